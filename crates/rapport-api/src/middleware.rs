use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use rapport_core::{CoreError, members, policy};
use rapport_types::claims::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// Extract and validate the bearer token, then attach its `Claims` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(CoreError::TokenInvalid)?;

        state.issuer.verify(token, Utc::now())?
    };
    policy::require(&claims, policy::AUTHENTICATED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Stamps the caller's `last_active` once the request has been handled.
/// Must run inside `require_auth`.
pub async fn track_activity(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let user_id = req.extensions().get::<Claims>().and_then(Claims::user_id);
    let response = next.run(req).await;

    if let Some(user_id) = user_id {
        let st = state.clone();
        let result =
            run_blocking(move || members::record_activity(st.store.as_ref(), user_id, Utc::now()))
                .await;
        if let Err(e) = result {
            warn!("Failed to record activity for {}: {}", user_id, e);
        }
    }

    response
}
