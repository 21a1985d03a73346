use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;

use rapport_core::credentials;
use rapport_core::members;
use rapport_core::ports::{BlobStore, Persistence};
use rapport_core::tokens::TokenIssuer;
use rapport_types::api::{LoginRequest, LoginResponse, RegisterRequest, UserForDetail, UserForList};

use crate::error::{ApiError, ApiResult, run_blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Persistence>,
    pub blobs: Arc<dyn BlobStore>,
    pub issuer: TokenIssuer,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate input
    let username_len = req.username.trim().chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::BadRequest(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if !(4..=128).contains(&req.password.chars().count()) {
        return Err(ApiError::BadRequest(
            "Password must be between 4 and 128 characters".into(),
        ));
    }

    let st = state.clone();
    let user = run_blocking(move || {
        credentials::register(st.store.as_ref(), &req.registration(), &req.password, Utc::now())
    })
    .await?;

    let location = format!("/api/users/{}", user.id);
    let body = UserForDetail::new(&user, &[], Utc::now().date_naive());
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let st = state.clone();
    let outcome = run_blocking(move || {
        members::login(
            st.store.as_ref(),
            &st.issuer,
            &req.username,
            &req.password,
            Utc::now(),
        )
    })
    .await?;

    Ok(Json(LoginResponse {
        token: outcome.token.token,
        user: UserForList::from_user(&outcome.user, Utc::now().date_naive()),
    }))
}
