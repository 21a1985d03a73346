use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use rapport_core::{CoreError, members, policy, relations, search};
use rapport_types::api::{UpdateUserRequest, UserForDetail, UserForList, UserListParams};
use rapport_types::claims::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, run_blocking};

pub const PAGINATION_HEADER: HeaderName = HeaderName::from_static("pagination");

fn caller(claims: &Claims) -> ApiResult<Uuid> {
    Ok(claims.user_id().ok_or(CoreError::Unauthorized)?)
}

/// GET /users: one page of matching members. Page metadata goes in the
/// `Pagination` header.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<UserListParams>,
) -> ApiResult<impl IntoResponse> {
    let requester = caller(&claims)?;
    let today = Utc::now().date_naive();

    let st = state.clone();
    let page = run_blocking(move || {
        search::search_users(st.store.as_ref(), requester, &params, today)
    })
    .await?;

    let meta = serde_json::to_string(&page.meta)
        .map_err(|e| ApiError::Internal(format!("serialising page metadata: {}", e)))?;
    let users: Vec<UserForList> = page
        .items
        .iter()
        .map(|u| UserForList::from_user(u, today))
        .collect();

    Ok((
        [
            (PAGINATION_HEADER, meta),
            (header::ACCESS_CONTROL_EXPOSE_HEADERS, "Pagination".to_string()),
        ],
        Json(users),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserForDetail>> {
    let viewer = caller(&claims)?;

    let st = state.clone();
    let detail = run_blocking(move || members::get_user(st.store.as_ref(), viewer, id)).await?;

    Ok(Json(UserForDetail::new(
        &detail.user,
        &detail.photos,
        Utc::now().date_naive(),
    )))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<StatusCode> {
    policy::ensure_owner(&claims, id)?;

    let st = state.clone();
    run_blocking(move || members::update_profile(st.store.as_ref(), id, req.into())).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_user(
    State(state): State<AppState>,
    Path((id, recipient_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    policy::ensure_owner(&claims, id)?;

    let st = state.clone();
    run_blocking(move || relations::like(st.store.as_ref(), id, recipient_id, Utc::now())).await?;

    Ok(StatusCode::OK)
}
