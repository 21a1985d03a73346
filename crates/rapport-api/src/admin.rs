use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use rapport_core::{members, policy, relations};
use rapport_types::api::{EditRolesRequest, PhotoForModeration};
use rapport_types::claims::Claims;

use crate::auth::AppState;
use crate::error::{ApiResult, run_blocking};

pub async fn photos_for_moderation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PhotoForModeration>>> {
    policy::require(&claims, policy::MODERATE_PHOTO_ROLE)?;

    let st = state.clone();
    let photos = run_blocking(move || relations::photos_for_moderation(st.store.as_ref())).await?;

    Ok(Json(photos.iter().map(PhotoForModeration::from).collect()))
}

pub async fn approve_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    policy::require(&claims, policy::MODERATE_PHOTO_ROLE)?;

    let st = state.clone();
    run_blocking(move || relations::approve_photo(st.store.as_ref(), id)).await?;

    Ok(StatusCode::OK)
}

/// Replaces a user's roles; answers with the resulting role names.
pub async fn edit_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditRolesRequest>,
) -> ApiResult<Json<Vec<String>>> {
    policy::require(&claims, policy::REQUIRE_ADMIN_ROLE)?;

    let st = state.clone();
    let roles =
        run_blocking(move || members::edit_roles(st.store.as_ref(), user_id, &req.role_names))
            .await?;

    Ok(Json(roles.iter().map(|r| r.to_string()).collect()))
}
