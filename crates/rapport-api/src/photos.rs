use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use rapport_core::{CoreError, policy, relations};
use rapport_types::api::{AddPhotoQuery, PhotoResponse};
use rapport_types::claims::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, run_blocking};

/// 10 MB upload limit for photos
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

pub async fn get_photo(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<PhotoResponse>> {
    let viewer = claims.user_id().ok_or(CoreError::Unauthorized)?;

    let st = state.clone();
    let photo = run_blocking(move || relations::get_photo(st.store.as_ref(), viewer, id)).await?;
    if photo.user_id != user_id {
        return Err(CoreError::PhotoNotFound.into());
    }

    Ok(Json(PhotoResponse::from(&photo)))
}

/// POST /users/{id}/photos with the raw image bytes as the body.
pub async fn add_photo(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AddPhotoQuery>,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    policy::ensure_owner(&claims, user_id)?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No photo supplied".into()));
    }
    if bytes.len() > MAX_PHOTO_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let st = state.clone();
    let photo = run_blocking(move || {
        relations::add_photo(
            st.store.as_ref(),
            st.blobs.as_ref(),
            user_id,
            &bytes,
            &query.description,
            Utc::now(),
        )
    })
    .await?;

    let location = format!("/api/users/{}/photos/{}", user_id, photo.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PhotoResponse::from(&photo)),
    ))
}

pub async fn set_main_photo(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    policy::ensure_owner(&claims, user_id)?;

    let st = state.clone();
    run_blocking(move || relations::set_main_photo(st.store.as_ref(), user_id, id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    policy::ensure_owner(&claims, user_id)?;

    let st = state.clone();
    run_blocking(move || {
        relations::delete_photo(st.store.as_ref(), st.blobs.as_ref(), user_id, id)
    })
    .await?;

    Ok(StatusCode::OK)
}
