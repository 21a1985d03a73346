use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_auth, track_activity};
use crate::photos::{self, MAX_PHOTO_SIZE};
use crate::{admin, users};

/// Every API route, mounted under `/api`.
///
/// Path parameters at the same position share a name; handlers read them by
/// position.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let member_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user).put(users::update_user))
        .route("/users/{id}/like/{recipient_id}", post(users::like_user))
        .route(
            "/users/{id}/photos",
            post(photos::add_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_SIZE)),
        )
        .route(
            "/users/{id}/photos/{photo_id}",
            get(photos::get_photo).delete(photos::delete_photo),
        )
        .route("/users/{id}/photos/{photo_id}/setMain", post(photos::set_main_photo))
        // track_activity needs the claims, so require_auth wraps it.
        .layer(middleware::from_fn_with_state(state.clone(), track_activity))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/photosForModeration", get(admin::photos_for_moderation))
        .route("/admin/approvePhoto/{id}", post(admin::approve_photo))
        .route("/admin/editRoles/{id}", post(admin::edit_roles))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .with_state(state);

    Router::new().nest("/api", api)
}
