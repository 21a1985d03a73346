use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use rapport_core::{CoreError, CoreResult};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                internal()
            }
            ApiError::Core(err) => core_status(err),
        };

        (status, message).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn core_status(err: &CoreError) -> (StatusCode, String) {
    match err {
        // No hint about which part of the credentials or token was wrong.
        CoreError::InvalidCredentials | CoreError::TokenInvalid | CoreError::TokenExpired => {
            (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
        }
        CoreError::Unauthorized | CoreError::PhotoNotOwned => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        CoreError::SelfLike
        | CoreError::AlreadyLiked
        | CoreError::AlreadyMain
        | CoreError::CannotDeleteMainPhoto
        | CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CoreError::RecipientNotFound | CoreError::UserNotFound | CoreError::PhotoNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CoreError::DuplicateUsername | CoreError::ConcurrentModification => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CoreError::UnknownPolicy(_) | CoreError::StorageUnavailable(_) | CoreError::Crypto(_) => {
            error!("{:#}", err);
            internal()
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Runs blocking engine/storage work off the async runtime.
pub async fn run_blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::from)
}
