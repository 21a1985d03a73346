use thiserror::Error;

/// Every failure the engine can report.
///
/// Validation-shaped variants are expected outcomes the caller maps to a
/// client error. `StorageUnavailable` and `Crypto` are infrastructure faults
/// (see [`CoreError::is_infrastructure`]) and are never retried here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Username is already taken")]
    DuplicateUsername,

    /// Returned for both an unknown username and a wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Unknown policy '{0}'")]
    UnknownPolicy(String),

    #[error("Not permitted")]
    Unauthorized,

    #[error("You cannot like yourself")]
    SelfLike,

    #[error("You've already liked this user")]
    AlreadyLiked,

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Photo does not belong to this user")]
    PhotoNotOwned,

    #[error("This is already the main photo")]
    AlreadyMain,

    #[error("You cannot delete your main photo")]
    CannotDeleteMainPhoto,

    #[error("User not found")]
    UserNotFound,

    #[error("Photo not found")]
    PhotoNotFound,

    /// A stored precondition no longer held when the change was applied.
    #[error("The resource was modified concurrently")]
    ConcurrentModification,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0:#}")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error("Crypto failure: {0}")]
    Crypto(String),
}

impl CoreError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CoreError::StorageUnavailable(_) | CoreError::Crypto(_))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::StorageUnavailable(err)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_infrastructure() {
        let err: CoreError = anyhow::anyhow!("disk on fire").into();
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn validation_errors_are_not_infrastructure() {
        for err in [
            CoreError::SelfLike,
            CoreError::AlreadyMain,
            CoreError::DuplicateUsername,
            CoreError::Unauthorized,
        ] {
            assert!(!err.is_infrastructure());
        }
    }
}
