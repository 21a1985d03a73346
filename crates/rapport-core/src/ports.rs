//! Collaborator contracts: persistence and blob hosting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rapport_types::models::{Like, Photo, ProfileUpdate, Role, User};

use crate::credentials::Credential;
use crate::search::UserQuery;

/// A user together with the credential it signs in with.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user: User,
    pub credential: Credential,
}

/// One step of a unit of work handed to [`Persistence::apply`].
///
/// Each change carries its own precondition. The store checks it inside the
/// same transaction that performs the write and reports a violation by
/// returning `Ok(false)` from `apply`, rolling back every change in the batch.
#[derive(Debug, Clone)]
pub enum Change {
    /// Requires that no user with the same (lower-cased) username exists.
    InsertUser {
        user: User,
        credential: Credential,
        roles: Vec<Role>,
    },
    /// Requires that the user exists.
    UpdateProfile { user_id: Uuid, profile: ProfileUpdate },
    /// Requires that the user exists.
    TouchLastActive { user_id: Uuid, at: DateTime<Utc> },
    /// Replaces the role set. Requires that the user exists.
    ReplaceRoles { user_id: Uuid, roles: Vec<Role> },
    /// If `photo.is_main`, requires that the owner has no main photo yet.
    InsertPhoto(Photo),
    /// Demotes `from` and promotes `to`, in that order. Requires `from` to be
    /// the owner's current main photo (or, when `None`, that there is none)
    /// and `to` to be a non-main photo of the same owner.
    SwapMainPhoto {
        user_id: Uuid,
        from: Option<Uuid>,
        to: Uuid,
    },
    /// Requires the photo to belong to `user_id` and not be main.
    DeletePhoto { user_id: Uuid, photo_id: Uuid },
    /// Requires that the photo exists.
    ApprovePhoto { photo_id: Uuid },
    /// Requires that the directed edge does not exist yet.
    InsertLike(Like),
}

/// Persistent storage. All methods may fail; the engine reports failures as
/// [`CoreError::StorageUnavailable`](crate::CoreError::StorageUnavailable).
pub trait Persistence: Send + Sync {
    /// `username` is compared case-insensitively.
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>>;

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    fn roles_for_user(&self, id: Uuid) -> Result<Vec<Role>>;

    /// Looks a photo up regardless of approval state.
    fn find_photo(&self, id: Uuid) -> Result<Option<Photo>>;

    fn photos_for_user(&self, user_id: Uuid) -> Result<Vec<Photo>>;

    fn photos_awaiting_approval(&self) -> Result<Vec<Photo>>;

    fn like_exists(&self, liker_id: Uuid, likee_id: Uuid) -> Result<bool>;

    /// Candidate users for a search. The query is a hint; implementations may
    /// pre-narrow by it but the engine filters and orders the result itself.
    fn list_users(&self, query: &UserQuery) -> Result<Vec<User>>;

    /// Applies every change or none. `Ok(false)` means a precondition failed.
    fn apply(&self, changes: &[Change]) -> Result<bool>;
}

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub public_id: String,
}

/// Third-party image host.
pub trait BlobStore: Send + Sync {
    fn upload(&self, bytes: &[u8]) -> Result<StoredBlob>;

    /// `Ok(false)` means the host refused to release the blob. A blob that is
    /// already absent counts as released.
    fn delete(&self, public_id: &str) -> Result<bool>;
}
