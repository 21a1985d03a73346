//! Likes and photos, and the invariants between them: one directed edge per
//! ordered pair, no self-likes, exactly one main photo per user with photos.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use rapport_types::models::{Like, Photo};

use crate::error::{CoreError, CoreResult};
use crate::ports::{BlobStore, Change, Persistence};

pub fn like(
    store: &dyn Persistence,
    liker_id: Uuid,
    likee_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Like> {
    if liker_id == likee_id {
        return Err(CoreError::SelfLike);
    }
    if store.like_exists(liker_id, likee_id)? {
        return Err(CoreError::AlreadyLiked);
    }
    if store.find_user_by_id(likee_id)?.is_none() {
        return Err(CoreError::RecipientNotFound);
    }

    let like = Like {
        liker_id,
        likee_id,
        created_at: now,
    };
    // A concurrent request may have created the edge since the check above.
    if !store.apply(&[Change::InsertLike(like.clone())])? {
        return Err(CoreError::AlreadyLiked);
    }

    info!("{} liked {}", liker_id, likee_id);
    Ok(like)
}

fn owned_photo(store: &dyn Persistence, user_id: Uuid, photo_id: Uuid) -> CoreResult<Photo> {
    match store.find_photo(photo_id)? {
        Some(photo) if photo.user_id == user_id => Ok(photo),
        _ => Err(CoreError::PhotoNotOwned),
    }
}

/// Returns a photo to `viewer_id`. Unapproved photos are visible to their
/// owner only.
pub fn get_photo(store: &dyn Persistence, viewer_id: Uuid, photo_id: Uuid) -> CoreResult<Photo> {
    match store.find_photo(photo_id)? {
        Some(photo) if photo.is_approved || photo.user_id == viewer_id => Ok(photo),
        _ => Err(CoreError::PhotoNotFound),
    }
}

/// Uploads `bytes` and records the photo. The user's first photo becomes main.
pub fn add_photo(
    store: &dyn Persistence,
    blobs: &dyn BlobStore,
    user_id: Uuid,
    bytes: &[u8],
    description: &str,
    now: DateTime<Utc>,
) -> CoreResult<Photo> {
    if bytes.is_empty() {
        return Err(CoreError::InvalidInput("photo is empty".into()));
    }
    if store.find_user_by_id(user_id)?.is_none() {
        return Err(CoreError::UserNotFound);
    }
    let has_main = store.photos_for_user(user_id)?.iter().any(|p| p.is_main);

    let blob = blobs.upload(bytes)?;
    let photo = Photo {
        id: Uuid::new_v4(),
        user_id,
        url: blob.url,
        description: description.to_string(),
        date_added: now,
        is_main: !has_main,
        public_id: Some(blob.public_id),
        is_approved: false,
    };

    match store.apply(&[Change::InsertPhoto(photo.clone())]) {
        Ok(true) => {
            info!("Added photo {} for {} (main: {})", photo.id, user_id, photo.is_main);
            Ok(photo)
        }
        Ok(false) => {
            release_orphan(blobs, &photo);
            Err(CoreError::ConcurrentModification)
        }
        Err(e) => {
            release_orphan(blobs, &photo);
            Err(e.into())
        }
    }
}

fn release_orphan(blobs: &dyn BlobStore, photo: &Photo) {
    let Some(public_id) = photo.public_id.as_deref() else {
        return;
    };
    match blobs.delete(public_id) {
        Ok(true) => {}
        Ok(false) => warn!("Blob store refused to release orphaned blob {}", public_id),
        Err(e) => warn!("Failed to release orphaned blob {}: {:#}", public_id, e),
    }
}

/// Makes `photo_id` the user's main photo, demoting the previous one in the
/// same unit of work.
pub fn set_main_photo(store: &dyn Persistence, user_id: Uuid, photo_id: Uuid) -> CoreResult<()> {
    let photo = owned_photo(store, user_id, photo_id)?;
    if photo.is_main {
        return Err(CoreError::AlreadyMain);
    }

    let current = store
        .photos_for_user(user_id)?
        .into_iter()
        .find(|p| p.is_main)
        .map(|p| p.id);

    let swapped = store.apply(&[Change::SwapMainPhoto {
        user_id,
        from: current,
        to: photo_id,
    }])?;
    if !swapped {
        return Err(CoreError::ConcurrentModification);
    }

    info!("Main photo of {} is now {}", user_id, photo_id);
    Ok(())
}

/// Deletes a non-main photo. The blob is released first; if that fails the
/// record is kept and the failure returned.
pub fn delete_photo(
    store: &dyn Persistence,
    blobs: &dyn BlobStore,
    user_id: Uuid,
    photo_id: Uuid,
) -> CoreResult<()> {
    let photo = owned_photo(store, user_id, photo_id)?;
    if photo.is_main {
        return Err(CoreError::CannotDeleteMainPhoto);
    }

    if let Some(public_id) = photo.public_id.as_deref() {
        let released = blobs
            .delete(public_id)
            .map_err(|e| e.context(format!("releasing blob {}", public_id)))?;
        if !released {
            return Err(CoreError::StorageUnavailable(anyhow!(
                "blob store refused to release {}",
                public_id
            )));
        }
    }

    let deleted = store.apply(&[Change::DeletePhoto { user_id, photo_id }])?;
    if !deleted {
        warn!(
            "Blob for photo {} was released but the record changed concurrently",
            photo_id
        );
        return Err(CoreError::ConcurrentModification);
    }

    info!("Deleted photo {} of {}", photo_id, user_id);
    Ok(())
}

pub fn photos_for_moderation(store: &dyn Persistence) -> CoreResult<Vec<Photo>> {
    Ok(store.photos_awaiting_approval()?)
}

pub fn approve_photo(store: &dyn Persistence, photo_id: Uuid) -> CoreResult<()> {
    if store.find_photo(photo_id)?.is_none() {
        return Err(CoreError::PhotoNotFound);
    }
    if !store.apply(&[Change::ApprovePhoto { photo_id }])? {
        return Err(CoreError::PhotoNotFound);
    }
    info!("Approved photo {}", photo_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::credentials::Credential;
    use crate::memory::MemoryStore;
    use crate::ports::StoredBlob;
    use chrono::NaiveDate;
    use rapport_types::models::{Gender, Role, User};

    #[derive(Default)]
    struct FakeBlobs {
        stored: Mutex<Vec<String>>,
        refuse_delete: bool,
    }

    impl FakeBlobs {
        fn count(&self) -> usize {
            self.stored.lock().unwrap().len()
        }

        fn lose(&self, public_id: &str) {
            self.stored.lock().unwrap().retain(|id| id != public_id);
        }
    }

    impl BlobStore for FakeBlobs {
        fn upload(&self, _bytes: &[u8]) -> anyhow::Result<StoredBlob> {
            let public_id = Uuid::new_v4().to_string();
            self.stored.lock().unwrap().push(public_id.clone());
            Ok(StoredBlob {
                url: format!("http://blobs.test/{}", public_id),
                public_id,
            })
        }

        fn delete(&self, public_id: &str) -> anyhow::Result<bool> {
            if self.refuse_delete {
                return Ok(false);
            }
            self.stored.lock().unwrap().retain(|id| id != public_id);
            Ok(true)
        }
    }

    fn add_user(store: &MemoryStore, name: &str) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: name.into(),
            gender: Gender::Male,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            known_as: name.into(),
            created_at: now,
            last_active: now,
            introduction: None,
            looking_for: None,
            interests: None,
            city: "Oslo".into(),
            country: "Norway".into(),
            photo_url: None,
        };
        let credential = Credential::create(name, "pw").unwrap();
        assert!(
            store
                .apply(&[Change::InsertUser {
                    user: user.clone(),
                    credential,
                    roles: vec![Role::Member],
                }])
                .unwrap()
        );
        user.id
    }

    fn main_flags(store: &MemoryStore, user_id: Uuid) -> Vec<(Uuid, bool)> {
        store
            .photos_for_user(user_id)
            .unwrap()
            .into_iter()
            .map(|p| (p.id, p.is_main))
            .collect()
    }

    #[test]
    fn like_is_directed_and_deduplicated() {
        let store = MemoryStore::new();
        let a = add_user(&store, "a");
        let b = add_user(&store, "b");

        like(&store, a, b, Utc::now()).unwrap();
        assert!(matches!(
            like(&store, a, b, Utc::now()),
            Err(CoreError::AlreadyLiked)
        ));
        assert!(!store.like_exists(b, a).unwrap());
        assert_eq!(store.like_count(), 1);

        like(&store, b, a, Utc::now()).unwrap();
        assert_eq!(store.like_count(), 2);
    }

    #[test]
    fn self_like_and_missing_recipient() {
        let store = MemoryStore::new();
        let a = add_user(&store, "a");
        assert!(matches!(like(&store, a, a, Utc::now()), Err(CoreError::SelfLike)));
        assert!(matches!(
            like(&store, a, Uuid::new_v4(), Utc::now()),
            Err(CoreError::RecipientNotFound)
        ));
        assert_eq!(store.like_count(), 0);
    }

    #[test]
    fn first_photo_becomes_main() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");

        let p1 = add_photo(&store, &blobs, a, b"jpeg", "beach", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"jpeg", "hike", Utc::now()).unwrap();
        assert!(p1.is_main);
        assert!(!p2.is_main);
        assert!(!p1.is_approved);
        assert_eq!(
            store.find_user_by_id(a).unwrap().unwrap().photo_url,
            Some(p1.url)
        );
    }

    #[test]
    fn set_main_swaps_exactly_one_flag() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let p1 = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        set_main_photo(&store, a, p2.id).unwrap();
        let mut flags = main_flags(&store, a);
        flags.sort();
        let mut expected = vec![(p1.id, false), (p2.id, true)];
        expected.sort();
        assert_eq!(flags, expected);

        assert!(matches!(
            set_main_photo(&store, a, p2.id),
            Err(CoreError::AlreadyMain)
        ));
    }

    #[test]
    fn photos_of_others_are_not_owned() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let b = add_user(&store, "b");
        let pa = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let pa2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        assert!(matches!(
            set_main_photo(&store, b, pa2.id),
            Err(CoreError::PhotoNotOwned)
        ));
        assert!(matches!(
            delete_photo(&store, &blobs, b, pa.id),
            Err(CoreError::PhotoNotOwned)
        ));
        assert!(matches!(
            set_main_photo(&store, a, Uuid::new_v4()),
            Err(CoreError::PhotoNotOwned)
        ));
    }

    #[test]
    fn main_photo_cannot_be_deleted() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let p1 = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        assert!(matches!(
            delete_photo(&store, &blobs, a, p1.id),
            Err(CoreError::CannotDeleteMainPhoto)
        ));

        delete_photo(&store, &blobs, a, p2.id).unwrap();
        assert_eq!(blobs.count(), 1);
        assert_eq!(main_flags(&store, a), vec![(p1.id, true)]);
    }

    #[test]
    fn refused_blob_release_keeps_the_record() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs {
            refuse_delete: true,
            ..Default::default()
        };
        let a = add_user(&store, "a");
        add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        let err = delete_photo(&store, &blobs, a, p2.id).unwrap_err();
        assert!(err.is_infrastructure());
        assert!(store.find_photo(p2.id).unwrap().is_some());
    }

    #[test]
    fn failed_save_releases_the_uploaded_blob() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");

        store.fail_next_apply();
        let err = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::StorageUnavailable(_)));
        assert_eq!(blobs.count(), 0);
        assert!(store.photos_for_user(a).unwrap().is_empty());
    }

    #[test]
    fn unapproved_photos_are_private_until_approved() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let b = add_user(&store, "b");
        let p = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();

        assert!(get_photo(&store, a, p.id).is_ok());
        assert!(matches!(
            get_photo(&store, b, p.id),
            Err(CoreError::PhotoNotFound)
        ));
        assert_eq!(photos_for_moderation(&store).unwrap().len(), 1);

        approve_photo(&store, p.id).unwrap();
        assert!(get_photo(&store, b, p.id).is_ok());
        assert!(photos_for_moderation(&store).unwrap().is_empty());
        assert!(matches!(
            approve_photo(&store, Uuid::new_v4()),
            Err(CoreError::PhotoNotFound)
        ));
    }

    #[test]
    fn missing_blob_does_not_block_deletion() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        blobs.lose(p2.public_id.as_deref().unwrap());
        delete_photo(&store, &blobs, a, p2.id).unwrap();

        assert!(store.find_photo(p2.id).unwrap().is_none());
        assert!(matches!(
            delete_photo(&store, &blobs, a, p2.id),
            Err(CoreError::PhotoNotOwned)
        ));
    }

    #[test]
    fn like_lost_to_a_concurrent_writer() {
        let store = MemoryStore::new();
        let a = add_user(&store, "a");
        let b = add_user(&store, "b");

        store.interleave_next_apply(vec![Change::InsertLike(Like {
            liker_id: a,
            likee_id: b,
            created_at: Utc::now(),
        })]);
        assert!(matches!(
            like(&store, a, b, Utc::now()),
            Err(CoreError::AlreadyLiked)
        ));
        assert_eq!(store.like_count(), 1);
    }

    #[test]
    fn set_main_lost_to_a_concurrent_swap() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let p1 = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();
        let p3 = add_photo(&store, &blobs, a, b"3", "", Utc::now()).unwrap();

        store.interleave_next_apply(vec![Change::SwapMainPhoto {
            user_id: a,
            from: Some(p1.id),
            to: p3.id,
        }]);
        assert!(matches!(
            set_main_photo(&store, a, p2.id),
            Err(CoreError::ConcurrentModification)
        ));

        let mains: Vec<Uuid> = main_flags(&store, a)
            .into_iter()
            .filter(|(_, main)| *main)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(mains, vec![p3.id]);
    }

    #[test]
    fn delete_after_photo_became_main_concurrently() {
        let store = MemoryStore::new();
        let blobs = FakeBlobs::default();
        let a = add_user(&store, "a");
        let p1 = add_photo(&store, &blobs, a, b"1", "", Utc::now()).unwrap();
        let p2 = add_photo(&store, &blobs, a, b"2", "", Utc::now()).unwrap();

        store.interleave_next_apply(vec![Change::SwapMainPhoto {
            user_id: a,
            from: Some(p1.id),
            to: p2.id,
        }]);
        assert!(matches!(
            delete_photo(&store, &blobs, a, p2.id),
            Err(CoreError::ConcurrentModification)
        ));

        // The record survives as the main photo; its blob was already released.
        let p2 = store.find_photo(p2.id).unwrap().unwrap();
        assert!(p2.is_main);
        assert_eq!(blobs.count(), 1);
    }
}
