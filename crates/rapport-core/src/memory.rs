//! In-process [`Persistence`] implementation, used by tests and for running the
//! engine without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use uuid::Uuid;

use rapport_types::models::{Like, Photo, Role, User};

use crate::credentials::Credential;
use crate::ports::{Change, Persistence, UserAccount};
use crate::search::UserQuery;

#[derive(Debug, Default, Clone)]
struct State {
    users: BTreeMap<Uuid, User>,
    credentials: HashMap<Uuid, Credential>,
    roles: HashMap<Uuid, Vec<Role>>,
    photos: BTreeMap<Uuid, Photo>,
    likes: BTreeMap<(Uuid, Uuid), Like>,
}

impl State {
    fn main_photo(&self, user_id: Uuid) -> Option<&Photo> {
        self.photos
            .values()
            .find(|p| p.user_id == user_id && p.is_main)
    }

    fn with_photo_url(&self, user: &User) -> User {
        let mut user = user.clone();
        user.photo_url = self.main_photo(user.id).map(|p| p.url.clone());
        user
    }

    fn apply_change(&mut self, change: &Change) -> bool {
        match change {
            Change::InsertUser {
                user,
                credential,
                roles,
            } => {
                let taken = self
                    .credentials
                    .values()
                    .any(|c| c.username == credential.username);
                if taken || self.users.contains_key(&user.id) {
                    return false;
                }
                let mut roles = roles.clone();
                roles.sort();
                roles.dedup();
                self.users.insert(user.id, user.clone());
                self.credentials.insert(user.id, credential.clone());
                self.roles.insert(user.id, roles);
                true
            }
            Change::UpdateProfile { user_id, profile } => {
                let Some(user) = self.users.get_mut(user_id) else {
                    return false;
                };
                user.introduction = profile.introduction.clone();
                user.looking_for = profile.looking_for.clone();
                user.interests = profile.interests.clone();
                user.city = profile.city.clone();
                user.country = profile.country.clone();
                true
            }
            Change::TouchLastActive { user_id, at } => {
                let Some(user) = self.users.get_mut(user_id) else {
                    return false;
                };
                user.last_active = *at;
                true
            }
            Change::ReplaceRoles { user_id, roles } => {
                if !self.users.contains_key(user_id) {
                    return false;
                }
                let mut roles = roles.clone();
                roles.sort();
                roles.dedup();
                self.roles.insert(*user_id, roles);
                true
            }
            Change::InsertPhoto(photo) => {
                if !self.users.contains_key(&photo.user_id)
                    || self.photos.contains_key(&photo.id)
                    || (photo.is_main && self.main_photo(photo.user_id).is_some())
                {
                    return false;
                }
                self.photos.insert(photo.id, photo.clone());
                true
            }
            Change::SwapMainPhoto { user_id, from, to } => {
                let current = self.main_photo(*user_id).map(|p| p.id);
                if current != *from {
                    return false;
                }
                match self.photos.get(to) {
                    Some(p) if p.user_id == *user_id && !p.is_main => {}
                    _ => return false,
                }
                if let Some(old) = from.and_then(|id| self.photos.get_mut(&id)) {
                    old.is_main = false;
                }
                if let Some(new) = self.photos.get_mut(to) {
                    new.is_main = true;
                }
                true
            }
            Change::DeletePhoto { user_id, photo_id } => match self.photos.get(photo_id) {
                Some(p) if p.user_id == *user_id && !p.is_main => {
                    self.photos.remove(photo_id);
                    true
                }
                _ => false,
            },
            Change::ApprovePhoto { photo_id } => match self.photos.get_mut(photo_id) {
                Some(p) => {
                    p.is_approved = true;
                    true
                }
                None => false,
            },
            Change::InsertLike(like) => {
                let key = (like.liker_id, like.likee_id);
                if self.likes.contains_key(&key) {
                    return false;
                }
                self.likes.insert(key, like.clone());
                true
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_read: AtomicBool,
    fail_apply: AtomicBool,
    interleaved: Mutex<Vec<Change>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next read return an error.
    pub fn fail_next_read(&self) {
        self.fail_read.store(true, Ordering::SeqCst);
    }

    /// Makes the next `apply` return an error.
    pub fn fail_next_apply(&self) {
        self.fail_apply.store(true, Ordering::SeqCst);
    }

    /// Commits `changes` just before the next `apply`, as if another writer
    /// got there between the caller's checks and its write.
    pub fn interleave_next_apply(&self, changes: Vec<Change>) {
        if let Ok(mut pending) = self.interleaved.lock() {
            *pending = changes;
        }
    }

    pub fn like_count(&self) -> usize {
        self.lock().map(|s| s.likes.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))
    }

    fn read(&self) -> Result<MutexGuard<'_, State>> {
        if self.fail_read.swap(false, Ordering::SeqCst) {
            bail!("simulated read failure");
        }
        self.lock()
    }
}

impl Persistence for MemoryStore {
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let state = self.read()?;
        let username = username.to_lowercase();
        let account = state
            .credentials
            .iter()
            .find(|(_, c)| c.username == username)
            .and_then(|(id, c)| {
                state.users.get(id).map(|u| UserAccount {
                    user: state.with_photo_url(u),
                    credential: c.clone(),
                })
            });
        Ok(account)
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.read()?;
        Ok(state.users.get(&id).map(|u| state.with_photo_url(u)))
    }

    fn roles_for_user(&self, id: Uuid) -> Result<Vec<Role>> {
        Ok(self.read()?.roles.get(&id).cloned().unwrap_or_default())
    }

    fn find_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        Ok(self.read()?.photos.get(&id).cloned())
    }

    fn photos_for_user(&self, user_id: Uuid) -> Result<Vec<Photo>> {
        let state = self.read()?;
        let mut photos: Vec<Photo> = state
            .photos
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| (p.date_added, p.id));
        Ok(photos)
    }

    fn photos_awaiting_approval(&self) -> Result<Vec<Photo>> {
        let state = self.read()?;
        let mut photos: Vec<Photo> = state
            .photos
            .values()
            .filter(|p| !p.is_approved)
            .cloned()
            .collect();
        photos.sort_by_key(|p| (p.date_added, p.id));
        Ok(photos)
    }

    fn like_exists(&self, liker_id: Uuid, likee_id: Uuid) -> Result<bool> {
        Ok(self.read()?.likes.contains_key(&(liker_id, likee_id)))
    }

    fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let state = self.read()?;
        Ok(state
            .users
            .values()
            .filter(|u| u.id != query.requester_id)
            .map(|u| state.with_photo_url(u))
            .collect())
    }

    fn apply(&self, changes: &[Change]) -> Result<bool> {
        if self.fail_apply.swap(false, Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        let interleaved = std::mem::take(
            &mut *self
                .interleaved
                .lock()
                .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?,
        );
        let mut state = self.lock()?;
        if !interleaved.is_empty() {
            let mut other = state.clone();
            if interleaved.iter().all(|c| other.apply_change(c)) {
                *state = other;
            }
        }
        let mut draft = state.clone();
        for change in changes {
            if !draft.apply_change(change) {
                return Ok(false);
            }
        }
        *state = draft;
        Ok(true)
    }
}
