use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;
use tracing::{debug, info};
use uuid::Uuid;

use rapport_types::models::{Registration, Role, User};

use crate::error::{CoreError, CoreResult};
use crate::ports::{Change, Persistence};

type HmacSha512 = Hmac<Sha512>;

/// Salt length in bytes; also the HMAC-SHA512 key size.
const SALT_LEN: usize = 128;

/// Salted password hash for one username.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// Hashes `password` under a fresh random salt.
    pub fn create(username: &str, password: &str) -> CoreResult<Self> {
        let mut salt = vec![0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let hash = keyed_hash(&salt, password)?;

        Ok(Self {
            username: normalize_username(username),
            password_hash: hash,
            password_salt: salt,
        })
    }

    /// Constant-time comparison against the stored hash.
    pub fn matches(&self, password: &str) -> bool {
        let Ok(mut mac) = HmacSha512::new_from_slice(&self.password_salt) else {
            return false;
        };
        mac.update(password.as_bytes());
        mac.verify_slice(&self.password_hash).is_ok()
    }
}

fn keyed_hash(salt: &[u8], password: &str) -> CoreResult<Vec<u8>> {
    let mut mac =
        HmacSha512::new_from_slice(salt).map_err(|e| CoreError::Crypto(e.to_string()))?;
    mac.update(password.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Usernames are stored and compared lower-cased.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Creates a member account. Fails with `DuplicateUsername` when the name is
/// taken in any letter case.
pub fn register(
    store: &dyn Persistence,
    registration: &Registration,
    password: &str,
    now: DateTime<Utc>,
) -> CoreResult<User> {
    create_account(store, registration, password, &[Role::Member], now)
}

pub(crate) fn create_account(
    store: &dyn Persistence,
    registration: &Registration,
    password: &str,
    roles: &[Role],
    now: DateTime<Utc>,
) -> CoreResult<User> {
    let username = normalize_username(&registration.username);
    if username.is_empty() {
        return Err(CoreError::InvalidInput("username must not be empty".into()));
    }

    if store.find_user_by_username(&username)?.is_some() {
        return Err(CoreError::DuplicateUsername);
    }

    let credential = Credential::create(&username, password)?;
    let user = User {
        id: Uuid::new_v4(),
        username: username.clone(),
        gender: registration.gender,
        date_of_birth: registration.date_of_birth,
        known_as: registration.known_as.clone(),
        created_at: now,
        last_active: now,
        introduction: None,
        looking_for: None,
        interests: None,
        city: registration.city.clone(),
        country: registration.country.clone(),
        photo_url: None,
    };

    // The store re-checks uniqueness inside its transaction.
    let created = store.apply(&[Change::InsertUser {
        user: user.clone(),
        credential,
        roles: roles.to_vec(),
    }])?;
    if !created {
        return Err(CoreError::DuplicateUsername);
    }

    info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// `Ok(false)` for an unknown username or a wrong password alike.
pub fn verify(store: &dyn Persistence, username: &str, password: &str) -> CoreResult<bool> {
    Ok(lookup(store, username, password)?.is_some())
}

/// Like [`verify`] but returns the account's user, or `InvalidCredentials`.
pub fn authenticate(store: &dyn Persistence, username: &str, password: &str) -> CoreResult<User> {
    lookup(store, username, password)?.ok_or(CoreError::InvalidCredentials)
}

fn lookup(store: &dyn Persistence, username: &str, password: &str) -> CoreResult<Option<User>> {
    let username = normalize_username(username);
    match store.find_user_by_username(&username)? {
        Some(account) if account.credential.matches(password) => Ok(Some(account.user)),
        Some(_) => {
            debug!("Password mismatch for {}", username);
            Ok(None)
        }
        None => {
            // Spend the same hashing work as a real comparison.
            let _ = keyed_hash(&[0u8; SALT_LEN], password);
            debug!("Login attempt for unknown user {}", username);
            Ok(None)
        }
    }
}
