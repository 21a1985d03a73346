//! Account-level operations: login, profiles, activity, role management.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use rapport_types::models::{Gender, Photo, ProfileUpdate, Registration, Role, User};

use crate::credentials::{self, normalize_username};
use crate::error::{CoreError, CoreResult};
use crate::ports::{Change, Persistence};
use crate::tokens::{IssuedToken, TokenIssuer};

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: User,
}

/// Checks the password and mints a token carrying the user's roles.
pub fn login(
    store: &dyn Persistence,
    issuer: &TokenIssuer,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> CoreResult<LoginOutcome> {
    let user = credentials::authenticate(store, username, password)?;
    let roles = store.roles_for_user(user.id)?;
    let token = issuer.issue(user.id, &user.username, roles.iter().map(|r| r.as_str()), now)?;

    info!("{} ({}) logged in", user.username, user.id);
    Ok(LoginOutcome { token, user })
}

#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: User,
    pub photos: Vec<Photo>,
}

/// Other members only see approved photos; the owner sees all of theirs.
pub fn get_user(store: &dyn Persistence, viewer_id: Uuid, user_id: Uuid) -> CoreResult<UserDetail> {
    let user = store
        .find_user_by_id(user_id)?
        .ok_or(CoreError::UserNotFound)?;
    let is_owner = viewer_id == user_id;
    let photos = store
        .photos_for_user(user_id)?
        .into_iter()
        .filter(|p| is_owner || p.is_approved)
        .collect();
    Ok(UserDetail { user, photos })
}

pub fn update_profile(
    store: &dyn Persistence,
    user_id: Uuid,
    profile: ProfileUpdate,
) -> CoreResult<User> {
    if !store.apply(&[Change::UpdateProfile { user_id, profile }])? {
        return Err(CoreError::UserNotFound);
    }
    store
        .find_user_by_id(user_id)?
        .ok_or(CoreError::UserNotFound)
}

/// Stamps `last_active`.
pub fn record_activity(store: &dyn Persistence, user_id: Uuid, now: DateTime<Utc>) -> CoreResult<()> {
    if !store.apply(&[Change::TouchLastActive { user_id, at: now }])? {
        return Err(CoreError::UserNotFound);
    }
    Ok(())
}

/// Replaces the user's roles. Names must match a known role exactly.
pub fn edit_roles(
    store: &dyn Persistence,
    user_id: Uuid,
    role_names: &[String],
) -> CoreResult<Vec<Role>> {
    let mut roles = role_names
        .iter()
        .map(|name| name.parse::<Role>().map_err(CoreError::InvalidInput))
        .collect::<CoreResult<Vec<_>>>()?;
    roles.sort();
    roles.dedup();

    if !store.apply(&[Change::ReplaceRoles {
        user_id,
        roles: roles.clone(),
    }])? {
        return Err(CoreError::UserNotFound);
    }

    info!("Roles of {} set to {:?}", user_id, roles);
    Ok(roles)
}

/// Creates an administrator account unless the username already exists.
/// Returns the new user, or `None` when nothing was created.
pub fn seed_admin(
    store: &dyn Persistence,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> CoreResult<Option<User>> {
    if store
        .find_user_by_username(&normalize_username(username))?
        .is_some()
    {
        return Ok(None);
    }

    let registration = Registration {
        username: username.to_string(),
        gender: Gender::Male,
        known_as: "Admin".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        city: String::new(),
        country: String::new(),
    };
    let user = credentials::create_account(
        store,
        &registration,
        password,
        &[Role::Admin, Role::Moderator],
        now,
    )?;
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::policy::{self, MODERATE_PHOTO_ROLE, REQUIRE_ADMIN_ROLE};
    use crate::tokens::default_ttl;
    use chrono::Duration;

    fn registration(name: &str) -> Registration {
        Registration {
            username: name.into(),
            gender: Gender::Female,
            known_as: name.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 8, 20).unwrap(),
            city: "Lyon".into(),
            country: "France".into(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"members-test-secret", default_ttl()).unwrap()
    }

    #[test]
    fn login_issues_token_with_roles() {
        let store = MemoryStore::new();
        let user = credentials::register(&store, &registration("Zoe"), "pa55word", Utc::now()).unwrap();

        let now = Utc::now();
        let outcome = login(&store, &issuer(), "ZOE", "pa55word", now).unwrap();
        assert_eq!(outcome.user.id, user.id);

        let claims = issuer().verify(&outcome.token.token, now).unwrap();
        assert_eq!(claims.user_id(), Some(user.id));
        assert_eq!(claims.username(), Some("zoe"));
        assert!(claims.has_role("Member"));
        assert!(!policy::authorize(&claims, REQUIRE_ADMIN_ROLE).unwrap());

        assert!(matches!(
            login(&store, &issuer(), "zoe", "wrong", now),
            Err(CoreError::InvalidCredentials)
        ));
    }

    #[test]
    fn seeded_admin_passes_admin_policies() {
        let store = MemoryStore::new();
        let admin = seed_admin(&store, "admin", "password", Utc::now()).unwrap().unwrap();
        assert!(seed_admin(&store, "ADMIN", "other", Utc::now()).unwrap().is_none());

        let outcome = login(&store, &issuer(), "admin", "password", Utc::now()).unwrap();
        let claims = &outcome.token.claims;
        assert_eq!(claims.user_id(), Some(admin.id));
        assert!(policy::authorize(claims, REQUIRE_ADMIN_ROLE).unwrap());
        assert!(policy::authorize(claims, MODERATE_PHOTO_ROLE).unwrap());
    }

    #[test]
    fn edit_roles_validates_names() {
        let store = MemoryStore::new();
        let user = credentials::register(&store, &registration("amy"), "pw1234", Utc::now()).unwrap();

        let roles = edit_roles(&store, user.id, &["VIP".into(), "Member".into(), "VIP".into()]).unwrap();
        assert_eq!(roles, vec![Role::Member, Role::Vip]);
        assert_eq!(store.roles_for_user(user.id).unwrap(), roles);

        assert!(matches!(
            edit_roles(&store, user.id, &["Overlord".into()]),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            edit_roles(&store, Uuid::new_v4(), &["Member".into()]),
            Err(CoreError::UserNotFound)
        ));
    }

    #[test]
    fn profile_and_activity_updates() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let user = credentials::register(&store, &registration("eve"), "pw1234", t0).unwrap();

        let updated = update_profile(
            &store,
            user.id,
            ProfileUpdate {
                introduction: Some("hi".into()),
                city: "Nice".into(),
                country: "France".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.introduction.as_deref(), Some("hi"));
        assert_eq!(updated.city, "Nice");

        let later = t0 + Duration::minutes(5);
        record_activity(&store, user.id, later).unwrap();
        assert_eq!(store.find_user_by_id(user.id).unwrap().unwrap().last_active, later);
        assert!(matches!(
            record_activity(&store, Uuid::new_v4(), later),
            Err(CoreError::UserNotFound)
        ));
    }

    #[test]
    fn get_user_unknown() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_user(&store, Uuid::new_v4(), Uuid::new_v4()),
            Err(CoreError::UserNotFound)
        ));
    }
}
