//! Named authorization policies over a verified claim set.

use uuid::Uuid;

use rapport_types::claims::Claims;
use rapport_types::models::Role;

use crate::error::{CoreError, CoreResult};

pub const AUTHENTICATED: &str = "Authenticated";
pub const REQUIRE_ADMIN_ROLE: &str = "RequireAdminRole";
pub const MODERATE_PHOTO_ROLE: &str = "ModeratePhotoRole";
pub const VIP_ONLY: &str = "VipOnly";

type Rule = fn(&Claims) -> bool;

fn authenticated(claims: &Claims) -> bool {
    claims.user_id().is_some()
}

fn admin(claims: &Claims) -> bool {
    claims.has_role(Role::Admin.as_str())
}

fn photo_moderator(claims: &Claims) -> bool {
    admin(claims) || claims.has_role(Role::Moderator.as_str())
}

fn vip(claims: &Claims) -> bool {
    claims.has_role(Role::Vip.as_str())
}

/// The process-wide policy table. Read-only; no reload.
static POLICIES: [(&str, Rule); 4] = [
    (AUTHENTICATED, authenticated),
    (REQUIRE_ADMIN_ROLE, admin),
    (MODERATE_PHOTO_ROLE, photo_moderator),
    (VIP_ONLY, vip),
];

/// Evaluates `policy` against `claims`. Pure; `UnknownPolicy` for a name
/// missing from the table.
pub fn authorize(claims: &Claims, policy: &str) -> CoreResult<bool> {
    POLICIES
        .iter()
        .find(|(name, _)| *name == policy)
        .map(|(_, rule)| rule(claims))
        .ok_or_else(|| CoreError::UnknownPolicy(policy.to_string()))
}

/// Like [`authorize`] but turns a `false` into `Unauthorized`.
pub fn require(claims: &Claims, policy: &str) -> CoreResult<()> {
    if authorize(claims, policy)? {
        Ok(())
    } else {
        Err(CoreError::Unauthorized)
    }
}

/// The caller must be the owner of the resource.
pub fn ensure_owner(claims: &Claims, owner_id: Uuid) -> CoreResult<()> {
    match claims.user_id() {
        Some(id) if id == owner_id => Ok(()),
        _ => Err(CoreError::Unauthorized),
    }
}
