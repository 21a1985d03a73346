use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimKind {
    Identity,
    Name,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub kind: ClaimKind,
    pub value: String,
}

impl Claim {
    pub fn new(kind: ClaimKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Verified assertions about the caller, as carried by a session token.
///
/// Shared by the token issuer (which produces them), the policy evaluator and
/// the HTTP middleware (which attaches them to each request). Handlers receive
/// them explicitly; there is no ambient session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub items: Vec<Claim>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    fn first(&self, kind: ClaimKind) -> Option<&str> {
        self.items
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    /// The caller's user id, if the Identity claim is present and well formed.
    pub fn user_id(&self) -> Option<Uuid> {
        self.first(ClaimKind::Identity)?.parse().ok()
    }

    pub fn username(&self) -> Option<&str> {
        self.first(ClaimKind::Name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|c| c.kind == ClaimKind::Role)
            .map(|c| c.value.as_str())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().any(|r| r == role)
    }
}
