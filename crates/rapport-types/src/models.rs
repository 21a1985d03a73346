use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Roles a user can hold. Claims carry the role name verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Member,
    Admin,
    Moderator,
    #[serde(rename = "VIP")]
    Vip,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Member, Role::Admin, Role::Moderator, Role::Vip];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "Member",
            Role::Admin => "Admin",
            Role::Moderator => "Moderator",
            Role::Vip => "VIP",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// A member profile. Photos and likes are referenced by id through the
/// persistence layer, never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub known_as: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub city: String,
    pub country: String,
    /// Url of the current main photo, if any.
    pub photo_url: Option<String>,
}

impl User {
    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_on(self.date_of_birth, today)
    }
}

pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub description: String,
    pub date_added: DateTime<Utc>,
    pub is_main: bool,
    /// Blob store handle; `None` for photos not held by the blob store.
    pub public_id: Option<String>,
    pub is_approved: bool,
}

/// Directed edge: `liker_id` likes `likee_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub liker_id: Uuid,
    pub likee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied at sign-up.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub gender: Gender,
    pub known_as: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub country: String,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub city: String,
    pub country: String,
}
