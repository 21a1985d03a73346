//! Database row types. These map directly to SQLite rows.
//! Conversion into rapport-types models happens here so the query code
//! stays free of parsing.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use rapport_core::credentials::Credential;
use rapport_types::models::{Photo, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub gender: String,
    pub date_of_birth: String,
    pub known_as: String,
    pub created_at: String,
    pub last_active: String,
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub city: String,
    pub country: String,
    pub photo_url: Option<String>,
}

pub struct PhotoRow {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub description: String,
    pub date_added: String,
    pub is_main: bool,
    pub public_id: Option<String>,
    pub is_approved: bool,
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Corrupt timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl UserRow {
    pub fn credential(&self) -> Credential {
        Credential {
            username: self.username.clone(),
            password_hash: self.password_hash.clone(),
            password_salt: self.password_salt.clone(),
        }
    }

    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            gender: self
                .gender
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{} on user '{}'", e, self.id))?,
            date_of_birth: NaiveDate::parse_from_str(&self.date_of_birth, "%Y-%m-%d")
                .with_context(|| format!("Corrupt date_of_birth on user '{}'", self.id))?,
            created_at: parse_time(&self.created_at)?,
            last_active: parse_time(&self.last_active)?,
            username: self.username,
            known_as: self.known_as,
            introduction: self.introduction,
            looking_for: self.looking_for,
            interests: self.interests,
            city: self.city,
            country: self.country,
            photo_url: self.photo_url,
        })
    }
}

impl PhotoRow {
    pub fn into_photo(self) -> Result<Photo> {
        Ok(Photo {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            date_added: parse_time(&self.date_added)?,
            url: self.url,
            description: self.description,
            is_main: self.is_main,
            public_id: self.public_id,
            is_approved: self.is_approved,
        })
    }
}
