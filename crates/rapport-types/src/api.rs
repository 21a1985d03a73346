use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Gender, Photo, ProfileUpdate, Registration, User};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub gender: Gender,
    pub known_as: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub country: String,
}

impl RegisterRequest {
    pub fn registration(&self) -> Registration {
        Registration {
            username: self.username.clone(),
            gender: self.gender,
            known_as: self.known_as.clone(),
            date_of_birth: self.date_of_birth,
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserForList,
}

// -- Users --

/// Query string of `GET /users`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListParams {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForList {
    pub id: Uuid,
    pub username: String,
    pub gender: Gender,
    pub age: u32,
    pub known_as: String,
    pub created: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub city: String,
    pub country: String,
    pub photo_url: Option<String>,
}

impl UserForList {
    pub fn from_user(user: &User, today: NaiveDate) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            gender: user.gender,
            age: user.age_on(today),
            known_as: user.known_as.clone(),
            created: user.created_at,
            last_active: user.last_active,
            city: user.city.clone(),
            country: user.country.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForDetail {
    #[serde(flatten)]
    pub summary: UserForList,
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub photos: Vec<PhotoResponse>,
}

impl UserForDetail {
    pub fn new(user: &User, photos: &[Photo], today: NaiveDate) -> Self {
        Self {
            summary: UserForList::from_user(user, today),
            introduction: user.introduction.clone(),
            looking_for: user.looking_for.clone(),
            interests: user.interests.clone(),
            photos: photos.iter().map(PhotoResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub city: String,
    pub country: String,
}

impl From<UpdateUserRequest> for ProfileUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        ProfileUpdate {
            introduction: req.introduction,
            looking_for: req.looking_for,
            interests: req.interests,
            city: req.city,
            country: req.country,
        }
    }
}

// -- Photos --

#[derive(Debug, Deserialize)]
pub struct AddPhotoQuery {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub id: Uuid,
    pub url: String,
    pub description: String,
    pub date_added: DateTime<Utc>,
    pub is_main: bool,
    pub is_approved: bool,
}

impl From<&Photo> for PhotoResponse {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            url: photo.url.clone(),
            description: photo.description.clone(),
            date_added: photo.date_added,
            is_main: photo.is_main,
            is_approved: photo.is_approved,
        }
    }
}

// -- Admin --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoForModeration {
    #[serde(flatten)]
    pub photo: PhotoResponse,
    pub user_id: Uuid,
}

impl From<&Photo> for PhotoForModeration {
    fn from(photo: &Photo) -> Self {
        Self {
            photo: PhotoResponse::from(photo),
            user_id: photo.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditRolesRequest {
    pub role_names: Vec<String>,
}
