//! Member search: gender/age narrowing, ordering, paging.

use chrono::NaiveDate;
use uuid::Uuid;

use rapport_types::api::UserListParams;
use rapport_types::models::{Gender, User};

use crate::error::{CoreError, CoreResult};
use crate::pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest, slice};
use crate::ports::Persistence;

pub const DEFAULT_MIN_AGE: u32 = 18;
pub const DEFAULT_MAX_AGE: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    CreatedAt,
    #[default]
    LastActive,
}

impl OrderBy {
    /// Anything other than `createdAt` (or the legacy `created`) orders by
    /// last activity.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("createdAt") | Some("created") => OrderBy::CreatedAt,
            _ => OrderBy::LastActive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserQuery {
    pub requester_id: Uuid,
    pub requester_gender: Gender,
    /// Explicit override; `None` means the opposite of the requester's gender.
    pub gender: Option<Gender>,
    pub min_age: u32,
    pub max_age: u32,
    pub order_by: OrderBy,
}

impl UserQuery {
    pub fn new(requester_id: Uuid, requester_gender: Gender) -> Self {
        Self {
            requester_id,
            requester_gender,
            gender: None,
            min_age: DEFAULT_MIN_AGE,
            max_age: DEFAULT_MAX_AGE,
            order_by: OrderBy::default(),
        }
    }

    pub fn target_gender(&self) -> Gender {
        self.gender.unwrap_or(self.requester_gender.opposite())
    }
}

/// Narrows and orders `users` for `query`. The requester is always dropped;
/// ties are broken by ascending id.
pub fn filter_users(users: Vec<User>, query: &UserQuery, today: NaiveDate) -> Vec<User> {
    let gender = query.target_gender();
    let mut matches: Vec<User> = users
        .into_iter()
        .filter(|u| u.id != query.requester_id)
        .filter(|u| u.gender == gender)
        .filter(|u| {
            let age = u.age_on(today);
            age >= query.min_age && age <= query.max_age
        })
        .collect();

    match query.order_by {
        OrderBy::CreatedAt => {
            matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)))
        }
        OrderBy::LastActive => {
            matches.sort_by(|a, b| b.last_active.cmp(&a.last_active).then(a.id.cmp(&b.id)))
        }
    }
    matches
}

/// Resolves the requester, applies `params` and returns one page.
pub fn search_users(
    store: &dyn Persistence,
    requester_id: Uuid,
    params: &UserListParams,
    today: NaiveDate,
) -> CoreResult<Page<User>> {
    let requester = store
        .find_user_by_id(requester_id)?
        .ok_or(CoreError::UserNotFound)?;

    let query = UserQuery {
        requester_id,
        requester_gender: requester.gender,
        gender: params.gender,
        min_age: params.min_age.unwrap_or(DEFAULT_MIN_AGE),
        max_age: params.max_age.unwrap_or(DEFAULT_MAX_AGE),
        order_by: OrderBy::from_param(params.order_by.as_deref()),
    };
    let request = PageRequest::new(
        params.page_number.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let candidates = store.list_users(&query)?;
    Ok(slice(filter_users(candidates, &query, today), request))
}
