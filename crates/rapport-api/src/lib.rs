pub mod admin;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod photos;
pub mod routes;
pub mod storage;
pub mod users;
