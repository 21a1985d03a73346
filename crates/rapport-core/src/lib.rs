//! Identity and relational-invariant engine.
//!
//! Everything in here is synchronous and transport-agnostic. Storage and blob
//! hosting are reached only through the traits in [`ports`]; callers pass the
//! verified [`Claims`](rapport_types::claims::Claims) and the current time in
//! explicitly.

pub mod credentials;
pub mod error;
pub mod members;
pub mod memory;
pub mod pagination;
pub mod policy;
pub mod ports;
pub mod relations;
pub mod search;
pub mod tokens;

pub use error::{CoreError, CoreResult};
