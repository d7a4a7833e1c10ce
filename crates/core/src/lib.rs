//! `bizdesk-core`: session and grant data shared by the client layers.
//!
//! This crate contains **plain data** only (no IO, no HTTP).

pub mod error;
pub mod grant;
pub mod id;
pub mod session;

pub use error::{DomainError, DomainResult};
pub use grant::{
    ALL_ACCESS_GROUPS, ALL_APPS, AccessGrant, AccessGroupEntry, AccessGroups, AccessRight,
};
pub use id::{TenantId, UserId};
pub use session::Session;
