//! Store layer
//!
//! Free functions over a `SqlitePool`, one module per aggregate. Domain
//! failures come back as `resonate_common::Error`; the HTTP layer maps them
//! to responses.

pub mod chat;
pub mod follows;
pub mod posts;
pub mod sessions;
pub mod users;
