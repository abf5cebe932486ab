//! HTTP handlers

pub mod accounts;
pub mod auth;
pub mod chat;
pub mod health;
pub mod posts;
pub mod profiles;
pub mod ui;

pub use auth::{require_login, CurrentUser};
pub use health::health_routes;
