//! # Resonate Common Library
//!
//! Shared code for the Resonate service crates:
//! - Database bootstrap and row models
//! - Configuration loading
//! - Error type
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
