//! # MuseGuard Common Library
//!
//! Shared code for the MuseGuard compliance engine:
//! - Database bootstrap and persisted models
//! - Typed system settings
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
