//! Shared utilities, configuration, and error handling for HelpHub
//!
//! This crate provides common functionality used across the HelpHub workspace:
//! - Configuration management following 12-factor principles
//! - Error types and their HTTP rendering
//! - Request extractors (validated JSON bodies, offset pagination)
//! - The state machine error shared by domain crates

pub mod config;
pub mod error;
pub mod extractors;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use extractors::{Pagination, ValidatedJson};
pub use state::StateError;
