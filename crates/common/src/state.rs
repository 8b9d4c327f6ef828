//! Common state machine error types
//!
//! Shared across domain crates that drive lifecycles through explicit transitions.

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: {event} is not allowed while {from}")]
    InvalidTransition { from: String, event: String },
}
