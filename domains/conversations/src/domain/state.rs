//! State machine for chat session connection transitions
//!
//! Connection states: Disconnected → Connecting → Connected → Disconnected
//! A dropped membership sends Connected back to Connecting.

pub use helphub_common::StateError;
use serde::{Deserialize, Serialize};

/// Connection state of a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [ConnectionState] {
        match self {
            Self::Disconnected => &[Self::Connecting],
            Self::Connecting => &[Self::Connecting, Self::Connected, Self::Disconnected],
            Self::Connected => &[Self::Connecting, Self::Disconnected],
        }
    }

    /// Outbound sends are only allowed once subscribed
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Events that trigger connection state transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionEvent {
    /// A consumer activated the session for a conversation (or retried)
    Activate,
    /// Channel subscribe succeeded and the join event went out
    Subscribed,
    /// The transport ended the channel membership
    Dropped,
    /// Unmount or conversation switch
    Teardown,
}

impl std::fmt::Display for ConnectionEvent {
    #[mutants::skip] // Only feeds StateError messages
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activate => write!(f, "activate"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::Dropped => write!(f, "dropped"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// Connection state machine
pub struct ConnectionStateMachine;

impl ConnectionStateMachine {
    /// Attempt a state transition
    pub fn transition(
        current: ConnectionState,
        event: ConnectionEvent,
    ) -> Result<ConnectionState, StateError> {
        let next = match (&current, &event) {
            // Retrying initialize after a failed subscribe stays in connecting
            (
                ConnectionState::Disconnected | ConnectionState::Connecting,
                ConnectionEvent::Activate,
            ) => ConnectionState::Connecting,
            (ConnectionState::Connecting, ConnectionEvent::Subscribed) => {
                ConnectionState::Connected
            }
            (ConnectionState::Connected, ConnectionEvent::Dropped) => ConnectionState::Connecting,
            (
                ConnectionState::Connecting | ConnectionState::Connected,
                ConnectionEvent::Teardown,
            ) => ConnectionState::Disconnected,
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }
}
