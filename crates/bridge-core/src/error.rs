//! Error types for bridge-core operations
//!
//! All fallible operations in this crate return [`BridgeResult`]. The error
//! taxonomy separates problems the caller can fix (malformed arguments,
//! configuration) from failures reported by the foreign engine and from
//! lifecycle violations of the bridge itself.
//!
//! # Error Categories
//!
//! - **usage** - arguments rejected before any engine call is made
//! - **engine** - the engine returned a non-success status
//! - **enumeration** - a symbolic name has no engine code
//! - **configuration** - invalid [`BridgeConfig`](crate::config::BridgeConfig)
//! - **lifecycle** - the bridge, queue or rendezvous is not in a usable state
//!
//! # Examples
//!
//! ```rust
//! use rvoip_bridge_core::error::BridgeError;
//!
//! let error = BridgeError::usage("Invalid number of arguments to addAccount");
//! assert_eq!(error.category(), "usage");
//! assert!(!error.is_recoverable());
//!
//! let error = BridgeError::engine("Error making call", 171_039, "Invalid URI");
//! assert_eq!(error.to_string(), "Error making call: Invalid URI");
//! assert_eq!(error.engine_status(), Some(171_039));
//! ```

use thiserror::Error;

/// Result type alias for bridge-core operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced by the gateway, the event model and the delivery paths
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Malformed or out-of-range arguments, detected before touching the engine
    #[error("{message}")]
    Usage { message: String },

    /// The engine reported a non-success status
    #[error("{operation}: {reason}")]
    Engine {
        operation: String,
        status: i32,
        reason: String,
    },

    /// A symbolic name could not be mapped to its engine code
    #[error("Unknown enumeration key \"{key}\" in table {table}")]
    UnknownEnumerationKey { key: String, table: &'static str },

    #[error("Invalid configuration: {field} - {reason}")]
    Configuration { field: String, reason: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The event queue no longer accepts events
    #[error("Event queue is closed")]
    QueueClosed,

    /// The rendezvous was stopped while a callback thread tried to acquire it
    #[error("Rendezvous stopped: {reason}")]
    RendezvousStopped { reason: String },
}

impl BridgeError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create an engine error from an operation description and the engine's diagnostic text
    pub fn engine(operation: impl Into<String>, status: i32, reason: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a rendezvous stopped error
    pub fn rendezvous_stopped(reason: impl Into<String>) -> Self {
        Self::RendezvousStopped {
            reason: reason.into(),
        }
    }

    /// Engine status code carried by this error, if any
    pub fn engine_status(&self) -> Option<i32> {
        match self {
            BridgeError::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if retrying the same operation later could succeed
    ///
    /// Usage and enumeration errors are programming errors and never
    /// recoverable. Engine errors are surfaced to the caller as-is; the bridge
    /// never retries them, but the caller may.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::Engine { .. } => true,

            BridgeError::Usage { .. }
            | BridgeError::UnknownEnumerationKey { .. }
            | BridgeError::Configuration { .. } => false,

            BridgeError::InvalidState { .. }
            | BridgeError::QueueClosed
            | BridgeError::RendezvousStopped { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            BridgeError::Usage { .. } => "usage",
            BridgeError::Engine { .. } => "engine",
            BridgeError::UnknownEnumerationKey { .. } => "enumeration",
            BridgeError::Configuration { .. } => "configuration",
            BridgeError::InvalidState { .. }
            | BridgeError::QueueClosed
            | BridgeError::RendezvousStopped { .. } => "lifecycle",
        }
    }
}
