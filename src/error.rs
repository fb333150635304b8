//! Error types for the sync layer
//!
//! Provides the unified failure taxonomy surfaced by the request coordinator
//! and the realtime channel manager, using thiserror.
//!
//! Classification happens once, at the coordinator boundary: callers receive
//! a single typed failure and react to it, rather than re-classifying raw
//! transport errors.

use serde::Serialize;
use thiserror::Error;

// == Validation Detail ==
/// A single field-level validation failure, preserved verbatim from the
/// server's structured `detail` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationItem {
    /// Dotted path of the offending field (e.g. "priority" or "items.0.qty")
    pub field: String,
    /// Server-provided message for this field
    pub message: String,
}

// == Api Error Enum ==
/// Failure taxonomy produced by the request coordinator.
///
/// Cloneable so that every caller deduplicated onto the same in-flight
/// request receives the identical outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The call exceeded the configured duration
    #[error("Request timed out")]
    Timeout,

    /// Transport-level failure (connection refused, DNS, ...)
    #[error("Network error - please check if the server is running")]
    NetworkUnavailable,

    /// Authentication failure; the session has been force-terminated
    #[error("Unauthorized - please log in again")]
    Unauthorized,

    /// The resource does not exist. Expected for already-deleted resources,
    /// so this never produces a user-facing notification.
    #[error("{0}")]
    NotFound(String),

    /// Structured, field-level validation failure
    #[error("{message}")]
    Validation {
        /// Pre-rendered human-readable summary of all items
        message: String,
        /// Field-level detail, preserved verbatim
        items: Vec<ValidationItem>,
    },

    /// Any other server-side failure, message surfaced as-is
    #[error("{message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// True for failures that should be shown to the user as a notification.
    ///
    /// NotFound is excluded: callers commonly treat it as a recoverable state
    /// for resources deleted out from under them. Unauthorized is excluded
    /// because it already triggers a forced logout.
    pub fn is_notifiable(&self) -> bool {
        !matches!(self, ApiError::NotFound(_) | ApiError::Unauthorized)
    }
}

// == Channel Error Enum ==
/// Failures surfaced by the realtime channel manager.
///
/// Connection-lifecycle problems (drops, unexpected closes) are reported via
/// the subscriber callbacks and handled by the reconnection policy; this enum
/// only covers failures of the channel operations themselves.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The address could not be parsed as a URL
    #[error("Invalid channel address '{0}'")]
    InvalidAddress(String),

    /// Opening the underlying duplex connection failed
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
}
