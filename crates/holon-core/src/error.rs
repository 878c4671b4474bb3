//! Error types for Holon
//!
//! TigerStyle: Explicit error types with context, using thiserror.
//!
//! Entity faults are never surfaced through this type; the activation engine
//! turns them into [`crate::outcome::Outcome`] values. `Error` is reserved for
//! programmer errors, exhausted limits and infrastructure failures.

use thiserror::Error;

/// Result type alias for Holon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Holon error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Collection Errors
    // =========================================================================
    #[error("No such element: {reason}")]
    CursorNoSuchElement { reason: String },

    #[error("Collection capacity exceeded: {count} members, limit {limit}")]
    CollectionCapacityExceeded { count: usize, limit: usize },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Invalid stage transition: from {from} to {to}")]
    InvalidStageTransition { from: String, to: String },

    #[error("Callback failed: provider {provider}, stage {stage}, reason: {reason}")]
    CallbackFailed {
        provider: String,
        stage: String,
        reason: String,
    },

    // =========================================================================
    // Mailbox Errors
    // =========================================================================
    #[error("Mailbox full: depth {depth}, max {max}")]
    MailboxFull { depth: usize, max: usize },

    #[error("Invalid address: {address}, reason: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Address too long: {length} bytes exceeds limit of {limit} bytes")]
    AddressTooLong { length: usize, limit: usize },

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },

    // =========================================================================
    // Kernel Errors
    // =========================================================================
    #[error("Kernel already started")]
    KernelAlreadyStarted,

    #[error("Kernel not running")]
    KernelNotRunning,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a cursor "no such element" error
    pub fn no_such_element(reason: impl Into<String>) -> Self {
        Self::CursorNoSuchElement {
            reason: reason.into(),
        }
    }

    /// Create a callback failed error
    pub fn callback_failed(
        provider: impl Into<String>,
        stage: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CallbackFailed {
            provider: provider.into(),
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error is retriable
    ///
    /// Cursor misuse is a programmer error and never retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::MailboxFull { .. })
    }
}
