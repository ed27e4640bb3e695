//! Error types for dialog-core

use thiserror::Error;

use crate::call_leg::CallLegState;

/// Result type for dialog operations
pub type DialogResult<T> = std::result::Result<T, DialogError>;

/// Errors raised by call legs, the orchestrator and crate setup.
///
/// Protocol races (a late response, an in-dialog request for an unknown
/// Call-ID) are not errors; they are logged and dropped by the caller of the
/// leg. Everything here indicates a caller bug or a setup failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialogError {
    /// A call leg pair already exists for this Call-ID
    #[error("Call-ID {0} already has a call leg pair")]
    DuplicateCallId(String),

    /// A required identifier was empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An explicit transition not in the call leg transition table
    #[error("Invalid call leg state transition from {from} to {to}")]
    InvalidStateTransition { from: CallLegState, to: CallLegState },

    #[error("No call leg pair for Call-ID {0}")]
    CallLegNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl DialogError {
    pub(crate) fn empty(what: &str) -> Self {
        DialogError::InvalidArgument(format!("{} must not be empty", what))
    }
}
