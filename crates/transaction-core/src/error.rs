use crate::transaction::{TransactionKey, TransactionState};
use sipbridge_sip_core::Method;
use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in SIP transaction handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Error originating from the sip-core crate (malformed headers, bad status codes).
    #[error("SIP core error: {0}")]
    SipCore(#[from] sipbridge_sip_core::Error),

    /// The transport layer failed to deliver a message.
    #[error("SIP transport error: {0}")]
    TransportError(String),

    /// Transaction with the given key already exists.
    #[error("Transaction already exists: {0}")]
    TransactionExists(TransactionKey),

    /// Invalid transaction state transition attempted.
    #[error("Invalid transaction state transition: {0}")]
    InvalidStateTransition(String),

    /// An operation was invoked in a state where it has no legal meaning.
    #[error("Operation '{operation}' is not allowed in state {state:?}")]
    InvalidOperation {
        operation: &'static str,
        state: TransactionState,
    },

    /// The request carries no `branch` parameter on its top Via.
    #[error("Request has no Via branch parameter")]
    MissingBranch,

    /// The request method does not fit the transaction variant.
    #[error("Method mismatch: expected {expected}, got {actual}")]
    MethodMismatch {
        expected: &'static str,
        actual: Method,
    },
}
