use thiserror::Error;

/// A type alias for handling `Result`s with [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or inspecting SIP message values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Status code outside the 100-699 range
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Method token that is empty or contains non-token characters
    #[error("Invalid method: {0:?}")]
    InvalidMethod(String),

    /// A header required by the caller is absent
    #[error("Missing header: {0}")]
    MissingHeader(String),

    /// A header is present but its value cannot be interpreted
    #[error("Invalid header {name}: {value:?}")]
    InvalidHeader { name: String, value: String },
}
