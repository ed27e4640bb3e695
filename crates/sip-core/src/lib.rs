//! # SIP message values for the sipbridge signaling core
//!
//! This crate holds the immutable SIP request and response values that the
//! parsing layer hands to the transaction and dialog layers. It deliberately
//! carries no wire-format parser: header values arrive as already-split text,
//! and the accessors here only pick out the handful of already-extracted
//! values the core depends on.
//!
//! - the `branch=` parameter of the top `Via`
//! - the `tag=` parameters of `From` and `To`
//! - `Call-ID` and the numeric/method parts of `CSeq`
//!
//! ## Example
//!
//! ```rust
//! use sipbridge_sip_core::prelude::*;
//!
//! let invite = Request::new(Method::Invite, "sip:bob@example.com")
//!     .with_header(HeaderName::Via, "SIP/2.0/UDP pc33.example.com;branch=z9hG4bK776asdhds")
//!     .with_header(HeaderName::From, "Alice <sip:alice@example.com>;tag=1928301774")
//!     .with_header(HeaderName::CallId, "a84b4c76e66710@pc33.example.com")
//!     .with_header(HeaderName::CSeq, "314159 INVITE");
//!
//! assert_eq!(invite.via_branch(), Some("z9hG4bK776asdhds"));
//! assert_eq!(invite.from_tag(), Some("1928301774"));
//! assert_eq!(invite.cseq().map(|c| c.seq), Some(314159));
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CSeq, HeaderName, Headers, Message, Method, Request, Response, StatusClass, StatusCode,
};

/// Commonly used types, re-exported for glob import.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        CSeq, HeaderName, Headers, Message, Method, Request, Response, StatusClass, StatusCode,
    };
}
