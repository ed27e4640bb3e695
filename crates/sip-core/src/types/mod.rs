//! SIP message value types.

pub mod headers;
pub mod message;
pub mod method;
pub mod sip_request;
pub mod sip_response;
pub mod status;

pub use headers::{CSeq, HeaderName, Headers};
pub use message::Message;
pub use method::Method;
pub use sip_request::Request;
pub use sip_response::Response;
pub use status::{StatusClass, StatusCode};
