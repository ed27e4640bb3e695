//! # SIP Response Message

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::headers::{CSeq, HeaderName, Headers};
use crate::types::status::{StatusClass, StatusCode};

/// A SIP response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The status code of the response
    pub status: StatusCode,
    /// The reason phrase; defaults to the code's standard phrase
    pub reason: String,
    /// The headers of the response
    pub headers: Headers,
    /// The body of the response
    pub body: Bytes,
}

impl Response {
    /// Creates a new response with the default reason phrase and no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: status.reason_phrase().to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Appends a header and returns the modified response
    pub fn with_header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn class(&self) -> StatusClass {
        self.status.class()
    }

    pub fn is_provisional(&self) -> bool {
        self.status.is_provisional()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers.call_id()
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.headers.cseq()
    }

    pub fn via_branch(&self) -> Option<&str> {
        self.headers.via_branch()
    }

    pub fn from_tag(&self) -> Option<&str> {
        self.headers.from_tag()
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.headers.to_tag()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {} {}\r\n", self.status.as_u16(), self.reason)?;
        for (name, value) in self.headers.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        write!(f, "Content-Length: {}\r\n\r\n", self.body.len())?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::method::Method;

    #[test]
    fn test_response_defaults_reason_phrase() {
        let response = Response::new(StatusCode::BusyHere);
        assert_eq!(response.reason, "Busy Here");
        assert_eq!(response.class(), StatusClass::ClientError);
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::new(StatusCode::Ok)
            .with_header(HeaderName::Via, "SIP/2.0/UDP host;branch=z9hG4bK1")
            .with_header(HeaderName::CSeq, "1 INVITE")
            .with_header(HeaderName::To, "<sip:bob@example.com>;tag=b0b");

        assert!(response.is_success());
        assert_eq!(response.via_branch(), Some("z9hG4bK1"));
        assert_eq!(response.cseq().map(|c| c.method), Some(Method::Invite));
        assert_eq!(response.to_tag(), Some("b0b"));
    }
}
