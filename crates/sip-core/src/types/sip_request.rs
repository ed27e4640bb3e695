//! # SIP Request Message
//!
//! The Request struct represents SIP request messages sent from clients to servers,
//! containing a method, request URI, headers, and optional body. Values are
//! immutable once handed to the core; the `with_*` builders consume and return
//! the request so callers (and tests) can assemble one fluently.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::headers::{CSeq, HeaderName, Headers};
use crate::types::method::Method;

/// A SIP request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The method of the request
    pub method: Method,
    /// The request URI, as produced by the parser
    pub uri: String,
    /// The headers of the request
    pub headers: Headers,
    /// The body of the request
    pub body: Bytes,
}

impl Request {
    /// Creates a new SIP request with the specified method and URI and no headers.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Appends a header and returns the modified request
    pub fn with_header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Sets the body and returns the modified request
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// First value of a header
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers.call_id()
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.headers.cseq()
    }

    /// `branch` parameter of the top Via
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

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0\r\n", self.method, self.uri)?;
        for (name, value) in self.headers.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        write!(f, "Content-Length: {}\r\n\r\n", self.body.len())?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}
