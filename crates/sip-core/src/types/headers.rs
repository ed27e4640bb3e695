//! # SIP Headers
//!
//! An ordered, case-insensitive header collection. Header values are stored as
//! the text the parsing layer produced; only the parameters the signaling core
//! keys on are interpreted here:
//!
//! - `branch` on the top `Via` (RFC 3261 §8.1.1.7)
//! - `tag` on `From` / `To` (RFC 3261 §19.3)
//! - the sequence number and method of `CSeq` (RFC 3261 §20.16)
//!
//! Header names are matched case-insensitively and compact forms
//! (`i`, `f`, `t`, `v`, `m`, ...) resolve to their long names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::method::Method;

/// Names of the headers the core inspects, plus a catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderName {
    Via,
    From,
    To,
    CallId,
    CSeq,
    Contact,
    MaxForwards,
    Route,
    RecordRoute,
    ContentType,
    ContentLength,
    /// Any other header, stored lowercase
    Other(String),
}

impl HeaderName {
    /// Canonical wire form of the header name.
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Via => "Via",
            HeaderName::From => "From",
            HeaderName::To => "To",
            HeaderName::CallId => "Call-ID",
            HeaderName::CSeq => "CSeq",
            HeaderName::Contact => "Contact",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::Route => "Route",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::Other(name) => name,
        }
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidHeader { name: s.to_string(), value: String::new() });
        }
        let lower = trimmed.to_ascii_lowercase();
        let name = match lower.as_str() {
            "via" | "v" => HeaderName::Via,
            "from" | "f" => HeaderName::From,
            "to" | "t" => HeaderName::To,
            "call-id" | "i" => HeaderName::CallId,
            "cseq" => HeaderName::CSeq,
            "contact" | "m" => HeaderName::Contact,
            "max-forwards" => HeaderName::MaxForwards,
            "route" => HeaderName::Route,
            "record-route" => HeaderName::RecordRoute,
            "content-type" | "c" => HeaderName::ContentType,
            "content-length" | "l" => HeaderName::ContentLength,
            _ => HeaderName::Other(lower),
        };
        Ok(name)
    }
}

impl From<&str> for HeaderName {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| HeaderName::Other(s.to_ascii_lowercase()))
    }
}

/// The two parts of a `CSeq` header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(seq: u32, method: Method) -> Self {
        Self { seq, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}

impl FromStr for CSeq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidHeader { name: "CSeq".to_string(), value: s.to_string() };
        let mut parts = s.split_whitespace();
        let seq = parts.next().and_then(|n| n.parse::<u32>().ok()).ok_or_else(invalid)?;
        let method = parts.next().ok_or_else(invalid)?.parse::<Method>()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(CSeq { seq, method })
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(HeaderName, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, keeping any existing values of the same name.
    pub fn push(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value.into()));
    }

    /// Removes every value of `name`.
    pub fn remove(&mut self, name: &HeaderName) {
        self.entries.retain(|(n, _)| n != name);
    }

    /// First value of `name`, if present.
    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Every value of `name`, in message order.
    pub fn get_all<'a>(&'a self, name: &'a HeaderName) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The top-most Via value, splitting comma-combined Via headers.
    pub fn top_via(&self) -> Option<&str> {
        self.get(&HeaderName::Via)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
    }

    /// `branch` parameter of the top-most Via.
    pub fn via_branch(&self) -> Option<&str> {
        self.top_via().and_then(|via| header_param(via, "branch"))
    }

    pub fn from_tag(&self) -> Option<&str> {
        self.get(&HeaderName::From).and_then(address_tag)
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.get(&HeaderName::To).and_then(address_tag)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.get(&HeaderName::CallId).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn cseq(&self) -> Option<CSeq> {
        self.get(&HeaderName::CSeq).and_then(|v| v.parse().ok())
    }
}

/// Looks up `;name=value` in a header value's parameter list.
///
/// Parameter names are case-insensitive. A parameter without `=` yields `None`.
pub fn header_param<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value.split(';').skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(val.trim()).filter(|v| !v.is_empty())
        } else {
            None
        }
    })
}

/// `tag` header parameter of a name-addr / addr-spec value.
///
/// With angle brackets the parameters follow `>`; without them any `;tag=`
/// belongs to the header (RFC 3261 §20.10).
fn address_tag(value: &str) -> Option<&str> {
    let params = match value.rfind('>') {
        Some(idx) => &value[idx + 1..],
        None => value,
    };
    header_param(params, "tag")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive_and_resolves_compact_forms() {
        let mut headers = Headers::new();
        headers.push("v", "SIP/2.0/UDP host;branch=z9hG4bKabc");
        headers.push("i", "call-42");
        headers.push(HeaderName::from("X-Custom"), "1");

        assert_eq!(headers.via_branch(), Some("z9hG4bKabc"));
        assert_eq!(headers.call_id(), Some("call-42"));
        assert_eq!(headers.get(&HeaderName::from("x-custom")), Some("1"));
    }

    #[test]
    fn test_top_via_splits_combined_values() {
        let mut headers = Headers::new();
        headers.push(HeaderName::Via, "SIP/2.0/UDP a;branch=z9hG4bKtop, SIP/2.0/UDP b;branch=z9hG4bKlow");
        assert_eq!(headers.via_branch(), Some("z9hG4bKtop"));
    }

    #[test]
    fn test_tag_extraction() {
        let mut headers = Headers::new();
        headers.push(HeaderName::From, "\"Alice\" <sip:alice@example.com;transport=udp>;tag=1928301774");
        headers.push(HeaderName::To, "sip:bob@example.com");
        assert_eq!(headers.from_tag(), Some("1928301774"));
        assert_eq!(headers.to_tag(), None);

        headers.set(HeaderName::To, "sip:bob@example.com;tag=a6c85cf");
        assert_eq!(headers.to_tag(), Some("a6c85cf"));
    }

    #[test]
    fn test_cseq_parsing() {
        assert_eq!("4711 INVITE".parse::<CSeq>().unwrap(), CSeq::new(4711, Method::Invite));
        assert!("INVITE".parse::<CSeq>().is_err());
        assert!("1 INVITE extra".parse::<CSeq>().is_err());
    }
}
