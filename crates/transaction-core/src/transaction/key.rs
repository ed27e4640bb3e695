use std::fmt;

use sipbridge_sip_core::{Method, Request};

/// Uniquely identifies a SIP transaction.
///
/// RFC 3261 §17 identifies a transaction by the top Via `branch`, the method
/// and the side (client or server). The branch is assumed to be generated with
/// the `z9hG4bK` magic cookie and therefore globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    /// The `branch` parameter of the top-most Via
    pub branch: String,
    /// The method of the request that created the transaction
    pub method: Method,
    /// `true` for server transactions
    pub is_server: bool,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, method: Method, is_server: bool) -> Self {
        Self {
            branch: branch.into(),
            method,
            is_server,
        }
    }

    /// Key of the server transaction an incoming request belongs to.
    ///
    /// `None` when the request has no Via branch.
    pub fn from_request(request: &Request) -> Option<Self> {
        let branch = request.via_branch()?;
        Some(Self::new(branch, request.method().clone(), true))
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_server { "server" } else { "client" };
        write!(f, "{}:{}:{}", self.branch, self.method, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipbridge_sip_core::HeaderName;

    #[test]
    fn test_key_from_request() {
        let request = Request::new(Method::Register, "sip:registrar.example.com")
            .with_header(HeaderName::Via, "SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bKreg1");
        let key = TransactionKey::from_request(&request).unwrap();
        assert_eq!(key.branch(), "z9hG4bKreg1");
        assert!(key.is_server());
        assert_eq!(key.to_string(), "z9hG4bKreg1:REGISTER:server");
    }

    #[test]
    fn test_key_requires_branch() {
        let request = Request::new(Method::Options, "sip:x@example.com")
            .with_header(HeaderName::Via, "SIP/2.0/UDP 10.0.0.1:5060");
        assert!(TransactionKey::from_request(&request).is_none());
    }
}
