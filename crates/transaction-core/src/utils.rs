use rand::distributions::Alphanumeric;
use rand::Rng;
use sipbridge_sip_core::{CSeq, Error as SipError, HeaderName, Method, Request, Response};
use uuid::Uuid;

use crate::error::Result;

/// RFC 3261 magic cookie every compliant branch starts with.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// Generate a new RFC 3261 compliant branch parameter
pub fn generate_branch() -> String {
    format!("{}-{}", BRANCH_MAGIC_COOKIE, Uuid::new_v4().simple())
}

/// Generate a random `tag` for From/To headers.
pub fn generate_tag() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

/// Whether the branch carries the RFC 3261 magic cookie.
pub fn is_rfc3261_branch(branch: &str) -> bool {
    branch.starts_with(BRANCH_MAGIC_COOKIE)
}

/// Create the ACK for a non-2xx final response to `original_request`
/// (RFC 3261 §17.1.1.3).
///
/// Request-URI, Call-ID, From, top Via and Route set are taken from the INVITE;
/// `To` comes from the response so it carries the remote tag.
pub fn create_ack_from_invite(original_request: &Request, response: &Response) -> Result<Request> {
    let missing = |name: &str| SipError::MissingHeader(name.to_string());

    let via = original_request.headers.top_via().ok_or_else(|| missing("Via"))?;
    let from = original_request.header(&HeaderName::From).ok_or_else(|| missing("From"))?;
    let to = response
        .header(&HeaderName::To)
        .or_else(|| original_request.header(&HeaderName::To))
        .ok_or_else(|| missing("To"))?;
    let call_id = original_request.call_id().ok_or_else(|| missing("Call-ID"))?;
    let cseq = original_request.cseq().ok_or_else(|| missing("CSeq"))?;

    let mut ack = Request::new(Method::Ack, original_request.uri())
        .with_header(HeaderName::Via, via)
        .with_header(HeaderName::From, from)
        .with_header(HeaderName::To, to)
        .with_header(HeaderName::CallId, call_id)
        .with_header(HeaderName::CSeq, CSeq::new(cseq.seq, Method::Ack).to_string())
        .with_header(HeaderName::MaxForwards, "70");
    for route in original_request.headers.get_all(&HeaderName::Route) {
        ack.headers.push(HeaderName::Route, route);
    }
    Ok(ack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipbridge_sip_core::StatusCode;

    #[test]
    fn test_generated_branch_has_magic_cookie() {
        let a = generate_branch();
        let b = generate_branch();
        assert!(is_rfc3261_branch(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_tag_is_alphanumeric() {
        let tag = generate_tag();
        assert_eq!(tag.len(), 10);
        assert!(tag.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_ack_for_non_2xx_copies_dialog_headers() {
        let invite = Request::new(Method::Invite, "sip:bob@biloxi.example.com")
            .with_header(HeaderName::Via, "SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bKnashds8")
            .with_header(HeaderName::Route, "<sip:proxy.atlanta.example.com;lr>")
            .with_header(HeaderName::From, "<sip:alice@atlanta.example.com>;tag=9fxced76sl")
            .with_header(HeaderName::To, "<sip:bob@biloxi.example.com>")
            .with_header(HeaderName::CallId, "3848276298220188511@atlanta.example.com")
            .with_header(HeaderName::CSeq, "2 INVITE");
        let busy = Response::new(StatusCode::BusyHere)
            .with_header(HeaderName::To, "<sip:bob@biloxi.example.com>;tag=314159");

        let ack = create_ack_from_invite(&invite, &busy).unwrap();
        assert_eq!(ack.method, Method::Ack);
        assert_eq!(ack.uri, "sip:bob@biloxi.example.com");
        assert_eq!(ack.via_branch(), Some("z9hG4bKnashds8"));
        assert_eq!(ack.to_tag(), Some("314159"));
        assert_eq!(ack.cseq(), Some(CSeq::new(2, Method::Ack)));
        assert_eq!(ack.headers.get_all(&HeaderName::Route).count(), 1);
    }

    #[test]
    fn test_ack_requires_call_id() {
        let invite = Request::new(Method::Invite, "sip:bob@example.com")
            .with_header(HeaderName::Via, "SIP/2.0/UDP host;branch=z9hG4bK1")
            .with_header(HeaderName::From, "<sip:a@example.com>;tag=1")
            .with_header(HeaderName::CSeq, "1 INVITE");
        let response = Response::new(StatusCode::Decline);
        assert!(create_ack_from_invite(&invite, &response).is_err());
    }
}
