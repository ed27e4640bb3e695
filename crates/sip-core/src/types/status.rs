//! # SIP Status Codes
//!
//! This module provides an implementation of SIP status codes as defined in
//! [RFC 3261 Section 21](https://datatracker.ietf.org/doc/html/rfc3261#section-21).
//!
//! Status codes are grouped into six classes, exposed through [`StatusClass`]:
//!
//! - **1xx** (Provisional): request received, continuing to process
//! - **2xx** (Success): the action was successfully received, understood, and accepted
//! - **3xx** (Redirection): further action needs to be taken
//! - **4xx** (Client Error): the request contains bad syntax or cannot be fulfilled here
//! - **5xx** (Server Error): the server failed to fulfill an apparently valid request
//! - **6xx** (Global Failure): the request cannot be fulfilled at any server
//!
//! ```rust
//! use sipbridge_sip_core::prelude::*;
//!
//! let status = StatusCode::Ringing;
//! assert!(status.is_provisional());
//! assert_eq!(status.class(), StatusClass::Provisional);
//!
//! let custom = StatusCode::from_u16(499).unwrap();
//! assert_eq!(custom.as_u16(), 499);
//! assert!(custom.is_client_error());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The class of a status code, i.e. its first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusClass {
    /// 1xx
    Provisional,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// 6xx
    GlobalFailure,
}

/// SIP status codes
///
/// Codes not listed here are represented by [`StatusCode::Custom`]; use
/// [`StatusCode::from_u16`] to obtain the canonical variant for any number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    // 1xx: Provisional
    /// 100 Trying
    Trying,
    /// 180 Ringing
    Ringing,
    /// 181 Call Is Being Forwarded
    CallIsBeingForwarded,
    /// 182 Queued
    Queued,
    /// 183 Session Progress
    SessionProgress,

    // 2xx: Success
    /// 200 OK
    Ok,
    /// 202 Accepted
    Accepted,

    // 3xx: Redirection
    /// 300 Multiple Choices
    MultipleChoices,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Moved Temporarily
    MovedTemporarily,

    // 4xx: Client Error
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 480 Temporarily Unavailable
    TemporarilyUnavailable,
    /// 481 Call/Transaction Does Not Exist
    CallOrTransactionDoesNotExist,
    /// 486 Busy Here
    BusyHere,
    /// 487 Request Terminated
    RequestTerminated,
    /// 488 Not Acceptable Here
    NotAcceptableHere,
    /// 491 Request Pending
    RequestPending,

    // 5xx: Server Error
    /// 500 Server Internal Error
    ServerInternalError,
    /// 501 Not Implemented
    NotImplemented,
    /// 502 Bad Gateway
    BadGateway,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 504 Server Time-out
    ServerTimeout,

    // 6xx: Global Failure
    /// 600 Busy Everywhere
    BusyEverywhere,
    /// 603 Decline
    Decline,
    /// 604 Does Not Exist Anywhere
    DoesNotExistAnywhere,

    /// Any other code in the 100-699 range
    Custom(u16),
}

impl StatusCode {
    /// Creates a status code from its numeric value.
    ///
    /// Returns `Err(Error::InvalidStatusCode)` for values outside 100-699.
    pub fn from_u16(code: u16) -> Result<Self> {
        let status = match code {
            100 => StatusCode::Trying,
            180 => StatusCode::Ringing,
            181 => StatusCode::CallIsBeingForwarded,
            182 => StatusCode::Queued,
            183 => StatusCode::SessionProgress,
            200 => StatusCode::Ok,
            202 => StatusCode::Accepted,
            300 => StatusCode::MultipleChoices,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::MovedTemporarily,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            408 => StatusCode::RequestTimeout,
            480 => StatusCode::TemporarilyUnavailable,
            481 => StatusCode::CallOrTransactionDoesNotExist,
            486 => StatusCode::BusyHere,
            487 => StatusCode::RequestTerminated,
            488 => StatusCode::NotAcceptableHere,
            491 => StatusCode::RequestPending,
            500 => StatusCode::ServerInternalError,
            501 => StatusCode::NotImplemented,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            504 => StatusCode::ServerTimeout,
            600 => StatusCode::BusyEverywhere,
            603 => StatusCode::Decline,
            604 => StatusCode::DoesNotExistAnywhere,
            100..=699 => StatusCode::Custom(code),
            _ => return Err(Error::InvalidStatusCode(code)),
        };
        Ok(status)
    }

    /// Returns the numeric value of this status code
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Trying => 100,
            StatusCode::Ringing => 180,
            StatusCode::CallIsBeingForwarded => 181,
            StatusCode::Queued => 182,
            StatusCode::SessionProgress => 183,
            StatusCode::Ok => 200,
            StatusCode::Accepted => 202,
            StatusCode::MultipleChoices => 300,
            StatusCode::MovedPermanently => 301,
            StatusCode::MovedTemporarily => 302,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::TemporarilyUnavailable => 480,
            StatusCode::CallOrTransactionDoesNotExist => 481,
            StatusCode::BusyHere => 486,
            StatusCode::RequestTerminated => 487,
            StatusCode::NotAcceptableHere => 488,
            StatusCode::RequestPending => 491,
            StatusCode::ServerInternalError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::BadGateway => 502,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::ServerTimeout => 504,
            StatusCode::BusyEverywhere => 600,
            StatusCode::Decline => 603,
            StatusCode::DoesNotExistAnywhere => 604,
            StatusCode::Custom(code) => *code,
        }
    }

    /// Returns the class (first digit) of this status code.
    pub fn class(&self) -> StatusClass {
        match self.as_u16() {
            100..=199 => StatusClass::Provisional,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            // Custom codes are range-checked on construction via from_u16
            _ => StatusClass::GlobalFailure,
        }
    }

    /// Returns true if this status code is provisional (1xx)
    pub fn is_provisional(&self) -> bool {
        self.class() == StatusClass::Provisional
    }

    /// Returns true if this status code is success (2xx)
    pub fn is_success(&self) -> bool {
        self.class() == StatusClass::Success
    }

    /// Returns true if this status code is redirection (3xx)
    pub fn is_redirection(&self) -> bool {
        self.class() == StatusClass::Redirection
    }

    /// Returns true if this status code is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.class() == StatusClass::ClientError
    }

    /// Returns true if this status code is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.class() == StatusClass::ServerError
    }

    /// Returns true if this status code is a global failure (6xx)
    pub fn is_global_failure(&self) -> bool {
        self.class() == StatusClass::GlobalFailure
    }

    /// Returns true for any final response (2xx-6xx)
    pub fn is_final(&self) -> bool {
        !self.is_provisional()
    }

    /// Returns true for any non-success final response (3xx-6xx)
    pub fn is_error(&self) -> bool {
        self.as_u16() >= 300
    }

    /// Returns the default reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Self::Trying => "Trying",
            Self::Ringing => "Ringing",
            Self::CallIsBeingForwarded => "Call Is Being Forwarded",
            Self::Queued => "Queued",
            Self::SessionProgress => "Session Progress",
            Self::Ok => "OK",
            Self::Accepted => "Accepted",
            Self::MultipleChoices => "Multiple Choices",
            Self::MovedPermanently => "Moved Permanently",
            Self::MovedTemporarily => "Moved Temporarily",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::RequestTimeout => "Request Timeout",
            Self::TemporarilyUnavailable => "Temporarily Unavailable",
            Self::CallOrTransactionDoesNotExist => "Call/Transaction Does Not Exist",
            Self::BusyHere => "Busy Here",
            Self::RequestTerminated => "Request Terminated",
            Self::NotAcceptableHere => "Not Acceptable Here",
            Self::RequestPending => "Request Pending",
            Self::ServerInternalError => "Server Internal Error",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::ServerTimeout => "Server Time-out",
            Self::BusyEverywhere => "Busy Everywhere",
            Self::Decline => "Decline",
            Self::DoesNotExistAnywhere => "Does Not Exist Anywhere",
            Self::Custom(_) => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    /// Formats the status code as "<numeric code> <reason phrase>".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

impl FromStr for StatusCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().parse::<u16>().map_err(|_| Error::InvalidStatusCode(0))?;
        StatusCode::from_u16(code)
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        StatusCode::from_u16(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_named_variants() {
        assert_eq!(StatusCode::from_u16(200).unwrap(), StatusCode::Ok);
        assert_eq!(StatusCode::from_u16(486).unwrap(), StatusCode::BusyHere);
        assert_eq!(StatusCode::from_u16(299).unwrap(), StatusCode::Custom(299));
    }

    #[test]
    fn test_out_of_range_codes_are_rejected() {
        assert_eq!(StatusCode::from_u16(99), Err(Error::InvalidStatusCode(99)));
        assert_eq!(StatusCode::from_u16(700), Err(Error::InvalidStatusCode(700)));
        assert!("abc".parse::<StatusCode>().is_err());
    }

    #[test]
    fn test_classification() {
        assert_eq!(StatusCode::Trying.class(), StatusClass::Provisional);
        assert_eq!(StatusCode::Accepted.class(), StatusClass::Success);
        assert_eq!(StatusCode::MovedTemporarily.class(), StatusClass::Redirection);
        assert_eq!(StatusCode::NotFound.class(), StatusClass::ClientError);
        assert_eq!(StatusCode::ServiceUnavailable.class(), StatusClass::ServerError);
        assert_eq!(StatusCode::Decline.class(), StatusClass::GlobalFailure);
        assert_eq!(StatusCode::Custom(699).class(), StatusClass::GlobalFailure);

        assert!(StatusCode::Ok.is_final());
        assert!(!StatusCode::Ok.is_error());
        assert!(StatusCode::BusyHere.is_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::Custom(499).to_string(), "499 Unknown");
    }
}
