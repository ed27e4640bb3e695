//! # Call legs and B2BUA orchestration for sipbridge
//!
//! A back-to-back user agent terminates one dialog towards the caller and
//! originates another towards the callee. This crate keeps the dialog-level
//! view of both sides in sync:
//!
//! - [`CallLeg`]: one side's tags, URIs, CSeq counters and [`CallLegState`]
//! - [`CallLegOrchestrator`]: the pairs of legs keyed by Call-ID, symmetric
//!   response routing, in-dialog request policy and eviction of finished pairs
//! - [`SipBridgeConfig`] and [`setup_logging`] for process setup
//!
//! ## Example
//!
//! ```rust
//! use sipbridge_dialog_core::prelude::*;
//! use sipbridge_sip_core::{Method, Request, Response, StatusCode};
//!
//! let orchestrator = CallLegOrchestrator::default();
//! orchestrator
//!     .create_call_leg_pair("call-1", "u1", "s1", "sip:alice@a.example", "sip:bob@b.example", false)
//!     .unwrap();
//!
//! orchestrator.route_provisional_response("call-1", Response::new(StatusCode::Trying));
//! orchestrator.route_final_response("call-1", Response::new(StatusCode::Ok));
//! assert!(orchestrator.is_dialog_confirmed("call-1"));
//!
//! let bye = Request::new(Method::Bye, "sip:bob@b.example");
//! assert!(orchestrator.route_in_dialog_request("call-1", bye).is_some());
//! orchestrator.route_final_response("call-1", Response::new(StatusCode::Ok));
//!
//! let (uac, uas) = orchestrator.try_get_call_legs("call-1").unwrap();
//! assert_eq!(uac.state(), CallLegState::Terminated);
//! assert_eq!(uas.state(), CallLegState::Terminated);
//! ```

pub mod call_leg;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;

pub use call_leg::{CallLeg, CallLegState};
pub use config::{LogSettings, OrchestratorConfig, SipBridgeConfig};
pub use error::{DialogError, DialogResult};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
pub use orchestrator::{CallLegOrchestrator, CallLegPair};

pub mod prelude {
    pub use crate::call_leg::{CallLeg, CallLegState};
    pub use crate::config::{OrchestratorConfig, SipBridgeConfig};
    pub use crate::error::{DialogError, DialogResult};
    pub use crate::orchestrator::{CallLegOrchestrator, CallLegPair};
}
