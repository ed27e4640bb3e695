//! One side of a B2BUA dialog.
//!
//! A [`CallLeg`] carries the dialog identifiers of one leg (Call-ID, local and
//! remote tag, URIs) together with its [`CallLegState`] and CSeq counters. The
//! identifiers are fixed at construction. State and counters sit behind one
//! mutex so every update to a leg is applied as a unit.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sipbridge_sip_core::{Method, Request, Response};
use tracing::{debug, trace};

use crate::error::{DialogError, DialogResult};

/// Dialog state of one call leg.
///
/// ```text
/// Initial -> Inviting -> ProvisionalResponse -> Confirmed -> Terminating -> Terminated
///    |          |               |
///    +----------+---------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallLegState {
    Initial,
    /// INVITE sent or received, no response yet
    Inviting,
    /// A 1xx has been seen
    ProvisionalResponse,
    /// A 2xx has been seen
    Confirmed,
    /// The INVITE was rejected with a 3xx-6xx
    Failed,
    /// BYE in progress
    Terminating,
    Terminated,
}

impl CallLegState {
    /// Whether `next` is reachable from this state in one step. Staying in the
    /// same state is always allowed.
    pub fn can_transition_to(self, next: CallLegState) -> bool {
        use CallLegState::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Initial, Inviting)
                | (Initial | Inviting, ProvisionalResponse)
                | (Initial | Inviting | ProvisionalResponse, Confirmed)
                | (Initial | Inviting | ProvisionalResponse, Failed)
                | (Confirmed, Terminating)
                | (Terminating, Terminated)
        )
    }

    /// No further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, CallLegState::Failed | CallLegState::Terminated)
    }
}

impl fmt::Display for CallLegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallLegState::Initial => "Initial",
            CallLegState::Inviting => "Inviting",
            CallLegState::ProvisionalResponse => "ProvisionalResponse",
            CallLegState::Confirmed => "Confirmed",
            CallLegState::Failed => "Failed",
            CallLegState::Terminating => "Terminating",
            CallLegState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct LegInner {
    state: CallLegState,
    local_sequence_number: u32,
    remote_sequence_number: u32,
}

/// One leg of a B2BUA call: identity is `(call_id, local_tag)`.
#[derive(Debug)]
pub struct CallLeg {
    call_id: String,
    local_tag: String,
    remote_tag: String,
    local_uri: String,
    remote_uri: String,
    secure: bool,
    inner: Mutex<LegInner>,
}

impl CallLeg {
    /// Creates a leg in `Initial` with local CSeq 1 and remote CSeq 0.
    pub fn new(
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        remote_tag: impl Into<String>,
        local_uri: impl Into<String>,
        remote_uri: impl Into<String>,
        secure: bool,
    ) -> DialogResult<Self> {
        let call_id = call_id.into();
        let local_tag = local_tag.into();
        let remote_tag = remote_tag.into();
        if call_id.is_empty() {
            return Err(DialogError::empty("Call-ID"));
        }
        if local_tag.is_empty() {
            return Err(DialogError::empty("local tag"));
        }
        if remote_tag.is_empty() {
            return Err(DialogError::empty("remote tag"));
        }

        Ok(Self {
            call_id,
            local_tag,
            remote_tag,
            local_uri: local_uri.into(),
            remote_uri: remote_uri.into(),
            secure,
            inner: Mutex::new(LegInner {
                state: CallLegState::Initial,
                local_sequence_number: 1,
                remote_sequence_number: 0,
            }),
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_tag(&self) -> &str {
        &self.local_tag
    }

    pub fn remote_tag(&self) -> &str {
        &self.remote_tag
    }

    pub fn local_uri(&self) -> &str {
        &self.local_uri
    }

    pub fn remote_uri(&self) -> &str {
        &self.remote_uri
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn state(&self) -> CallLegState {
        self.inner.lock().state
    }

    pub fn local_sequence_number(&self) -> u32 {
        self.inner.lock().local_sequence_number
    }

    pub fn remote_sequence_number(&self) -> u32 {
        self.inner.lock().remote_sequence_number
    }

    /// Increments the local CSeq and returns the new value.
    pub fn get_next_sequence_number(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.local_sequence_number += 1;
        inner.local_sequence_number
    }

    /// Records the CSeq of a request from the remote side. Returns `false`
    /// and keeps the stored value unless `sequence` is strictly greater.
    pub fn update_remote_sequence_number(&self, sequence: u32) -> bool {
        let mut inner = self.inner.lock();
        if sequence > inner.remote_sequence_number {
            inner.remote_sequence_number = sequence;
            true
        } else {
            false
        }
    }

    /// Moves to `target`, failing if the transition table forbids it.
    pub fn transition_to_state(&self, target: CallLegState) -> DialogResult<()> {
        let mut inner = self.inner.lock();
        let from = inner.state;
        if !from.can_transition_to(target) {
            return Err(DialogError::InvalidStateTransition { from, to: target });
        }
        if from != target {
            debug!(call_id = %self.call_id, tag = %self.local_tag, "Call leg {} -> {}", from, target);
            inner.state = target;
        }
        Ok(())
    }

    /// Applies the state a response implies and returns the resulting state.
    ///
    /// 1xx maps to `ProvisionalResponse`, 2xx to `Confirmed` and 3xx-6xx to
    /// `Failed`. While `Terminating` only a final response to the BYE ends
    /// the leg; a response whose CSeq names another method (a retransmitted
    /// INVITE 2xx) is ignored, and one without a CSeq is taken as the BYE's.
    /// A transition the table does not allow (a late 1xx after `Confirmed`)
    /// is dropped, so a leg is never downgraded.
    pub fn handle_response(&self, response: &Response) -> CallLegState {
        let mut inner = self.inner.lock();
        let from = inner.state;
        let target = match from {
            CallLegState::Terminating if response.is_provisional() => from,
            CallLegState::Terminating if response.cseq().is_some_and(|cseq| cseq.method != Method::Bye) => {
                trace!(call_id = %self.call_id, tag = %self.local_tag, status = %response.status, "Final response to an earlier request while terminating");
                from
            }
            CallLegState::Terminating => CallLegState::Terminated,
            _ if response.is_provisional() => CallLegState::ProvisionalResponse,
            _ if response.is_success() => CallLegState::Confirmed,
            _ => CallLegState::Failed,
        };
        self.apply(&mut inner, target, response.status.as_u16())
    }

    /// Applies the state a request implies: INVITE starts `Inviting` and BYE
    /// starts `Terminating`.
    ///
    /// The request's CSeq is recorded as the remote sequence number only when
    /// the request was sent by this leg's peer, i.e. its From tag is this
    /// leg's remote tag. A request relayed out through this leg carries the
    /// other party's CSeq space and leaves the counter alone.
    pub fn handle_request(&self, request: &Request) -> CallLegState {
        let mut inner = self.inner.lock();
        if request.from_tag() == Some(self.remote_tag.as_str()) {
            if let Some(cseq) = request.cseq() {
                if cseq.seq > inner.remote_sequence_number {
                    inner.remote_sequence_number = cseq.seq;
                }
            }
        }
        let target = match request.method() {
            Method::Invite => CallLegState::Inviting,
            Method::Bye => CallLegState::Terminating,
            _ => return inner.state,
        };
        let from = inner.state;
        if from.can_transition_to(target) {
            if from != target {
                debug!(call_id = %self.call_id, tag = %self.local_tag, method = %request.method(), "Call leg {} -> {}", from, target);
            }
            inner.state = target;
        } else {
            trace!(call_id = %self.call_id, tag = %self.local_tag, method = %request.method(), state = %from, "Request does not change leg state");
        }
        inner.state
    }

    fn apply(&self, inner: &mut LegInner, target: CallLegState, status: u16) -> CallLegState {
        let from = inner.state;
        if from == target {
            return from;
        }
        if from.can_transition_to(target) {
            debug!(call_id = %self.call_id, tag = %self.local_tag, status, "Call leg {} -> {}", from, target);
            inner.state = target;
        } else {
            debug!(call_id = %self.call_id, tag = %self.local_tag, status, state = %from, "Ignoring stale response for call leg");
        }
        inner.state
    }
}
