//! B2BUA call-leg orchestration.
//!
//! The orchestrator owns one [`CallLegPair`] per Call-ID: the UAC-facing and
//! the UAS-facing leg of a bridged call. Every response routed through it is
//! applied to both legs, under the pair's routing lock, so the two legs always
//! agree on the dialog state and [`CallLegOrchestrator::is_dialog_confirmed`]
//! has a single answer.
//!
//! Pairs whose legs have both reached a terminal state stay queryable for
//! [`OrchestratorConfig::terminated_pair_ttl`] and are then removed by
//! [`CallLegOrchestrator::purge_terminated`], which
//! [`CallLegOrchestrator::spawn_reaper`] runs periodically.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use sipbridge_sip_core::{Method, Request, Response, StatusClass};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::call_leg::{CallLeg, CallLegState};
use crate::config::OrchestratorConfig;
use crate::error::{DialogError, DialogResult};

/// The two legs bridged under one Call-ID.
#[derive(Debug)]
pub struct CallLegPair {
    call_id: String,
    uac: Arc<CallLeg>,
    uas: Arc<CallLeg>,
    created_at: Instant,
    terminated_at: Mutex<Option<Instant>>,
    routing: Mutex<()>,
}

impl CallLegPair {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn uac(&self) -> &Arc<CallLeg> {
        &self.uac
    }

    pub fn uas(&self) -> &Arc<CallLeg> {
        &self.uas
    }

    /// `(uac, uas)` leg states.
    pub fn states(&self) -> (CallLegState, CallLegState) {
        (self.uac.state(), self.uas.state())
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When both legs were first seen in a terminal state.
    pub fn terminated_at(&self) -> Option<Instant> {
        *self.terminated_at.lock()
    }

    pub fn is_terminated(&self) -> bool {
        self.uac.state().is_terminal() && self.uas.state().is_terminal()
    }

    fn mark_if_terminated(&self) {
        if self.is_terminated() {
            let mut stamp = self.terminated_at.lock();
            if stamp.is_none() {
                *stamp = Some(Instant::now());
                debug!(call_id = %self.call_id, "Call leg pair terminated");
            }
        }
    }

    fn is_expired(&self, now: Instant, ttl: std::time::Duration) -> bool {
        match self.terminated_at() {
            Some(at) => now.saturating_duration_since(at) >= ttl,
            None => false,
        }
    }
}

/// Registry of call leg pairs keyed by Call-ID.
#[derive(Debug)]
pub struct CallLegOrchestrator {
    config: OrchestratorConfig,
    pairs: DashMap<String, Arc<CallLegPair>>,
}

impl Default for CallLegOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl CallLegOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            pairs: DashMap::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Creates the UAC/UAS legs for `call_id`, each holding the other's tag as
    /// its remote tag.
    ///
    /// A Call-ID that already has a pair is rejected with
    /// [`DialogError::DuplicateCallId`] and the existing pair is left untouched.
    pub fn create_call_leg_pair(
        &self,
        call_id: &str,
        uac_tag: &str,
        uas_tag: &str,
        uac_uri: &str,
        uas_uri: &str,
        secure: bool,
    ) -> DialogResult<Arc<CallLegPair>> {
        if call_id.is_empty() {
            return Err(DialogError::empty("Call-ID"));
        }

        match self.pairs.entry(call_id.to_string()) {
            Entry::Occupied(_) => {
                warn!(call_id, "Call leg pair already exists");
                Err(DialogError::DuplicateCallId(call_id.to_string()))
            }
            Entry::Vacant(slot) => {
                let uac = CallLeg::new(call_id, uac_tag, uas_tag, uac_uri, uas_uri, secure)?;
                let uas = CallLeg::new(call_id, uas_tag, uac_tag, uas_uri, uac_uri, secure)?;
                let pair = Arc::new(CallLegPair {
                    call_id: call_id.to_string(),
                    uac: Arc::new(uac),
                    uas: Arc::new(uas),
                    created_at: Instant::now(),
                    terminated_at: Mutex::new(None),
                    routing: Mutex::new(()),
                });
                slot.insert(pair.clone());
                info!(call_id, uac_tag, uas_tag, secure, "Created call leg pair");
                Ok(pair)
            }
        }
    }

    /// The pair registered for `call_id`.
    pub fn call_leg_pair(&self, call_id: &str) -> DialogResult<Arc<CallLegPair>> {
        self.pairs
            .get(call_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DialogError::CallLegNotFound(call_id.to_string()))
    }

    /// `(uac, uas)` legs of `call_id`, if a pair exists.
    pub fn try_get_call_legs(&self, call_id: &str) -> Option<(Arc<CallLeg>, Arc<CallLeg>)> {
        self.call_leg_pair(call_id)
            .ok()
            .map(|pair| (pair.uac.clone(), pair.uas.clone()))
    }

    /// True iff both legs of `call_id` are `Confirmed`.
    pub fn is_dialog_confirmed(&self, call_id: &str) -> bool {
        self.call_leg_pair(call_id)
            .map(|pair| pair.states() == (CallLegState::Confirmed, CallLegState::Confirmed))
            .unwrap_or(false)
    }

    pub fn route_provisional_response(&self, call_id: &str, response: Response) -> Option<Response> {
        self.route_response("provisional", call_id, response, |class| class == StatusClass::Provisional)
    }

    pub fn route_final_response(&self, call_id: &str, response: Response) -> Option<Response> {
        self.route_response("final", call_id, response, |class| class == StatusClass::Success)
    }

    pub fn route_error_response(&self, call_id: &str, response: Response) -> Option<Response> {
        self.route_response("error", call_id, response, |class| {
            !matches!(class, StatusClass::Provisional | StatusClass::Success)
        })
    }

    /// Applies `response` to both legs and hands it back for forwarding to
    /// the opposite leg. Unknown Call-IDs return `None`.
    fn route_response<F>(&self, route: &'static str, call_id: &str, response: Response, expected: F) -> Option<Response>
    where
        F: Fn(StatusClass) -> bool,
    {
        let Ok(pair) = self.call_leg_pair(call_id) else {
            debug!(call_id, status = %response.status, route, "No call leg pair for response, dropping");
            return None;
        };
        if !expected(response.class()) {
            warn!(call_id, status = %response.status, route, "Response routed through the wrong path");
        }

        let _routing = pair.routing.lock();
        let uac = pair.uac.handle_response(&response);
        let uas = pair.uas.handle_response(&response);
        if uac != uas {
            warn!(call_id, uac = %uac, uas = %uas, "Call legs diverged");
        }
        trace!(call_id, status = %response.status, state = %uac, "Routed {} response to both legs", route);
        pair.mark_if_terminated();
        Some(response)
    }

    /// Routes a request received inside the dialog of `call_id`.
    ///
    /// ACK is absorbed and returns `None`: each leg's ACK belongs to that
    /// leg's own INVITE transaction. BYE moves both legs to `Terminating`.
    /// Every other method is applied to both legs and returned for
    /// forwarding. Only the leg whose peer sent the request (matched by From
    /// tag) records its CSeq. Unknown Call-IDs return `None`.
    pub fn route_in_dialog_request(&self, call_id: &str, request: Request) -> Option<Request> {
        let Ok(pair) = self.call_leg_pair(call_id) else {
            debug!(call_id, method = %request.method(), "No call leg pair for in-dialog request, dropping");
            return None;
        };

        let _routing = pair.routing.lock();
        match request.method() {
            Method::Ack => {
                trace!(call_id, "ACK consumed locally");
                None
            }
            method => {
                let uac = pair.uac.handle_request(&request);
                let uas = pair.uas.handle_request(&request);
                if method == &Method::Bye {
                    debug!(call_id, uac = %uac, uas = %uas, "BYE routed, legs terminating");
                } else {
                    trace!(call_id, %method, "Forwarding in-dialog request");
                }
                Some(request)
            }
        }
    }

    pub fn remove_call_leg_pair(&self, call_id: &str) -> Option<Arc<CallLegPair>> {
        let removed = self.pairs.remove(call_id).map(|(_, pair)| pair);
        if removed.is_some() {
            debug!(call_id, "Removed call leg pair");
        }
        removed
    }

    /// Removes pairs that have been terminated for at least the configured
    /// TTL. Returns how many were removed.
    pub fn purge_terminated(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.terminated_pair_ttl;
        let before = self.pairs.len();
        self.pairs.retain(|_, pair| !pair.is_expired(now, ttl));
        let purged = before.saturating_sub(self.pairs.len());
        if purged > 0 {
            debug!(purged, remaining = self.pairs.len(), "Purged terminated call leg pairs");
        }
        purged
    }

    /// Runs [`purge_terminated`](Self::purge_terminated) every
    /// `reaper_interval` until the orchestrator is dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> DialogResult<JoinHandle<()>> {
        let period = self.config.reaper_interval;
        if period.is_zero() {
            return Err(DialogError::Config("reaper_interval must be greater than zero".to_string()));
        }
        let orchestrator: Weak<Self> = Arc::downgrade(self);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(orchestrator) = orchestrator.upgrade() else {
                    debug!("Orchestrator dropped, reaper exiting");
                    break;
                };
                orchestrator.purge_terminated();
            }
        }))
    }

    /// Pairs that have not terminated yet.
    pub fn active_pair_count(&self) -> usize {
        self.pairs.iter().filter(|entry| !entry.value().is_terminated()).count()
    }

    /// All registered pairs, terminated ones included.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
