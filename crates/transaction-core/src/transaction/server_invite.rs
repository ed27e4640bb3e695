use std::time::Duration;

use async_trait::async_trait;
use sipbridge_sip_core::Response;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::timer::InviteServerTimer;
use crate::transaction::runner::{TransactionContext, TransactionLogic};
use crate::transaction::server::InviteServerOp;
use crate::transaction::{TransactionEvent, TransactionKind, TransactionState};

/// INVITE server state machine (RFC 3261 §17.2.1, Figure 7).
///
/// A 2xx ends the transaction at once; retransmitting the 2xx and absorbing
/// its ACK belong to the dialog layer. A 3xx-6xx is retransmitted on Timer G
/// until the ACK arrives or Timer H gives up.
pub(crate) struct InviteServerLogic {
    last_provisional: Option<Response>,
    timer_g_interval: Duration,
}

impl InviteServerLogic {
    pub fn new() -> Self {
        Self {
            last_provisional: None,
            timer_g_interval: Duration::ZERO,
        }
    }

    async fn send_response(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
        response: Response,
    ) -> Result<Option<TransactionState>> {
        if ctx.state() != TransactionState::Proceeding {
            return Err(ctx.invalid("send_response"));
        }
        ctx.send_response(&response).await?;
        if response.is_provisional() {
            self.last_provisional = Some(response);
            Ok(None)
        } else if response.is_success() {
            ctx.last_response = Some(response);
            Ok(Some(TransactionState::Terminated))
        } else {
            ctx.last_response = Some(response);
            Ok(Some(TransactionState::Completed))
        }
    }

    fn ack_received(&mut self, ctx: &mut TransactionContext<InviteServerTimer>) -> Option<TransactionState> {
        if ctx.state() == TransactionState::Completed {
            ctx.emit(TransactionEvent::AckReceived {
                transaction_id: ctx.key.clone(),
            });
            Some(TransactionState::Confirmed)
        } else {
            debug!(id = %ctx.key, state = ?ctx.state(), "ACK outside Completed, ignoring");
            None
        }
    }

    async fn retransmission(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
    ) -> Result<Option<TransactionState>> {
        let resend = match ctx.state() {
            TransactionState::Proceeding => self.last_provisional.clone(),
            TransactionState::Completed => ctx.last_response.clone(),
            _ => None,
        };
        match resend {
            Some(response) => {
                trace!(id = %ctx.key, status = %response.status, "INVITE retransmitted, re-sending last response");
                ctx.send_response(&response).await?;
            }
            None => debug!(id = %ctx.key, state = ?ctx.state(), "INVITE retransmission absorbed"),
        }
        Ok(None)
    }
}

#[async_trait]
impl TransactionLogic for InviteServerLogic {
    type Timer = InviteServerTimer;
    type Op = InviteServerOp;

    fn kind(&self) -> TransactionKind {
        TransactionKind::InviteServer
    }

    async fn on_start(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
    ) -> Result<Option<TransactionState>> {
        ctx.emit(TransactionEvent::NewRequest {
            transaction_id: ctx.key.clone(),
            request: ctx.request.clone(),
            source: ctx.remote_addr,
        });
        Ok(None)
    }

    async fn on_enter_state(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
        new_state: TransactionState,
        _previous_state: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match new_state {
            TransactionState::Completed => {
                if ctx.settings.retransmits() {
                    self.timer_g_interval = ctx.settings.timer_g();
                    ctx.timers.arm(InviteServerTimer::G, self.timer_g_interval);
                }
                ctx.timers.arm(InviteServerTimer::H, ctx.settings.timer_h());
                Ok(None)
            }
            TransactionState::Confirmed => {
                ctx.timers.cancel(InviteServerTimer::G);
                ctx.timers.cancel(InviteServerTimer::H);
                let wait = ctx.settings.timer_i();
                if wait.is_zero() {
                    Ok(Some(TransactionState::Terminated))
                } else {
                    ctx.timers.arm(InviteServerTimer::I, wait);
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    async fn handle_op(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
        op: InviteServerOp,
    ) -> Result<Option<TransactionState>> {
        match op {
            InviteServerOp::SendResponse(response) => self.send_response(ctx, response).await,
            InviteServerOp::AckReceived => Ok(self.ack_received(ctx)),
            InviteServerOp::RetransmitRequest => self.retransmission(ctx).await,
        }
    }

    async fn handle_timer(
        &mut self,
        ctx: &mut TransactionContext<InviteServerTimer>,
        timer: InviteServerTimer,
    ) -> Result<Option<TransactionState>> {
        match (timer, ctx.state()) {
            (InviteServerTimer::G, TransactionState::Completed) => {
                if let Some(response) = ctx.last_response.clone() {
                    debug!(id = %ctx.key, interval = ?self.timer_g_interval, "Timer G fired, retransmitting final response");
                    ctx.send_response(&response).await?;
                }
                self.timer_g_interval = (self.timer_g_interval * 2).min(ctx.settings.t2);
                ctx.timers.arm(InviteServerTimer::G, self.timer_g_interval);
                Ok(None)
            }
            (InviteServerTimer::H, TransactionState::Completed) => {
                warn!(id = %ctx.key, "Timer H fired, no ACK received");
                ctx.emit(TransactionEvent::Timeout {
                    transaction_id: ctx.key.clone(),
                });
                Ok(Some(TransactionState::Terminated))
            }
            (InviteServerTimer::I, TransactionState::Confirmed) => Ok(Some(TransactionState::Terminated)),
            (timer, state) => {
                trace!(id = %ctx.key, ?timer, ?state, "Timer not applicable in current state");
                Ok(None)
            }
        }
    }
}
