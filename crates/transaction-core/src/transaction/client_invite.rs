use std::time::Duration;

use async_trait::async_trait;
use sipbridge_sip_core::{Message, Request, Response};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::timer::InviteClientTimer;
use crate::transaction::client::{self, ClientOp};
use crate::transaction::runner::{TransactionContext, TransactionLogic};
use crate::transaction::{TransactionEvent, TransactionKind, TransactionState};
use crate::utils::create_ack_from_invite;

/// INVITE client state machine (RFC 3261 §17.1.1, Figure 5).
///
/// ```text
///  Calling --1xx--> Proceeding --300-699--> Completed --Timer D--> Terminated
///     |                 |
///     +------2xx--------+------------------------------------------> Terminated
/// ```
pub(crate) struct InviteClientLogic {
    timer_a_interval: Duration,
    /// ACK sent for the non-2xx final response
    ack: Option<Request>,
}

impl InviteClientLogic {
    pub fn new() -> Self {
        Self {
            timer_a_interval: Duration::ZERO,
            ack: None,
        }
    }

    async fn on_response(
        &mut self,
        ctx: &mut TransactionContext<InviteClientTimer>,
        response: Response,
    ) -> Result<Option<TransactionState>> {
        let transaction_id = ctx.key.clone();
        match ctx.state() {
            TransactionState::Calling | TransactionState::Proceeding => {
                if response.is_provisional() {
                    ctx.emit(TransactionEvent::ProvisionalResponse {
                        transaction_id,
                        response,
                    });
                    Ok(Some(TransactionState::Proceeding))
                } else if response.is_success() {
                    ctx.emit(TransactionEvent::SuccessResponse {
                        transaction_id,
                        response,
                    });
                    Ok(Some(TransactionState::Terminated))
                } else {
                    ctx.last_response = Some(response.clone());
                    ctx.emit(TransactionEvent::FailureResponse {
                        transaction_id,
                        response,
                    });
                    Ok(Some(TransactionState::Completed))
                }
            }
            TransactionState::Completed if response.status.is_error() => {
                trace!(id = %transaction_id, status = %response.status, "Final response retransmitted, re-sending ACK");
                if let Some(ack) = self.ack.clone() {
                    ctx.send(Message::Request(ack)).await?;
                }
                Ok(None)
            }
            state => {
                debug!(id = %transaction_id, ?state, status = %response.status, "Dropping response");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TransactionLogic for InviteClientLogic {
    type Timer = InviteClientTimer;
    type Op = ClientOp;

    fn kind(&self) -> TransactionKind {
        TransactionKind::InviteClient
    }

    async fn on_start(
        &mut self,
        ctx: &mut TransactionContext<InviteClientTimer>,
    ) -> Result<Option<TransactionState>> {
        ctx.send_request().await?;
        if ctx.settings.retransmits() {
            self.timer_a_interval = ctx.settings.timer_a();
            ctx.timers.arm(InviteClientTimer::A, self.timer_a_interval);
        }
        ctx.timers.arm(InviteClientTimer::B, ctx.settings.timer_b());
        Ok(None)
    }

    async fn on_enter_state(
        &mut self,
        ctx: &mut TransactionContext<InviteClientTimer>,
        new_state: TransactionState,
        _previous_state: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match new_state {
            TransactionState::Proceeding => {
                ctx.timers.cancel(InviteClientTimer::A);
                ctx.timers.cancel(InviteClientTimer::B);
                Ok(None)
            }
            TransactionState::Completed => {
                ctx.timers.cancel(InviteClientTimer::A);
                ctx.timers.cancel(InviteClientTimer::B);

                match ctx.last_response.as_ref().map(|response| create_ack_from_invite(&ctx.request, response)) {
                    Some(Ok(ack)) => {
                        ctx.send(Message::Request(ack.clone())).await?;
                        self.ack = Some(ack);
                    }
                    Some(Err(e)) => warn!(id = %ctx.key, error = %e, "Could not build ACK for final response"),
                    None => debug!(id = %ctx.key, "Completed without a final response, no ACK sent"),
                }

                let wait = ctx.settings.timer_d();
                if wait.is_zero() {
                    Ok(Some(TransactionState::Terminated))
                } else {
                    ctx.timers.arm(InviteClientTimer::D, wait);
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    async fn handle_op(
        &mut self,
        ctx: &mut TransactionContext<InviteClientTimer>,
        op: ClientOp,
    ) -> Result<Option<TransactionState>> {
        match op {
            ClientOp::ReceiveResponse(response) => self.on_response(ctx, response).await,
            ClientOp::Retransmit => client::retransmit_request(ctx).await,
            ClientOp::TransportError => client::transport_failed(ctx),
        }
    }

    async fn handle_timer(
        &mut self,
        ctx: &mut TransactionContext<InviteClientTimer>,
        timer: InviteClientTimer,
    ) -> Result<Option<TransactionState>> {
        match (timer, ctx.state()) {
            (InviteClientTimer::A, TransactionState::Calling) => {
                debug!(id = %ctx.key, interval = ?self.timer_a_interval, "Timer A fired, retransmitting INVITE");
                ctx.send_request().await?;
                self.timer_a_interval *= 2;
                ctx.timers.arm(InviteClientTimer::A, self.timer_a_interval);
                Ok(None)
            }
            (InviteClientTimer::B, TransactionState::Calling) => {
                warn!(id = %ctx.key, "Timer B fired, INVITE transaction timed out");
                ctx.emit(TransactionEvent::Timeout {
                    transaction_id: ctx.key.clone(),
                });
                Ok(Some(TransactionState::Terminated))
            }
            (InviteClientTimer::D, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            (timer, state) => {
                trace!(id = %ctx.key, ?timer, ?state, "Timer not applicable in current state");
                Ok(None)
            }
        }
    }
}
