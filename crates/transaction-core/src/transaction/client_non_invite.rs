use std::time::Duration;

use async_trait::async_trait;
use sipbridge_sip_core::Response;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::timer::NonInviteClientTimer;
use crate::transaction::client::{self, ClientOp};
use crate::transaction::runner::{TransactionContext, TransactionLogic};
use crate::transaction::{TransactionEvent, TransactionKind, TransactionState};

/// Non-INVITE client state machine (RFC 3261 §17.1.2, Figure 6).
///
/// Timer E starts at T1 and doubles up to T2 while `Trying`; once a provisional
/// response arrives it keeps firing every T2 until the final response or Timer F.
pub(crate) struct NonInviteClientLogic {
    timer_e_interval: Duration,
}

impl NonInviteClientLogic {
    pub fn new() -> Self {
        Self {
            timer_e_interval: Duration::ZERO,
        }
    }

    fn on_response(
        &mut self,
        ctx: &mut TransactionContext<NonInviteClientTimer>,
        response: Response,
    ) -> Result<Option<TransactionState>> {
        let transaction_id = ctx.key.clone();
        match ctx.state() {
            TransactionState::Trying | TransactionState::Proceeding => {
                if response.is_provisional() {
                    ctx.emit(TransactionEvent::ProvisionalResponse {
                        transaction_id,
                        response,
                    });
                    return Ok(Some(TransactionState::Proceeding));
                }
                ctx.last_response = Some(response.clone());
                if response.is_success() {
                    ctx.emit(TransactionEvent::SuccessResponse {
                        transaction_id,
                        response,
                    });
                } else {
                    ctx.emit(TransactionEvent::FailureResponse {
                        transaction_id,
                        response,
                    });
                }
                Ok(Some(TransactionState::Completed))
            }
            state => {
                debug!(id = %transaction_id, ?state, status = %response.status, "Dropping response");
                Ok(None)
            }
        }
    }

    fn arm_retransmit(&mut self, ctx: &mut TransactionContext<NonInviteClientTimer>, interval: Duration) {
        if ctx.settings.retransmits() {
            self.timer_e_interval = interval;
            ctx.timers.arm(NonInviteClientTimer::E, interval);
        }
    }
}

#[async_trait]
impl TransactionLogic for NonInviteClientLogic {
    type Timer = NonInviteClientTimer;
    type Op = ClientOp;

    fn kind(&self) -> TransactionKind {
        TransactionKind::NonInviteClient
    }

    async fn on_start(
        &mut self,
        ctx: &mut TransactionContext<NonInviteClientTimer>,
    ) -> Result<Option<TransactionState>> {
        ctx.send_request().await?;
        let initial = ctx.settings.timer_e();
        self.arm_retransmit(ctx, initial);
        ctx.timers.arm(NonInviteClientTimer::F, ctx.settings.timer_f());
        Ok(None)
    }

    async fn on_enter_state(
        &mut self,
        ctx: &mut TransactionContext<NonInviteClientTimer>,
        new_state: TransactionState,
        _previous_state: TransactionState,
    ) -> Result<Option<TransactionState>> {
        match new_state {
            TransactionState::Proceeding => {
                let t2 = ctx.settings.t2;
                self.arm_retransmit(ctx, t2);
                Ok(None)
            }
            TransactionState::Completed => {
                ctx.timers.cancel(NonInviteClientTimer::E);
                ctx.timers.cancel(NonInviteClientTimer::F);
                let wait = ctx.settings.timer_k();
                if wait.is_zero() {
                    Ok(Some(TransactionState::Terminated))
                } else {
                    ctx.timers.arm(NonInviteClientTimer::K, wait);
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    async fn handle_op(
        &mut self,
        ctx: &mut TransactionContext<NonInviteClientTimer>,
        op: ClientOp,
    ) -> Result<Option<TransactionState>> {
        match op {
            ClientOp::ReceiveResponse(response) => self.on_response(ctx, response),
            ClientOp::Retransmit => client::retransmit_request(ctx).await,
            ClientOp::TransportError => client::transport_failed(ctx),
        }
    }

    async fn handle_timer(
        &mut self,
        ctx: &mut TransactionContext<NonInviteClientTimer>,
        timer: NonInviteClientTimer,
    ) -> Result<Option<TransactionState>> {
        match (timer, ctx.state()) {
            (NonInviteClientTimer::E, TransactionState::Trying) => {
                debug!(id = %ctx.key, interval = ?self.timer_e_interval, "Timer E fired, retransmitting request");
                ctx.send_request().await?;
                let next = (self.timer_e_interval * 2).min(ctx.settings.t2);
                self.arm_retransmit(ctx, next);
                Ok(None)
            }
            (NonInviteClientTimer::E, TransactionState::Proceeding) => {
                debug!(id = %ctx.key, "Timer E fired in Proceeding, retransmitting request");
                ctx.send_request().await?;
                let t2 = ctx.settings.t2;
                self.arm_retransmit(ctx, t2);
                Ok(None)
            }
            (NonInviteClientTimer::F, TransactionState::Trying | TransactionState::Proceeding) => {
                warn!(id = %ctx.key, "Timer F fired, non-INVITE transaction timed out");
                ctx.emit(TransactionEvent::Timeout {
                    transaction_id: ctx.key.clone(),
                });
                Ok(Some(TransactionState::Terminated))
            }
            (NonInviteClientTimer::K, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            (timer, state) => {
                trace!(id = %ctx.key, ?timer, ?state, "Timer not applicable in current state");
                Ok(None)
            }
        }
    }
}
