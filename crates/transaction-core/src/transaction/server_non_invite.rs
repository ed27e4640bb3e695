use async_trait::async_trait;
use sipbridge_sip_core::Response;
use tracing::{debug, trace};

use crate::error::Result;
use crate::timer::NonInviteServerTimer;
use crate::transaction::runner::{TransactionContext, TransactionLogic};
use crate::transaction::server::NonInviteServerOp;
use crate::transaction::{TransactionEvent, TransactionKind, TransactionState};

/// Non-INVITE server state machine (RFC 3261 §17.2.2, Figure 8).
pub(crate) struct NonInviteServerLogic {
    last_provisional: Option<Response>,
}

impl NonInviteServerLogic {
    pub fn new() -> Self {
        Self {
            last_provisional: None,
        }
    }

    async fn send_response(
        &mut self,
        ctx: &mut TransactionContext<NonInviteServerTimer>,
        response: Response,
    ) -> Result<Option<TransactionState>> {
        match ctx.state() {
            TransactionState::Trying | TransactionState::Proceeding => {
                ctx.send_response(&response).await?;
                if response.is_provisional() {
                    self.last_provisional = Some(response);
                    Ok(Some(TransactionState::Proceeding))
                } else {
                    ctx.last_response = Some(response);
                    Ok(Some(TransactionState::Completed))
                }
            }
            _ => Err(ctx.invalid("send_response")),
        }
    }

    async fn retransmission(
        &mut self,
        ctx: &mut TransactionContext<NonInviteServerTimer>,
    ) -> Result<Option<TransactionState>> {
        let resend = match ctx.state() {
            TransactionState::Proceeding => self.last_provisional.clone(),
            TransactionState::Completed => ctx.last_response.clone(),
            _ => None,
        };
        match resend {
            Some(response) => {
                trace!(id = %ctx.key, status = %response.status, "Request retransmitted, re-sending last response");
                ctx.send_response(&response).await?;
            }
            None => debug!(id = %ctx.key, state = ?ctx.state(), "Request retransmission discarded"),
        }
        Ok(None)
    }
}

#[async_trait]
impl TransactionLogic for NonInviteServerLogic {
    type Timer = NonInviteServerTimer;
    type Op = NonInviteServerOp;

    fn kind(&self) -> TransactionKind {
        TransactionKind::NonInviteServer
    }

    async fn on_start(
        &mut self,
        ctx: &mut TransactionContext<NonInviteServerTimer>,
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
        ctx: &mut TransactionContext<NonInviteServerTimer>,
        new_state: TransactionState,
        _previous_state: TransactionState,
    ) -> Result<Option<TransactionState>> {
        if new_state != TransactionState::Completed {
            return Ok(None);
        }
        let wait = ctx.settings.timer_j();
        if wait.is_zero() {
            Ok(Some(TransactionState::Terminated))
        } else {
            ctx.timers.arm(NonInviteServerTimer::J, wait);
            Ok(None)
        }
    }

    async fn handle_op(
        &mut self,
        ctx: &mut TransactionContext<NonInviteServerTimer>,
        op: NonInviteServerOp,
    ) -> Result<Option<TransactionState>> {
        match op {
            NonInviteServerOp::SendResponse(response) => self.send_response(ctx, response).await,
            NonInviteServerOp::RetransmitRequest => self.retransmission(ctx).await,
        }
    }

    async fn handle_timer(
        &mut self,
        ctx: &mut TransactionContext<NonInviteServerTimer>,
        timer: NonInviteServerTimer,
    ) -> Result<Option<TransactionState>> {
        match (timer, ctx.state()) {
            (NonInviteServerTimer::J, TransactionState::Completed) => Ok(Some(TransactionState::Terminated)),
            (timer, state) => {
                trace!(id = %ctx.key, ?timer, ?state, "Timer not applicable in current state");
                Ok(None)
            }
        }
    }
}
