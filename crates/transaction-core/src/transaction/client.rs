//! Client transaction handles (RFC 3261 §17.1).

use std::net::SocketAddr;

use sipbridge_sip_core::{Request, Response};
use tracing::warn;

use crate::error::{Error, Result};
use crate::timer::TimerKind;
use crate::transaction::client_invite::InviteClientLogic;
use crate::transaction::client_non_invite::NonInviteClientLogic;
use crate::transaction::runner::{self, PendingTransaction, TransactionContext, TransactionHandle};
use crate::transaction::{TransactionKey, TransactionKind, TransactionServices, TransactionState};

#[derive(Debug)]
pub(crate) enum ClientOp {
    ReceiveResponse(Response),
    Retransmit,
    TransportError,
}

fn client_key(request: &Request, invite: bool) -> Result<TransactionKey> {
    let method = request.method().clone();
    if invite && !method.is_invite() {
        return Err(Error::MethodMismatch {
            expected: "INVITE",
            actual: method,
        });
    }
    if !invite && (method.is_invite() || method.is_ack()) {
        return Err(Error::MethodMismatch {
            expected: "a non-INVITE, non-ACK method",
            actual: method,
        });
    }
    let branch = request.via_branch().ok_or(Error::MissingBranch)?;
    Ok(TransactionKey::new(branch, method, false))
}

/// Re-sends the original request while it is still outstanding.
pub(super) async fn retransmit_request<T: TimerKind>(
    ctx: &mut TransactionContext<T>,
) -> Result<Option<TransactionState>> {
    match ctx.state() {
        TransactionState::Calling | TransactionState::Trying | TransactionState::Proceeding => {
            ctx.send_request().await?;
            Ok(None)
        }
        _ => Err(ctx.invalid("retransmit")),
    }
}

/// Transport failure reported while the request is outstanding.
pub(super) fn transport_failed<T: TimerKind>(
    ctx: &mut TransactionContext<T>,
) -> Result<Option<TransactionState>> {
    match ctx.state() {
        TransactionState::Calling | TransactionState::Trying | TransactionState::Proceeding => {
            warn!(id = %ctx.key, "Transport error reported, terminating client transaction");
            ctx.report_transport_failure();
            Ok(Some(TransactionState::Terminated))
        }
        _ => Err(ctx.invalid("transport_error")),
    }
}

/// Handle to an INVITE client transaction (RFC 3261 §17.1.1).
///
/// Cloning the handle is cheap; all clones drive the same transaction.
#[derive(Debug, Clone)]
pub struct InviteClientTransaction {
    inner: TransactionHandle<ClientOp>,
}

impl InviteClientTransaction {
    /// Sends `request` to `remote_addr`, enters `Calling` and arms Timers A and B.
    pub fn start(
        request: Request,
        remote_addr: SocketAddr,
        services: &TransactionServices,
    ) -> Result<Self> {
        let (transaction, pending) = Self::prepare(request, remote_addr, services)?;
        pending.spawn();
        Ok(transaction)
    }

    pub(crate) fn prepare(
        request: Request,
        remote_addr: SocketAddr,
        services: &TransactionServices,
    ) -> Result<(Self, PendingTransaction<InviteClientLogic>)> {
        let key = client_key(&request, true)?;
        let (inner, pending) =
            runner::prepare(InviteClientLogic::new(), key, request, remote_addr, services);
        Ok((Self { inner }, pending))
    }

    pub fn key(&self) -> &TransactionKey {
        self.inner.key()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_addr()
    }

    /// Feeds a response to the transaction. Responses the current state has no
    /// use for are dropped.
    pub async fn receive_response(&self, response: Response) -> Result<()> {
        self.inner.request(ClientOp::ReceiveResponse(response)).await
    }

    /// Re-sends the INVITE. Only legal in `Calling` or `Proceeding`.
    pub async fn retransmit(&self) -> Result<()> {
        self.inner.request(ClientOp::Retransmit).await
    }

    /// Reports a transport failure for the outstanding INVITE.
    pub async fn transport_error(&self) -> Result<()> {
        self.inner.request(ClientOp::TransportError).await
    }

    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub(crate) fn instance(&self) -> u64 {
        self.inner.instance()
    }
}

/// Handle to a non-INVITE client transaction (RFC 3261 §17.1.2).
#[derive(Debug, Clone)]
pub struct NonInviteClientTransaction {
    inner: TransactionHandle<ClientOp>,
}

impl NonInviteClientTransaction {
    /// Sends `request` to `remote_addr`, enters `Trying` and arms Timers E and F.
    pub fn start(
        request: Request,
        remote_addr: SocketAddr,
        services: &TransactionServices,
    ) -> Result<Self> {
        let (transaction, pending) = Self::prepare(request, remote_addr, services)?;
        pending.spawn();
        Ok(transaction)
    }

    pub(crate) fn prepare(
        request: Request,
        remote_addr: SocketAddr,
        services: &TransactionServices,
    ) -> Result<(Self, PendingTransaction<NonInviteClientLogic>)> {
        let key = client_key(&request, false)?;
        let (inner, pending) =
            runner::prepare(NonInviteClientLogic::new(), key, request, remote_addr, services);
        Ok((Self { inner }, pending))
    }

    pub fn key(&self) -> &TransactionKey {
        self.inner.key()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_addr()
    }

    pub async fn receive_response(&self, response: Response) -> Result<()> {
        self.inner.request(ClientOp::ReceiveResponse(response)).await
    }

    /// Re-sends the request. Only legal in `Trying` or `Proceeding`.
    pub async fn retransmit(&self) -> Result<()> {
        self.inner.request(ClientOp::Retransmit).await
    }

    pub async fn transport_error(&self) -> Result<()> {
        self.inner.request(ClientOp::TransportError).await
    }

    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub(crate) fn instance(&self) -> u64 {
        self.inner.instance()
    }
}

/// Either kind of client transaction.
#[derive(Debug, Clone)]
pub enum ClientTransaction {
    Invite(InviteClientTransaction),
    NonInvite(NonInviteClientTransaction),
}

impl ClientTransaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            ClientTransaction::Invite(_) => TransactionKind::InviteClient,
            ClientTransaction::NonInvite(_) => TransactionKind::NonInviteClient,
        }
    }

    pub fn key(&self) -> &TransactionKey {
        match self {
            ClientTransaction::Invite(tx) => tx.key(),
            ClientTransaction::NonInvite(tx) => tx.key(),
        }
    }

    pub fn state(&self) -> TransactionState {
        match self {
            ClientTransaction::Invite(tx) => tx.state(),
            ClientTransaction::NonInvite(tx) => tx.state(),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        match self {
            ClientTransaction::Invite(tx) => tx.remote_addr(),
            ClientTransaction::NonInvite(tx) => tx.remote_addr(),
        }
    }

    pub async fn receive_response(&self, response: Response) -> Result<()> {
        match self {
            ClientTransaction::Invite(tx) => tx.receive_response(response).await,
            ClientTransaction::NonInvite(tx) => tx.receive_response(response).await,
        }
    }

    pub async fn retransmit(&self) -> Result<()> {
        match self {
            ClientTransaction::Invite(tx) => tx.retransmit().await,
            ClientTransaction::NonInvite(tx) => tx.retransmit().await,
        }
    }

    pub async fn transport_error(&self) -> Result<()> {
        match self {
            ClientTransaction::Invite(tx) => tx.transport_error().await,
            ClientTransaction::NonInvite(tx) => tx.transport_error().await,
        }
    }

    pub fn terminate(&self) {
        match self {
            ClientTransaction::Invite(tx) => tx.terminate(),
            ClientTransaction::NonInvite(tx) => tx.terminate(),
        }
    }
}
