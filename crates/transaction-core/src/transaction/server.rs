//! Server transaction handles (RFC 3261 §17.2).

use std::net::SocketAddr;

use sipbridge_sip_core::{Request, Response};

use crate::error::{Error, Result};
use crate::transaction::runner::{self, PendingTransaction, TransactionHandle};
use crate::transaction::server_invite::InviteServerLogic;
use crate::transaction::server_non_invite::NonInviteServerLogic;
use crate::transaction::{TransactionKey, TransactionKind, TransactionServices, TransactionState};

#[derive(Debug)]
pub(crate) enum InviteServerOp {
    SendResponse(Response),
    AckReceived,
    RetransmitRequest,
}

#[derive(Debug)]
pub(crate) enum NonInviteServerOp {
    SendResponse(Response),
    RetransmitRequest,
}

fn server_key(request: &Request, invite: bool) -> Result<TransactionKey> {
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
    TransactionKey::from_request(request).ok_or(Error::MissingBranch)
}

/// Handle to an INVITE server transaction (RFC 3261 §17.2.1).
#[derive(Debug, Clone)]
pub struct InviteServerTransaction {
    inner: TransactionHandle<InviteServerOp>,
}

impl InviteServerTransaction {
    /// Records the INVITE received from `source`, enters `Proceeding` and
    /// passes the request up as [`TransactionEvent::NewRequest`](super::TransactionEvent::NewRequest).
    pub fn start(
        request: Request,
        source: SocketAddr,
        services: &TransactionServices,
    ) -> Result<Self> {
        let (transaction, pending) = Self::prepare(request, source, services)?;
        pending.spawn();
        Ok(transaction)
    }

    pub(crate) fn prepare(
        request: Request,
        source: SocketAddr,
        services: &TransactionServices,
    ) -> Result<(Self, PendingTransaction<InviteServerLogic>)> {
        let key = server_key(&request, true)?;
        let (inner, pending) =
            runner::prepare(InviteServerLogic::new(), key, request, source, services);
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

    /// Sends a response for the INVITE.
    ///
    /// 1xx and final responses are only legal while `Proceeding`. A 2xx
    /// terminates the transaction, 3xx-6xx move it to `Completed`.
    pub async fn send_response(&self, response: Response) -> Result<()> {
        self.inner.request(InviteServerOp::SendResponse(response)).await
    }

    /// ACK for the final response. Ignored outside `Completed`.
    pub async fn ack_received(&self) -> Result<()> {
        self.inner.request(InviteServerOp::AckReceived).await
    }

    /// A retransmission of the INVITE arrived.
    pub async fn retransmit_request(&self) -> Result<()> {
        self.inner.request(InviteServerOp::RetransmitRequest).await
    }

    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub(crate) fn instance(&self) -> u64 {
        self.inner.instance()
    }
}

/// Handle to a non-INVITE server transaction (RFC 3261 §17.2.2).
#[derive(Debug, Clone)]
pub struct NonInviteServerTransaction {
    inner: TransactionHandle<NonInviteServerOp>,
}

impl NonInviteServerTransaction {
    /// Records the request received from `source`, enters `Trying` and passes
    /// the request up.
    pub fn start(
        request: Request,
        source: SocketAddr,
        services: &TransactionServices,
    ) -> Result<Self> {
        let (transaction, pending) = Self::prepare(request, source, services)?;
        pending.spawn();
        Ok(transaction)
    }

    pub(crate) fn prepare(
        request: Request,
        source: SocketAddr,
        services: &TransactionServices,
    ) -> Result<(Self, PendingTransaction<NonInviteServerLogic>)> {
        let key = server_key(&request, false)?;
        let (inner, pending) =
            runner::prepare(NonInviteServerLogic::new(), key, request, source, services);
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

    /// Sends a response. Legal in `Trying` and `Proceeding`; a final response
    /// moves the transaction to `Completed`.
    pub async fn send_response(&self, response: Response) -> Result<()> {
        self.inner.request(NonInviteServerOp::SendResponse(response)).await
    }

    pub async fn retransmit_request(&self) -> Result<()> {
        self.inner.request(NonInviteServerOp::RetransmitRequest).await
    }

    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub(crate) fn instance(&self) -> u64 {
        self.inner.instance()
    }
}

/// Either kind of server transaction.
#[derive(Debug, Clone)]
pub enum ServerTransaction {
    Invite(InviteServerTransaction),
    NonInvite(NonInviteServerTransaction),
}

impl ServerTransaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            ServerTransaction::Invite(_) => TransactionKind::InviteServer,
            ServerTransaction::NonInvite(_) => TransactionKind::NonInviteServer,
        }
    }

    pub fn key(&self) -> &TransactionKey {
        match self {
            ServerTransaction::Invite(tx) => tx.key(),
            ServerTransaction::NonInvite(tx) => tx.key(),
        }
    }

    pub fn state(&self) -> TransactionState {
        match self {
            ServerTransaction::Invite(tx) => tx.state(),
            ServerTransaction::NonInvite(tx) => tx.state(),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        match self {
            ServerTransaction::Invite(tx) => tx.remote_addr(),
            ServerTransaction::NonInvite(tx) => tx.remote_addr(),
        }
    }

    pub async fn send_response(&self, response: Response) -> Result<()> {
        match self {
            ServerTransaction::Invite(tx) => tx.send_response(response).await,
            ServerTransaction::NonInvite(tx) => tx.send_response(response).await,
        }
    }

    pub async fn retransmit_request(&self) -> Result<()> {
        match self {
            ServerTransaction::Invite(tx) => tx.retransmit_request().await,
            ServerTransaction::NonInvite(tx) => tx.retransmit_request().await,
        }
    }

    pub fn terminate(&self) {
        match self {
            ServerTransaction::Invite(tx) => tx.terminate(),
            ServerTransaction::NonInvite(tx) => tx.terminate(),
        }
    }

    pub fn as_invite(&self) -> Option<&InviteServerTransaction> {
        match self {
            ServerTransaction::Invite(tx) => Some(tx),
            ServerTransaction::NonInvite(_) => None,
        }
    }
}
