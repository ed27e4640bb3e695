//! RFC 3261 transaction state machines.
//!
//! Each transaction runs as its own tokio task that exclusively owns the
//! transaction's state, request, last response and timer slots. Public handles
//! ([`InviteClientTransaction`], [`NonInviteClientTransaction`],
//! [`InviteServerTransaction`], [`NonInviteServerTransaction`]) send
//! operations to that task and await its verdict, so a timer firing and an
//! inbound message can never interleave inside one transaction.
//!
//! Everything the transaction user needs to observe is delivered as a
//! [`TransactionEvent`], in order, on the channel supplied through
//! [`TransactionServices`].

use std::net::SocketAddr;
use std::sync::Arc;

use sipbridge_sip_core::{Request, Response};
use tokio::sync::mpsc;

use crate::timer::{TimerProvider, TimerType};
use crate::transport::Transport;

pub mod client;
mod client_invite;
mod client_non_invite;
pub mod key;
pub(crate) mod runner;
pub mod server;
mod server_invite;
mod server_non_invite;
pub mod state;

pub use client::{ClientTransaction, InviteClientTransaction, NonInviteClientTransaction};
pub use key::TransactionKey;
pub use server::{InviteServerTransaction, NonInviteServerTransaction, ServerTransaction};
pub use state::{AtomicTransactionState, TransactionState};

/// The four RFC 3261 transaction state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    InviteClient,
    NonInviteClient,
    InviteServer,
    NonInviteServer,
}

impl TransactionKind {
    pub fn is_client(&self) -> bool {
        matches!(self, TransactionKind::InviteClient | TransactionKind::NonInviteClient)
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, TransactionKind::InviteClient | TransactionKind::InviteServer)
    }

    /// State a transaction of this kind is in once started.
    pub fn initial_state(&self) -> TransactionState {
        match self {
            TransactionKind::InviteClient => TransactionState::Calling,
            TransactionKind::NonInviteClient | TransactionKind::NonInviteServer => {
                TransactionState::Trying
            }
            TransactionKind::InviteServer => TransactionState::Proceeding,
        }
    }
}

/// Lifecycle and inbound-message notifications for the transaction user.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    /// A server transaction was created for a new request.
    NewRequest {
        transaction_id: TransactionKey,
        request: Request,
        source: SocketAddr,
    },
    /// A client transaction received a 1xx response.
    ProvisionalResponse {
        transaction_id: TransactionKey,
        response: Response,
    },
    /// A client transaction received a 2xx response.
    SuccessResponse {
        transaction_id: TransactionKey,
        response: Response,
    },
    /// A client transaction received a 3xx-6xx response.
    FailureResponse {
        transaction_id: TransactionKey,
        response: Response,
    },
    /// An INVITE server transaction received the ACK for its final response.
    AckReceived { transaction_id: TransactionKey },
    StateChanged {
        transaction_id: TransactionKey,
        previous_state: TransactionState,
        new_state: TransactionState,
    },
    TimerTriggered {
        transaction_id: TransactionKey,
        timer: TimerType,
    },
    /// Timer B, F or H expired, or a client transaction lost its transport.
    Timeout { transaction_id: TransactionKey },
    TransportError { transaction_id: TransactionKey },
    Terminated { transaction_id: TransactionKey },
    Error {
        transaction_id: Option<TransactionKey>,
        error: String,
    },
}

impl TransactionEvent {
    /// Key of the transaction the event belongs to.
    pub fn transaction_id(&self) -> Option<&TransactionKey> {
        match self {
            TransactionEvent::NewRequest { transaction_id, .. }
            | TransactionEvent::ProvisionalResponse { transaction_id, .. }
            | TransactionEvent::SuccessResponse { transaction_id, .. }
            | TransactionEvent::FailureResponse { transaction_id, .. }
            | TransactionEvent::AckReceived { transaction_id }
            | TransactionEvent::StateChanged { transaction_id, .. }
            | TransactionEvent::TimerTriggered { transaction_id, .. }
            | TransactionEvent::Timeout { transaction_id }
            | TransactionEvent::TransportError { transaction_id }
            | TransactionEvent::Terminated { transaction_id } => Some(transaction_id),
            TransactionEvent::Error { transaction_id, .. } => transaction_id.as_ref(),
        }
    }
}

/// Collaborators every transaction is created with.
#[derive(Debug, Clone)]
pub struct TransactionServices {
    pub transport: Arc<dyn Transport>,
    pub events_tx: mpsc::UnboundedSender<TransactionEvent>,
    pub timers: Arc<dyn TimerProvider>,
}

impl TransactionServices {
    pub fn new(
        transport: Arc<dyn Transport>,
        events_tx: mpsc::UnboundedSender<TransactionEvent>,
        timers: Arc<dyn TimerProvider>,
    ) -> Self {
        Self {
            transport,
            events_tx,
            timers,
        }
    }
}
