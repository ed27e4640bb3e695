//! SIP transaction layer for the sipbridge signaling core
//!
//! This crate implements the four RFC 3261 §17 transaction state machines and
//! the registries that match inbound messages to them:
//!
//! - [`InviteClientTransaction`] / [`NonInviteClientTransaction`] drive an
//!   outgoing request through `Calling`/`Trying`, `Proceeding`, `Completed`
//!   and `Terminated`, retransmitting on Timer A/E.
//! - [`InviteServerTransaction`] / [`NonInviteServerTransaction`] drive an
//!   incoming request, absorb retransmissions and (for INVITE) wait for the ACK.
//! - [`ClientTransactionRegistry`] / [`ServerTransactionRegistry`] create the
//!   right variant and route responses, retransmissions and ACKs.
//!
//! Each transaction runs as its own tokio task. Time comes from an injected
//! [`TimerProvider`], output goes to an injected [`Transport`], and every
//! lifecycle signal is a [`TransactionEvent`] on the channel passed in
//! [`TransactionServices`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use sipbridge_sip_core::{HeaderName, Message, Method, Request};
//! use sipbridge_transaction_core::prelude::*;
//!
//! #[derive(Debug)]
//! struct Udp;
//!
//! #[async_trait]
//! impl Transport for Udp {
//!     async fn send_message(&self, _message: Message, _to: std::net::SocketAddr) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//! let services = TransactionServices::new(
//!     Arc::new(Udp),
//!     events_tx,
//!     Arc::new(TokioTimerProvider::default()),
//! );
//! let registry = ClientTransactionRegistry::new(services);
//!
//! let options = Request::new(Method::Options, "sip:bob@example.com")
//!     .with_header(HeaderName::Via, format!("SIP/2.0/UDP 192.0.2.1;branch={}", generate_branch()))
//!     .with_header(HeaderName::CSeq, "1 OPTIONS");
//! registry.send_request(options, "192.0.2.4:5060".parse().unwrap())?;
//!
//! while let Some(event) = events_rx.recv().await {
//!     if let TransactionEvent::Terminated { .. } = event {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod registry;
pub mod timer;
pub mod transaction;
pub mod transport;
pub mod utils;

pub use error::{Error, Result};
pub use registry::{ClientTransactionRegistry, ServerRequestOutcome, ServerTransactionRegistry};
pub use timer::{ManualTimerProvider, TimerProvider, TimerSettings, TimerType, TokioTimerProvider};
pub use transaction::{
    ClientTransaction, InviteClientTransaction, InviteServerTransaction,
    NonInviteClientTransaction, NonInviteServerTransaction, ServerTransaction, TransactionEvent,
    TransactionKey, TransactionKind, TransactionServices, TransactionState,
};
pub use transport::Transport;
pub use utils::{generate_branch, generate_tag};

/// Commonly used types, re-exported for glob import.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::registry::{
        ClientTransactionRegistry, ServerRequestOutcome, ServerTransactionRegistry,
    };
    pub use crate::timer::{
        ManualTimerProvider, TimerProvider, TimerSettings, TimerType, TokioTimerProvider,
    };
    pub use crate::transaction::{
        ClientTransaction, InviteClientTransaction, InviteServerTransaction,
        NonInviteClientTransaction, NonInviteServerTransaction, ServerTransaction,
        TransactionEvent, TransactionKey, TransactionKind, TransactionServices, TransactionState,
    };
    pub use crate::transport::Transport;
    pub use crate::utils::{generate_branch, generate_tag};
}
