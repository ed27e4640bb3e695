//! Boundary to the transport layer.
//!
//! Transactions hand every outbound request or response to a [`Transport`]
//! together with its destination. Framing, sockets and connection management
//! live behind this trait.

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use sipbridge_sip_core::Message;

use crate::error::Result;

/// Sends SIP messages to the network.
///
/// A returned error is treated by the transaction as a transport failure
/// (RFC 3261 §17.1.4): the transaction reports it and terminates.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send_message(&self, message: Message, destination: SocketAddr) -> Result<()>;
}
