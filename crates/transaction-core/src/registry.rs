//! Client and server transaction registries (RFC 3261 §17.1.3, §17.2.3).
//!
//! Each registry keeps INVITE and non-INVITE transactions in separate maps:
//!
//! | map | key |
//! |-----|-----|
//! | INVITE | `branch` |
//! | non-INVITE | `branch:remote-address:method` |
//!
//! An ACK never creates a server transaction. It matches the INVITE server
//! transaction with the same branch, and an ACK without one (the ACK for a 2xx
//! carries a new branch) is handed back to the caller as unmatched.
//!
//! Transactions evict themselves from their registry when they terminate.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sipbridge_sip_core::{Method, Request, Response};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transaction::runner::TerminationHook;
use crate::transaction::{
    ClientTransaction, InviteClientTransaction, InviteServerTransaction,
    NonInviteClientTransaction, NonInviteServerTransaction, ServerTransaction, TransactionKey,
    TransactionServices,
};

/// Registry key of a non-INVITE transaction.
pub fn non_invite_key(branch: &str, remote: SocketAddr, method: &Method) -> String {
    format!("{}:{}:{}", branch, remote, method)
}

/// Hook removing `instance` from `map` once its transaction terminates, unless
/// the slot has been reused by a newer transaction meanwhile.
fn evict_on_termination<V, F>(map: &Arc<DashMap<String, V>>, slot: String, instance: u64, id_of: F) -> TerminationHook
where
    V: Send + Sync + 'static,
    F: Fn(&V) -> u64 + Send + 'static,
{
    let map: Weak<DashMap<String, V>> = Arc::downgrade(map);
    Box::new(move |key: &TransactionKey| {
        if let Some(map) = map.upgrade() {
            if map.remove_if(&slot, |_, tx| id_of(tx) == instance).is_some() {
                trace!(id = %key, %slot, "Evicted terminated transaction");
            }
        }
    })
}

/// Creates client transactions and routes responses to them.
#[derive(Debug)]
pub struct ClientTransactionRegistry {
    services: TransactionServices,
    invite: Arc<DashMap<String, InviteClientTransaction>>,
    non_invite: Arc<DashMap<String, NonInviteClientTransaction>>,
}

impl ClientTransactionRegistry {
    pub fn new(services: TransactionServices) -> Self {
        Self {
            services,
            invite: Arc::new(DashMap::new()),
            non_invite: Arc::new(DashMap::new()),
        }
    }

    /// Creates and starts the client transaction for `request`.
    ///
    /// The request must carry a top Via branch (see
    /// [`generate_branch`](crate::utils::generate_branch)). A second request
    /// with the key of a live transaction is rejected.
    pub fn send_request(&self, request: Request, remote: SocketAddr) -> Result<ClientTransaction> {
        let branch = request.via_branch().ok_or(Error::MissingBranch)?.to_string();

        if request.method().is_invite() {
            let (transaction, pending) = match self.invite.entry(branch.clone()) {
                Entry::Occupied(slot) => {
                    return Err(Error::TransactionExists(slot.get().key().clone()));
                }
                Entry::Vacant(slot) => {
                    let (transaction, pending) =
                        InviteClientTransaction::prepare(request, remote, &self.services)?;
                    slot.insert(transaction.clone());
                    (transaction, pending)
                }
            };
            let hook = evict_on_termination(&self.invite, branch, transaction.instance(), |tx| {
                tx.instance()
            });
            pending.on_terminated(hook).spawn();
            debug!(id = %transaction.key(), %remote, "Started INVITE client transaction");
            Ok(ClientTransaction::Invite(transaction))
        } else {
            let slot_key = non_invite_key(&branch, remote, request.method());
            let (transaction, pending) = match self.non_invite.entry(slot_key.clone()) {
                Entry::Occupied(slot) => {
                    return Err(Error::TransactionExists(slot.get().key().clone()));
                }
                Entry::Vacant(slot) => {
                    let (transaction, pending) =
                        NonInviteClientTransaction::prepare(request, remote, &self.services)?;
                    slot.insert(transaction.clone());
                    (transaction, pending)
                }
            };
            let hook = evict_on_termination(&self.non_invite, slot_key, transaction.instance(), |tx| {
                tx.instance()
            });
            pending.on_terminated(hook).spawn();
            debug!(id = %transaction.key(), %remote, "Started non-INVITE client transaction");
            Ok(ClientTransaction::NonInvite(transaction))
        }
    }

    /// Routes a response to its client transaction. Returns `false` when no
    /// transaction matches; that is not an error.
    pub async fn receive_response(&self, response: Response, source: SocketAddr) -> bool {
        let Some(branch) = response.via_branch().map(str::to_string) else {
            debug!(status = %response.status, "Response without Via branch, dropping");
            return false;
        };
        let Some(cseq) = response.cseq() else {
            debug!(%branch, status = %response.status, "Response without CSeq, dropping");
            return false;
        };

        let transaction = if cseq.method.is_invite() {
            self.invite
                .get(branch.as_str())
                .map(|entry| ClientTransaction::Invite(entry.value().clone()))
        } else {
            self.non_invite
                .get(&non_invite_key(&branch, source, &cseq.method))
                .map(|entry| ClientTransaction::NonInvite(entry.value().clone()))
        };

        match transaction {
            Some(transaction) => {
                if let Err(e) = transaction.receive_response(response).await {
                    warn!(id = %transaction.key(), error = %e, "Client transaction rejected response");
                }
                true
            }
            None => {
                debug!(%branch, method = %cseq.method, %source, "No matching client transaction");
                false
            }
        }
    }

    /// Looks up a transaction by registry key (see module docs).
    pub fn get(&self, key: &str) -> Option<ClientTransaction> {
        if let Some(entry) = self.invite.get(key) {
            return Some(ClientTransaction::Invite(entry.value().clone()));
        }
        self.non_invite
            .get(key)
            .map(|entry| ClientTransaction::NonInvite(entry.value().clone()))
    }

    /// Removes a transaction by registry key. Dropping the returned handle
    /// with no other clones alive terminates the transaction.
    pub fn remove(&self, key: &str) -> Option<ClientTransaction> {
        if let Some((_, tx)) = self.invite.remove(key) {
            return Some(ClientTransaction::Invite(tx));
        }
        self.non_invite
            .remove(key)
            .map(|(_, tx)| ClientTransaction::NonInvite(tx))
    }

    pub fn len(&self) -> usize {
        self.invite.len() + self.non_invite.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What [`ServerTransactionRegistry::receive_request`] did with a request.
#[derive(Debug)]
pub enum ServerRequestOutcome {
    /// A server transaction was created and the request passed up.
    New(ServerTransaction),
    /// The request matched a live transaction and was absorbed by it.
    Retransmission(ServerTransaction),
    /// An ACK matched an INVITE server transaction.
    AckMatched(InviteServerTransaction),
    /// An ACK with no INVITE server transaction, typically the ACK for a 2xx.
    UnmatchedAck(Request),
}

/// Creates server transactions and matches retransmissions and ACKs to them.
#[derive(Debug)]
pub struct ServerTransactionRegistry {
    services: TransactionServices,
    invite: Arc<DashMap<String, InviteServerTransaction>>,
    non_invite: Arc<DashMap<String, NonInviteServerTransaction>>,
}

impl ServerTransactionRegistry {
    pub fn new(services: TransactionServices) -> Self {
        Self {
            services,
            invite: Arc::new(DashMap::new()),
            non_invite: Arc::new(DashMap::new()),
        }
    }

    /// Dispatches a request received from `source`.
    pub async fn receive_request(&self, request: Request, source: SocketAddr) -> Result<ServerRequestOutcome> {
        let branch = request.via_branch().ok_or(Error::MissingBranch)?.to_string();

        if request.method().is_ack() {
            let matched = self.invite.get(&branch).map(|entry| entry.value().clone());
            return match matched {
                Some(transaction) => {
                    transaction.ack_received().await?;
                    Ok(ServerRequestOutcome::AckMatched(transaction))
                }
                None => {
                    debug!(%branch, %source, "ACK matches no INVITE server transaction");
                    Ok(ServerRequestOutcome::UnmatchedAck(request))
                }
            };
        }

        if request.method().is_invite() {
            let created = match self.invite.entry(branch.clone()) {
                Entry::Occupied(slot) => Err(slot.get().clone()),
                Entry::Vacant(slot) => {
                    let (transaction, pending) =
                        InviteServerTransaction::prepare(request, source, &self.services)?;
                    slot.insert(transaction.clone());
                    Ok((transaction, pending))
                }
            };
            match created {
                Ok((transaction, pending)) => {
                    let hook = evict_on_termination(&self.invite, branch, transaction.instance(), |tx| {
                        tx.instance()
                    });
                    pending.on_terminated(hook).spawn();
                    debug!(id = %transaction.key(), %source, "Created INVITE server transaction");
                    Ok(ServerRequestOutcome::New(ServerTransaction::Invite(transaction)))
                }
                Err(existing) => {
                    existing.retransmit_request().await?;
                    Ok(ServerRequestOutcome::Retransmission(ServerTransaction::Invite(existing)))
                }
            }
        } else {
            let slot_key = non_invite_key(&branch, source, request.method());
            let created = match self.non_invite.entry(slot_key.clone()) {
                Entry::Occupied(slot) => Err(slot.get().clone()),
                Entry::Vacant(slot) => {
                    let (transaction, pending) =
                        NonInviteServerTransaction::prepare(request, source, &self.services)?;
                    slot.insert(transaction.clone());
                    Ok((transaction, pending))
                }
            };
            match created {
                Ok((transaction, pending)) => {
                    let hook = evict_on_termination(&self.non_invite, slot_key, transaction.instance(), |tx| {
                        tx.instance()
                    });
                    pending.on_terminated(hook).spawn();
                    debug!(id = %transaction.key(), %source, "Created non-INVITE server transaction");
                    Ok(ServerRequestOutcome::New(ServerTransaction::NonInvite(transaction)))
                }
                Err(existing) => {
                    existing.retransmit_request().await?;
                    Ok(ServerRequestOutcome::Retransmission(ServerTransaction::NonInvite(existing)))
                }
            }
        }
    }

    /// Looks up a transaction by registry key (see module docs).
    pub fn get(&self, key: &str) -> Option<ServerTransaction> {
        if let Some(entry) = self.invite.get(key) {
            return Some(ServerTransaction::Invite(entry.value().clone()));
        }
        self.non_invite
            .get(key)
            .map(|entry| ServerTransaction::NonInvite(entry.value().clone()))
    }

    /// The INVITE server transaction with this branch, if any.
    pub fn find_invite(&self, branch: &str) -> Option<InviteServerTransaction> {
        self.invite.get(branch).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &str) -> Option<ServerTransaction> {
        if let Some((_, tx)) = self.invite.remove(key) {
            return Some(ServerTransaction::Invite(tx));
        }
        self.non_invite
            .remove(key)
            .map(|(_, tx)| ServerTransaction::NonInvite(tx))
    }

    pub fn len(&self) -> usize {
        self.invite.len() + self.non_invite.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
