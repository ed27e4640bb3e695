use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};
use crate::transaction::TransactionKind;

/// Represents the state of a SIP transaction, aligned with the state machines
/// defined in RFC 3261 (Section 17).
///
/// Different transaction kinds use different subsets:
///
/// | kind | states |
/// |------|--------|
/// | INVITE client | `Calling → Proceeding → Completed → Terminated` |
/// | non-INVITE client | `Trying → Proceeding → Completed → Terminated` |
/// | INVITE server | `Proceeding → Completed → Confirmed → Terminated` |
/// | non-INVITE server | `Trying → Proceeding → Completed → Terminated` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// INVITE client only: request sent, no response yet
    Calling,
    /// Non-INVITE: request sent (client) or received (server), no provisional yet
    Trying,
    /// A provisional response was received (client) or sent (server)
    Proceeding,
    /// A final response was received (client) or sent (server); absorbing retransmissions
    Completed,
    /// INVITE server only: ACK received for a non-2xx final response
    Confirmed,
    /// Finished; no further messages are processed
    Terminated,
}

impl TransactionState {
    pub fn is_terminated(&self) -> bool {
        *self == TransactionState::Terminated
    }

    /// Checks that `self → next` is legal for `kind`.
    ///
    /// The self-transition is always accepted as a no-op and `Terminated` can be
    /// entered from every live state. Nothing leaves `Terminated`.
    pub fn validate_transition(self, kind: TransactionKind, next: TransactionState) -> Result<()> {
        use TransactionState::*;

        if self == next {
            return Ok(());
        }
        let legal = match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            _ => match kind {
                TransactionKind::InviteClient => matches!(
                    (self, next),
                    (Calling, Proceeding) | (Calling, Completed) | (Proceeding, Completed)
                ),
                TransactionKind::NonInviteClient | TransactionKind::NonInviteServer => matches!(
                    (self, next),
                    (Trying, Proceeding) | (Trying, Completed) | (Proceeding, Completed)
                ),
                TransactionKind::InviteServer => {
                    matches!((self, next), (Proceeding, Completed) | (Completed, Confirmed))
                }
            },
        };
        if legal {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition(format!(
                "{:?} transaction cannot move from {:?} to {:?}",
                kind, self, next
            )))
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateValue {
    Calling = 0,
    Trying = 1,
    Proceeding = 2,
    Completed = 3,
    Confirmed = 4,
    Terminated = 5,
}

impl From<TransactionState> for StateValue {
    fn from(state: TransactionState) -> Self {
        match state {
            TransactionState::Calling => StateValue::Calling,
            TransactionState::Trying => StateValue::Trying,
            TransactionState::Proceeding => StateValue::Proceeding,
            TransactionState::Completed => StateValue::Completed,
            TransactionState::Confirmed => StateValue::Confirmed,
            TransactionState::Terminated => StateValue::Terminated,
        }
    }
}

impl From<u8> for TransactionState {
    fn from(value: u8) -> Self {
        match value {
            0 => TransactionState::Calling,
            1 => TransactionState::Trying,
            2 => TransactionState::Proceeding,
            3 => TransactionState::Completed,
            4 => TransactionState::Confirmed,
            _ => TransactionState::Terminated,
        }
    }
}

/// Lock-free snapshot of a transaction's state.
///
/// Only the transaction's own task writes it; handles read it.
#[derive(Debug)]
pub struct AtomicTransactionState {
    value: AtomicU8,
}

impl AtomicTransactionState {
    pub fn new(initial: TransactionState) -> Self {
        Self {
            value: AtomicU8::new(StateValue::from(initial) as u8),
        }
    }

    pub fn get(&self) -> TransactionState {
        TransactionState::from(self.value.load(Ordering::Acquire))
    }

    /// Stores `state`, returning the previous one.
    pub fn set(&self, state: TransactionState) -> TransactionState {
        let previous = self.value.swap(StateValue::from(state) as u8, Ordering::AcqRel);
        TransactionState::from(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionState::*;

    #[test]
    fn test_invite_client_transitions() {
        let kind = TransactionKind::InviteClient;
        assert!(Calling.validate_transition(kind, Proceeding).is_ok());
        assert!(Calling.validate_transition(kind, Terminated).is_ok());
        assert!(Proceeding.validate_transition(kind, Completed).is_ok());
        assert!(Proceeding.validate_transition(kind, Calling).is_err());
        assert!(Completed.validate_transition(kind, Proceeding).is_err());
        assert!(Calling.validate_transition(kind, Confirmed).is_err());
    }

    #[test]
    fn test_invite_server_transitions() {
        let kind = TransactionKind::InviteServer;
        assert!(Proceeding.validate_transition(kind, Completed).is_ok());
        assert!(Completed.validate_transition(kind, Confirmed).is_ok());
        assert!(Confirmed.validate_transition(kind, Completed).is_err());
        assert!(Proceeding.validate_transition(kind, Confirmed).is_err());
    }

    #[test]
    fn test_self_transition_is_noop_and_terminated_is_final() {
        for kind in [
            TransactionKind::InviteClient,
            TransactionKind::NonInviteClient,
            TransactionKind::InviteServer,
            TransactionKind::NonInviteServer,
        ] {
            assert!(Completed.validate_transition(kind, Completed).is_ok());
            assert!(Terminated.validate_transition(kind, Terminated).is_ok());
            assert!(Terminated.validate_transition(kind, Completed).is_err());
        }
    }

    #[test]
    fn test_atomic_state_swap() {
        let state = AtomicTransactionState::new(Trying);
        assert_eq!(state.set(Proceeding), Trying);
        assert_eq!(state.get(), Proceeding);
    }
}
