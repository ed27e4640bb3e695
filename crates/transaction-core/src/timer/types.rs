//! Timer identities.
//!
//! [`TimerType`] labels every RFC 3261 transaction timer for logging, events and
//! the timer provider. Each transaction variant arms timers through its own
//! enum ([`InviteClientTimer`], [`NonInviteClientTimer`], [`InviteServerTimer`],
//! [`NonInviteServerTimer`]), so a timer that does not belong to a variant
//! cannot be armed on it.

use std::fmt;
use std::hash::Hash;

/// Label of an RFC 3261 transaction timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// INVITE client: request retransmission interval
    A,
    /// INVITE client: transaction timeout
    B,
    /// INVITE client: wait for response retransmissions
    D,
    /// Non-INVITE client: request retransmission interval
    E,
    /// Non-INVITE client: transaction timeout
    F,
    /// INVITE server: response retransmission interval
    G,
    /// INVITE server: wait for ACK
    H,
    /// INVITE server: wait for ACK retransmissions
    I,
    /// Non-INVITE server: wait for request retransmissions
    J,
    /// Non-INVITE client: wait for response retransmissions
    K,
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerType::A => "A",
            TimerType::B => "B",
            TimerType::D => "D",
            TimerType::E => "E",
            TimerType::F => "F",
            TimerType::G => "G",
            TimerType::H => "H",
            TimerType::I => "I",
            TimerType::J => "J",
            TimerType::K => "K",
        };
        write!(f, "Timer {}", name)
    }
}

/// A timer a specific transaction variant is allowed to arm.
pub trait TimerKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    fn timer_type(self) -> TimerType;
}

/// Timers of the INVITE client transaction (RFC 3261 §17.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteClientTimer {
    A,
    B,
    D,
}

/// Timers of the non-INVITE client transaction (RFC 3261 §17.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonInviteClientTimer {
    E,
    F,
    K,
}

/// Timers of the INVITE server transaction (RFC 3261 §17.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteServerTimer {
    G,
    H,
    I,
}

/// Timers of the non-INVITE server transaction (RFC 3261 §17.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonInviteServerTimer {
    J,
}

impl From<InviteClientTimer> for TimerType {
    fn from(timer: InviteClientTimer) -> Self {
        match timer {
            InviteClientTimer::A => TimerType::A,
            InviteClientTimer::B => TimerType::B,
            InviteClientTimer::D => TimerType::D,
        }
    }
}

impl From<NonInviteClientTimer> for TimerType {
    fn from(timer: NonInviteClientTimer) -> Self {
        match timer {
            NonInviteClientTimer::E => TimerType::E,
            NonInviteClientTimer::F => TimerType::F,
            NonInviteClientTimer::K => TimerType::K,
        }
    }
}

impl From<InviteServerTimer> for TimerType {
    fn from(timer: InviteServerTimer) -> Self {
        match timer {
            InviteServerTimer::G => TimerType::G,
            InviteServerTimer::H => TimerType::H,
            InviteServerTimer::I => TimerType::I,
        }
    }
}

impl From<NonInviteServerTimer> for TimerType {
    fn from(timer: NonInviteServerTimer) -> Self {
        match timer {
            NonInviteServerTimer::J => TimerType::J,
        }
    }
}

impl TimerKind for InviteClientTimer {
    fn timer_type(self) -> TimerType {
        self.into()
    }
}

impl TimerKind for NonInviteClientTimer {
    fn timer_type(self) -> TimerType {
        self.into()
    }
}

impl TimerKind for InviteServerTimer {
    fn timer_type(self) -> TimerType {
        self.into()
    }
}

impl TimerKind for NonInviteServerTimer {
    fn timer_type(self) -> TimerType {
        self.into()
    }
}
