//! RFC 3261 timer values.
//!
//! Only the base values are stored. Every named timer (A through K) is derived
//! from them following RFC 3261 Appendix A, so changing `t1` rescales the
//! retransmission and timeout timers together.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base timer values, with the named timers derived on demand.
///
/// Durations serialize as integer milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// Round-trip time estimate (RFC 3261 default 500ms)
    #[serde(with = "duration_ms")]
    pub t1: Duration,
    /// Maximum retransmit interval for non-INVITE requests and INVITE responses (4s)
    #[serde(with = "duration_ms")]
    pub t2: Duration,
    /// Maximum duration a message remains in the network (5s)
    #[serde(with = "duration_ms")]
    pub t4: Duration,
    /// Wait time for INVITE response retransmissions (at least 32s)
    #[serde(with = "duration_ms")]
    pub timer_d: Duration,
    /// Reliable transport (TCP/TLS): no retransmissions, no absorb wait
    pub reliable: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
            timer_d: Duration::from_secs(32),
            reliable: false,
        }
    }
}

impl TimerSettings {
    /// Settings for a reliable transport. Timers D, I, J and K collapse to
    /// zero and the retransmission timers A, E and G are never armed.
    pub fn for_reliable_transport() -> Self {
        Self {
            reliable: true,
            ..Self::default()
        }
    }

    pub fn with_t1(mut self, t1: Duration) -> Self {
        self.t1 = t1;
        self
    }

    pub fn with_t2(mut self, t2: Duration) -> Self {
        self.t2 = t2;
        self
    }

    pub fn with_t4(mut self, t4: Duration) -> Self {
        self.t4 = t4;
        self
    }

    pub fn with_timer_d(mut self, timer_d: Duration) -> Self {
        self.timer_d = timer_d;
        self
    }

    /// Whether retransmission timers (A, E, G) apply.
    pub fn retransmits(&self) -> bool {
        !self.reliable
    }

    /// Initial INVITE request retransmit interval.
    pub fn timer_a(&self) -> Duration {
        self.t1
    }

    /// INVITE transaction timeout.
    pub fn timer_b(&self) -> Duration {
        self.t1 * 64
    }

    pub fn timer_d(&self) -> Duration {
        self.absorb(self.timer_d)
    }

    /// Initial non-INVITE request retransmit interval.
    pub fn timer_e(&self) -> Duration {
        self.t1
    }

    /// Non-INVITE transaction timeout.
    pub fn timer_f(&self) -> Duration {
        self.t1 * 64
    }

    /// Initial INVITE response retransmit interval.
    pub fn timer_g(&self) -> Duration {
        self.t1
    }

    /// Wait time for ACK receipt.
    pub fn timer_h(&self) -> Duration {
        self.t1 * 64
    }

    /// Wait time for ACK retransmits.
    pub fn timer_i(&self) -> Duration {
        self.absorb(self.t4)
    }

    /// Wait time for non-INVITE request retransmits.
    pub fn timer_j(&self) -> Duration {
        self.absorb(self.t1 * 64)
    }

    /// Wait time for non-INVITE response retransmits.
    pub fn timer_k(&self) -> Duration {
        self.absorb(self.t4)
    }

    fn absorb(&self, unreliable: Duration) -> Duration {
        if self.reliable {
            Duration::ZERO
        } else {
            unreliable
        }
    }
}

/// Serde adapter writing a `Duration` as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
