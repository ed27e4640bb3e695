//! Timer management for SIP transactions.
//!
//! - [`TimerSettings`]: T1/T2/T4 and the derived RFC 3261 timers A through K
//! - [`TimerProvider`]: injected source of scheduled, cancellable callbacks
//! - [`TokioTimerProvider`] / [`ManualTimerProvider`]: runtime and test clocks
//! - per-variant timer enums, see [`types`]

mod manual;
mod provider;
mod settings;
pub mod types;

pub use manual::ManualTimerProvider;
pub use provider::{TimerCallback, TimerHandle, TimerProvider, TokioTimerProvider};
pub use settings::{duration_ms, TimerSettings};
pub use types::{
    InviteClientTimer, InviteServerTimer, NonInviteClientTimer, NonInviteServerTimer, TimerKind,
    TimerType,
};
