//! Deterministic timer provider for tests.
//!
//! [`ManualTimerProvider`] never fires on its own. Tests move a virtual clock
//! with [`advance`](ManualTimerProvider::advance) or fire one timer with
//! [`fire`](ManualTimerProvider::fire), and inspect every delay the state
//! machines asked for through [`scheduled`](ManualTimerProvider::scheduled).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{TimerCallback, TimerHandle, TimerProvider, TimerSettings, TimerType};

struct PendingTimer {
    seq: u64,
    timer: TimerType,
    deadline: Duration,
    cancelled: Arc<AtomicBool>,
    callback: TimerCallback,
}

impl PendingTimer {
    fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTimer>,
    history: Vec<(TimerType, Duration)>,
}

struct Inner {
    settings: TimerSettings,
    clock: Mutex<ClockState>,
    armed: Notify,
}

/// Virtual-clock timer provider. Clones share the same clock.
#[derive(Clone)]
pub struct ManualTimerProvider {
    inner: Arc<Inner>,
}

impl ManualTimerProvider {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                clock: Mutex::new(ClockState::default()),
                armed: Notify::new(),
            }),
        }
    }

    /// Current virtual time, measured from creation.
    pub fn now(&self) -> Duration {
        self.inner.clock.lock().now
    }

    /// Every `(timer, delay)` ever scheduled, in request order.
    pub fn scheduled(&self) -> Vec<(TimerType, Duration)> {
        self.inner.clock.lock().history.clone()
    }

    /// Delays requested for one timer type, in request order.
    pub fn scheduled_delays(&self, timer: TimerType) -> Vec<Duration> {
        self.inner
            .clock
            .lock()
            .history
            .iter()
            .filter(|(t, _)| *t == timer)
            .map(|(_, delay)| *delay)
            .collect()
    }

    /// Timers that are armed and not cancelled.
    pub fn pending(&self) -> Vec<TimerType> {
        let clock = self.inner.clock.lock();
        clock.pending.iter().filter(|p| p.is_live()).map(|p| p.timer).collect()
    }

    pub fn is_pending(&self, timer: TimerType) -> bool {
        let clock = self.inner.clock.lock();
        clock.pending.iter().any(|p| p.timer == timer && p.is_live())
    }

    /// Waits until a live timer of this type is armed.
    pub async fn wait_pending(&self, timer: TimerType) {
        loop {
            let notified = self.inner.armed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_pending(timer) {
                return;
            }
            notified.await;
        }
    }

    /// Fires the earliest live timer of this type, moving the clock to its
    /// deadline if that lies ahead. Returns `false` if none is armed.
    pub fn fire(&self, timer: TimerType) -> bool {
        let due = {
            let mut clock = self.inner.clock.lock();
            clock.pending.retain(PendingTimer::is_live);
            let next = clock
                .pending
                .iter()
                .enumerate()
                .filter(|(_, p)| p.timer == timer)
                .min_by_key(|(_, p)| (p.deadline, p.seq))
                .map(|(idx, _)| idx);
            match next {
                Some(idx) => {
                    let due = clock.pending.remove(idx);
                    clock.now = clock.now.max(due.deadline);
                    due
                }
                None => return false,
            }
        };
        (due.callback)();
        true
    }

    /// Moves the clock forward, firing every live timer that falls due in
    /// deadline order. Returns the number of timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;
        loop {
            let due = {
                let mut clock = self.inner.clock.lock();
                clock.pending.retain(PendingTimer::is_live);
                let next = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.deadline <= target)
                    .min_by_key(|(_, p)| (p.deadline, p.seq))
                    .map(|(idx, _)| idx);
                match next {
                    Some(idx) => {
                        let due = clock.pending.remove(idx);
                        clock.now = due.deadline;
                        due
                    }
                    None => {
                        clock.now = target;
                        break;
                    }
                }
            };
            (due.callback)();
            fired += 1;
        }
        fired
    }
}

impl Default for ManualTimerProvider {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}

impl fmt::Debug for ManualTimerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimerProvider")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl TimerProvider for ManualTimerProvider {
    fn settings(&self) -> TimerSettings {
        self.inner.settings
    }

    fn schedule(&self, timer: TimerType, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut clock = self.inner.clock.lock();
            let seq = clock.next_seq;
            clock.next_seq += 1;
            let deadline = clock.now + delay;
            clock.history.push((timer, delay));
            clock.pending.push(PendingTimer {
                seq,
                timer,
                deadline,
                cancelled: cancelled.clone(),
                callback,
            });
        }
        self.inner.armed.notify_waiters();
        TimerHandle::new(timer, cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, TimerCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let callback: TimerCallback = Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_advance_fires_due_timers_in_order() {
        let provider = ManualTimerProvider::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (timer, millis) in [(TimerType::B, 300), (TimerType::A, 100), (TimerType::D, 900)] {
            let order = order.clone();
            std::mem::forget(provider.schedule(
                timer,
                Duration::from_millis(millis),
                Box::new(move || order.lock().push(timer)),
            ));
        }

        assert_eq!(provider.advance(Duration::from_millis(500)), 2);
        assert_eq!(*order.lock(), vec![TimerType::A, TimerType::B]);
        assert_eq!(provider.now(), Duration::from_millis(500));
        assert_eq!(provider.pending(), vec![TimerType::D]);
    }

    #[test]
    fn test_cancelled_timer_is_skipped() {
        let provider = ManualTimerProvider::default();
        let (count, callback) = counter();
        let handle = provider.schedule(TimerType::E, Duration::from_millis(500), callback);
        handle.cancel();

        assert!(!provider.fire(TimerType::E));
        assert_eq!(provider.advance(Duration::from_secs(1)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(provider.scheduled(), vec![(TimerType::E, Duration::from_millis(500))]);
    }

    #[test]
    fn test_fire_moves_clock_to_deadline() {
        let provider = ManualTimerProvider::default();
        let (count, callback) = counter();
        let _handle = provider.schedule(TimerType::K, Duration::from_secs(5), callback);

        assert!(provider.fire(TimerType::K));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(provider.now(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_pending_returns_once_armed() {
        let provider = ManualTimerProvider::default();
        let waiter = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.wait_pending(TimerType::H).await })
        };
        tokio::task::yield_now().await;
        let (_count, callback) = counter();
        let _handle = provider.schedule(TimerType::H, Duration::from_secs(32), callback);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_pending should complete")
            .unwrap();
    }
}
