use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::trace;

use super::{TimerSettings, TimerType};

/// Work run when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Source of timer durations and scheduled callbacks.
///
/// Transactions never sleep on their own; every timer goes through the
/// provider they were created with, which lets tests substitute a clock they
/// control (see [`ManualTimerProvider`](super::ManualTimerProvider)).
pub trait TimerProvider: Send + Sync + fmt::Debug {
    /// Timer values in effect for transactions using this provider.
    fn settings(&self) -> TimerSettings;

    /// Runs `callback` once `delay` elapses unless the returned handle is
    /// cancelled or dropped first.
    fn schedule(&self, timer: TimerType, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// A scheduled timer. Cancels on drop.
///
/// Once `cancel` returns the callback will not be started.
pub struct TimerHandle {
    timer: TimerType,
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(timer: TimerType, cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self {
            timer,
            cancelled,
            abort,
        }
    }

    pub fn timer(&self) -> TimerType {
        self.timer
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("timer", &self.timer)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Timer provider backed by the tokio clock, one sleeping task per timer.
#[derive(Debug, Clone, Default)]
pub struct TokioTimerProvider {
    settings: TimerSettings,
}

impl TokioTimerProvider {
    pub fn new(settings: TimerSettings) -> Self {
        Self { settings }
    }
}

impl TimerProvider for TokioTimerProvider {
    fn settings(&self) -> TimerSettings {
        self.settings
    }

    fn schedule(&self, timer: TimerType, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                trace!(%timer, "Timer cancelled before expiry");
                return;
            }
            trace!(%timer, ?delay, "Timer expired");
            callback();
        });
        TimerHandle::new(timer, cancelled, Some(task.abort_handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let provider = TokioTimerProvider::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _handle = provider.schedule(
            TimerType::A,
            Duration::from_millis(500),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let provider = TokioTimerProvider::default();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = provider.schedule(
            TimerType::F,
            Duration::from_secs(1),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let provider = TokioTimerProvider::default();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        drop(provider.schedule(
            TimerType::J,
            Duration::from_millis(10),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
