//! Standard library backed runtime services for Sprig.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `sprig-core`. Applications construct a
//! [`StdRuntime`] and drive its scheduler from an ordinary thread loop,
//! sleeping between deadlines.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use sprig_core::{Clock, ErrorSink, Scheduler, SchedulerHandle, SchedulerWaker, TickError};

/// Waker that flags a wake request and optionally notifies a host callback.
pub struct StdWaker {
    wake_requested: AtomicBool,
    waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl StdWaker {
    pub fn new() -> Self {
        Self {
            wake_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a wake was requested since the last call.
    pub fn take_wake_request(&self) -> bool {
        self.wake_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a callback invoked whenever the scheduler gains work.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap() = Some(Arc::new(waker));
    }

    /// Clears any registered wake callback.
    pub fn clear_waker(&self) {
        *self.waker.write().unwrap() = None;
    }

    fn notify(&self) {
        let waker = self.waker.read().unwrap().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdWaker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdWaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdWaker")
            .field(
                "wake_requested",
                &self.wake_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl SchedulerWaker for StdWaker {
    fn wake(&self) {
        self.wake_requested.store(true, Ordering::SeqCst);
        self.notify();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed_millis(&self, since: Self::Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }
}

impl StdClock {
    /// Returns the elapsed time as a [`Duration`] for convenience.
    pub fn elapsed(&self, since: Instant) -> Duration {
        since.elapsed()
    }
}

/// Error sink that reports timer failures through the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &TickError) {
        log::error!("timer callback failed: {error}");
    }
}

/// Convenience container bundling the standard waker, clock, and scheduler.
#[derive(Clone)]
pub struct StdRuntime {
    waker: Arc<StdWaker>,
    clock: Arc<StdClock>,
    scheduler: Scheduler,
    epoch: Instant,
}

impl StdRuntime {
    /// Creates a new standard runtime instance.
    pub fn new() -> Self {
        let waker = Arc::new(StdWaker::default());
        let clock = Arc::new(StdClock);
        let scheduler = Scheduler::with_services(
            Arc::clone(&waker) as Arc<dyn SchedulerWaker>,
            Arc::new(LogErrorSink),
        );
        let epoch = clock.now();
        Self {
            waker,
            clock,
            scheduler,
            epoch,
        }
    }

    /// Returns the scheduler driven by this runtime.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns a handle to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Returns the clock implementation.
    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    /// Milliseconds elapsed since this runtime was created.
    pub fn now_millis(&self) -> u64 {
        self.clock.elapsed_millis(self.epoch)
    }

    /// Returns whether the scheduler requested a wake since the last poll.
    pub fn take_wake_request(&self) -> bool {
        self.waker.take_wake_request()
    }

    /// Registers a callback invoked when the scheduler gains new work.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker.set_waker(waker);
    }

    /// Clears any previously registered wake callback.
    pub fn clear_waker(&self) {
        self.waker.clear_waker();
    }

    /// Fires every due timer and returns how long the host may sleep
    /// before the next deadline, or `None` when no timer is pending.
    pub fn turn(&self) -> Option<Duration> {
        let now = self.now_millis();
        self.scheduler.fire_due(now);
        let deadline = self.scheduler.next_deadline_millis()?;
        Some(Duration::from_millis(
            deadline.saturating_sub(self.now_millis()),
        ))
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("waker", &self.waker)
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::StdRuntime;

    #[test]
    fn registering_a_timer_requests_a_wake() {
        let runtime = StdRuntime::new();
        assert!(!runtime.take_wake_request());

        runtime
            .scheduler()
            .after(Duration::from_millis(5), || Ok(()));

        assert!(runtime.take_wake_request());
        assert!(!runtime.take_wake_request());
    }

    #[test]
    fn wake_callback_fires_on_registration() {
        let runtime = StdRuntime::new();
        let notified = Arc::new(AtomicUsize::new(0));
        {
            let notified = Arc::clone(&notified);
            runtime.set_waker(move || {
                notified.fetch_add(1, Ordering::SeqCst);
            });
        }

        runtime
            .scheduler()
            .after(Duration::from_millis(5), || Ok(()));

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        runtime.clear_waker();
    }

    #[test]
    fn turn_fires_due_timers_and_reports_the_next_deadline() {
        let runtime = StdRuntime::new();
        let fired = Rc::new(Cell::new(false));
        {
            let fired = fired.clone();
            runtime.scheduler().after(Duration::ZERO, move || {
                fired.set(true);
                Ok(())
            });
        }
        runtime
            .scheduler()
            .every(Duration::from_secs(60), || Ok(()));

        let sleep_hint = runtime.turn().expect("repeating timer still pending");

        assert!(fired.get());
        assert!(sleep_hint <= Duration::from_secs(60));
    }

    #[test]
    fn turn_returns_none_once_all_timers_are_gone() {
        let runtime = StdRuntime::new();
        runtime.scheduler().after(Duration::ZERO, || Ok(()));

        assert!(runtime.turn().is_none());
    }
}
