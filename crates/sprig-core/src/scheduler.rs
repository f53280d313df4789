use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crate::platform::{ErrorSink, SchedulerWaker};
use crate::TickError;

/// Opaque identifier of a scheduled timer.
pub type TimerId = u64;

type TimerCallback = Box<dyn FnMut() -> Result<(), TickError> + 'static>;

struct TimerEntry {
    id: TimerId,
    deadline_millis: u64,
    interval_millis: Option<u64>,
    active: Rc<Cell<bool>>,
    callback: TimerCallback,
}

struct SchedulerInner {
    waker: Arc<dyn SchedulerWaker>,
    error_sink: Arc<dyn ErrorSink>,
    timers: RefCell<Vec<TimerEntry>>,
    next_timer_id: Cell<TimerId>,
    now_millis: Cell<u64>,
    draining: Cell<bool>,
}

impl SchedulerInner {
    fn new(waker: Arc<dyn SchedulerWaker>, error_sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            waker,
            error_sink,
            timers: RefCell::new(Vec::new()),
            next_timer_id: Cell::new(1),
            now_millis: Cell::new(0),
            draining: Cell::new(false),
        }
    }

    fn every(&self, interval: Duration, callback: TimerCallback) -> TimerHandle {
        assert!(
            !interval.is_zero(),
            "repeating timer interval must be non-zero"
        );
        let interval_millis = (interval.as_millis() as u64).max(1);
        let deadline = self.now_millis.get() + interval_millis;
        self.register(deadline, Some(interval_millis), interval, callback)
    }

    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let deadline = self.now_millis.get() + delay.as_millis() as u64;
        self.register(deadline, None, delay, callback)
    }

    fn register(
        &self,
        deadline_millis: u64,
        interval_millis: Option<u64>,
        interval: Duration,
        callback: TimerCallback,
    ) -> TimerHandle {
        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        self.timers.borrow_mut().push(TimerEntry {
            id,
            deadline_millis,
            interval_millis,
            active: Rc::clone(&active),
            callback,
        });
        self.waker.wake();
        TimerHandle {
            id,
            interval,
            active,
        }
    }

    /// Runs every callback whose deadline has passed, in deadline order.
    ///
    /// Observed time is clamped to be non-decreasing. Timers registered by
    /// a callback wait for the next drain, and a nested drain is ignored,
    /// so delivery stays serialized per handle. A repeating timer is
    /// rescheduled relative to this drain point, not its original
    /// deadline, so a stalled host never causes a catch-up burst.
    fn fire_due(&self, now_millis: u64) {
        if self.draining.replace(true) {
            return;
        }
        self.now_millis
            .set(now_millis.max(self.now_millis.get()));
        let now = self.now_millis.get();
        let mut due: Vec<TimerEntry> = Vec::new();
        {
            let mut timers = self.timers.borrow_mut();
            let mut index = 0;
            while index < timers.len() {
                if !timers[index].active.get() {
                    timers.remove(index);
                } else if timers[index].deadline_millis <= now {
                    due.push(timers.remove(index));
                } else {
                    index += 1;
                }
            }
        }
        due.sort_by_key(|entry| (entry.deadline_millis, entry.id));
        for mut entry in due {
            // An earlier callback in this batch may have cancelled it.
            if !entry.active.get() {
                continue;
            }
            if let Err(error) = (entry.callback)() {
                self.error_sink.report(&error);
            }
            match entry.interval_millis {
                Some(interval) if entry.active.get() => {
                    entry.deadline_millis = now + interval;
                    self.timers.borrow_mut().push(entry);
                }
                _ => entry.active.set(false),
            }
        }
        self.draining.set(false);
    }

    fn next_deadline_millis(&self) -> Option<u64> {
        self.timers
            .borrow()
            .iter()
            .filter(|entry| entry.active.get())
            .map(|entry| entry.deadline_millis)
            .min()
    }

    fn has_timers(&self) -> bool {
        self.timers.borrow().iter().any(|entry| entry.active.get())
    }
}

/// Deadline-driven timer scheduler for a single logical thread.
///
/// The host drives it by calling [`Scheduler::fire_due`] with a monotonic
/// millisecond timestamp; registered timers whose deadlines have passed run
/// synchronously inside that call. Registration wakes the host through the
/// injected [`SchedulerWaker`]; failed ticks go to the injected
/// [`ErrorSink`] and never stop the timer.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_services(Arc::new(DefaultWaker), Arc::new(NullErrorSink))
    }

    pub fn with_services(waker: Arc<dyn SchedulerWaker>, error_sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner::new(waker, error_sink)),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle(Rc::downgrade(&self.inner))
    }

    /// Invokes `callback` repeatedly at the fixed interval until cancelled.
    pub fn every(
        &self,
        interval: Duration,
        callback: impl FnMut() -> Result<(), TickError> + 'static,
    ) -> TimerHandle {
        self.inner.every(interval, Box::new(callback))
    }

    /// Invokes `callback` once after `delay`, then expires the handle.
    pub fn after(
        &self,
        delay: Duration,
        callback: impl FnOnce() -> Result<(), TickError> + 'static,
    ) -> TimerHandle {
        let mut callback = Some(callback);
        self.inner.after(
            delay,
            Box::new(move || match callback.take() {
                Some(callback) => callback(),
                None => Ok(()),
            }),
        )
    }

    /// Cancels a timer. Idempotent; expired handles are already inert.
    pub fn cancel(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    pub fn fire_due(&self, now_millis: u64) {
        self.inner.fire_due(now_millis);
    }

    pub fn next_deadline_millis(&self) -> Option<u64> {
        self.inner.next_deadline_millis()
    }

    pub fn has_timers(&self) -> bool {
        self.inner.has_timers()
    }

    pub fn now_millis(&self) -> u64 {
        self.inner.now_millis.get()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak reference to a [`Scheduler`], safe to hold from component hooks.
///
/// Operations on a handle whose scheduler is gone degrade quietly:
/// registration returns an inert handle and the rest are no-ops.
#[derive(Clone)]
pub struct SchedulerHandle(Weak<SchedulerInner>);

impl SchedulerHandle {
    pub fn every(
        &self,
        interval: Duration,
        callback: impl FnMut() -> Result<(), TickError> + 'static,
    ) -> TimerHandle {
        match self.0.upgrade() {
            Some(inner) => inner.every(interval, Box::new(callback)),
            None => TimerHandle::inactive(interval),
        }
    }

    pub fn after(
        &self,
        delay: Duration,
        callback: impl FnOnce() -> Result<(), TickError> + 'static,
    ) -> TimerHandle {
        match self.0.upgrade() {
            Some(inner) => {
                let mut callback = Some(callback);
                inner.after(
                    delay,
                    Box::new(move || match callback.take() {
                        Some(callback) => callback(),
                        None => Ok(()),
                    }),
                )
            }
            None => TimerHandle::inactive(delay),
        }
    }

    pub fn cancel(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    pub fn fire_due(&self, now_millis: u64) {
        if let Some(inner) = self.0.upgrade() {
            inner.fire_due(now_millis);
        }
    }

    pub fn next_deadline_millis(&self) -> Option<u64> {
        self.0
            .upgrade()
            .and_then(|inner| inner.next_deadline_millis())
    }

    pub fn has_timers(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_timers())
            .unwrap_or(false)
    }
}

/// Handle to a scheduled timer.
///
/// Dropping the handle does not cancel the timer; stopping it is always an
/// explicit [`TimerHandle::cancel`] call, typically from the same
/// component's `before_unmount` hook that started it in `before_mount`.
pub struct TimerHandle {
    id: TimerId,
    interval: Duration,
    active: Rc<Cell<bool>>,
}

impl TimerHandle {
    fn inactive(interval: Duration) -> Self {
        Self {
            id: 0,
            interval,
            active: Rc::new(Cell::new(false)),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The repeat interval for `every` timers, or the delay for `after`.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Once this returns false the callback will never fire again.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stops the timer. Idempotent; cancelling a cancelled or expired
    /// handle is a no-op. A tick already being delivered completes, but no
    /// further tick fires.
    pub fn cancel(&self) {
        self.active.set(false);
    }
}

/// Waker that performs no host notification.
#[derive(Default)]
pub struct DefaultWaker;

impl SchedulerWaker for DefaultWaker {
    fn wake(&self) {}
}

/// Error sink that discards reported failures.
#[derive(Default)]
pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn report(&self, _error: &TickError) {}
}
