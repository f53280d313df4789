//! Deterministic doubles for the Sprig platform services.
//!
//! [`TestHost`] bundles a virtual clock, a scheduler wired to counting and
//! collecting doubles, and a recording render port, so lifecycle scenarios
//! can be driven tick by tick without real time.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use sprig_core::{
    Clock, ComponentDescriptor, ComponentInstance, ErrorSink, RenderOutput, RenderPort, Scheduler,
    SchedulerHandle, SchedulerWaker, TickError,
};

/// Clock whose time only moves when a test advances it.
#[derive(Default)]
pub struct ManualClock {
    now_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_millis(&self) -> u64 {
        self.now_millis.load(Ordering::SeqCst)
    }

    pub fn advance(&self, by: Duration) {
        self.now_millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_millis(&self, now_millis: u64) {
        self.now_millis.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    type Instant = u64;

    fn now(&self) -> u64 {
        self.now_millis()
    }

    fn elapsed_millis(&self, since: u64) -> u64 {
        self.now_millis().saturating_sub(since)
    }
}

/// Render port recording every presented frame, plus the latest output per
/// target in first-presentation order.
#[derive(Default)]
pub struct RecordingRenderPort {
    frames: Vec<(String, RenderOutput)>,
    latest: IndexMap<String, RenderOutput>,
}

impl RecordingRenderPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[(String, RenderOutput)] {
        &self.frames
    }

    pub fn texts_for(&self, target: &str) -> Vec<String> {
        self.frames
            .iter()
            .filter(|(presented, _)| presented == target)
            .map(|(_, output)| output.as_str().to_string())
            .collect()
    }

    pub fn latest(&self, target: &str) -> Option<&RenderOutput> {
        self.latest.get(target)
    }

    /// Targets in the order they first received output.
    pub fn targets(&self) -> Vec<&str> {
        self.latest.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl RenderPort for RecordingRenderPort {
    fn present(&mut self, output: RenderOutput, target: &str) {
        self.latest.insert(target.to_string(), output.clone());
        self.frames.push((target.to_string(), output));
    }
}

/// Error sink collecting every reported tick failure.
#[derive(Default)]
pub struct CollectingErrorSink {
    errors: Mutex<Vec<TickError>>,
}

impl CollectingErrorSink {
    pub fn reported(&self) -> Vec<TickError> {
        self.errors.lock().unwrap().clone()
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, error: &TickError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// Waker counting how often the scheduler asked the host for attention.
#[derive(Default)]
pub struct CountingWaker {
    wakes: AtomicUsize,
}

impl CountingWaker {
    pub fn count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl SchedulerWaker for CountingWaker {
    fn wake(&self) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a lifecycle test needs, wired together.
pub struct TestHost {
    clock: ManualClock,
    scheduler: Scheduler,
    waker: Arc<CountingWaker>,
    errors: Arc<CollectingErrorSink>,
    port: Rc<RefCell<RecordingRenderPort>>,
}

impl TestHost {
    pub fn new() -> Self {
        let waker = Arc::new(CountingWaker::default());
        let errors = Arc::new(CollectingErrorSink::default());
        let scheduler = Scheduler::with_services(
            Arc::clone(&waker) as Arc<dyn SchedulerWaker>,
            Arc::clone(&errors) as Arc<dyn ErrorSink>,
        );
        Self {
            clock: ManualClock::new(),
            scheduler,
            waker,
            errors,
            port: Rc::new(RefCell::new(RecordingRenderPort::new())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn render_port(&self) -> Rc<RefCell<dyn RenderPort>> {
        let port: Rc<RefCell<dyn RenderPort>> = self.port.clone();
        port
    }

    pub fn recording(&self) -> Rc<RefCell<RecordingRenderPort>> {
        Rc::clone(&self.port)
    }

    /// Moves virtual time forward and fires every timer that came due.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
        self.scheduler.fire_due(self.clock.now_millis());
    }

    /// Builds an instance wired to this host's scheduler and render port.
    pub fn instance<T: Clone + 'static>(
        &self,
        descriptor: ComponentDescriptor<T>,
        initial: T,
        target: &str,
    ) -> ComponentInstance<T> {
        ComponentInstance::new(
            Rc::new(descriptor),
            initial,
            target,
            self.render_port(),
            self.scheduler_handle(),
        )
    }

    pub fn rendered_texts(&self, target: &str) -> Vec<String> {
        self.port.borrow().texts_for(target)
    }

    pub fn reported_errors(&self) -> Vec<TickError> {
        self.errors.reported()
    }

    pub fn wake_count(&self) -> usize {
        self.waker.count()
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}
