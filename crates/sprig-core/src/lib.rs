#![doc = r"Core runtime pieces for the Sprig component runtime."]

pub mod collections;
pub mod platform;
pub mod scheduler;
pub mod state_cell;

pub use platform::{Clock, ErrorSink, SchedulerWaker};
pub use scheduler::{
    DefaultWaker, NullErrorSink, Scheduler, SchedulerHandle, TimerHandle, TimerId,
};
pub use state_cell::{StateCell, SubscriptionId};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::collections::map::HashMap;

/// Lifecycle phases of a component instance.
///
/// Transitions are strictly ordered; an instance never re-enters
/// `Mounting` or `Unmounting` once past them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Mounting,
    Active,
    Unmounting,
    Destroyed,
}

/// Which hook list a hook belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HookPhase {
    BeforeMount,
    BeforeUnmount,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::BeforeMount => write!(f, "before_mount"),
            HookPhase::BeforeUnmount => write!(f, "before_unmount"),
        }
    }
}

/// Error returned by a lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HookError {}

/// Error returned by a timer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickError {
    message: String,
}

impl TickError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TickError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `mount`/`unmount` was attempted from the wrong phase; the instance
    /// is unchanged.
    InvalidTransition {
        phase: Phase,
        operation: &'static str,
    },
    /// A hook failed; the remaining hooks of that phase were skipped.
    HookFailed {
        phase: HookPhase,
        index: usize,
        source: HookError,
    },
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidTransition { phase, operation } => {
                write!(f, "cannot {operation} an instance in phase {phase:?}")
            }
            LifecycleError::HookFailed {
                phase,
                index,
                source,
            } => {
                write!(f, "{phase} hook #{index} failed: {source}")
            }
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Output of a component's render function, consumed by a [`RenderPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    text: String,
}

impl RenderOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RenderOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Sink that paints a render output to a named target.
///
/// The runtime treats the target as an opaque key and never parses it.
/// Calls arrive already serialized by the single-thread model.
pub trait RenderPort {
    fn present(&mut self, output: RenderOutput, target: &str);
}

/// In-memory render port recording every presented frame.
#[derive(Default)]
pub struct MemoryRenderPort {
    frames: Vec<(String, RenderOutput)>,
    latest: HashMap<String, RenderOutput>,
}

impl MemoryRenderPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[(String, RenderOutput)] {
        &self.frames
    }

    pub fn latest(&self, target: &str) -> Option<&RenderOutput> {
        self.latest.get(target)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl RenderPort for MemoryRenderPort {
    fn present(&mut self, output: RenderOutput, target: &str) {
        self.latest.insert(target.to_string(), output.clone());
        self.frames.push((target.to_string(), output));
    }
}

/// Capabilities handed to lifecycle hooks: the instance's own state cell
/// and the scheduler it may register timers on.
///
/// Timers started here are not cancelled by the runtime on unmount; a hook
/// that starts one in `before_mount` is expected to cancel it in
/// `before_unmount`.
pub struct HookScope<T: Clone + 'static> {
    state: StateCell<T>,
    scheduler: SchedulerHandle,
}

impl<T: Clone + 'static> HookScope<T> {
    pub fn state(&self) -> &StateCell<T> {
        &self.state
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

type Hook<T> = Box<dyn Fn(&HookScope<T>) -> Result<(), HookError>>;
type RenderFn<T> = Box<dyn Fn(&T) -> RenderOutput>;

/// Immutable description of a component: ordered lifecycle hooks plus a
/// pure render function.
///
/// One descriptor may back any number of instances; each instantiation
/// gets its own [`StateCell`].
pub struct ComponentDescriptor<T: Clone + 'static> {
    before_mount: Vec<Hook<T>>,
    before_unmount: Vec<Hook<T>>,
    render: RenderFn<T>,
}

impl<T: Clone + 'static> ComponentDescriptor<T> {
    pub fn builder() -> ComponentDescriptorBuilder<T> {
        ComponentDescriptorBuilder {
            before_mount: Vec::new(),
            before_unmount: Vec::new(),
            render: None,
        }
    }

    pub fn render_output(&self, value: &T) -> RenderOutput {
        (self.render)(value)
    }
}

pub struct ComponentDescriptorBuilder<T: Clone + 'static> {
    before_mount: Vec<Hook<T>>,
    before_unmount: Vec<Hook<T>>,
    render: Option<RenderFn<T>>,
}

impl<T: Clone + 'static> ComponentDescriptorBuilder<T> {
    /// Appends a hook run during mounting, in declaration order.
    pub fn before_mount(
        mut self,
        hook: impl Fn(&HookScope<T>) -> Result<(), HookError> + 'static,
    ) -> Self {
        self.before_mount.push(Box::new(hook));
        self
    }

    /// Appends a hook run during unmounting, in declaration order.
    pub fn before_unmount(
        mut self,
        hook: impl Fn(&HookScope<T>) -> Result<(), HookError> + 'static,
    ) -> Self {
        self.before_unmount.push(Box::new(hook));
        self
    }

    pub fn render(mut self, render: impl Fn(&T) -> RenderOutput + 'static) -> Self {
        self.render = Some(Box::new(render));
        self
    }

    pub fn build(self) -> ComponentDescriptor<T> {
        let render = self.render.expect("descriptor requires a render function");
        ComponentDescriptor {
            before_mount: self.before_mount,
            before_unmount: self.before_unmount,
            render,
        }
    }
}

/// Drives an instance through its lifecycle phases, running hooks exactly
/// once per transition and gating the render path on the current phase.
pub struct LifecycleController {
    phase: Rc<Cell<Phase>>,
}

impl LifecycleController {
    fn new() -> Self {
        Self {
            phase: Rc::new(Cell::new(Phase::Unmounted)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    fn phase_cell(&self) -> Rc<Cell<Phase>> {
        Rc::clone(&self.phase)
    }

    fn begin_mount(&self) -> Result<(), LifecycleError> {
        match self.phase.get() {
            Phase::Unmounted => {
                self.phase.set(Phase::Mounting);
                Ok(())
            }
            phase => Err(LifecycleError::InvalidTransition {
                phase,
                operation: "mount",
            }),
        }
    }

    fn finish_mount(&self) {
        self.phase.set(Phase::Active);
    }

    fn abort_mount(&self) {
        self.phase.set(Phase::Unmounted);
    }

    fn begin_unmount(&self) -> Result<(), LifecycleError> {
        match self.phase.get() {
            Phase::Active => {
                self.phase.set(Phase::Unmounting);
                Ok(())
            }
            phase => Err(LifecycleError::InvalidTransition {
                phase,
                operation: "unmount",
            }),
        }
    }

    fn finish_unmount(&self) {
        self.phase.set(Phase::Destroyed);
    }

    fn run_hooks<T: Clone + 'static>(
        &self,
        phase: HookPhase,
        hooks: &[Hook<T>],
        scope: &HookScope<T>,
    ) -> Result<(), LifecycleError> {
        for (index, hook) in hooks.iter().enumerate() {
            hook(scope).map_err(|source| LifecycleError::HookFailed {
                phase,
                index,
                source,
            })?;
        }
        Ok(())
    }
}

/// One live occurrence of a descriptor: its own state cell, lifecycle
/// phase, and mount target.
pub struct ComponentInstance<T: Clone + 'static> {
    descriptor: Rc<ComponentDescriptor<T>>,
    state: StateCell<T>,
    controller: LifecycleController,
    mount_target: String,
    render_port: Rc<RefCell<dyn RenderPort>>,
    scheduler: SchedulerHandle,
    render_subscription: Cell<Option<SubscriptionId>>,
}

impl<T: Clone + 'static> ComponentInstance<T> {
    pub fn new(
        descriptor: Rc<ComponentDescriptor<T>>,
        initial: T,
        mount_target: impl Into<String>,
        render_port: Rc<RefCell<dyn RenderPort>>,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            descriptor,
            state: StateCell::new(initial),
            controller: LifecycleController::new(),
            mount_target: mount_target.into(),
            render_port,
            scheduler,
            render_subscription: Cell::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn mount_target(&self) -> &str {
        &self.mount_target
    }

    pub fn state(&self) -> &StateCell<T> {
        &self.state
    }

    /// Mounts the instance: runs `before_mount` hooks in declaration
    /// order, subscribes the render path to state, and performs the
    /// initial render.
    ///
    /// Valid only from `Unmounted`. A failing hook skips the remaining
    /// hooks, reverts the instance to `Unmounted`, and produces no render.
    pub fn mount(&self) -> Result<(), LifecycleError> {
        self.controller.begin_mount()?;
        let scope = self.hook_scope();
        if let Err(error) = self.controller.run_hooks(
            HookPhase::BeforeMount,
            &self.descriptor.before_mount,
            &scope,
        ) {
            self.controller.abort_mount();
            return Err(error);
        }
        self.controller.finish_mount();
        self.subscribe_render_path();
        self.render_now();
        Ok(())
    }

    /// Unmounts the instance: runs `before_unmount` hooks in declaration
    /// order, detaches the render path, and destroys the instance.
    ///
    /// Valid only from `Active`. A failing hook skips the remaining hooks
    /// but teardown still completes; the instance always ends `Destroyed`
    /// and the error is returned. Once destroyed, writes to the state
    /// cell are silent no-ops.
    pub fn unmount(&self) -> Result<(), LifecycleError> {
        self.controller.begin_unmount()?;
        let scope = self.hook_scope();
        let hook_result = self.controller.run_hooks(
            HookPhase::BeforeUnmount,
            &self.descriptor.before_unmount,
            &scope,
        );
        if let Some(subscription) = self.render_subscription.take() {
            self.state.unsubscribe(subscription);
        }
        self.controller.finish_unmount();
        self.state.seal();
        hook_result
    }

    fn hook_scope(&self) -> HookScope<T> {
        HookScope {
            state: self.state.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    fn subscribe_render_path(&self) {
        let descriptor = Rc::clone(&self.descriptor);
        let render_port = Rc::clone(&self.render_port);
        let target = self.mount_target.clone();
        let phase = self.controller.phase_cell();
        let subscription = self.state.subscribe(move |value| {
            // Renders only happen while Active; hook writes during the
            // other phases bump state without painting.
            if phase.get() != Phase::Active {
                return;
            }
            let output = descriptor.render_output(value);
            render_port.borrow_mut().present(output, &target);
        });
        self.render_subscription.set(Some(subscription));
    }

    fn render_now(&self) {
        let output = self.descriptor.render_output(&self.state.get());
        self.render_port.borrow_mut().present(output, &self.mount_target);
    }
}

#[cfg(test)]
mod tests;
