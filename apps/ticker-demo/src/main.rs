//! Ticker demo: a component that counts seconds while mounted.
//!
//! `before_mount` zeroes the tick counter and starts a repeating timer
//! incrementing it, `render` prints the elapsed seconds, and
//! `before_unmount` stops the timer. Run with optional arguments:
//!
//! ```text
//! ticker-demo [interval_ms] [ticks]
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use sprig_core::{ComponentDescriptor, ComponentInstance, RenderOutput, RenderPort, TimerHandle};
use sprig_runtime_std::StdRuntime;

struct StdoutRenderPort;

impl RenderPort for StdoutRenderPort {
    fn present(&mut self, output: RenderOutput, target: &str) {
        println!("[{target}] {output}");
    }
}

fn ticker_descriptor(interval: Duration) -> ComponentDescriptor<u64> {
    let timer: Rc<RefCell<Option<TimerHandle>>> = Rc::new(RefCell::new(None));
    let started = Rc::clone(&timer);
    ComponentDescriptor::<u64>::builder()
        .before_mount(move |scope| {
            scope.state().set(0);
            let state = scope.state().clone();
            *started.borrow_mut() = Some(scope.scheduler().every(interval, move || {
                state.update(|ticks| *ticks += 1);
                Ok(())
            }));
            Ok(())
        })
        .before_unmount(move |_scope| {
            if let Some(handle) = timer.borrow_mut().take() {
                handle.cancel();
            }
            Ok(())
        })
        .render(|ticks| RenderOutput::new(format!("Seconds Elapsed: {ticks}")))
        .build()
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let interval_ms: u64 = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1000);
    let ticks: u64 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(5);

    let runtime = StdRuntime::new();
    let descriptor = Rc::new(ticker_descriptor(Duration::from_millis(interval_ms)));
    let port: Rc<RefCell<dyn RenderPort>> = Rc::new(RefCell::new(StdoutRenderPort));
    let instance = ComponentInstance::new(
        descriptor,
        0,
        "#timer-target",
        port,
        runtime.handle(),
    );

    if let Err(error) = instance.mount() {
        log::error!("mount failed: {error}");
        return;
    }
    log::info!("mounted at {}", instance.mount_target());

    while instance.state().get() < ticks {
        match runtime.turn() {
            Some(sleep_for) => thread::sleep(sleep_for),
            None => break,
        }
    }

    if let Err(error) = instance.unmount() {
        log::error!("unmount failed: {error}");
        return;
    }
    log::info!("unmounted after {} ticks", instance.state().get());
}
