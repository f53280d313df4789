use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sprig_core::{
    Clock, ComponentDescriptor, RenderOutput, RenderPort, TickError, TimerHandle,
};
use sprig_testing::{ManualClock, RecordingRenderPort, TestHost};

#[test]
fn manual_clock_only_moves_when_advanced() {
    let clock = ManualClock::new();
    let start = clock.now();

    assert_eq!(clock.elapsed_millis(start), 0);
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.elapsed_millis(start), 250);

    clock.set_millis(1_000);
    assert_eq!(clock.now_millis(), 1_000);
}

#[test]
fn advance_fires_timers_that_came_due() {
    let host = TestHost::new();
    let ticks = Rc::new(RefCell::new(0u32));
    {
        let ticks = ticks.clone();
        host.scheduler()
            .every(Duration::from_millis(100), move || {
                *ticks.borrow_mut() += 1;
                Ok(())
            });
    }

    host.advance(Duration::from_millis(99));
    assert_eq!(*ticks.borrow(), 0);

    host.advance(Duration::from_millis(1));
    assert_eq!(*ticks.borrow(), 1);
    assert_eq!(host.wake_count(), 1);
}

#[test]
fn recording_port_keeps_frames_and_target_order() {
    let mut port = RecordingRenderPort::new();
    port.present(RenderOutput::new("one"), "#a");
    port.present(RenderOutput::new("two"), "#b");
    port.present(RenderOutput::new("three"), "#a");

    assert_eq!(port.len(), 3);
    assert_eq!(port.texts_for("#a"), ["one", "three"]);
    assert_eq!(port.latest("#a"), Some(&RenderOutput::new("three")));
    assert_eq!(port.targets(), ["#a", "#b"]);
}

#[test]
fn reported_tick_failures_are_collected() {
    let host = TestHost::new();
    host.scheduler()
        .after(Duration::from_millis(10), || Err(TickError::new("boom")));

    host.advance(Duration::from_millis(10));

    assert_eq!(host.reported_errors(), [TickError::new("boom")]);
}

#[test]
fn ticker_component_runs_end_to_end() {
    let host = TestHost::new();
    let timer: Rc<RefCell<Option<TimerHandle>>> = Rc::new(RefCell::new(None));
    let started = Rc::clone(&timer);
    let descriptor = ComponentDescriptor::<u64>::builder()
        .before_mount(move |scope| {
            scope.state().set(0);
            let state = scope.state().clone();
            *started.borrow_mut() = Some(scope.scheduler().every(
                Duration::from_secs(1),
                move || {
                    state.update(|ticks| *ticks += 1);
                    Ok(())
                },
            ));
            Ok(())
        })
        .before_unmount(move |_scope| {
            if let Some(handle) = timer.borrow_mut().take() {
                handle.cancel();
            }
            Ok(())
        })
        .render(|ticks| RenderOutput::new(format!("Seconds Elapsed: {ticks}")))
        .build();
    let instance = host.instance(descriptor, 0, "#timer-target");

    instance.mount().expect("mount");
    assert_eq!(host.rendered_texts("#timer-target"), ["Seconds Elapsed: 0"]);
    // Starting the timer nudged the host exactly once.
    assert_eq!(host.wake_count(), 1);

    host.advance(Duration::from_secs(1));
    assert_eq!(
        host.rendered_texts("#timer-target"),
        ["Seconds Elapsed: 0", "Seconds Elapsed: 1"]
    );

    instance.unmount().expect("unmount");
    host.advance(Duration::from_secs(1));

    assert_eq!(host.rendered_texts("#timer-target").len(), 2);
    assert_eq!(instance.state().get(), 1);
    assert!(!host.scheduler().has_timers());
}
