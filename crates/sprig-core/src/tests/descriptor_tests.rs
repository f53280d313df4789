use std::cell::RefCell;
use std::rc::Rc;

use crate::{
    ComponentDescriptor, ComponentInstance, MemoryRenderPort, RenderOutput, RenderPort, Scheduler,
};

#[test]
fn render_output_displays_its_text() {
    let output = RenderOutput::new("Seconds Elapsed: 3");
    assert_eq!(output.as_str(), "Seconds Elapsed: 3");
    assert_eq!(output.to_string(), "Seconds Elapsed: 3");
}

#[test]
#[should_panic(expected = "descriptor requires a render function")]
fn building_a_descriptor_without_render_panics() {
    let _ = ComponentDescriptor::<i32>::builder().build();
}

#[test]
fn descriptor_renders_from_a_state_snapshot() {
    let descriptor = ComponentDescriptor::<i32>::builder()
        .render(|count| RenderOutput::new(format!("count: {count}")))
        .build();

    assert_eq!(descriptor.render_output(&3).as_str(), "count: 3");
    assert_eq!(descriptor.render_output(&3).as_str(), "count: 3");
}

#[test]
fn memory_render_port_records_frames_and_latest_output() {
    let mut port = MemoryRenderPort::new();
    assert!(port.is_empty());

    port.present(RenderOutput::new("one"), "#a");
    port.present(RenderOutput::new("two"), "#a");
    port.present(RenderOutput::new("other"), "#b");

    assert_eq!(port.len(), 3);
    assert_eq!(port.latest("#a"), Some(&RenderOutput::new("two")));
    assert_eq!(port.latest("#b"), Some(&RenderOutput::new("other")));
    assert_eq!(port.latest("#missing"), None);
    assert_eq!(
        port.frames()[0],
        ("#a".to_string(), RenderOutput::new("one"))
    );
}

#[test]
fn memory_render_port_backs_a_mounted_instance() {
    let scheduler = Scheduler::new();
    let port = Rc::new(RefCell::new(MemoryRenderPort::new()));
    let descriptor = ComponentDescriptor::<i32>::builder()
        .render(|count| RenderOutput::new(format!("count: {count}")))
        .build();
    let instance = ComponentInstance::new(
        Rc::new(descriptor),
        0,
        "#root",
        port.clone(),
        scheduler.handle(),
    );

    instance.mount().expect("mount");
    instance.state().set(2);

    let port = port.borrow();
    assert_eq!(port.len(), 2);
    assert_eq!(port.latest("#root"), Some(&RenderOutput::new("count: 2")));
}
