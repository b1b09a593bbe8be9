//! Level 6: Viewport, Resize & Controller Tests
//!
//! Tests zooming, fitView, animated transitions, wheel input, panning
//! hooks, node resizing through the engine and the shared controller.

mod common;

use common::harness::{pipeline, FlowHarness};
use futures::FutureExt;
use node_flow::{
    ControlPosition, CoordinateExtent, Dimensions, Easing, FitViewOptions, FlowConfig, FlowController, Hooks,
    Modifiers, Node, NodeChange, Point, PointerEvent, PointerTarget, ResizeControl, ResizeEvent, ResizeParams,
    ResizeValues, TransitionOptions, Viewport, WheelEvent,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn linear(millis: u64) -> TransitionOptions {
    TransitionOptions::animated(ms(millis)).with_easing(Easing::Linear)
}

/// A 200x100 box at (100, 100).
fn resizable(params: ResizeParams) -> FlowHarness {
    let mut harness = FlowHarness::measured(
        FlowConfig::default(),
        vec![Node::new("box", 100.0, 100.0).with_size(200.0, 100.0)],
        vec![],
    );
    harness.engine.set_resize_params("box", params);
    harness
}

fn resize_target(position: ControlPosition) -> PointerTarget {
    PointerTarget::ResizeControl {
        node_id: "box".into(),
        control: ResizeControl::handle(position),
    }
}

// ============================================================================
// Zoom
// ============================================================================

#[test]
fn test_set_zoom_clamps_around_center() {
    let mut harness = FlowHarness::new();
    let done = harness.engine.set_zoom(10.0, TransitionOptions::instant());
    assert_eq!(done.now_or_never(), Some(true));
    assert_eq!(harness.engine.viewport(), Viewport::new(-400.0, -300.0, 2.0));
}

#[test]
fn test_zoom_in_and_out() {
    let mut harness = FlowHarness::new();
    harness.engine.zoom_in(TransitionOptions::instant());
    assert!((harness.engine.viewport().zoom - 1.2).abs() < 1e-5);
    harness.engine.zoom_out(TransitionOptions::instant());
    assert!((harness.engine.viewport().zoom - 1.0).abs() < 1e-5);
}

#[test]
fn test_set_center_on_node() {
    let mut harness = FlowHarness::new();
    harness
        .engine
        .set_center(375.0, 30.0, Some(1.0), TransitionOptions::instant());
    let center = harness.engine.flow_to_screen(Point::new(375.0, 30.0));
    assert_eq!(center, Point::new(400.0, 300.0));
}

#[test]
fn test_double_click_zoom() {
    let mut harness = FlowHarness::new();
    let done = harness.engine.double_click(Point::new(400.0, 300.0), Modifiers::NONE);
    assert_eq!(done.now_or_never(), Some(true));
    assert_eq!(harness.engine.viewport().zoom, 2.0);
    assert_eq!(harness.engine.screen_to_flow(Point::new(400.0, 300.0)), Point::new(400.0, 300.0));

    harness.engine.double_click(Point::new(400.0, 300.0), Modifiers::shift());
    assert_eq!(harness.engine.viewport().zoom, 1.0);

    let config = FlowConfig {
        zoom_on_double_click: false,
        ..Default::default()
    };
    let (nodes, edges) = pipeline();
    let mut harness = FlowHarness::measured(config, nodes, edges);
    let done = harness.engine.double_click(Point::new(400.0, 300.0), Modifiers::NONE);
    assert_eq!(done.now_or_never(), Some(false));
    assert_eq!(harness.engine.viewport().zoom, 1.0);
}

// ============================================================================
// fitView
// ============================================================================

#[test]
fn test_fit_view_is_idempotent() {
    let mut harness = FlowHarness::new();
    assert_eq!(harness.engine.fit_view(FitViewOptions::default()).now_or_never(), Some(true));
    let first = harness.engine.viewport();
    harness.tracker.clear();

    assert_eq!(harness.engine.fit_view(FitViewOptions::default()).now_or_never(), Some(true));
    assert_eq!(harness.engine.viewport(), first);
    assert!(harness.tracker.viewport_changes.borrow().is_empty());
}

#[test]
fn test_fit_view_subset_centers_it() {
    let mut harness = FlowHarness::new();
    let options = FitViewOptions {
        nodes: Some(vec!["output".to_owned()]),
        ..Default::default()
    };
    harness.engine.fit_view(options);
    // Zoom would be far above the maximum, so it clamps to 2.
    assert_eq!(harness.engine.viewport(), Viewport::new(-950.0, 240.0, 2.0));
}

#[test]
fn test_fit_view_respects_zoom_option() {
    let mut harness = FlowHarness::new();
    let options = FitViewOptions {
        max_zoom: Some(0.6),
        ..Default::default()
    };
    harness.engine.fit_view(options);
    assert!(harness.engine.viewport().zoom <= 0.6);
}

#[test]
fn test_fit_bounds() {
    let mut harness = FlowHarness::new();
    let done = harness.engine.fit_bounds(
        node_flow::Rect::new(0.0, 0.0, 400.0, 300.0),
        0.0,
        TransitionOptions::instant(),
    );
    assert_eq!(done.now_or_never(), Some(true));
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, 0.0, 2.0));
}

// ============================================================================
// Transitions
// ============================================================================

#[test]
fn test_animated_transition_advances_on_tick() {
    let mut harness = FlowHarness::new();
    let done = harness.engine.set_viewport(Viewport::new(100.0, 0.0, 1.0), linear(100));
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, 0.0, 1.0));
    assert_eq!(done.clone().now_or_never(), None);

    // The first tick only records the start time.
    assert!(!harness.engine.tick(ms(1000)));
    assert!(harness.engine.tick(ms(1050)));
    assert!((harness.engine.viewport().x - 50.0).abs() < 1e-3);
    assert_eq!(done.clone().now_or_never(), None);

    assert!(harness.engine.tick(ms(1100)));
    assert_eq!(harness.engine.viewport(), Viewport::new(100.0, 0.0, 1.0));
    assert_eq!(done.now_or_never(), Some(true));
    assert!(!harness.engine.tick(ms(1116)));
}

#[test]
fn test_interrupted_transition_resolves_false() {
    let mut harness = FlowHarness::new();
    let first = harness.engine.set_viewport(Viewport::new(100.0, 0.0, 1.0), linear(100));
    harness.engine.tick(ms(0));
    harness.engine.tick(ms(50));

    let second = harness
        .engine
        .set_viewport(Viewport::new(0.0, 200.0, 1.0), TransitionOptions::instant());
    assert_eq!(first.now_or_never(), Some(false));
    assert_eq!(second.now_or_never(), Some(true));
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, 200.0, 1.0));
}

#[test]
fn test_pan_interrupts_transition() {
    let mut harness = FlowHarness::new();
    let animated = harness.engine.set_zoom(2.0, linear(200));
    harness.engine.tick(ms(0));
    harness.drag(PointerTarget::Pane, (100.0, 100.0), (120.0, 100.0), Modifiers::NONE);
    assert_eq!(animated.now_or_never(), Some(false));
    assert!(!harness.engine.tick(ms(100)));
}

#[test]
fn test_default_easing_is_cubic_in_out() {
    let mut harness = FlowHarness::new();
    harness
        .engine
        .set_viewport(Viewport::new(100.0, 0.0, 1.0), TransitionOptions::animated(ms(100)));
    harness.engine.tick(ms(0));
    harness.engine.tick(ms(25));
    assert!((harness.engine.viewport().x - 6.25).abs() < 1e-3);
    harness.engine.tick(ms(50));
    assert!((harness.engine.viewport().x - 50.0).abs() < 1e-3);
}

// ============================================================================
// Wheel & panning
// ============================================================================

#[test]
fn test_wheel_zoom_keeps_pointer_anchor() {
    let mut harness = FlowHarness::new();
    let pointer = Point::new(200.0, 100.0);
    let before = harness.engine.screen_to_flow(pointer);
    assert!(harness.engine.wheel(WheelEvent {
        pointer,
        delta: Point::new(0.0, -100.0),
        pinch: false,
    }));
    let after = harness.engine.screen_to_flow(pointer);
    assert!(harness.engine.viewport().zoom > 1.0);
    assert!((before.x - after.x).abs() < 1e-3 && (before.y - after.y).abs() < 1e-3);
    assert_eq!(harness.tracker.viewport_changes.borrow().len(), 1);
}

#[test]
fn test_wheel_can_pan_instead() {
    let config = FlowConfig {
        pan_on_scroll: true,
        ..Default::default()
    };
    let (nodes, edges) = pipeline();
    let mut harness = FlowHarness::measured(config, nodes, edges);
    harness.engine.wheel(WheelEvent {
        pointer: Point::new(200.0, 100.0),
        delta: Point::new(0.0, 100.0),
        pinch: false,
    });
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, -50.0, 1.0));
}

#[test]
fn test_wheel_disabled() {
    let config = FlowConfig {
        zoom_on_scroll: false,
        ..Default::default()
    };
    let (nodes, edges) = pipeline();
    let mut harness = FlowHarness::measured(config, nodes, edges);
    let used = harness.engine.wheel(WheelEvent {
        pointer: Point::ZERO,
        delta: Point::new(0.0, -100.0),
        pinch: false,
    });
    assert!(!used);
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, 0.0, 1.0));
}

#[test]
fn test_pane_drag_pans_with_hooks() {
    let mut harness = FlowHarness::new();
    harness.drag(PointerTarget::Pane, (100.0, 100.0), (180.0, 140.0), Modifiers::NONE);

    assert_eq!(harness.engine.viewport(), Viewport::new(80.0, 40.0, 1.0));
    assert_eq!(harness.tracker.viewport_changes.borrow().len(), 4);
    assert_eq!(
        harness.tracker.move_ends.borrow().as_slice(),
        &[Viewport::new(80.0, 40.0, 1.0)]
    );
    // A pan is not a pane click.
    assert!(harness.tracker.pane_clicks.borrow().is_empty());
}

#[test]
fn test_translate_extent_limits_pan() {
    let config = FlowConfig {
        translate_extent: Some(CoordinateExtent::new(0.0, 0.0, 1000.0, 1000.0)),
        ..Default::default()
    };
    let (nodes, edges) = pipeline();
    let mut harness = FlowHarness::measured(config, nodes, edges);
    harness.drag(PointerTarget::Pane, (100.0, 100.0), (600.0, 100.0), Modifiers::NONE);
    assert_eq!(harness.engine.viewport(), Viewport::new(0.0, 0.0, 1.0));

    harness.drag(PointerTarget::Pane, (600.0, 100.0), (400.0, 100.0), Modifiers::NONE);
    assert_eq!(harness.engine.viewport(), Viewport::new(-200.0, 0.0, 1.0));
}

#[test]
fn test_middle_button_pans_over_nodes() {
    let mut harness = FlowHarness::new();
    let event = PointerEvent::new(Point::new(10.0, 10.0), PointerTarget::Node("input".into()))
        .with_button(node_flow::MouseButton::Middle);
    harness.engine.pointer_down(&event);
    harness.engine.pointer_move(Point::new(40.0, 10.0));
    harness.engine.pointer_up(Point::new(40.0, 10.0));

    assert_eq!(harness.engine.viewport(), Viewport::new(30.0, 0.0, 1.0));
    assert_eq!(harness.position("input"), Point::new(0.0, 0.0));
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_bottom_right() {
    let mut harness = resizable(ResizeParams::default());
    harness.drag(resize_target(ControlPosition::BottomRight), (300.0, 200.0), (350.0, 260.0), Modifiers::NONE);

    let node = harness.engine.node("box").unwrap();
    assert_eq!(node.size(), Dimensions::new(250.0, 160.0));
    assert_eq!(node.node.position, Point::new(100.0, 100.0));
    assert!(!node.node.resizing);

    let changes = harness.tracker.all_node_changes();
    assert!(matches!(
        changes.last(),
        Some(NodeChange::Dimensions { resizing: Some(false), .. })
    ));
}

#[test]
fn test_resize_left_moves_node() {
    let mut harness = resizable(ResizeParams::default());
    harness.drag(resize_target(ControlPosition::Left), (100.0, 150.0), (50.0, 150.0), Modifiers::NONE);

    let node = harness.engine.node("box").unwrap();
    assert_eq!(node.size(), Dimensions::new(250.0, 100.0));
    assert_eq!(node.node.position, Point::new(50.0, 100.0));
}

#[test]
fn test_resize_keeps_aspect_ratio_within_max() {
    let params = ResizeParams {
        max_width: 400.0,
        keep_aspect_ratio: true,
        ..Default::default()
    };
    let mut harness = resizable(params);
    harness.drag(resize_target(ControlPosition::Bottom), (200.0, 200.0), (200.0, 400.0), Modifiers::NONE);
    assert_eq!(harness.engine.node("box").unwrap().size(), Dimensions::new(400.0, 200.0));
}

#[test]
fn test_resize_hooks_and_veto() {
    let mut harness = resizable(ResizeParams::default());
    let steps: Rc<RefCell<Vec<ResizeValues>>> = Rc::default();
    let ends: Rc<RefCell<Vec<ResizeValues>>> = Rc::default();
    let hooks = Hooks::new()
        .on_resize({
            let steps = steps.clone();
            move |event: &ResizeEvent| steps.borrow_mut().push(event.values)
        })
        .on_resize_end({
            let ends = ends.clone();
            move |event: &ResizeEvent| ends.borrow_mut().push(event.values)
        })
        .should_resize(|event: &ResizeEvent| event.values.width <= 300.0);
    harness.engine.set_hooks(hooks);

    harness.drag(resize_target(ControlPosition::Right), (300.0, 150.0), (500.0, 150.0), Modifiers::NONE);

    let widths: Vec<f32> = steps.borrow().iter().map(|v| v.width).collect();
    assert_eq!(widths, vec![250.0, 300.0]);
    assert_eq!(ends.borrow().len(), 1);
    assert_eq!(ends.borrow()[0].width, 300.0);
    assert_eq!(harness.engine.node("box").unwrap().size().width, 300.0);
}

#[test]
fn test_resize_unknown_node_is_ignored() {
    let mut harness = resizable(ResizeParams::default());
    let target = PointerTarget::ResizeControl {
        node_id: "ghost".into(),
        control: ResizeControl::handle(ControlPosition::Right),
    };
    harness.press(target, (0.0, 0.0), Modifiers::NONE);
    assert_eq!(harness.engine.active_gesture(), node_flow::GestureKind::Idle);
}

// ============================================================================
// Controller
// ============================================================================

fn controller() -> FlowController {
    let ctrl = FlowController::new(FlowConfig::default()).unwrap();
    ctrl.handle_surface_resized(800.0, 600.0);
    let (nodes, edges) = pipeline();
    ctrl.with(|e| {
        e.set_nodes(nodes);
        e.set_edges(edges);
    });
    let measured = ctrl.node_measured_callback();
    for id in ["input", "process", "output"] {
        measured(id, 150.0, 60.0);
    }
    ctrl
}

#[test]
fn test_controller_callbacks_drive_engine() {
    let ctrl = controller();
    let down = ctrl.pointer_down_callback();
    let moved = ctrl.pointer_move_callback();
    let up = ctrl.pointer_up_callback();

    down(PointerEvent::new(Point::new(310.0, 10.0), PointerTarget::Node("process".into())));
    moved(330.0, 50.0);
    up(330.0, 50.0);

    let position = ctrl.with(|e| e.node("process").unwrap().node.position);
    assert_eq!(position, Some(Point::new(320.0, 40.0)));
    let path = ctrl.edge_path("e1");
    assert!(path.starts_with("M 155 30 C"), "{path}");
    assert!(path.ends_with("315 70"), "{path}");
}

#[test]
fn test_controller_reentrant_call_returns_none() {
    let ctrl = controller();
    let seen: Rc<RefCell<Option<Option<usize>>>> = Rc::default();
    let hooks = Hooks::new().on_node_click({
        let inner = ctrl.clone();
        let seen = seen.clone();
        move |_: &str| *seen.borrow_mut() = Some(inner.with(|e| e.nodes().len()))
    });
    ctrl.engine().borrow_mut().set_hooks(hooks);

    ctrl.handle_pointer_down(&PointerEvent::new(Point::new(10.0, 10.0), PointerTarget::Node("input".into())));
    ctrl.handle_pointer_up(10.0, 10.0);

    assert_eq!(*seen.borrow(), Some(None));
    assert_eq!(ctrl.with(|e| e.nodes().len()), Some(3));
}

#[test]
fn test_controller_visible_nodes_follow_viewport() {
    let config = FlowConfig {
        only_render_visible_elements: true,
        ..Default::default()
    };
    let ctrl = FlowController::new(config).unwrap();
    ctrl.handle_surface_resized(400.0, 300.0);
    let (nodes, edges) = pipeline();
    ctrl.with(|e| {
        e.set_nodes(nodes);
        e.set_edges(edges);
    });
    for id in ["input", "process", "output"] {
        ctrl.handle_node_measured(id, 150.0, 60.0);
    }
    ctrl.with(|e| e.flush_updates());

    assert_eq!(ctrl.visible_node_ids(), vec!["input", "process"]);
    ctrl.with(|e| e.set_viewport(Viewport::new(-350.0, 0.0, 1.0), TransitionOptions::instant()));
    assert_eq!(ctrl.visible_node_ids(), vec!["process", "output"]);
}
