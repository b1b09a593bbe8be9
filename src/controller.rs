//! Shared handle for wiring a [`FlowEngine`] into UI callbacks.
//!
//! UI toolkits hand out callbacks one by one; [`FlowController`] is a cheap
//! clone around the engine so each callback can own a copy.
//!
//! # Example
//!
//! ```
//! use node_flow::{FlowConfig, FlowController, Node, Point, PointerEvent, PointerTarget};
//!
//! let ctrl = FlowController::new(FlowConfig::default()).unwrap();
//! ctrl.handle_surface_resized(800.0, 600.0);
//! ctrl.with(|engine| engine.set_nodes(vec![Node::new("a", 0.0, 0.0)]));
//!
//! // Rendering layer reports
//! let measured = ctrl.node_measured_callback();
//! measured("a", 120.0, 40.0);
//!
//! // Pointer input
//! let down = ctrl.pointer_down_callback();
//! let moved = ctrl.pointer_move_callback();
//! let up = ctrl.pointer_up_callback();
//! down(PointerEvent::new(Point::new(10.0, 10.0), PointerTarget::Node("a".into())));
//! moved(40.0, 10.0);
//! up(40.0, 10.0);
//!
//! assert_eq!(ctrl.with(|e| e.node("a").unwrap().node.position), Some(Point::new(30.0, 0.0)));
//! ```
//!
//! Hooks run while the engine is borrowed. A hook that calls back into the
//! controller gets `None` (and a warning) instead of a panic.

use crate::config::FlowConfig;
use crate::engine::FlowEngine;
use crate::error::Result;
use crate::geometry::Point;
use crate::input::{Key, Modifiers, PointerEvent};
use crate::types::Handle;
use crate::viewport::WheelEvent;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct FlowController {
    engine: Rc<RefCell<FlowEngine>>,
}

impl FlowController {
    pub fn new(config: FlowConfig) -> Result<Self> {
        Ok(Self::from_engine(FlowEngine::new(config)?))
    }

    pub fn from_engine(engine: FlowEngine) -> Self {
        Self {
            engine: Rc::new(RefCell::new(engine)),
        }
    }

    /// Get access to the engine.
    pub fn engine(&self) -> Rc<RefCell<FlowEngine>> {
        self.engine.clone()
    }

    /// Runs `f` on the engine. `None` when called from inside a hook.
    pub fn with<R>(&self, f: impl FnOnce(&mut FlowEngine) -> R) -> Option<R> {
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => Some(f(&mut engine)),
            Err(_) => {
                warn!("flow engine is busy, dropping re-entrant call");
                None
            }
        }
    }

    // === Callback factories ===

    /// Returns a callback for node size reports: `(id, width, height)`.
    pub fn node_measured_callback(&self) -> impl Fn(&str, f32, f32) {
        let ctrl = self.clone();
        move |id, width, height| ctrl.handle_node_measured(id, width, height)
    }

    /// Returns a callback for handle reports: `(node_id, handles)` with rects
    /// relative to the node.
    pub fn handle_bounds_callback(&self) -> impl Fn(&str, Vec<Handle>) {
        let ctrl = self.clone();
        move |id, handles| ctrl.handle_handle_bounds(id, handles)
    }

    pub fn pointer_down_callback(&self) -> impl Fn(PointerEvent) {
        let ctrl = self.clone();
        move |event| ctrl.handle_pointer_down(&event)
    }

    /// Returns a callback for pointer moves: `(x, y)` in screen space.
    pub fn pointer_move_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| ctrl.handle_pointer_move(x, y)
    }

    pub fn pointer_up_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| ctrl.handle_pointer_up(x, y)
    }

    /// Returns a callback for wheel events; the result tells whether the event was used.
    pub fn wheel_callback(&self) -> impl Fn(WheelEvent) -> bool {
        let ctrl = self.clone();
        move |event| ctrl.with(|e| e.wheel(event)).unwrap_or(false)
    }

    pub fn key_callback(&self) -> impl Fn(Key, Modifiers) {
        let ctrl = self.clone();
        move |key, modifiers| {
            ctrl.with(|e| e.key_down(key, modifiers));
        }
    }

    /// Returns a per-frame callback; the result tells whether to redraw.
    pub fn tick_callback(&self) -> impl Fn(Duration) -> bool {
        let ctrl = self.clone();
        move |now| ctrl.with(|e| e.tick(now)).unwrap_or(false)
    }

    /// Returns a callback producing the flow-space SVG path of an edge.
    ///
    /// Empty for unknown or hidden edges.
    pub fn edge_path_callback(&self) -> impl Fn(&str) -> String {
        let ctrl = self.clone();
        move |id| ctrl.edge_path(id)
    }

    // === Direct handlers ===

    pub fn handle_node_measured(&self, id: &str, width: f32, height: f32) {
        self.with(|e| e.report_measured(id, width, height));
    }

    pub fn handle_handle_bounds(&self, id: &str, handles: Vec<Handle>) {
        self.with(|e| e.report_handle_bounds(id, handles));
    }

    /// Pane size changed; also flushes pending measurements.
    pub fn handle_surface_resized(&self, width: f32, height: f32) {
        self.with(|e| {
            e.set_surface(width, height);
            e.flush_updates();
        });
    }

    pub fn handle_pointer_down(&self, event: &PointerEvent) {
        self.with(|e| {
            e.flush_updates();
            e.pointer_down(event);
        });
    }

    pub fn handle_pointer_move(&self, x: f32, y: f32) {
        self.with(|e| e.pointer_move(Point::new(x, y)));
    }

    pub fn handle_pointer_up(&self, x: f32, y: f32) {
        self.with(|e| e.pointer_up(Point::new(x, y)));
    }

    pub fn handle_pointer_leave(&self) {
        self.with(|e| e.pointer_leave());
    }

    pub fn edge_path(&self, id: &str) -> String {
        self.with(|e| e.edge_layout(id).map(|l| l.path.commands.clone()))
            .flatten()
            .unwrap_or_default()
    }

    // === Screen-space hit-testing facades ===

    /// Edge under a screen point.
    pub fn find_edge_at_screen(&self, x: f32, y: f32) -> Option<String> {
        self.with(|e| e.edge_at(Point::new(x, y))).flatten()
    }

    /// Ids of the nodes worth drawing this frame.
    pub fn visible_node_ids(&self) -> Vec<String> {
        self.with(|e| e.visible_nodes().iter().map(|n| n.id().to_owned()).collect())
            .unwrap_or_default()
    }
}
