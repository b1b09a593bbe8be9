//! The engine façade.
//!
//! [`FlowEngine`] owns the node and edge stores, the viewport and whichever
//! gesture is running. The rendering layer feeds it pointer, keyboard and
//! measurement events; the host reads derived state back and listens through
//! [`Hooks`].
//!
//! Every public mutator runs inside [`FlowEngine::batch`]. Changes collected
//! during a batch reach `on_nodes_change` / `on_edges_change` once, when the
//! outermost batch ends:
//!
//! ```
//! use node_flow::{FlowConfig, FlowEngine, Node};
//!
//! let mut engine = FlowEngine::new(FlowConfig::default()).unwrap();
//! engine.set_surface(800.0, 600.0);
//! engine.set_nodes(vec![Node::new("a", 0.0, 0.0), Node::new("b", 200.0, 0.0).with_parent("a")]);
//! assert_eq!(engine.node("b").unwrap().position_absolute().x, 200.0);
//! ```

use crate::changes::{EdgeChange, NodeChange};
use crate::config::FlowConfig;
use crate::connection::{ConnectionDrag, ConnectionLine, ConnectionOutcome, ConnectionStatus, Reconnect};
use crate::drag::{move_selected_nodes, DragTarget, NodeDrag};
use crate::edges::{resolve_anchor, visible_nodes, EdgeGeometryEngine, EdgeGeometryOptions, EdgeLayout, Revisions};
use crate::error::{FlowError, Result};
use crate::geometry::{Dimensions, Point, Rect, Viewport};
use crate::graph::{ConnectionValidator, EdgeStore};
use crate::hooks::{ConnectionStart, Hooks};
use crate::input::{Key, Modifiers, MouseButton, PointerEvent, PointerTarget};
use crate::path::EdgePath;
use crate::resize::{NodeResize, ResizeParams};
use crate::selection::{user_selection_rect, Marquee, SelectionChanges, SelectionEngine, SelectionSet};
use crate::snapshot::Snapshot;
use crate::store::{InternalNode, NodeStore};
use crate::transition::{completion, resolved, TransitionOptions, ViewportFuture};
use crate::types::{Connection, Edge, Handle, HandleBounds, HandleType, Node, SelectionRect};
use crate::viewport::{FitViewOptions, ViewportController, WheelEvent};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Calls a hook if the host set it.
macro_rules! call {
    ($hooks:expr, $name:ident $(, $arg:expr)* $(,)?) => {
        if let Some(f) = $hooks.$name.as_mut() {
            f($($arg),*);
        }
    };
}

/// Zoom factor of a double click; shift zooms out instead.
const DOUBLE_CLICK_ZOOM: f32 = 2.0;
/// Arrow-key nudges move this many steps while shift is held.
const NUDGE_SHIFT_FACTOR: f32 = 4.0;

/// The gesture in progress, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Idle,
    /// Pointer down on the pane, possibly panning.
    Pane,
    Marquee,
    /// Pointer down on a node or the selection box, possibly dragging.
    Drag,
    /// Pointer down on an edge.
    EdgePress,
    Connect,
    Reconnect,
    Resize,
}

#[derive(Debug)]
enum Gesture {
    Idle,
    Pane {
        start: Point,
        panning: bool,
    },
    Marquee(Marquee),
    Node {
        /// `None` when the selection box was grabbed.
        id: Option<String>,
        drag: Option<NodeDrag>,
        start: Point,
        pointer: Point,
        multi: bool,
        /// The press already changed the selection, so the click must not toggle it back.
        selected_on_press: bool,
    },
    Edge {
        id: String,
        start: Point,
        multi: bool,
    },
    Connect {
        drag: ConnectionDrag,
        pointer: Point,
    },
    Resize(NodeResize),
}

impl Gesture {
    fn kind(&self) -> GestureKind {
        match self {
            Gesture::Idle => GestureKind::Idle,
            Gesture::Pane { .. } => GestureKind::Pane,
            Gesture::Marquee(_) => GestureKind::Marquee,
            Gesture::Node { .. } => GestureKind::Drag,
            Gesture::Edge { .. } => GestureKind::EdgePress,
            Gesture::Connect { drag, .. } if drag.reconnect().is_some() => GestureKind::Reconnect,
            Gesture::Connect { .. } => GestureKind::Connect,
            Gesture::Resize(_) => GestureKind::Resize,
        }
    }
}

#[derive(Debug, Default)]
struct PendingChanges {
    nodes: Vec<NodeChange>,
    edges: Vec<EdgeChange>,
}

pub struct FlowEngine {
    config: FlowConfig,
    hooks: Hooks,
    nodes: NodeStore,
    edges: EdgeStore,
    viewport: ViewportController,
    selection: SelectionEngine,
    edge_geometry: EdgeGeometryEngine,
    validator: Option<Box<dyn ConnectionValidator>>,
    resize_params: HashMap<String, ResizeParams>,
    gesture: Gesture,
    /// The group box around a finished marquee selection is shown.
    nodes_selection_active: bool,
    batch_depth: u32,
    pending: PendingChanges,
    errors: Vec<FlowError>,
    node_revision: u64,
    edge_revision: u64,
    /// Viewport revision last reported to `on_viewport_change`.
    reported_viewport: u64,
    initialized: bool,
    fit_view_done: bool,
}

impl FlowEngine {
    /// Creates an engine. Fails with [`FlowError::InvalidConfig`] when the config does not validate.
    pub fn new(config: FlowConfig) -> Result<Self> {
        config.validate()?;
        let viewport = ViewportController::new(
            config.default_viewport,
            config.min_zoom,
            config.max_zoom,
            config.translate_extent(),
        );
        Ok(Self {
            selection: SelectionEngine::new(config.selection_options()),
            reported_viewport: viewport.revision(),
            viewport,
            config,
            hooks: Hooks::default(),
            nodes: NodeStore::new(),
            edges: EdgeStore::new(),
            edge_geometry: EdgeGeometryEngine::new(),
            validator: None,
            resize_params: HashMap::new(),
            gesture: Gesture::Idle,
            nodes_selection_active: false,
            batch_depth: 0,
            pending: PendingChanges::default(),
            errors: Vec::new(),
            node_revision: 0,
            edge_revision: 0,
            initialized: false,
            fit_view_done: false,
        })
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Swaps the config. Nodes are re-adopted when their placement rules changed.
    pub fn set_config(&mut self, config: FlowConfig) -> Result<()> {
        config.validate()?;
        self.batch(|e| {
            let readopt = config.adopt_options() != e.config.adopt_options();
            e.viewport.set_zoom_limits(config.min_zoom, config.max_zoom);
            e.viewport.set_translate_extent(config.translate_extent());
            e.selection.set_options(config.selection_options());
            e.config = config;
            if readopt {
                let nodes = e.nodes.user_nodes();
                e.adopt(nodes);
            }
            e.edge_geometry.invalidate();
        });
        Ok(())
    }

    /// Extra connection rules on top of the connection mode.
    pub fn set_validator<V: ConnectionValidator + 'static>(&mut self, validator: V) {
        self.validator = Some(Box::new(validator));
    }

    pub fn clear_validator(&mut self) {
        self.validator = None;
    }

    /// Constraints for resizing one node.
    pub fn set_resize_params(&mut self, node_id: &str, params: ResizeParams) {
        self.resize_params.insert(node_id.to_owned(), params);
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    /// Runs `f` with change notifications deferred to the end of the outermost batch.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.emit();
        }
        result
    }

    fn emit(&mut self) {
        let nodes = std::mem::take(&mut self.pending.nodes);
        let edges = std::mem::take(&mut self.pending.edges);
        let selection_changed = nodes.iter().any(|c| matches!(c, NodeChange::Select { .. }))
            || edges.iter().any(|c| matches!(c, EdgeChange::Select { .. }));

        if !nodes.is_empty() {
            trace!(changes = nodes.len(), "nodes changed");
            call!(self.hooks, on_nodes_change, &nodes);
        }
        if !edges.is_empty() {
            trace!(changes = edges.len(), "edges changed");
            call!(self.hooks, on_edges_change, &edges);
        }
        if selection_changed {
            let selection = SelectionSet::from_stores(&self.nodes, &self.edges);
            call!(self.hooks, on_selection_change, &selection);
        }
        let revision = self.viewport.revision();
        if revision != self.reported_viewport {
            self.reported_viewport = revision;
            call!(self.hooks, on_viewport_change, self.viewport.viewport());
        }
        for err in std::mem::take(&mut self.errors) {
            self.hooks.error(err.code(), &err.to_string());
        }
    }

    fn push_nodes(&mut self, changes: Vec<NodeChange>) {
        if !changes.is_empty() {
            self.node_revision += 1;
            self.pending.nodes.extend(changes);
        }
    }

    fn push_edges(&mut self, changes: Vec<EdgeChange>) {
        if !changes.is_empty() {
            self.edge_revision += 1;
            self.pending.edges.extend(changes);
        }
    }

    fn push_selection(&mut self, (nodes, edges): SelectionChanges) {
        self.push_nodes(nodes);
        self.push_edges(edges);
    }

    // ------------------------------------------------------------------
    // Nodes and edges
    // ------------------------------------------------------------------

    fn adopt(&mut self, nodes: Vec<Node>) {
        let options = self.config.adopt_options();
        self.nodes.adopt(nodes, options, &mut self.errors);
        self.node_revision += 1;
        let dropped = self.edges.prune(&self.nodes, &mut self.errors);
        if !dropped.is_empty() {
            debug!(edges = dropped.len(), "edges dropped with their nodes");
            self.push_edges(dropped.into_iter().map(|e| EdgeChange::Remove { id: e.id }).collect());
        }
        self.check_ready();
    }

    /// Replaces all nodes.
    ///
    /// Edges left without an endpoint are dropped, each one reported through
    /// `on_error` and announced as an [`EdgeChange::Remove`].
    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.batch(|e| e.adopt(nodes));
    }

    /// Replaces all edges. Edges referencing unknown nodes are dropped and reported.
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.batch(|e| {
            e.edges.set_edges(edges, &e.nodes, &mut e.errors);
            e.edge_revision += 1;
        });
    }

    /// Adds one edge unless it duplicates an existing id or connection.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.batch(|e| e.insert_edge(edge))
    }

    fn insert_edge(&mut self, edge: Edge) -> bool {
        if !self.edges.add_edge(edge.clone(), &self.nodes, &mut self.errors) {
            return false;
        }
        self.push_edges(vec![EdgeChange::Add { item: edge }]);
        true
    }

    /// Edits one node in place. Returns `false` for unknown ids.
    ///
    /// The id is fixed; a closure that renames the node has the rename undone.
    pub fn update_node<F: FnOnce(&mut Node)>(&mut self, id: &str, f: F) -> bool {
        let mut nodes = self.nodes.user_nodes();
        let Some(node) = nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        f(node);
        if node.id != id {
            warn!(node = id, renamed = %node.id, "node ids cannot change in update_node");
            node.id = id.to_owned();
        }
        let item = node.clone();
        self.batch(|e| {
            e.adopt(nodes);
            e.push_nodes(vec![NodeChange::Replace {
                id: id.to_owned(),
                item,
            }]);
        });
        true
    }

    /// Edits one edge in place. Returns `false` for unknown ids. The id is fixed.
    pub fn update_edge<F: FnOnce(&mut Edge)>(&mut self, id: &str, f: F) -> bool {
        let Some(mut edge) = self.edges.get(id).cloned() else {
            return false;
        };
        f(&mut edge);
        if edge.id != id {
            warn!(edge = id, renamed = %edge.id, "edge ids cannot change in update_edge");
            edge.id = id.to_owned();
        }
        self.batch(|e| {
            e.edges.replace(id, edge.clone());
            e.push_edges(vec![EdgeChange::Replace {
                id: id.to_owned(),
                item: edge,
            }]);
        });
        true
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeStore {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&InternalNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    // ------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------

    /// Queues a measured size; applied on the next [`flush_updates`](Self::flush_updates).
    pub fn report_measured(&mut self, id: &str, width: f32, height: f32) {
        self.nodes.queue_measurement(id, Dimensions::new(width, height));
    }

    /// Queues the node's handle rects, relative to its top-left corner.
    pub fn report_handle_bounds(&mut self, id: &str, handles: Vec<Handle>) {
        self.nodes.queue_handle_bounds(id, HandleBounds::from_handles(handles));
    }

    pub fn request_internals_update(&mut self, ids: &[String]) {
        self.nodes.request_internals_update(ids);
    }

    /// Applies queued measurements. Returns whether any node changed.
    pub fn flush_updates(&mut self) -> bool {
        if !self.nodes.has_pending_updates() {
            return false;
        }
        self.batch(|e| {
            let (changes, updated) = e.nodes.flush_updates();
            let changed = !changes.is_empty() || !updated.is_empty();
            if changed {
                e.node_revision += 1;
            }
            e.push_nodes(changes);
            e.check_ready();
            changed
        })
    }

    /// Fires `on_init` and runs waiting fitViews once every node is measured.
    fn check_ready(&mut self) {
        if !self.nodes.all_measured() {
            return;
        }
        if !self.initialized {
            self.initialized = true;
            debug!(nodes = self.nodes.len(), "flow initialized");
            call!(self.hooks, on_init);
        }
        if self.config.fit_view && !self.fit_view_done && self.viewport.is_mounted() {
            self.fit_view_done = true;
            let options = FitViewOptions {
                padding: self.config.fit_view_padding,
                ..Default::default()
            };
            let (done, _) = completion();
            let bounds = self.fit_view_bounds(&options);
            self.viewport.fit_view_to(bounds, &options, done);
        }
        if let Some((options, done)) = self.viewport.take_pending_fit_view() {
            let bounds = self.fit_view_bounds(&options);
            self.viewport.fit_view_to(bounds, &options, done);
        }
    }

    /// One frame: flushes measurements, advances transitions and auto-pans.
    /// Returns whether anything visible changed.
    pub fn tick(&mut self, now: Duration) -> bool {
        self.batch(|e| {
            let mut changed = e.flush_updates();
            changed |= e.viewport.tick(now);
            changed |= e.auto_pan();
            changed
        })
    }

    fn auto_pan(&mut self) -> bool {
        let (enabled, pointer) = match &self.gesture {
            Gesture::Node {
                drag: Some(drag),
                pointer,
                ..
            } if drag.is_active() => (self.config.auto_pan_on_node_drag, *pointer),
            Gesture::Connect { drag, pointer } if drag.is_active() => (self.config.auto_pan_on_connect, *pointer),
            _ => return false,
        };
        if !enabled {
            return false;
        }
        let moved = self
            .viewport
            .auto_pan(pointer, self.config.auto_pan_speed, self.config.auto_pan_distance);
        if moved.is_none() {
            return false;
        }
        // Same screen point, new flow point.
        self.on_pointer_move(pointer);
        true
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    pub fn active_gesture(&self) -> GestureKind {
        self.gesture.kind()
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) {
        self.batch(|e| e.on_pointer_down(event));
    }

    pub fn pointer_move(&mut self, position: Point) {
        self.batch(|e| e.on_pointer_move(position));
    }

    pub fn pointer_up(&mut self, position: Point) {
        self.batch(|e| e.on_pointer_up(position));
    }

    /// The pointer left the pane; a running gesture is cancelled.
    pub fn pointer_leave(&mut self) {
        self.cancel();
    }

    /// Ends the running gesture without committing a connection or a click.
    pub fn cancel(&mut self) {
        self.batch(|e| e.cancel_gesture());
    }

    fn on_pointer_down(&mut self, event: &PointerEvent) {
        if !matches!(self.gesture, Gesture::Idle) {
            debug!(gesture = ?self.gesture.kind(), "pointer down ignored during gesture");
            return;
        }
        let screen = event.position;
        match event.button {
            MouseButton::Left => {}
            MouseButton::Middle if self.config.pan_on_drag => {
                self.begin_pan(screen);
                return;
            }
            _ => return,
        }
        let flow = self.viewport.screen_to_flow(screen);
        let multi = event.modifiers.any(&self.config.multi_selection_key);

        match &event.target {
            PointerTarget::Pane => {
                let marquee_key = event.modifiers.any(&self.config.selection_key);
                if self.config.elements_selectable && (marquee_key || self.config.selection_on_drag) {
                    let (marquee, changes) = self.selection.begin_marquee(
                        screen - self.viewport.origin(),
                        multi,
                        &mut self.nodes,
                        &mut self.edges,
                    );
                    self.push_selection(changes);
                    self.nodes_selection_active = false;
                    call!(self.hooks, on_selection_start);
                    self.gesture = Gesture::Marquee(marquee);
                } else if self.config.pan_on_drag {
                    self.begin_pan(screen);
                } else {
                    self.gesture = Gesture::Pane {
                        start: screen,
                        panning: false,
                    };
                }
            }
            PointerTarget::Node(id) => {
                if !self.nodes.contains(id) {
                    return;
                }
                let mut selected_on_press = false;
                if self.config.select_nodes_on_drag {
                    let changes = self.selection.select_for_drag(id, multi, &mut self.nodes, &mut self.edges);
                    selected_on_press = !changes.0.is_empty() || !changes.1.is_empty();
                    self.push_selection(changes);
                }
                let ctx = self.config.drag_context();
                let drag = NodeDrag::start(
                    DragTarget::Node(id.clone()),
                    &self.nodes,
                    screen,
                    flow,
                    &ctx,
                    &mut self.errors,
                );
                self.gesture = Gesture::Node {
                    id: Some(id.clone()),
                    drag,
                    start: screen,
                    pointer: screen,
                    multi,
                    selected_on_press,
                };
            }
            PointerTarget::SelectionBox => {
                let ctx = self.config.drag_context();
                let drag = NodeDrag::start(DragTarget::Selection, &self.nodes, screen, flow, &ctx, &mut self.errors);
                self.gesture = Gesture::Node {
                    id: None,
                    drag,
                    start: screen,
                    pointer: screen,
                    multi,
                    selected_on_press: false,
                };
            }
            PointerTarget::Handle {
                node_id,
                handle_id,
                handle_type,
            } => {
                let Some(node) = self.nodes.get(node_id) else { return };
                if !node.node.connectable.unwrap_or(self.config.nodes_connectable) {
                    debug!(node = %node_id, "node is not connectable");
                    return;
                }
                let Some(anchor) = resolve_anchor(node, *handle_type, handle_id.as_deref()) else {
                    debug!(node = %node_id, handle = ?handle_id, "connection start on unknown handle");
                    return;
                };
                let start = ConnectionStart {
                    node_id: node_id.clone(),
                    handle_id: handle_id.clone(),
                    handle_type: *handle_type,
                };
                call!(self.hooks, on_connect_start, &start);
                self.gesture = Gesture::Connect {
                    drag: ConnectionDrag::new(anchor, screen, flow, None),
                    pointer: screen,
                };
            }
            PointerTarget::EdgeEndpoint { edge_id, end } => {
                let Some(edge) = self.edges.get(edge_id) else { return };
                if !edge.reconnectable.unwrap_or(self.config.edges_reconnectable) {
                    debug!(edge = %edge_id, "edge is not reconnectable");
                    return;
                }
                let fixed = end.opposite();
                let (node_id, handle_id) = match fixed {
                    HandleType::Source => (&edge.source, edge.source_handle.as_deref()),
                    HandleType::Target => (&edge.target, edge.target_handle.as_deref()),
                };
                let Some(anchor) = self.nodes.get(node_id).and_then(|n| resolve_anchor(n, fixed, handle_id)) else {
                    debug!(edge = %edge_id, "reconnect anchor not found");
                    return;
                };
                let edge = edge.clone();
                call!(self.hooks, on_reconnect_start, &edge, *end);
                let reconnect = Reconnect {
                    edge_id: edge_id.clone(),
                    moving_end: *end,
                };
                self.gesture = Gesture::Connect {
                    drag: ConnectionDrag::new(anchor, screen, flow, Some(reconnect)),
                    pointer: screen,
                };
            }
            PointerTarget::Edge(id) => {
                if self.edges.contains(id) {
                    self.gesture = Gesture::Edge {
                        id: id.clone(),
                        start: screen,
                        multi,
                    };
                }
            }
            PointerTarget::ResizeControl { node_id, control } => {
                let params = self.resize_params.get(node_id).cloned().unwrap_or_default();
                let pointer = self.viewport.screen_to_flow_snapped(screen, self.config.snap_grid());
                let Some(resize) = NodeResize::start(node_id, *control, params, &self.nodes, pointer, &mut self.errors)
                else {
                    return;
                };
                let event = resize.event(resize.values(), (0.0, 0.0));
                call!(self.hooks, on_resize_start, &event);
                self.gesture = Gesture::Resize(resize);
            }
        }
    }

    fn begin_pan(&mut self, screen: Point) {
        self.viewport.begin_pan(screen);
        self.gesture = Gesture::Pane {
            start: screen,
            panning: true,
        };
        call!(self.hooks, on_move_start, self.viewport.viewport());
    }

    fn end_pan(&mut self) {
        if self.viewport.end_pan() {
            call!(self.hooks, on_move_end, self.viewport.viewport());
        }
    }

    fn on_pointer_move(&mut self, screen: Point) {
        let mut gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match &mut gesture {
            Gesture::Idle | Gesture::Edge { .. } => {}
            Gesture::Pane { panning, .. } => {
                if *panning {
                    self.viewport.pan_to(screen);
                }
            }
            Gesture::Marquee(marquee) => {
                let viewport = self.viewport.viewport();
                let local = screen - self.viewport.origin();
                let changes = marquee.update(local, &viewport, &mut self.nodes, &mut self.edges);
                self.push_selection(changes);
            }
            Gesture::Node { id, drag, pointer, .. } => {
                *pointer = screen;
                if let Some(drag) = drag {
                    self.drag_to(id.as_deref(), drag, screen);
                }
            }
            Gesture::Connect { drag, pointer } => {
                *pointer = screen;
                self.connect_to(drag, screen);
            }
            Gesture::Resize(resize) => self.resize_to(resize, screen),
        }
        self.gesture = gesture;
    }

    fn dragged_nodes(&self, drag: &NodeDrag) -> Vec<Node> {
        drag.node_ids()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.node.clone())
            .collect()
    }

    fn drag_to(&mut self, id: Option<&str>, drag: &mut NodeDrag, screen: Point) {
        let flow = self.viewport.screen_to_flow(screen);
        let ctx = self.config.drag_context();
        let step = drag.update(screen, flow, &mut self.nodes, &ctx);
        if !step.started && step.changes.is_empty() {
            return;
        }
        let moved_any = !step.changes.is_empty();
        self.push_nodes(step.changes);
        let moved = self.dragged_nodes(drag);
        match id {
            Some(id) => {
                if step.started {
                    call!(self.hooks, on_node_drag_start, id, &moved);
                }
                if moved_any {
                    call!(self.hooks, on_node_drag, id, &moved);
                }
            }
            None => {
                if step.started {
                    call!(self.hooks, on_selection_drag_start, &moved);
                }
                if moved_any {
                    call!(self.hooks, on_selection_drag, &moved);
                }
            }
        }
    }

    fn connect_to(&mut self, drag: &mut ConnectionDrag, screen: Point) {
        let flow = self.viewport.screen_to_flow(screen);
        let mut ctx = self.config.connection_context();
        ctx.validator = self.validator.as_deref();
        ctx.is_valid_connection = self.hooks.is_valid_connection.as_deref();
        drag.update(screen, flow, &self.nodes, &self.edges, &ctx);
    }

    fn resize_to(&mut self, resize: &mut NodeResize, screen: Point) {
        let pointer = self.viewport.screen_to_flow_snapped(screen, self.config.snap_grid());
        let Some(step) = resize.update(pointer) else { return };
        let event = resize.event(step.values, step.direction);
        if let Some(should_resize) = self.hooks.should_resize.as_mut() {
            if !should_resize(&event) {
                debug!(node = %resize.node_id(), "resize step vetoed");
                return;
            }
        }
        let changes = resize.apply(&step, &mut self.nodes);
        self.push_nodes(changes);
        call!(self.hooks, on_resize, &event);
    }

    fn on_pointer_up(&mut self, screen: Point) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let click_distance = self.config.pane_click_distance;
        let is_click = |start: Point| screen.distance(start) <= click_distance;
        match gesture {
            Gesture::Idle => {}
            Gesture::Pane { start, panning } => {
                let click = is_click(start);
                if panning {
                    self.end_pan();
                }
                if click {
                    self.pane_click(screen);
                }
            }
            Gesture::Marquee(marquee) => {
                let rect = marquee.rect();
                let empty = rect.width == 0.0 && rect.height == 0.0;
                let active = marquee.finish(&self.nodes);
                call!(self.hooks, on_selection_end);
                if empty {
                    self.pane_click(screen);
                } else {
                    self.nodes_selection_active = active;
                }
            }
            Gesture::Node {
                id,
                drag,
                multi,
                selected_on_press,
                ..
            } => {
                let dragged = self.end_node_drag(id.as_deref(), drag);
                if let (false, Some(id)) = (dragged, id) {
                    self.node_click(&id, multi, selected_on_press);
                }
            }
            Gesture::Edge { id, start, multi } => {
                if is_click(start) {
                    let changes = self.selection.click_edge(&id, multi, &mut self.nodes, &mut self.edges);
                    self.push_selection(changes);
                    call!(self.hooks, on_edge_click, &id);
                }
            }
            Gesture::Connect { drag, .. } => self.end_connection(drag, true),
            Gesture::Resize(resize) => self.end_resize(resize),
        }
    }

    fn cancel_gesture(&mut self) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        debug!(gesture = ?gesture.kind(), "gesture cancelled");
        match gesture {
            Gesture::Idle | Gesture::Edge { .. } => {}
            Gesture::Pane { panning, .. } => {
                if panning {
                    self.end_pan();
                }
            }
            Gesture::Marquee(marquee) => {
                self.nodes_selection_active = marquee.finish(&self.nodes);
                call!(self.hooks, on_selection_end);
            }
            Gesture::Node { id, drag, .. } => {
                self.end_node_drag(id.as_deref(), drag);
            }
            Gesture::Connect { drag, .. } => self.end_connection(drag, false),
            Gesture::Resize(resize) => self.end_resize(resize),
        }
    }

    /// Returns whether a drag actually happened.
    fn end_node_drag(&mut self, id: Option<&str>, drag: Option<NodeDrag>) -> bool {
        let Some(drag) = drag.filter(NodeDrag::is_active) else {
            return false;
        };
        let ids = drag.node_ids();
        let changes = drag.finish(&mut self.nodes);
        self.push_nodes(changes);
        let moved: Vec<Node> = ids.iter().filter_map(|i| self.nodes.get(i)).map(|n| n.node.clone()).collect();
        match id {
            Some(id) => call!(self.hooks, on_node_drag_stop, id, &moved),
            None => call!(self.hooks, on_selection_drag_stop, &moved),
        }
        true
    }

    fn node_click(&mut self, id: &str, multi: bool, selected_on_press: bool) {
        if !selected_on_press {
            let changes = self.selection.click_node(id, multi, &mut self.nodes, &mut self.edges);
            self.push_selection(changes);
        }
        self.nodes_selection_active = false;
        call!(self.hooks, on_node_click, id);
    }

    fn pane_click(&mut self, screen: Point) {
        let changes = self.selection.unselect_all(&mut self.nodes, &mut self.edges);
        self.push_selection(changes);
        self.nodes_selection_active = false;
        let flow = self.viewport.screen_to_flow(screen);
        call!(self.hooks, on_pane_click, flow);
    }

    fn end_resize(&mut self, resize: NodeResize) {
        let (event, changes) = resize.finish(&mut self.nodes);
        self.push_nodes(changes);
        call!(self.hooks, on_resize_end, &event);
    }

    fn end_connection(&mut self, drag: ConnectionDrag, commit: bool) {
        let reconnect = drag.reconnect().cloned();
        let outcome = if commit { drag.finish() } else { ConnectionOutcome::Cancelled };
        debug!(outcome = ?outcome, "connection ended");

        match reconnect {
            None => {
                if let ConnectionOutcome::Connect(connection) = &outcome {
                    self.connect(connection);
                }
                call!(self.hooks, on_connect_end, &outcome);
            }
            Some(reconnect) => {
                let success = match outcome {
                    ConnectionOutcome::Reconnect { edge_id, connection } => self.reconnect_edge(&edge_id, connection),
                    _ => false,
                };
                if let Some(edge) = self.edges.get(&reconnect.edge_id).cloned() {
                    call!(self.hooks, on_reconnect_end, &edge, reconnect.moving_end, success);
                }
            }
        }
    }

    fn connect(&mut self, connection: &Connection) {
        call!(self.hooks, on_connect, connection);
        let edge = connection.clone().into_edge().with_kind(self.config.default_edge_kind);
        let edge = match self.hooks.on_before_connect.as_mut() {
            Some(before) => before(edge),
            None => Some(edge),
        };
        match edge {
            Some(edge) => {
                if !self.insert_edge(edge) {
                    debug!(source = %connection.source, target = %connection.target, "connection not added");
                }
            }
            None => debug!(source = %connection.source, target = %connection.target, "connection vetoed"),
        }
    }

    fn reconnect_edge(&mut self, edge_id: &str, connection: Connection) -> bool {
        let Some(old) = self.edges.get(edge_id).cloned() else {
            return false;
        };
        let connection = match self.hooks.on_before_reconnect.as_mut() {
            Some(before) => before(&old, connection),
            None => Some(connection),
        };
        let Some(connection) = connection else {
            debug!(edge = %edge_id, "reconnect vetoed");
            return false;
        };
        let Some(updated) = self.edges.reconnect(edge_id, &connection) else {
            return false;
        };
        self.push_edges(vec![EdgeChange::Replace {
            id: edge_id.to_owned(),
            item: updated,
        }]);
        call!(self.hooks, on_reconnect, &old, &connection);
        true
    }

    // ------------------------------------------------------------------
    // Wheel and keyboard
    // ------------------------------------------------------------------

    /// Wheel zoom anchored at the pointer, or panning with `pan_on_scroll`.
    pub fn wheel(&mut self, event: WheelEvent) -> bool {
        let allowed = if event.pinch {
            self.config.zoom_on_pinch
        } else {
            self.config.zoom_on_scroll || self.config.pan_on_scroll
        };
        if !allowed {
            return false;
        }
        self.batch(|e| {
            e.viewport
                .handle_wheel(event, e.config.pan_on_scroll, e.config.pan_on_scroll_speed)
        })
    }

    /// Zooms in around `position`, or out with shift held.
    pub fn double_click(&mut self, position: Point, modifiers: Modifiers) -> ViewportFuture {
        if !self.config.zoom_on_double_click {
            return resolved(false);
        }
        let factor = if modifiers.shift {
            1.0 / DOUBLE_CLICK_ZOOM
        } else {
            DOUBLE_CLICK_ZOOM
        };
        self.batch(|e| e.viewport.scale_at(position, factor, TransitionOptions::instant()))
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) {
        self.batch(|e| e.on_key_down(key, modifiers));
    }

    fn on_key_down(&mut self, key: Key, modifiers: Modifiers) {
        match key {
            Key::Escape => {
                if matches!(self.gesture, Gesture::Idle) {
                    let changes = self.selection.unselect_all(&mut self.nodes, &mut self.edges);
                    self.push_selection(changes);
                    self.nodes_selection_active = false;
                } else {
                    self.cancel_gesture();
                }
            }
            Key::Delete | Key::Backspace => {
                if self.config.delete_key_enabled && matches!(self.gesture, Gesture::Idle) {
                    self.delete_selected_inner();
                }
            }
            _ => {
                if let Some(direction) = key.arrow_direction() {
                    let factor = if modifiers.shift { NUDGE_SHIFT_FACTOR } else { 1.0 };
                    self.nudge(direction, factor);
                }
            }
        }
    }

    fn nudge(&mut self, direction: Point, factor: f32) {
        let ctx = self.config.drag_context();
        let changes = move_selected_nodes(direction, factor, &mut self.nodes, &ctx, &mut self.errors);
        self.push_nodes(changes);
    }

    /// Moves the selected nodes by `direction` nudge steps times `factor`.
    pub fn move_selected_nodes(&mut self, direction: Point, factor: f32) {
        self.batch(|e| e.nudge(direction, factor));
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Removes nodes and edges the host or the user asked to delete.
    ///
    /// Nodes take their descendants and connected edges with them. Elements
    /// with `deletable: false` stay. Returns whether anything was removed.
    pub fn delete_elements(&mut self, node_ids: &[String], edge_ids: &[String]) -> bool {
        self.batch(|e| e.delete(node_ids, edge_ids))
    }

    pub fn delete_selected(&mut self) -> bool {
        self.batch(|e| e.delete_selected_inner())
    }

    fn delete_selected_inner(&mut self) -> bool {
        let selection = SelectionSet::from_stores(&self.nodes, &self.edges);
        let node_ids: Vec<String> = selection.nodes.into_iter().collect();
        let edge_ids: Vec<String> = selection.edges.into_iter().collect();
        self.delete(&node_ids, &edge_ids)
    }

    fn delete(&mut self, node_ids: &[String], edge_ids: &[String]) -> bool {
        let mut doomed_nodes: IndexSet<String> = IndexSet::new();
        for id in node_ids {
            let Some(node) = self.nodes.get(id) else { continue };
            if !node.node.deletable.unwrap_or(true) {
                continue;
            }
            doomed_nodes.insert(id.clone());
            doomed_nodes.extend(self.nodes.descendants(id));
        }
        let mut doomed_edges: IndexSet<String> = edge_ids
            .iter()
            .filter(|id| self.edges.get(id).map_or(false, |e| e.deletable.unwrap_or(true)))
            .cloned()
            .collect();
        doomed_edges.extend(self.edges.edges_of_nodes(doomed_nodes.iter().map(String::as_str)));
        if doomed_nodes.is_empty() && doomed_edges.is_empty() {
            return false;
        }

        let nodes: Vec<Node> = doomed_nodes
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.node.clone())
            .collect();
        let edges: Vec<Edge> = doomed_edges.iter().filter_map(|id| self.edges.get(id)).cloned().collect();
        if let Some(before) = self.hooks.on_before_delete.as_mut() {
            if !before(&nodes, &edges) {
                debug!(nodes = nodes.len(), edges = edges.len(), "deletion vetoed");
                return false;
            }
        }

        let node_ids: Vec<String> = doomed_nodes.into_iter().collect();
        let edge_ids: Vec<String> = doomed_edges.into_iter().collect();
        let removed_edges = self.edges.remove(&edge_ids);
        let removed_nodes = self.nodes.remove(&node_ids);
        debug!(nodes = removed_nodes.len(), edges = removed_edges.len(), "elements deleted");
        self.push_edges(removed_edges.into_iter().map(|e| EdgeChange::Remove { id: e.id }).collect());
        self.push_nodes(removed_nodes.into_iter().map(|id| NodeChange::Remove { id }).collect());
        if !self.nodes.iter().any(|n| n.node.selected) {
            self.nodes_selection_active = false;
        }
        call!(self.hooks, on_delete, &nodes, &edges);
        true
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select_all(&mut self) {
        self.batch(|e| {
            let changes = e.selection.select_all(&mut e.nodes, &mut e.edges);
            e.push_selection(changes);
        });
    }

    pub fn unselect_all(&mut self) {
        self.batch(|e| {
            let changes = e.selection.unselect_all(&mut e.nodes, &mut e.edges);
            e.push_selection(changes);
            e.nodes_selection_active = false;
        });
    }

    /// Replaces the selection. Unknown ids are ignored.
    pub fn set_selection(&mut self, node_ids: &[String], edge_ids: &[String]) {
        self.batch(|e| {
            let changes = e.selection.set_selection(node_ids, edge_ids, &mut e.nodes, &mut e.edges);
            e.push_selection(changes);
        });
    }

    pub fn selection(&self) -> SelectionSet {
        SelectionSet::from_stores(&self.nodes, &self.edges)
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn viewport(&self) -> Viewport {
        self.viewport.viewport()
    }

    pub fn viewport_controller(&self) -> &ViewportController {
        &self.viewport
    }

    /// Size of the pane in screen pixels. Waiting fitViews run once it is mounted.
    pub fn set_surface(&mut self, width: f32, height: f32) {
        self.batch(|e| {
            e.viewport.set_surface(width, height);
            e.check_ready();
        });
    }

    /// Offset of the pane in the coordinate space of pointer events.
    pub fn set_surface_origin(&mut self, origin: Point) {
        self.viewport.set_origin(origin);
    }

    pub fn screen_to_flow(&self, position: Point) -> Point {
        self.viewport.screen_to_flow(position)
    }

    pub fn flow_to_screen(&self, position: Point) -> Point {
        self.viewport.flow_to_screen(position)
    }

    pub fn set_viewport(&mut self, viewport: Viewport, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.set_viewport(viewport, options))
    }

    pub fn zoom_in(&mut self, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.zoom_in(options))
    }

    pub fn zoom_out(&mut self, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.zoom_out(options))
    }

    pub fn set_zoom(&mut self, zoom: f32, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.set_zoom(zoom, options))
    }

    pub fn set_center(&mut self, x: f32, y: f32, zoom: Option<f32>, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.set_center(x, y, zoom, options))
    }

    pub fn fit_bounds(&mut self, bounds: Rect, padding: f32, options: TransitionOptions) -> ViewportFuture {
        self.batch(|e| e.viewport.fit_bounds(bounds, padding, options))
    }

    /// Frames the nodes. Until every node is measured the request waits; calls
    /// made meanwhile share one future.
    pub fn fit_view(&mut self, options: FitViewOptions) -> ViewportFuture {
        if !self.nodes.all_measured() {
            debug!("fitView queued until the nodes are measured");
            return self.viewport.queue_fit_view(options);
        }
        self.batch(|e| {
            let (done, future) = completion();
            let bounds = e.fit_view_bounds(&options);
            e.viewport.fit_view_to(bounds, &options, done);
            future
        })
    }

    fn fit_view_bounds(&self, options: &FitViewOptions) -> Option<Rect> {
        self.nodes.bounds_where(|n| {
            n.is_measured()
                && (options.include_hidden_nodes || !n.node.hidden)
                && options
                    .nodes
                    .as_ref()
                    .map_or(true, |ids| ids.iter().any(|id| id == n.id()))
        })
    }

    // ------------------------------------------------------------------
    // Render state
    // ------------------------------------------------------------------

    /// Nodes to draw; culled to the pane with `only_render_visible_elements`.
    pub fn visible_nodes(&self) -> Vec<&InternalNode> {
        let surface = self
            .viewport
            .surface()
            .filter(|_| self.config.only_render_visible_elements);
        visible_nodes(&self.nodes, &self.viewport.viewport(), surface)
    }

    /// Edge layouts to draw. Recomputed only when nodes, edges or (when
    /// culling) the viewport changed.
    pub fn edge_layouts(&mut self) -> &[Rc<EdgeLayout>] {
        let culling = self.config.only_render_visible_elements;
        let revisions = Revisions {
            nodes: self.node_revision,
            edges: self.edge_revision,
            viewport: if culling { self.viewport.revision() } else { 0 },
        };
        let options = EdgeGeometryOptions {
            visible_rect: if culling { self.viewport.visible_rect() } else { None },
            elevate_on_select: self.config.elevate_edges_on_select,
        };
        let mut errors = Vec::new();
        self.edge_geometry
            .update(&self.nodes, &self.edges, revisions, options, &mut errors);
        for err in errors {
            self.hooks.error(err.code(), &err.to_string());
        }
        self.edge_geometry.visible()
    }

    pub fn edge_layout(&mut self, id: &str) -> Option<Rc<EdgeLayout>> {
        self.edge_layouts();
        self.edge_geometry.layout(id).cloned()
    }

    /// Edge under a screen point.
    pub fn edge_at(&mut self, position: Point) -> Option<String> {
        let flow = self.viewport.screen_to_flow(position);
        self.edge_layouts();
        self.edge_geometry
            .edge_at(flow, self.config.edge_hit_distance, self.config.edge_hit_samples)
            .map(str::to_owned)
    }

    /// The in-progress connection, once past the drag threshold.
    pub fn connection_line(&self) -> Option<ConnectionLine> {
        match &self.gesture {
            Gesture::Connect { drag, .. } if drag.is_active() => Some(drag.line()),
            _ => None,
        }
    }

    pub fn connection_path(&self) -> Option<EdgePath> {
        match &self.gesture {
            Gesture::Connect { drag, .. } if drag.is_active() => Some(drag.path(self.config.default_edge_kind)),
            _ => None,
        }
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        match &self.gesture {
            Gesture::Connect { drag, .. } => Some(drag.status()),
            _ => None,
        }
    }

    /// The marquee rectangle in screen coordinates.
    pub fn selection_rect(&self) -> Option<SelectionRect> {
        match &self.gesture {
            Gesture::Marquee(marquee) => Some(marquee.rect()),
            _ => None,
        }
    }

    pub fn nodes_selection_active(&self) -> bool {
        self.nodes_selection_active
    }

    /// Flow-space group box shown after a marquee selection.
    pub fn user_selection_rect(&self) -> Option<Rect> {
        if !self.nodes_selection_active {
            return None;
        }
        user_selection_rect(&self.nodes)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.user_nodes(),
            edges: self.edges.user_edges(),
            viewport: self.viewport.viewport(),
        }
    }

    /// Replaces nodes, edges and viewport. A running gesture is cancelled.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) {
        self.batch(|e| {
            e.cancel_gesture();
            e.edges.set_edges(Vec::new(), &e.nodes, &mut e.errors);
            e.adopt(snapshot.nodes);
            e.edges.set_edges(snapshot.edges, &e.nodes, &mut e.errors);
            e.edge_revision += 1;
            e.viewport.set_viewport(snapshot.viewport, TransitionOptions::instant());
        });
    }
}
