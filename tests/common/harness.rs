//! Test harness around a [`FlowEngine`].
//!
//! Provides prebuilt graphs with callback tracking and helper methods for
//! simulating user interactions. Coordinates passed to the gesture helpers
//! are screen coordinates; with the default viewport they equal flow
//! coordinates.

#![allow(dead_code)]

use super::CallbackTracker;
use node_flow::{
    Dimensions, Edge, FlowConfig, FlowEngine, Handle, HandleType, Modifiers, Node, Point, PointerEvent,
    PointerTarget, Position, Rect,
};

pub const NODE_WIDTH: f32 = 150.0;
pub const NODE_HEIGHT: f32 = 60.0;

/// Source handle on the right edge, target handle on the left edge, both
/// vertically centered.
pub fn side_handles(node_id: &str, source: bool, target: bool) -> Vec<Handle> {
    let mut handles = Vec::new();
    if target {
        handles.push(Handle::new(
            None,
            node_id,
            HandleType::Target,
            Position::Left,
            Rect::new(-5.0, NODE_HEIGHT / 2.0 - 5.0, 10.0, 10.0),
        ));
    }
    if source {
        handles.push(Handle::new(
            None,
            node_id,
            HandleType::Source,
            Position::Right,
            Rect::new(NODE_WIDTH - 5.0, NODE_HEIGHT / 2.0 - 5.0, 10.0, 10.0),
        ));
    }
    handles
}

/// A sized node with side handles.
pub fn node(id: &str, x: f32, y: f32, source: bool, target: bool) -> Node {
    let mut node = Node::new(id, x, y).with_size(NODE_WIDTH, NODE_HEIGHT);
    node.handles = Some(side_handles(id, source, target));
    node
}

/// `input -> process -> output` laid out left to right, 300 apart, plus an
/// edge from `input` to `process`.
pub fn pipeline() -> (Vec<Node>, Vec<Edge>) {
    (
        vec![
            node("input", 0.0, 0.0, true, false),
            node("process", 300.0, 0.0, true, true),
            node("output", 600.0, 0.0, false, true),
        ],
        vec![Edge::new("e1", "input", "process")],
    )
}

/// A group at (100, 100) sized 300x200 holding `child` at (20, 30).
pub fn nested() -> Vec<Node> {
    vec![
        Node::new("group", 100.0, 100.0).with_size(300.0, 200.0),
        Node::new("child", 20.0, 30.0).with_size(50.0, 50.0).with_parent("group"),
        Node::new("free", 600.0, 100.0).with_size(50.0, 50.0),
    ]
}

/// `count` sized nodes on a grid, 200 apart, with an edge from each node to
/// its right neighbour.
pub fn grid(count: usize) -> (Vec<Node>, Vec<Edge>) {
    let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
    let nodes: Vec<Node> = (0..count)
        .map(|i| {
            let (col, row) = (i % cols, i / cols);
            Node::new(format!("n{i}"), col as f32 * 200.0, row as f32 * 200.0).with_size(100.0, 50.0)
        })
        .collect();
    let edges = (0..count)
        .filter(|i| (i + 1) % cols != 0 && i + 1 < count)
        .map(|i| Edge::new(format!("e{i}"), format!("n{i}"), format!("n{}", i + 1)))
        .collect();
    (nodes, edges)
}

pub struct FlowHarness {
    pub engine: FlowEngine,
    pub tracker: CallbackTracker,
}

impl FlowHarness {
    /// The pipeline graph with the default configuration, measured.
    pub fn new() -> Self {
        let (nodes, edges) = pipeline();
        let mut harness = Self::with_graph(FlowConfig::default(), nodes, edges);
        harness.measure_all();
        harness.tracker.clear();
        harness
    }

    /// An 800x600 pane holding `nodes` and `edges`; nothing is measured yet.
    pub fn with_graph(config: FlowConfig, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let tracker = CallbackTracker::new();
        let mut engine = FlowEngine::new(config)
            .expect("valid config")
            .with_hooks(tracker.hooks());
        engine.set_surface(800.0, 600.0);
        engine.set_nodes(nodes);
        engine.set_edges(edges);
        Self { engine, tracker }
    }

    /// Like [`with_graph`](Self::with_graph), measured and with the tracker cleared.
    pub fn measured(config: FlowConfig, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut harness = Self::with_graph(config, nodes, edges);
        harness.measure_all();
        harness.tracker.clear();
        harness
    }

    /// Reports every node at its user size (or 150x60) and flushes.
    pub fn measure_all(&mut self) {
        let sizes: Vec<(String, Dimensions)> = self
            .engine
            .nodes()
            .iter()
            .map(|n| {
                (
                    n.id().to_owned(),
                    n.node
                        .dimensions()
                        .unwrap_or(Dimensions::new(NODE_WIDTH, NODE_HEIGHT)),
                )
            })
            .collect();
        for (id, size) in sizes {
            self.engine.report_measured(&id, size.width, size.height);
        }
        self.engine.flush_updates();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn position(&self, id: &str) -> Point {
        self.engine.node(id).expect("node exists").node.position
    }

    pub fn position_absolute(&self, id: &str) -> Point {
        self.engine.node(id).expect("node exists").position_absolute()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.engine.node(id).map_or(false, |n| n.node.selected)
    }

    pub fn is_edge_selected(&self, id: &str) -> bool {
        self.engine.edge(id).map_or(false, |e| e.selected)
    }

    pub fn selected_nodes(&self) -> Vec<String> {
        self.engine.selection().nodes.into_iter().collect()
    }

    pub fn edge_ids(&self) -> Vec<String> {
        self.engine.edges().iter().map(|e| e.id.clone()).collect()
    }

    // ========================================================================
    // Gestures
    // ========================================================================

    pub fn press(&mut self, target: PointerTarget, at: (f32, f32), modifiers: Modifiers) {
        let event = PointerEvent::new(Point::new(at.0, at.1), target).with_modifiers(modifiers);
        self.engine.pointer_down(&event);
    }

    /// Press on `target`, move to `to` in `steps` moves, release.
    pub fn drag(&mut self, target: PointerTarget, from: (f32, f32), to: (f32, f32), modifiers: Modifiers) {
        self.press(target, from, modifiers);
        let steps = 4;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.engine
                .pointer_move(Point::new(from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t));
        }
        self.engine.pointer_up(Point::new(to.0, to.1));
    }

    pub fn drag_node(&mut self, id: &str, from: (f32, f32), to: (f32, f32)) {
        self.drag(PointerTarget::Node(id.to_owned()), from, to, Modifiers::NONE);
    }

    pub fn click(&mut self, target: PointerTarget, at: (f32, f32), modifiers: Modifiers) {
        self.press(target, at, modifiers);
        self.engine.pointer_up(Point::new(at.0, at.1));
    }

    pub fn click_node(&mut self, id: &str, at: (f32, f32)) {
        self.click(PointerTarget::Node(id.to_owned()), at, Modifiers::NONE);
    }

    pub fn click_pane(&mut self, at: (f32, f32)) {
        self.click(PointerTarget::Pane, at, Modifiers::NONE);
    }

    /// Connection drag from the unnamed handle of `node_id`.
    pub fn connect(&mut self, node_id: &str, handle_type: HandleType, from: (f32, f32), to: (f32, f32)) {
        let target = PointerTarget::Handle {
            node_id: node_id.to_owned(),
            handle_id: None,
            handle_type,
        };
        self.drag(target, from, to, Modifiers::NONE);
    }

    /// Shift-drag over the pane.
    pub fn marquee(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.drag(PointerTarget::Pane, from, to, Modifiers::shift());
    }
}
