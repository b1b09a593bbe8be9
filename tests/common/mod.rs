//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use node_flow::{
    Connection, ConnectionOutcome, EdgeChange, ErrorCode, HandleType, Hooks, NodeChange, Point, Viewport,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Tracks hook invocations for testing.
///
/// Each field records calls to the corresponding hook with their arguments.
#[derive(Default, Clone)]
pub struct CallbackTracker {
    /// One entry per `on_nodes_change` batch.
    pub node_changes: Rc<RefCell<Vec<Vec<NodeChange>>>>,
    /// One entry per `on_edges_change` batch.
    pub edge_changes: Rc<RefCell<Vec<Vec<EdgeChange>>>>,
    pub connects: Rc<RefCell<Vec<Connection>>>,
    pub connect_starts: Rc<RefCell<Vec<(String, HandleType)>>>,
    pub connect_ends: Rc<RefCell<Vec<ConnectionOutcome>>>,
    /// (edge_id, moved end, success)
    pub reconnect_ends: Rc<RefCell<Vec<(String, HandleType, bool)>>>,
    /// (node_id, dragged node count)
    pub drag_starts: Rc<RefCell<Vec<(String, usize)>>>,
    pub drag_stops: Rc<RefCell<Vec<(String, usize)>>>,
    /// Count of `on_node_drag` calls
    pub drags: Rc<RefCell<usize>>,
    /// (selected node count, selected edge count)
    pub selection_changes: Rc<RefCell<Vec<(usize, usize)>>>,
    pub viewport_changes: Rc<RefCell<Vec<Viewport>>>,
    pub move_ends: Rc<RefCell<Vec<Viewport>>>,
    pub errors: Rc<RefCell<Vec<ErrorCode>>>,
    /// (deleted node ids, deleted edge ids)
    pub deleted: Rc<RefCell<Vec<(Vec<String>, Vec<String>)>>>,
    pub node_clicks: Rc<RefCell<Vec<String>>>,
    pub edge_clicks: Rc<RefCell<Vec<String>>>,
    /// Flow position of each pane click
    pub pane_clicks: Rc<RefCell<Vec<Point>>>,
    /// Count of `on_init` calls
    pub inits: Rc<RefCell<usize>>,
}

impl CallbackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks that record into this tracker.
    pub fn hooks(&self) -> Hooks {
        let t = self.clone();
        Hooks::new()
            .on_nodes_change({
                let t = t.clone();
                move |changes| t.node_changes.borrow_mut().push(changes.to_vec())
            })
            .on_edges_change({
                let t = t.clone();
                move |changes| t.edge_changes.borrow_mut().push(changes.to_vec())
            })
            .on_connect({
                let t = t.clone();
                move |c| t.connects.borrow_mut().push(c.clone())
            })
            .on_connect_start({
                let t = t.clone();
                move |start| {
                    t.connect_starts
                        .borrow_mut()
                        .push((start.node_id.clone(), start.handle_type))
                }
            })
            .on_connect_end({
                let t = t.clone();
                move |outcome| t.connect_ends.borrow_mut().push(outcome.clone())
            })
            .on_reconnect_end({
                let t = t.clone();
                move |edge, end, ok| t.reconnect_ends.borrow_mut().push((edge.id.clone(), end, ok))
            })
            .on_node_drag_start({
                let t = t.clone();
                move |id, nodes| t.drag_starts.borrow_mut().push((id.to_owned(), nodes.len()))
            })
            .on_node_drag({
                let t = t.clone();
                move |_, _| *t.drags.borrow_mut() += 1
            })
            .on_node_drag_stop({
                let t = t.clone();
                move |id, nodes| t.drag_stops.borrow_mut().push((id.to_owned(), nodes.len()))
            })
            .on_selection_change({
                let t = t.clone();
                move |s| t.selection_changes.borrow_mut().push((s.nodes.len(), s.edges.len()))
            })
            .on_viewport_change({
                let t = t.clone();
                move |v| t.viewport_changes.borrow_mut().push(v)
            })
            .on_move_end({
                let t = t.clone();
                move |v| t.move_ends.borrow_mut().push(v)
            })
            .on_error({
                let t = t.clone();
                move |code, _| t.errors.borrow_mut().push(code)
            })
            .on_delete({
                let t = t.clone();
                move |nodes, edges| {
                    t.deleted.borrow_mut().push((
                        nodes.iter().map(|n| n.id.clone()).collect(),
                        edges.iter().map(|e| e.id.clone()).collect(),
                    ))
                }
            })
            .on_node_click({
                let t = t.clone();
                move |id| t.node_clicks.borrow_mut().push(id.to_owned())
            })
            .on_edge_click({
                let t = t.clone();
                move |id| t.edge_clicks.borrow_mut().push(id.to_owned())
            })
            .on_pane_click({
                let t = t.clone();
                move |p| t.pane_clicks.borrow_mut().push(p)
            })
            .on_init(move || *t.inits.borrow_mut() += 1)
    }

    /// All node changes across batches, flattened.
    pub fn all_node_changes(&self) -> Vec<NodeChange> {
        self.node_changes.borrow().iter().flatten().cloned().collect()
    }

    pub fn all_edge_changes(&self) -> Vec<EdgeChange> {
        self.edge_changes.borrow().iter().flatten().cloned().collect()
    }

    /// Clear all recorded callbacks.
    pub fn clear(&self) {
        self.node_changes.borrow_mut().clear();
        self.edge_changes.borrow_mut().clear();
        self.connects.borrow_mut().clear();
        self.connect_starts.borrow_mut().clear();
        self.connect_ends.borrow_mut().clear();
        self.reconnect_ends.borrow_mut().clear();
        self.drag_starts.borrow_mut().clear();
        self.drag_stops.borrow_mut().clear();
        *self.drags.borrow_mut() = 0;
        self.selection_changes.borrow_mut().clear();
        self.viewport_changes.borrow_mut().clear();
        self.move_ends.borrow_mut().clear();
        self.errors.borrow_mut().clear();
        self.deleted.borrow_mut().clear();
        self.node_clicks.borrow_mut().clear();
        self.edge_clicks.borrow_mut().clear();
        self.pane_clicks.borrow_mut().clear();
        *self.inits.borrow_mut() = 0;
    }
}
