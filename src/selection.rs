//! Click and marquee selection.
//!
//! Every operation computes the wanted [`SelectionSet`] and hands it to
//! [`apply_selection`], which flips only the flags that differ and reports
//! exactly those flips as changes.

use crate::changes::{EdgeChange, NodeChange};
use crate::geometry::{Point, Rect, Viewport};
use crate::graph::EdgeStore;
use crate::hit_test::{nodes_inside, InsideQuery};
use crate::store::NodeStore;
use crate::types::{Edge, EdgeSelectionPolicy, SelectionMode, SelectionRect};
use indexmap::IndexSet;
use tracing::{debug, trace};

/// Flipped selection flags, in store order.
pub type SelectionChanges = (Vec<NodeChange>, Vec<EdgeChange>);

/// Selected node and edge ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pub nodes: IndexSet<String>,
    pub edges: IndexSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current flags from the stores.
    pub fn from_stores(nodes: &NodeStore, edges: &EdgeStore) -> Self {
        Self {
            nodes: nodes
                .iter()
                .filter(|n| n.node.selected)
                .map(|n| n.node.id.clone())
                .collect(),
            edges: edges.iter().filter(|e| e.selected).map(|e| e.id.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains(id)
    }

    fn only_node(&self, id: &str) -> bool {
        self.edges.is_empty() && self.nodes.len() == 1 && self.nodes.contains(id)
    }

    fn only_edge(&self, id: &str) -> bool {
        self.nodes.is_empty() && self.edges.len() == 1 && self.edges.contains(id)
    }
}

/// Sets every node and edge flag to match `target`.
pub fn apply_selection(target: &SelectionSet, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
    let node_ids: Vec<String> = nodes.ids().map(str::to_owned).collect();
    let node_changes = node_ids
        .into_iter()
        .filter_map(|id| {
            let selected = target.nodes.contains(&id);
            nodes.set_selected(&id, selected).then(|| NodeChange::select(&id, selected))
        })
        .collect();

    let edge_ids: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
    let edge_changes = edge_ids
        .into_iter()
        .filter_map(|id| {
            let selected = target.edges.contains(&id);
            edges.set_selected(&id, selected).then(|| EdgeChange::select(&id, selected))
        })
        .collect();

    (node_changes, edge_changes)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionOptions {
    pub mode: SelectionMode,
    pub edge_policy: EdgeSelectionPolicy,
    /// Default for nodes and edges without their own `selectable`.
    pub elements_selectable: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Full,
            edge_policy: EdgeSelectionPolicy::AnyEndpoint,
            elements_selectable: true,
        }
    }
}

/// Click and programmatic selection over the stores.
#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    options: SelectionOptions,
}

impl SelectionEngine {
    pub fn new(options: SelectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SelectionOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SelectionOptions) {
        self.options = options;
    }

    pub fn is_node_selectable(&self, nodes: &NodeStore, id: &str) -> bool {
        nodes
            .get(id)
            .is_some_and(|n| !n.node.hidden && n.node.selectable.unwrap_or(self.options.elements_selectable))
    }

    pub fn is_edge_selectable(&self, edges: &EdgeStore, id: &str) -> bool {
        edges
            .get(id)
            .is_some_and(|e| !e.hidden && e.selectable.unwrap_or(self.options.elements_selectable))
    }

    /// Selection after clicking a node.
    ///
    /// With `multi` the node is toggled. Otherwise the selection collapses to
    /// the node; clicking the only selected element changes nothing.
    pub fn click_node(&self, id: &str, multi: bool, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
        if !self.is_node_selectable(nodes, id) {
            return Default::default();
        }
        let mut target = SelectionSet::from_stores(nodes, edges);
        if multi {
            if !target.nodes.shift_remove(id) {
                target.nodes.insert(id.to_owned());
            }
        } else {
            if target.only_node(id) {
                return Default::default();
            }
            target = SelectionSet::new();
            target.nodes.insert(id.to_owned());
        }
        debug!(node = %id, multi, "node click selection");
        apply_selection(&target, nodes, edges)
    }

    /// Like [`Self::click_node`], for edges.
    pub fn click_edge(&self, id: &str, multi: bool, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
        if !self.is_edge_selectable(edges, id) {
            return Default::default();
        }
        let mut target = SelectionSet::from_stores(nodes, edges);
        if multi {
            if !target.edges.shift_remove(id) {
                target.edges.insert(id.to_owned());
            }
        } else {
            if target.only_edge(id) {
                return Default::default();
            }
            target = SelectionSet::new();
            target.edges.insert(id.to_owned());
        }
        debug!(edge = %id, multi, "edge click selection");
        apply_selection(&target, nodes, edges)
    }

    /// Selection on pointer-down before a drag.
    ///
    /// An already selected node keeps the whole selection so it can be
    /// dragged together; an unselected one is added (`multi`) or selected
    /// exclusively.
    pub fn select_for_drag(&self, id: &str, multi: bool, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
        let already = nodes.get(id).is_some_and(|n| n.node.selected);
        if already || !self.is_node_selectable(nodes, id) {
            return Default::default();
        }
        let mut target = if multi {
            SelectionSet::from_stores(nodes, edges)
        } else {
            SelectionSet::new()
        };
        target.nodes.insert(id.to_owned());
        apply_selection(&target, nodes, edges)
    }

    pub fn select_all(&self, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
        let default_selectable = self.options.elements_selectable;
        let target = SelectionSet {
            nodes: nodes
                .iter()
                .filter(|n| !n.node.hidden && n.node.selectable.unwrap_or(default_selectable))
                .map(|n| n.node.id.clone())
                .collect(),
            edges: edges
                .iter()
                .filter(|e| !e.hidden && e.selectable.unwrap_or(default_selectable))
                .map(|e| e.id.clone())
                .collect(),
        };
        apply_selection(&target, nodes, edges)
    }

    pub fn unselect_all(&self, nodes: &mut NodeStore, edges: &mut EdgeStore) -> SelectionChanges {
        apply_selection(&SelectionSet::new(), nodes, edges)
    }

    /// Replaces the selection with the given ids. Unknown ids are ignored.
    pub fn set_selection(
        &self,
        node_ids: &[String],
        edge_ids: &[String],
        nodes: &mut NodeStore,
        edges: &mut EdgeStore,
    ) -> SelectionChanges {
        let target = SelectionSet {
            nodes: node_ids.iter().filter(|id| nodes.contains(id)).cloned().collect(),
            edges: edge_ids.iter().filter(|id| edges.contains(id)).cloned().collect(),
        };
        apply_selection(&target, nodes, edges)
    }

    /// Starts a marquee at a screen point.
    ///
    /// An `additive` marquee keeps what was selected before; otherwise the
    /// selection is cleared first and those changes are returned.
    pub fn begin_marquee(
        &self,
        screen: Point,
        additive: bool,
        nodes: &mut NodeStore,
        edges: &mut EdgeStore,
    ) -> (Marquee, SelectionChanges) {
        let (prior, changes) = if additive {
            (SelectionSet::from_stores(nodes, edges), Default::default())
        } else {
            (SelectionSet::new(), self.unselect_all(nodes, edges))
        };
        debug!(x = screen.x, y = screen.y, additive, "marquee started");
        let marquee = Marquee {
            rect: SelectionRect::at(screen),
            prior,
            options: self.options,
            selection: SelectionSet::new(),
        };
        (marquee, changes)
    }
}

/// An in-progress marquee selection.
#[derive(Debug, Clone)]
pub struct Marquee {
    rect: SelectionRect,
    prior: SelectionSet,
    options: SelectionOptions,
    /// What the marquee itself currently covers.
    selection: SelectionSet,
}

impl Marquee {
    /// The rectangle in screen coordinates.
    pub fn rect(&self) -> SelectionRect {
        self.rect
    }

    pub fn covered(&self) -> &SelectionSet {
        &self.selection
    }

    fn edge_matches(&self, edge: &Edge, covered: &IndexSet<String>) -> bool {
        if edge.hidden || !edge.selectable.unwrap_or(self.options.elements_selectable) {
            return false;
        }
        let source = covered.contains(&edge.source);
        let target = covered.contains(&edge.target);
        match self.options.edge_policy {
            EdgeSelectionPolicy::AnyEndpoint => source || target,
            EdgeSelectionPolicy::BothEndpoints => source && target,
        }
    }

    /// Grows the rectangle towards `screen` and updates the selection.
    pub fn update(
        &mut self,
        screen: Point,
        viewport: &Viewport,
        nodes: &mut NodeStore,
        edges: &mut EdgeStore,
    ) -> SelectionChanges {
        self.rect = self.rect.extend_to(screen);
        let default_selectable = self.options.elements_selectable;

        let covered_nodes: IndexSet<String> = nodes_inside(
            nodes.iter(),
            self.rect.rect(),
            viewport,
            InsideQuery::marquee(self.options.mode),
        )
        .into_iter()
        .filter(|n| n.node.selectable.unwrap_or(default_selectable))
        .map(|n| n.node.id.clone())
        .collect();
        let covered_edges: IndexSet<String> = edges
            .iter()
            .filter(|e| self.edge_matches(e, &covered_nodes))
            .map(|e| e.id.clone())
            .collect();

        trace!(nodes = covered_nodes.len(), edges = covered_edges.len(), "marquee");
        self.selection = SelectionSet {
            nodes: covered_nodes,
            edges: covered_edges,
        };

        let mut target = self.prior.clone();
        target.nodes.extend(self.selection.nodes.iter().cloned());
        target.edges.extend(self.selection.edges.iter().cloned());
        apply_selection(&target, nodes, edges)
    }

    /// Ends the marquee. Returns whether any node ended up selected, in
    /// which case the host shows the selection group box.
    pub fn finish(self, nodes: &NodeStore) -> bool {
        let active = nodes.iter().any(|n| n.node.selected);
        debug!(active, "marquee finished");
        active
    }
}

/// Flow-space box around the selected nodes.
pub fn user_selection_rect(nodes: &NodeStore) -> Option<Rect> {
    nodes.bounds_where(|n| n.node.selected && !n.node.hidden)
}
