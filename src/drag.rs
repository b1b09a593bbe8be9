//! Node dragging and keyboard nudging.
//!
//! Pointer-down snapshots the absolute positions of everything that moves;
//! each move places every item at `start + delta`, snapped and clamped, in
//! one pass so the group moves atomically.

use crate::changes::NodeChange;
use crate::error::FlowError;
use crate::geometry::{bounds_of_rects, clamp_position, snap_position, CoordinateExtent, Dimensions, Point, Rect};
use crate::hit_test::NodeGeometry;
use crate::store::{InternalNode, NodeStore};
use crate::types::NodeExtent;
use tracing::{debug, trace};

/// Keyboard nudge step without a snap grid.
pub const NUDGE_STEP: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragContext {
    pub node_extent: CoordinateExtent,
    pub snap_grid: Option<(f32, f32)>,
    /// Screen distance the pointer must travel before the drag starts.
    pub threshold: f32,
    /// Default for nodes without an explicit `draggable`.
    pub nodes_draggable: bool,
}

impl Default for DragContext {
    fn default() -> Self {
        Self {
            node_extent: CoordinateExtent::INFINITE,
            snap_grid: None,
            threshold: 0.0,
            nodes_draggable: true,
        }
    }
}

/// What the pointer went down on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragTarget {
    /// A node; drags the whole selection when the node is part of it.
    Node(String),
    /// The box around the selected nodes.
    Selection,
}

#[derive(Debug, Clone)]
struct DragItem {
    id: String,
    start: Point,
    size: Dimensions,
    /// Extent from the node itself, in absolute coordinates.
    own_extent: Option<CoordinateExtent>,
    expand_parent: bool,
}

/// Result of one pointer move.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragStep {
    /// This move crossed the threshold.
    pub started: bool,
    pub changes: Vec<NodeChange>,
}

pub fn is_draggable(node: &InternalNode, nodes_draggable: bool) -> bool {
    !node.node.hidden && node.node.draggable.unwrap_or(nodes_draggable)
}

fn has_selected_ancestor(nodes: &NodeStore, id: &str) -> bool {
    let mut current = nodes.parent_of(id);
    while let Some(parent) = current {
        if parent.node.selected {
            return true;
        }
        current = nodes.parent_of(parent.id());
    }
    false
}

/// Absolute extent the node's top-left corner must stay in.
///
/// `extent: parent` needs a sized parent; without one the global extent
/// applies and a [`FlowError::NodeNotMeasured`] is reported.
pub(crate) fn node_extent(
    nodes: &NodeStore,
    internal: &InternalNode,
    global: CoordinateExtent,
    errors: &mut Vec<FlowError>,
) -> Option<CoordinateExtent> {
    let parent = nodes.parent_of(internal.id());
    match (&internal.node.extent, parent) {
        (Some(NodeExtent::Parent), Some(parent)) => match parent.rect() {
            Some(rect) => Some(CoordinateExtent::from_rect(rect)),
            None => {
                errors.push(FlowError::NodeNotMeasured {
                    node_id: parent.id().to_owned(),
                });
                (!global.is_infinite()).then_some(global)
            }
        },
        (Some(NodeExtent::Coordinate(extent)), Some(parent)) => Some(extent.offset(parent.position_absolute())),
        (Some(NodeExtent::Coordinate(extent)), None) => Some(*extent),
        _ => (!global.is_infinite()).then_some(global),
    }
}

#[derive(Debug, Clone)]
pub struct NodeDrag {
    target: DragTarget,
    items: Vec<DragItem>,
    /// Bounds of all items at start, for keeping a group inside the global extent.
    group: Option<Rect>,
    start_screen: Point,
    start_pointer: Point,
    active: bool,
}

impl NodeDrag {
    /// Collects the nodes that move. `None` when nothing is draggable.
    ///
    /// Nodes whose ancestor also moves are left to follow their parent.
    pub fn start(
        target: DragTarget,
        nodes: &NodeStore,
        pointer_screen: Point,
        pointer_flow: Point,
        ctx: &DragContext,
        errors: &mut Vec<FlowError>,
    ) -> Option<Self> {
        let clicked = match &target {
            DragTarget::Node(id) => Some(id.as_str()),
            DragTarget::Selection => None,
        };
        if let Some(id) = clicked {
            if !nodes.get(id).map_or(false, |n| is_draggable(n, ctx.nodes_draggable)) {
                debug!(node = %id, "node is not draggable");
                return None;
            }
        }

        let mut items = Vec::new();
        for internal in nodes.iter() {
            let id = internal.id();
            let picked = internal.node.selected || Some(id) == clicked;
            if !picked || !is_draggable(internal, ctx.nodes_draggable) || has_selected_ancestor(nodes, id) {
                continue;
            }
            let size = match internal.dimensions() {
                Some(size) => size,
                None => {
                    errors.push(FlowError::NodeNotMeasured { node_id: id.to_owned() });
                    Dimensions::default()
                }
            };
            let own_extent = match internal.node.extent {
                Some(_) => node_extent(nodes, internal, CoordinateExtent::INFINITE, errors),
                None => None,
            };
            items.push(DragItem {
                id: id.to_owned(),
                start: internal.position_absolute(),
                size,
                own_extent,
                expand_parent: internal.node.expand_parent,
            });
        }
        if items.is_empty() {
            return None;
        }

        let group = bounds_of_rects(items.iter().map(|i| Rect::from_position(i.start, i.size)));
        debug!(drag = ?target, nodes = items.len(), "drag pending");
        Some(Self {
            target,
            items,
            group,
            start_screen: pointer_screen,
            start_pointer: pointer_flow,
            active: false,
        })
    }

    pub fn target(&self) -> &DragTarget {
        &self.target
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ids of the moving nodes.
    pub fn node_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    /// Where an item goes for a pointer delta.
    fn place(&self, item: &DragItem, delta: Point, ctx: &DragContext) -> Point {
        let mut next = item.start + delta;
        if let Some(grid) = ctx.snap_grid {
            next = snap_position(next, grid);
        }
        if let Some(extent) = &item.own_extent {
            return clamp_position(next, extent, item.size);
        }
        if ctx.node_extent.is_infinite() {
            return next;
        }
        // In a group drag the whole group stays inside the global extent.
        let extent = match (self.items.len() > 1, self.group) {
            (true, Some(group)) => CoordinateExtent::new(
                item.start.x - group.x + ctx.node_extent.min.x,
                item.start.y - group.y + ctx.node_extent.min.y,
                item.start.x + item.size.width - (group.x + group.width) + ctx.node_extent.max.x,
                item.start.y + item.size.height - (group.y + group.height) + ctx.node_extent.max.y,
            ),
            _ => ctx.node_extent,
        };
        clamp_position(next, &extent, item.size)
    }

    /// Follows the pointer.
    pub fn update(&mut self, pointer_screen: Point, pointer_flow: Point, nodes: &mut NodeStore, ctx: &DragContext) -> DragStep {
        let mut step = DragStep::default();
        if !self.active {
            if pointer_screen.distance(self.start_screen) <= ctx.threshold {
                return step;
            }
            self.active = true;
            step.started = true;
            debug!(drag = ?self.target, "drag started");
        }

        let delta = pointer_flow - self.start_pointer;
        let mut expanded = Vec::new();
        for item in &self.items {
            let next = self.place(item, delta, ctx);
            let Some(current) = nodes.get(&item.id) else { continue };
            if current.position_absolute() == next && current.node.dragging {
                continue;
            }
            nodes.set_position_absolute(&item.id, next);
            nodes.set_dragging(&item.id, true);
            let Some(moved) = nodes.get(&item.id) else { continue };
            step.changes.push(NodeChange::position(
                &item.id,
                moved.node.position,
                moved.position_absolute(),
                Some(true),
            ));
            if item.expand_parent {
                expanded.push(item.id.clone());
            }
        }
        step.changes.extend(nodes.expand_parents(&expanded));
        trace!(dx = delta.x, dy = delta.y, changes = step.changes.len(), "drag");
        step
    }

    /// Ends the drag; emits the `dragging: false` changes of a drag that started.
    pub fn finish(self, nodes: &mut NodeStore) -> Vec<NodeChange> {
        if !self.active {
            return Vec::new();
        }
        debug!(drag = ?self.target, "drag stopped");
        self.items
            .iter()
            .filter_map(|item| {
                nodes.set_dragging(&item.id, false);
                let node = nodes.get(&item.id)?;
                Some(NodeChange::position(
                    &item.id,
                    node.node.position,
                    node.position_absolute(),
                    Some(false),
                ))
            })
            .collect()
    }
}

/// Moves the selected nodes by `direction` steps of 5px (or one grid cell)
/// times `factor`.
pub fn move_selected_nodes(
    direction: Point,
    factor: f32,
    nodes: &mut NodeStore,
    ctx: &DragContext,
    errors: &mut Vec<FlowError>,
) -> Vec<NodeChange> {
    let (step_x, step_y) = ctx.snap_grid.unwrap_or((NUDGE_STEP, NUDGE_STEP));
    let diff = Point::new(direction.x * step_x * factor, direction.y * step_y * factor);

    let store: &NodeStore = nodes;
    let moving: Vec<(String, Point, Option<CoordinateExtent>, Dimensions, bool)> = store
        .iter()
        .filter(|n| n.node.selected && is_draggable(n, ctx.nodes_draggable) && !has_selected_ancestor(store, n.id()))
        .map(|n| {
            (
                n.id().to_owned(),
                n.position_absolute(),
                node_extent(store, n, ctx.node_extent, errors),
                n.size(),
                n.node.expand_parent,
            )
        })
        .collect();

    let mut changes = Vec::new();
    let mut expanded = Vec::new();
    for (id, position, extent, size, expand_parent) in moving {
        let mut next = position + diff;
        if let Some(grid) = ctx.snap_grid {
            next = snap_position(next, grid);
        }
        if let Some(extent) = extent {
            next = clamp_position(next, &extent, size);
        }
        if next == position {
            continue;
        }
        nodes.set_position_absolute(&id, next);
        if let Some(moved) = nodes.get(&id) {
            changes.push(NodeChange::position(&id, moved.node.position, moved.position_absolute(), None));
        }
        if expand_parent {
            expanded.push(id);
        }
    }
    changes.extend(nodes.expand_parents(&expanded));
    changes
}
