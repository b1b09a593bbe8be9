//! Internal node registry.
//!
//! [`NodeStore`] adopts the host's [`Node`]s into [`InternalNode`]s with a
//! resolved absolute position, measured size, z-index and handle cache, and
//! keeps a parent → children index. Measurements reported by the rendering
//! layer go through an [`UpdateQueue`] that is drained once per frame.

use crate::changes::NodeChange;
use crate::error::FlowError;
use crate::geometry::{bounds_of_rects, clamp_position, CoordinateExtent, Dimensions, Point, Rect};
use crate::hit_test::{HandleAnchor, NodeGeometry};
use crate::types::{HandleBounds, HandleType, Node, NodeExtent};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Added to the z-index of selected nodes when elevation is on.
pub const SELECTED_Z_OFFSET: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdoptOptions {
    /// Fraction of the node size the position refers to; `(0, 0)` is top-left.
    pub node_origin: (f32, f32),
    pub node_extent: CoordinateExtent,
    pub elevate_on_select: bool,
    /// Reuse the internal entry of nodes equal to their previous version.
    pub check_equality: bool,
}

impl Default for AdoptOptions {
    fn default() -> Self {
        Self {
            node_origin: (0.0, 0.0),
            node_extent: CoordinateExtent::INFINITE,
            elevate_on_select: true,
            check_equality: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInternals {
    pub position_absolute: Point,
    pub z: i32,
    pub handle_bounds: Option<HandleBounds>,
    pub is_parent: bool,
    /// Resolved parent; `None` for roots and for nodes whose parent is missing or cyclic.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalNode {
    /// The user node. `measured` and `handles` are kept in sync with the internals.
    pub node: Node,
    pub measured: Option<Dimensions>,
    pub internals: NodeInternals,
}

impl InternalNode {
    pub fn new(node: Node) -> Self {
        let handle_bounds = node.handles.clone().map(HandleBounds::from_handles);
        Self {
            measured: node.measured,
            internals: NodeInternals {
                handle_bounds,
                ..Default::default()
            },
            node,
        }
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Measured size, else the user-set size.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.measured.or_else(|| self.node.dimensions())
    }

    pub fn size(&self) -> Dimensions {
        self.dimensions().unwrap_or_default()
    }

    pub fn is_measured(&self) -> bool {
        self.measured.is_some()
    }

    pub fn position_absolute(&self) -> Point {
        self.internals.position_absolute
    }

    /// Absolute rect; zero-sized while the size is unknown.
    pub fn abs_rect(&self) -> Rect {
        Rect::from_position(self.internals.position_absolute, self.size())
    }

    pub fn handle_bounds(&self) -> Option<&HandleBounds> {
        self.internals.handle_bounds.as_ref()
    }

    /// All handles of the node in absolute coordinates.
    pub fn anchors(&self) -> impl Iterator<Item = HandleAnchor> + '_ {
        let origin = self.internals.position_absolute;
        self.internals
            .handle_bounds
            .iter()
            .flat_map(|b| b.iter())
            .map(move |h| HandleAnchor::from_handle(h, origin))
    }

    /// The handle of `handle_type` addressed by `handle_id`; `None` picks the first one.
    pub fn find_handle(&self, handle_type: HandleType, handle_id: Option<&str>) -> Option<HandleAnchor> {
        self.handle_bounds()?
            .of_type(handle_type)
            .iter()
            .find(|h| h.matches(handle_id))
            .map(|h| HandleAnchor::from_handle(h, self.internals.position_absolute))
    }
}

impl NodeGeometry for InternalNode {
    fn id(&self) -> &str {
        &self.node.id
    }
    fn rect(&self) -> Option<Rect> {
        self.dimensions()
            .map(|d| Rect::from_position(self.internals.position_absolute, d))
    }
    fn is_hidden(&self) -> bool {
        self.node.hidden
    }
    fn is_selectable(&self) -> bool {
        self.node.selectable.unwrap_or(true)
    }
}

/// A pending measurement for one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalsUpdate {
    pub dimensions: Option<Dimensions>,
    pub handle_bounds: Option<HandleBounds>,
    /// Recompute derived state even when nothing was measured.
    pub force: bool,
}

impl InternalsUpdate {
    fn merge(&mut self, other: InternalsUpdate) {
        if other.dimensions.is_some() {
            self.dimensions = other.dimensions;
        }
        if other.handle_bounds.is_some() {
            self.handle_bounds = other.handle_bounds;
        }
        self.force |= other.force;
    }
}

/// Measurement requests keyed by node id; later requests overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    pending: IndexMap<String, InternalsUpdate>,
}

impl UpdateQueue {
    pub fn push(&mut self, id: &str, update: InternalsUpdate) {
        match self.pending.get_mut(id) {
            Some(existing) => existing.merge(update),
            None => {
                self.pending.insert(id.to_owned(), update);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<(String, InternalsUpdate)> {
        self.pending.drain(..).collect()
    }
}

/// Parent state needed to place a child.
#[derive(Debug, Clone, Copy)]
struct ParentFrame {
    position: Point,
    z: i32,
    dimensions: Option<Dimensions>,
}

#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: IndexMap<String, InternalNode>,
    children: IndexMap<String, IndexSet<String>>,
    options: AdoptOptions,
    queue: UpdateQueue,
    all_measured: bool,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from `nodes`.
    ///
    /// Duplicate ids keep the last occurrence. Measurements and handle bounds
    /// of surviving ids carry over unless the incoming node brings its own.
    /// Returns whether every visible node is measured.
    pub fn adopt(&mut self, nodes: Vec<Node>, options: AdoptOptions, errors: &mut Vec<FlowError>) -> bool {
        let previous = std::mem::take(&mut self.nodes);
        self.options = options;

        let mut next: IndexMap<String, InternalNode> = IndexMap::with_capacity(nodes.len());
        for node in nodes {
            if next.contains_key(&node.id) {
                errors.push(FlowError::DuplicateNode { id: node.id.clone() });
            }
            let internal = match previous.get(&node.id) {
                Some(prev) if options.check_equality && prev.node == node => prev.clone(),
                Some(prev) => {
                    let mut internal = InternalNode::new(node);
                    if internal.measured.is_none() {
                        internal.measured = prev.measured;
                        internal.node.measured = prev.measured;
                    }
                    if internal.internals.handle_bounds.is_none() {
                        internal.internals.handle_bounds = prev.internals.handle_bounds.clone();
                        internal.node.handles = prev.node.handles.clone();
                    }
                    internal
                }
                None => InternalNode::new(node),
            };
            next.insert(internal.node.id.clone(), internal);
        }

        self.nodes = next;
        self.resolve_parents(errors);
        self.refresh_all();
        self.update_all_measured();
        debug!(nodes = self.nodes.len(), all_measured = self.all_measured, "adopted nodes");
        self.all_measured
    }

    /// Validates every `parent_id` and rebuilds the children index.
    fn resolve_parents(&mut self, errors: &mut Vec<FlowError>) {
        self.children.clear();

        let mut resolved: Vec<(String, Option<String>)> = Vec::with_capacity(self.nodes.len());
        for (id, internal) in &self.nodes {
            let Some(parent_id) = internal.node.parent_id.as_deref() else {
                resolved.push((id.clone(), None));
                continue;
            };
            if !self.nodes.contains_key(parent_id) {
                errors.push(FlowError::MissingParent {
                    node_id: id.clone(),
                    parent_id: parent_id.to_owned(),
                });
                resolved.push((id.clone(), None));
                continue;
            }
            if self.is_in_parent_cycle(id) {
                errors.push(FlowError::ParentCycle { node_id: id.clone() });
                resolved.push((id.clone(), None));
                continue;
            }
            resolved.push((id.clone(), Some(parent_id.to_owned())));
        }

        for (id, parent) in resolved {
            if let Some(parent_id) = &parent {
                self.children
                    .entry(parent_id.clone())
                    .or_default()
                    .insert(id.clone());
            }
            if let Some(internal) = self.nodes.get_mut(&id) {
                internal.internals.parent = parent;
            }
        }

        for (id, internal) in self.nodes.iter_mut() {
            internal.internals.is_parent = self.children.contains_key(id);
        }
    }

    /// Does walking up the declared parents from `id` come back to `id`?
    fn is_in_parent_cycle(&self, id: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = self.nodes.get(id).and_then(|n| n.node.parent_id.as_deref());
        while let Some(ancestor) = current {
            if ancestor == id {
                return true;
            }
            if !visited.insert(ancestor) {
                return false;
            }
            current = self
                .nodes
                .get(ancestor)
                .and_then(|n| n.node.parent_id.as_deref());
        }
        false
    }

    fn parent_frame(&self, id: &str) -> Option<ParentFrame> {
        let parent_id = self.nodes.get(id)?.internals.parent.as_deref()?;
        let parent = self.nodes.get(parent_id)?;
        Some(ParentFrame {
            position: parent.internals.position_absolute,
            z: parent.internals.z,
            dimensions: parent.dimensions(),
        })
    }

    /// Absolute position and z of a node placed inside `parent`.
    fn place(&self, internal: &InternalNode, parent: Option<ParentFrame>) -> (Point, i32) {
        let origin = internal.node.origin.unwrap_or(self.options.node_origin);
        let size = internal.size();
        let parent_position = parent.map_or(Point::ZERO, |p| p.position);
        let mut position = parent_position + internal.node.position
            - Point::new(origin.0 * size.width, origin.1 * size.height);

        let extent = match internal.node.extent {
            Some(NodeExtent::Parent) => parent.and_then(|p| {
                p.dimensions
                    .map(|d| CoordinateExtent::from_rect(Rect::from_position(p.position, d)))
            }),
            Some(NodeExtent::Coordinate(extent)) if parent.is_some() => Some(extent.offset(parent_position)),
            Some(NodeExtent::Coordinate(extent)) => Some(extent),
            None => (!self.options.node_extent.is_infinite()).then_some(self.options.node_extent),
        };
        if let Some(extent) = extent {
            position = clamp_position(position, &extent, size);
        }

        let elevation = if internal.node.selected && self.options.elevate_on_select {
            SELECTED_Z_OFFSET
        } else {
            0
        };
        let own_z = internal.node.z_index.unwrap_or(0) + elevation;
        let z = match parent {
            Some(p) if p.z >= own_z => p.z + 1,
            _ => own_z,
        };
        (position, z)
    }

    fn refresh_all(&mut self) {
        let roots: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.internals.parent.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for root in roots {
            self.refresh_subtree(&root);
        }
    }

    /// Recomputes absolute position and z of `id` and all its descendants.
    pub fn refresh_subtree(&mut self, id: &str) {
        let mut stack = vec![id.to_owned()];
        while let Some(current) = stack.pop() {
            let parent = self.parent_frame(&current);
            let Some(internal) = self.nodes.get(&current) else {
                continue;
            };
            let (position, z) = self.place(internal, parent);
            if let Some(internal) = self.nodes.get_mut(&current) {
                internal.internals.position_absolute = position;
                internal.internals.z = z;
            }
            if let Some(children) = self.children.get(&current) {
                stack.extend(children.iter().rev().cloned());
            }
        }
    }

    fn update_all_measured(&mut self) {
        // An empty store has nothing to fit yet.
        self.all_measured = !self.nodes.is_empty()
            && self
                .nodes
                .values()
                .all(|n| n.node.hidden || n.measured.is_some());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&InternalNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut InternalNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InternalNode> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn options(&self) -> &AdoptOptions {
        &self.options
    }

    pub fn all_measured(&self) -> bool {
        self.all_measured
    }

    /// User nodes in insertion order, with measurements mirrored in.
    pub fn user_nodes(&self) -> Vec<Node> {
        self.nodes.values().map(|n| n.node.clone()).collect()
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &str> {
        self.children
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn parent_of(&self, id: &str) -> Option<&InternalNode> {
        let parent_id = self.nodes.get(id)?.internals.parent.as_deref()?;
        self.nodes.get(parent_id)
    }

    /// All descendants of `id`, parents before children.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self.children(id).collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current.to_owned());
            let mut next: Vec<&str> = self.children(current).collect();
            next.reverse();
            stack.extend(next);
        }
        out
    }

    pub fn is_descendant_of(&self, id: &str, ancestor: &str) -> bool {
        let mut current = self.nodes.get(id).and_then(|n| n.internals.parent.as_deref());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|n| n.internals.parent.as_deref());
        }
        false
    }

    /// Bounds of the sized nodes matching `filter`.
    pub fn bounds_where<F>(&self, filter: F) -> Option<Rect>
    where
        F: Fn(&InternalNode) -> bool,
    {
        bounds_of_rects(
            self.nodes
                .values()
                .filter(|n| filter(n))
                .filter_map(|n| n.rect()),
        )
    }

    /// Bounds of all visible nodes.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds_where(|n| !n.node.hidden)
    }

    /// Bounds of the given ids.
    pub fn bounds_of(&self, ids: &[String]) -> Option<Rect> {
        bounds_of_rects(ids.iter().filter_map(|id| self.nodes.get(id)?.rect()))
    }

    /// Converts an absolute position into a position relative to the node's parent.
    pub fn relative_position(&self, id: &str, position_absolute: Point) -> Point {
        let Some(internal) = self.nodes.get(id) else {
            return position_absolute;
        };
        let origin = internal.node.origin.unwrap_or(self.options.node_origin);
        let size = internal.size();
        let parent_position = self
            .parent_of(id)
            .map_or(Point::ZERO, |p| p.internals.position_absolute);
        position_absolute - parent_position + Point::new(origin.0 * size.width, origin.1 * size.height)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Sets the parent-relative position and refreshes the subtree.
    pub fn set_position(&mut self, id: &str, position: Point) -> bool {
        let Some(internal) = self.nodes.get_mut(id) else {
            return false;
        };
        internal.node.position = position;
        self.refresh_subtree(id);
        true
    }

    pub fn set_position_absolute(&mut self, id: &str, position_absolute: Point) -> bool {
        let relative = self.relative_position(id, position_absolute);
        self.set_position(id, relative)
    }

    /// Returns whether the flag flipped.
    pub fn set_selected(&mut self, id: &str, selected: bool) -> bool {
        let Some(internal) = self.nodes.get_mut(id) else {
            return false;
        };
        if internal.node.selected == selected {
            return false;
        }
        internal.node.selected = selected;
        if self.options.elevate_on_select {
            self.refresh_subtree(id);
        }
        true
    }

    pub fn set_dragging(&mut self, id: &str, dragging: bool) {
        if let Some(internal) = self.nodes.get_mut(id) {
            internal.node.dragging = dragging;
        }
    }

    pub fn set_resizing(&mut self, id: &str, resizing: bool) {
        if let Some(internal) = self.nodes.get_mut(id) {
            internal.node.resizing = resizing;
        }
    }

    /// Stores a size; with `set_attributes` it also becomes the user-set size.
    pub fn set_dimensions(&mut self, id: &str, dimensions: Dimensions, set_attributes: bool) -> bool {
        let Some(internal) = self.nodes.get_mut(id) else {
            return false;
        };
        internal.measured = Some(dimensions);
        internal.node.measured = Some(dimensions);
        if set_attributes {
            internal.node.width = Some(dimensions.width);
            internal.node.height = Some(dimensions.height);
        }
        self.refresh_subtree(id);
        self.update_all_measured();
        true
    }

    /// Records a size reported by the rendering layer. Returns whether it changed.
    pub fn report_measured(&mut self, id: &str, dimensions: Dimensions) -> bool {
        match self.nodes.get(id) {
            Some(internal) if internal.measured == Some(dimensions) => false,
            Some(_) => self.set_dimensions(id, dimensions, false),
            None => false,
        }
    }

    pub fn set_handle_bounds(&mut self, id: &str, bounds: HandleBounds) -> bool {
        let Some(internal) = self.nodes.get_mut(id) else {
            return false;
        };
        internal.node.handles = Some(bounds.iter().cloned().collect());
        internal.internals.handle_bounds = Some(bounds);
        true
    }

    /// Removes the given nodes and all their descendants. Returns every removed id.
    pub fn remove(&mut self, ids: &[String]) -> Vec<String> {
        let mut doomed: IndexSet<String> = IndexSet::new();
        for id in ids {
            if !self.nodes.contains_key(id) {
                continue;
            }
            doomed.insert(id.clone());
            doomed.extend(self.descendants(id));
        }
        for id in &doomed {
            self.nodes.shift_remove(id);
        }
        for children in self.children.values_mut() {
            children.retain(|c| !doomed.contains(c));
        }
        self.children.retain(|parent, set| !doomed.contains(parent) && !set.is_empty());
        for (id, internal) in self.nodes.iter_mut() {
            internal.internals.is_parent = self.children.contains_key(id);
        }
        self.update_all_measured();
        doomed.into_iter().collect()
    }

    /// Grows the parents of `expandParent` children so the children fit.
    ///
    /// A child sticking out on the left or top moves the parent instead and
    /// shifts the parent's children back so their absolute positions stay
    /// put. Growth cascades to grandparents.
    pub fn expand_parents(&mut self, child_ids: &[String]) -> Vec<NodeChange> {
        let mut changes = Vec::new();
        let mut pending: Vec<String> = child_ids.to_vec();

        while !pending.is_empty() {
            let mut expanded: IndexMap<String, Rect> = IndexMap::new();
            for child_id in &pending {
                let Some(child) = self.nodes.get(child_id) else { continue };
                if !child.node.expand_parent {
                    continue;
                }
                let Some(parent) = self.parent_of(child_id) else { continue };
                let Some(parent_rect) = parent.rect() else { continue };
                let parent_id = parent.node.id.clone();
                let base = expanded.get(&parent_id).copied().unwrap_or(parent_rect);
                let grown = bounds_of_rects([base, child.abs_rect()]).unwrap_or(base);
                expanded.insert(parent_id, grown);
            }

            let mut next = Vec::new();
            for (parent_id, rect) in expanded {
                let Some(parent) = self.nodes.get(&parent_id) else { continue };
                let current = parent.abs_rect();
                let x_change = (current.x - rect.x).max(0.0);
                let y_change = (current.y - rect.y).max(0.0);
                let width = current.width.max(rect.width);
                let height = current.height.max(rect.height);
                if x_change <= 0.0 && y_change <= 0.0 && width <= current.width && height <= current.height {
                    continue;
                }
                trace!(parent = %parent_id, width, height, x_change, y_change, "expanding parent");

                if x_change > 0.0 || y_change > 0.0 {
                    let shift = Point::new(x_change, y_change);
                    let position = parent.node.position - shift;
                    self.set_position(&parent_id, position);
                    let position_absolute = self.nodes.get(&parent_id).map_or(Point::ZERO, |p| p.position_absolute());
                    changes.push(NodeChange::position(&parent_id, position, position_absolute, None));

                    let children: Vec<String> = self.children(&parent_id).map(str::to_owned).collect();
                    for child_id in children {
                        let Some(child) = self.nodes.get(&child_id) else { continue };
                        let position = child.node.position + shift;
                        self.set_position(&child_id, position);
                        let position_absolute = self.nodes.get(&child_id).map_or(Point::ZERO, |c| c.position_absolute());
                        changes.push(NodeChange::position(&child_id, position, position_absolute, None));
                    }
                }

                let dimensions = Dimensions::new(width, height);
                self.set_dimensions(&parent_id, dimensions, true);
                changes.push(NodeChange::Dimensions {
                    id: parent_id.clone(),
                    dimensions: Some(dimensions),
                    resizing: None,
                    set_attributes: true,
                });
                next.push(parent_id);
            }
            pending = next;
        }

        changes
    }

    // ------------------------------------------------------------------
    // Deferred measurement
    // ------------------------------------------------------------------

    pub fn queue_measurement(&mut self, id: &str, dimensions: Dimensions) {
        self.queue.push(
            id,
            InternalsUpdate {
                dimensions: Some(dimensions),
                ..Default::default()
            },
        );
    }

    pub fn queue_handle_bounds(&mut self, id: &str, bounds: HandleBounds) {
        self.queue.push(
            id,
            InternalsUpdate {
                handle_bounds: Some(bounds),
                ..Default::default()
            },
        );
    }

    /// Schedules a recompute of the given nodes' derived state.
    pub fn request_internals_update(&mut self, ids: &[String]) {
        for id in ids {
            self.queue.push(
                id,
                InternalsUpdate {
                    force: true,
                    ..Default::default()
                },
            );
        }
    }

    pub fn has_pending_updates(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Applies all queued updates once, merged per id.
    ///
    /// Returns the resulting changes (dimension changes plus parent
    /// expansion) and the ids whose derived state changed.
    pub fn flush_updates(&mut self) -> (Vec<NodeChange>, Vec<String>) {
        let mut changes = Vec::new();
        let mut updated = Vec::new();
        let mut resized = Vec::new();

        for (id, update) in self.queue.drain() {
            let Some(internal) = self.nodes.get(&id) else {
                trace!(node = %id, "dropping update for unknown node");
                continue;
            };
            let mut touched = update.force;

            if let Some(dimensions) = update.dimensions {
                if internal.measured != Some(dimensions) {
                    self.set_dimensions(&id, dimensions, false);
                    changes.push(NodeChange::Dimensions {
                        id: id.clone(),
                        dimensions: Some(dimensions),
                        resizing: None,
                        set_attributes: false,
                    });
                    resized.push(id.clone());
                    touched = true;
                }
            }
            if let Some(bounds) = update.handle_bounds {
                self.set_handle_bounds(&id, bounds);
                touched = true;
            }
            if update.force {
                self.refresh_subtree(&id);
            }
            if touched {
                updated.push(id);
            }
        }

        changes.extend(self.expand_parents(&resized));
        self.update_all_measured();
        (changes, updated)
    }
}
