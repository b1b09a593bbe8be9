//! Edge geometry: resolves each edge's handles to absolute anchors, builds
//! its path and culls it against the viewport.
//!
//! [`EdgeGeometryEngine`] is memoized on the node, edge and viewport
//! revisions. Edges whose endpoints, kind and flags did not change keep the
//! same `Rc<EdgeLayout>` across recomputes, so a renderer can skip them by
//! pointer identity.

use crate::error::FlowError;
use crate::geometry::{bounds_of_rects, Dimensions, Point, Position, Rect, Viewport};
use crate::hit_test::{find_edge_at, nodes_inside, HandleAnchor, InsideQuery};
use crate::path::{edge_path, EdgePath, PathEndpoints};
use crate::store::{InternalNode, NodeStore, SELECTED_Z_OFFSET};
use crate::graph::EdgeStore;
use crate::types::{Edge, EdgeKind, EdgePathOptions, HandleType};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::trace;

/// Change counters the edge layouts are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub nodes: u64,
    pub edges: u64,
    pub viewport: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeGeometryOptions {
    /// Cull edges outside this flow-space rect.
    pub visible_rect: Option<Rect>,
    pub elevate_on_select: bool,
}

/// Everything a renderer needs to draw one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub endpoints: PathEndpoints,
    pub path: EdgePath,
    pub z: i32,
    pub selected: bool,
    pub animated: bool,
    pub label: Option<String>,
    /// Union of the source and target node rects.
    pub node_bounds: Rect,
    path_options: EdgePathOptions,
}

impl EdgeLayout {
    /// Bounding box of the two endpoints, at least one unit on each axis.
    pub fn bounds(&self) -> Rect {
        let s = self.endpoints.source;
        let t = self.endpoints.target;
        let mut rect = Rect::from_corners(s, t);
        if rect.width == 0.0 {
            rect.width = 1.0;
        }
        if rect.height == 0.0 {
            rect.height = 1.0;
        }
        rect
    }

    /// Rect used for viewport culling. Routed paths bend outside the
    /// endpoint box but stay within the rects of the two nodes.
    pub fn visibility_bounds(&self) -> Rect {
        self.node_bounds.to_box().union(self.bounds().to_box()).to_rect()
    }
}

/// Stand-in handle for nodes that report no handles: bottom center for
/// sources, top center for targets.
pub fn fallback_anchor(node: &InternalNode, handle_type: HandleType) -> HandleAnchor {
    let rect = node.abs_rect();
    let (point, position) = match handle_type {
        HandleType::Source => (Point::new(rect.x + rect.width / 2.0, rect.y + rect.height), Position::Bottom),
        HandleType::Target => (Point::new(rect.x + rect.width / 2.0, rect.y), Position::Top),
    };
    HandleAnchor {
        node_id: node.node.id.clone(),
        id: None,
        handle_type,
        position,
        rect: Rect::from_position(point, Dimensions::default()),
    }
}

/// Resolves the handle an edge end refers to.
///
/// A node without handles of that type uses [`fallback_anchor`]. A single
/// handle always matches; with several, `handle_id` selects one (`None`
/// picks the first). Returns `None` when the requested handle is missing.
pub fn resolve_anchor(node: &InternalNode, handle_type: HandleType, handle_id: Option<&str>) -> Option<HandleAnchor> {
    let handles = node.handle_bounds().map_or(&[][..], |b| b.of_type(handle_type));
    if handles.is_empty() {
        return Some(fallback_anchor(node, handle_type));
    }
    let handle = if handles.len() == 1 {
        handles.first()
    } else {
        handles.iter().find(|h| h.matches(handle_id))
    };
    handle.map(|h| HandleAnchor::from_handle(h, node.position_absolute()))
}

/// z-index of an edge; selected edges, or edges of selected nodes, rise
/// above the nodes they connect.
pub fn edge_z_index(edge: &Edge, source: &InternalNode, target: &InternalNode, elevate_on_select: bool) -> i32 {
    let z = edge.z_index.unwrap_or(0);
    if !elevate_on_select {
        return z;
    }
    let elevated = edge.selected || source.node.selected || target.node.selected;
    if elevated {
        z + source.internals.z.max(target.internals.z).max(SELECTED_Z_OFFSET)
    } else {
        z
    }
}

/// Lays out one edge, reusing `previous` when nothing it depends on changed.
///
/// `None` for edges that are not drawn; `Err` when a handle is missing.
fn layout_edge(
    edge: &Edge,
    nodes: &NodeStore,
    elevate_on_select: bool,
    previous: Option<Rc<EdgeLayout>>,
) -> Option<Result<(Rc<EdgeLayout>, bool), FlowError>> {
    let source = nodes.get(&edge.source)?;
    let target = nodes.get(&edge.target)?;
    if edge.hidden || source.node.hidden || target.node.hidden {
        return None;
    }

    let Some(from) = resolve_anchor(source, HandleType::Source, edge.source_handle.as_deref()) else {
        return Some(Err(FlowError::MissingHandle {
            edge_id: edge.id.clone(),
            node_id: edge.source.clone(),
            handle: edge.source_handle.clone().unwrap_or_default(),
        }));
    };
    let Some(to) = resolve_anchor(target, HandleType::Target, edge.target_handle.as_deref()) else {
        return Some(Err(FlowError::MissingHandle {
            edge_id: edge.id.clone(),
            node_id: edge.target.clone(),
            handle: edge.target_handle.clone().unwrap_or_default(),
        }));
    };

    let endpoints = PathEndpoints::new(from.anchor(), from.position, to.anchor(), to.position);
    let path_options = edge.path_options.unwrap_or_default();
    let z = edge_z_index(edge, source, target, elevate_on_select);
    let node_bounds = source.abs_rect().to_box().union(target.abs_rect().to_box()).to_rect();

    if let Some(prev) = previous {
        let unchanged = prev.kind == edge.kind
            && prev.endpoints == endpoints
            && prev.path_options == path_options
            && prev.source == edge.source
            && prev.target == edge.target
            && prev.z == z
            && prev.node_bounds == node_bounds
            && prev.selected == edge.selected
            && prev.animated == edge.animated
            && prev.label == edge.label;
        if unchanged {
            return Some(Ok((prev, true)));
        }
    }

    let layout = EdgeLayout {
        id: edge.id.clone(),
        source: edge.source.clone(),
        target: edge.target.clone(),
        kind: edge.kind,
        path: edge_path(edge.kind, &endpoints, &path_options),
        endpoints,
        z,
        selected: edge.selected,
        animated: edge.animated,
        label: edge.label.clone(),
        node_bounds,
        path_options,
    };
    Some(Ok((Rc::new(layout), false)))
}

/// Memoized per-edge layouts.
#[derive(Debug, Default)]
pub struct EdgeGeometryEngine {
    layouts: IndexMap<String, Rc<EdgeLayout>>,
    visible: Vec<Rc<EdgeLayout>>,
    computed_for: Option<(Revisions, EdgeGeometryOptions)>,
}

impl EdgeGeometryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes layouts unless `revisions` and `options` are unchanged.
    ///
    /// Edges with a missing handle are skipped and reported in `errors`.
    /// Returns whether anything was recomputed.
    pub fn update(
        &mut self,
        nodes: &NodeStore,
        edges: &EdgeStore,
        revisions: Revisions,
        options: EdgeGeometryOptions,
        errors: &mut Vec<FlowError>,
    ) -> bool {
        if self.computed_for == Some((revisions, options)) {
            return false;
        }

        let mut previous = std::mem::take(&mut self.layouts);
        let mut reused = 0usize;
        for edge in edges.iter() {
            let prev = previous.swap_remove(&edge.id);
            match layout_edge(edge, nodes, options.elevate_on_select, prev) {
                Some(Ok((layout, was_reused))) => {
                    reused += usize::from(was_reused);
                    self.layouts.insert(edge.id.clone(), layout);
                }
                Some(Err(err)) => errors.push(err),
                None => {}
            }
        }

        self.visible = match options.visible_rect {
            Some(view) => self
                .layouts
                .values()
                .filter(|l| l.visibility_bounds().intersects(&view))
                .cloned()
                .collect(),
            None => self.layouts.values().cloned().collect(),
        };
        self.computed_for = Some((revisions, options));
        trace!(
            edges = self.layouts.len(),
            visible = self.visible.len(),
            reused,
            "edge layouts"
        );
        true
    }

    /// Forces the next [`update`](Self::update) to recompute.
    pub fn invalidate(&mut self) {
        self.computed_for = None;
    }

    /// Edges to draw, in edge order.
    pub fn visible(&self) -> &[Rc<EdgeLayout>] {
        &self.visible
    }

    /// Layout of any renderable edge, culled or not.
    pub fn layout(&self, id: &str) -> Option<&Rc<EdgeLayout>> {
        self.layouts.get(id)
    }

    /// Bounds of the given edges' endpoints.
    pub fn bounds_of(&self, ids: &[String]) -> Option<Rect> {
        bounds_of_rects(ids.iter().filter_map(|id| self.layouts.get(id)).map(|l| l.bounds()))
    }

    /// Closest visible edge to a flow-space point.
    pub fn edge_at(&self, pointer: Point, max_distance: f32, samples: usize) -> Option<&str> {
        find_edge_at(
            pointer,
            self.visible.iter().map(|l| (l.id.as_str(), &l.path)),
            max_distance,
            samples,
        )
    }
}

/// Nodes to draw: every visible node, or only those on screen when
/// `surface` is given.
pub fn visible_nodes<'a>(nodes: &'a NodeStore, viewport: &Viewport, surface: Option<Dimensions>) -> Vec<&'a InternalNode> {
    match surface {
        Some(s) => nodes_inside(
            nodes.iter(),
            Rect::new(0.0, 0.0, s.width, s.height),
            viewport,
            InsideQuery::visibility(),
        ),
        None => nodes.iter().filter(|n| !n.node.hidden).collect(),
    }
}
