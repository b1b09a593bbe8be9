//! User-facing data model: nodes, edges, handles and connections.
//!
//! Everything here is plain data. Derived state (absolute positions, measured
//! sizes, z-order) lives in [`InternalNode`](crate::store::InternalNode).

use crate::geometry::{CoordinateExtent, Dimensions, Point, Position, Rect};
use serde::{Deserialize, Serialize};

/// Which end of a connection a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleType {
    Source,
    Target,
}

impl HandleType {
    pub fn opposite(self) -> HandleType {
        match self {
            HandleType::Source => HandleType::Target,
            HandleType::Target => HandleType::Source,
        }
    }
}

/// A connection point on a node, relative to the node's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub node_id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub position: Position,
    #[serde(rename = "type")]
    pub handle_type: HandleType,
}

impl Handle {
    pub fn new(
        id: Option<&str>,
        node_id: &str,
        handle_type: HandleType,
        position: Position,
        rect: Rect,
    ) -> Self {
        Self {
            id: id.map(str::to_owned),
            node_id: node_id.to_owned(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            position,
            handle_type,
        }
    }

    /// Does `handle_id` address this handle? `None` matches the first handle.
    pub fn matches(&self, handle_id: Option<&str>) -> bool {
        match handle_id {
            Some(id) => self.id.as_deref() == Some(id),
            None => true,
        }
    }
}

/// Measured handle rects of a node, split by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandleBounds {
    #[serde(default)]
    pub source: Vec<Handle>,
    #[serde(default)]
    pub target: Vec<Handle>,
}

impl HandleBounds {
    pub fn of_type(&self, handle_type: HandleType) -> &[Handle] {
        match handle_type {
            HandleType::Source => &self.source,
            HandleType::Target => &self.target,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.source.iter().chain(self.target.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }

    pub fn from_handles<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = Handle>,
    {
        let mut bounds = HandleBounds::default();
        for h in handles {
            match h.handle_type {
                HandleType::Source => bounds.source.push(h),
                HandleType::Target => bounds.target.push(h),
            }
        }
        bounds
    }
}

/// Region a node may be dragged within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeExtent {
    /// Stay inside the parent node's rect.
    Parent,
    /// Stay inside a box, relative to the parent when the node has one.
    #[serde(untagged)]
    Coordinate(CoordinateExtent),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub position: Point,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub dragging: bool,
    #[serde(default)]
    pub resizing: bool,
    #[serde(default)]
    pub hidden: bool,
    /// `None` falls back to the engine-wide default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<NodeExtent>,
    #[serde(default)]
    pub expand_parent: bool,
    /// Overrides the engine-wide node origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<(f32, f32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    /// Size last reported by the rendering layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<Dimensions>,
    /// Handle rects known up front or last reported by the rendering layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handles: Option<Vec<Handle>>,
}

impl Node {
    pub fn new(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            position: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_extent(mut self, extent: NodeExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Size from the last measurement, else the user-set size.
    pub fn dimensions(&self) -> Option<Dimensions> {
        if let Some(m) = self.measured {
            return Some(m);
        }
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions::new(width, height)),
            _ => None,
        }
    }
}

/// Path family of an edge; each maps to one path builder in [`crate::path`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Cubic bezier.
    #[default]
    #[serde(alias = "bezier")]
    Default,
    Straight,
    Step,
    #[serde(alias = "smooth-step")]
    SmoothStep,
}

/// Per-edge overrides for the path builders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePathOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curvature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub style: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_options: Option<EdgePathOptions>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_owned);
        self.target_handle = target_handle.map(str::to_owned);
        self
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn connection(&self) -> Connection {
        Connection {
            source: self.source.clone(),
            target: self.target.clone(),
            source_handle: self.source_handle.clone(),
            target_handle: self.target_handle.clone(),
        }
    }
}

/// A proposed or completed link between two handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_owned);
        self.target_handle = target_handle.map(str::to_owned);
        self
    }

    /// Default id for an edge created from this connection.
    pub fn edge_id(&self) -> String {
        format!(
            "xy-edge__{}{}-{}{}",
            self.source,
            self.source_handle.as_deref().unwrap_or(""),
            self.target,
            self.target_handle.as_deref().unwrap_or("")
        )
    }

    pub fn into_edge(self) -> Edge {
        Edge {
            id: self.edge_id(),
            source: self.source,
            target: self.target,
            source_handle: self.source_handle,
            target_handle: self.target_handle,
            ..Default::default()
        }
    }
}

/// Marquee rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub start_x: f32,
    pub start_y: f32,
}

impl SelectionRect {
    pub fn at(p: Point) -> Self {
        Self {
            x: p.x,
            y: p.y,
            width: 0.0,
            height: 0.0,
            start_x: p.x,
            start_y: p.y,
        }
    }

    /// Grows the rect from its anchor towards `p`.
    pub fn extend_to(&self, p: Point) -> Self {
        let r = Rect::from_corners(Point::new(self.start_x, self.start_y), p);
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            start_x: self.start_x,
            start_y: self.start_y,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Which handle pairs may be connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Only source to target.
    #[default]
    Strict,
    /// Any two distinct handles.
    Loose,
}

/// How a marquee decides whether a node is inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// The node must be fully contained.
    #[default]
    Full,
    /// Any overlap counts.
    Partial,
}

/// Which edges a marquee selects alongside the nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeSelectionPolicy {
    /// Edges touching at least one selected node.
    #[default]
    AnyEndpoint,
    /// Edges whose both endpoints are selected.
    BothEndpoints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_uses_camel_case_and_type_tag() {
        let node = Node::new("a", 10.0, 20.0)
            .with_type("input")
            .with_parent("group")
            .with_size(100.0, 40.0);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "input");
        assert_eq!(json["parentId"], "group");
        assert_eq!(json["position"]["x"], 10.0);
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_node_extent_serde() {
        let parent: NodeExtent = serde_json::from_str("\"parent\"").unwrap();
        assert_eq!(parent, NodeExtent::Parent);
        let coord: NodeExtent = serde_json::from_str(
            r#"{"min":{"x":0.0,"y":0.0},"max":{"x":10.0,"y":10.0}}"#,
        )
        .unwrap();
        assert_eq!(
            coord,
            NodeExtent::Coordinate(CoordinateExtent::new(0.0, 0.0, 10.0, 10.0))
        );
    }

    #[test]
    fn test_edge_kind_aliases() {
        let e: Edge = serde_json::from_str(
            r#"{"id":"e","source":"a","target":"b","type":"smoothstep"}"#,
        )
        .unwrap();
        assert_eq!(e.kind, EdgeKind::SmoothStep);
        let e: Edge =
            serde_json::from_str(r#"{"id":"e","source":"a","target":"b"}"#).unwrap();
        assert_eq!(e.kind, EdgeKind::Default);
    }

    #[test]
    fn test_connection_edge_id() {
        let c = Connection::new("a", "b").with_handles(Some("out"), None);
        assert_eq!(c.edge_id(), "xy-edge__aout-b");
        assert_eq!(c.into_edge().source_handle.as_deref(), Some("out"));
    }

    #[test]
    fn test_selection_rect_extend_any_direction() {
        let r = SelectionRect::at(Point::new(100.0, 100.0)).extend_to(Point::new(40.0, 160.0));
        assert_eq!(r.x, 40.0);
        assert_eq!(r.y, 100.0);
        assert_eq!(r.width, 60.0);
        assert_eq!(r.height, 60.0);
        assert_eq!((r.start_x, r.start_y), (100.0, 100.0));
    }

    #[test]
    fn test_dimensions_prefers_measured() {
        let mut n = Node::new("a", 0.0, 0.0).with_size(10.0, 10.0);
        assert_eq!(n.dimensions(), Some(Dimensions::new(10.0, 10.0)));
        n.measured = Some(Dimensions::new(30.0, 20.0));
        assert_eq!(n.dimensions(), Some(Dimensions::new(30.0, 20.0)));
        assert_eq!(Node::new("b", 0.0, 0.0).dimensions(), None);
    }
}
