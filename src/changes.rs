//! Change events emitted through `on_nodes_change` / `on_edges_change`.
//!
//! A host that keeps its own node and edge arrays can replay them with
//! [`apply_node_changes`] and [`apply_edge_changes`].

use crate::geometry::{Dimensions, Point};
use crate::types::{Edge, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    Position {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Point>,
        #[serde(
            rename = "positionAbsolute",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        position_absolute: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dragging: Option<bool>,
    },
    Dimensions {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimensions: Option<Dimensions>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resizing: Option<bool>,
        /// Also write `width`/`height` on the node.
        #[serde(rename = "setAttributes", default)]
        set_attributes: bool,
    },
    Select {
        id: String,
        selected: bool,
    },
    Remove {
        id: String,
    },
    Add {
        item: Node,
    },
    Replace {
        id: String,
        item: Node,
    },
}

impl NodeChange {
    pub fn id(&self) -> &str {
        match self {
            NodeChange::Position { id, .. }
            | NodeChange::Dimensions { id, .. }
            | NodeChange::Select { id, .. }
            | NodeChange::Remove { id }
            | NodeChange::Replace { id, .. } => id,
            NodeChange::Add { item } => &item.id,
        }
    }

    pub fn select(id: &str, selected: bool) -> Self {
        NodeChange::Select {
            id: id.to_owned(),
            selected,
        }
    }

    pub fn position(id: &str, position: Point, position_absolute: Point, dragging: Option<bool>) -> Self {
        NodeChange::Position {
            id: id.to_owned(),
            position: Some(position),
            position_absolute: Some(position_absolute),
            dragging,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select { id: String, selected: bool },
    Remove { id: String },
    Add { item: Edge },
    Replace { id: String, item: Edge },
}

impl EdgeChange {
    pub fn id(&self) -> &str {
        match self {
            EdgeChange::Select { id, .. } | EdgeChange::Remove { id } | EdgeChange::Replace { id, .. } => id,
            EdgeChange::Add { item } => &item.id,
        }
    }

    pub fn select(id: &str, selected: bool) -> Self {
        EdgeChange::Select {
            id: id.to_owned(),
            selected,
        }
    }
}

fn group_by_id<'a, C, F>(changes: &'a [C], id: F) -> HashMap<&'a str, Vec<&'a C>>
where
    F: Fn(&'a C) -> Option<&'a str>,
{
    let mut grouped: HashMap<&str, Vec<&C>> = HashMap::new();
    for change in changes {
        if let Some(key) = id(change) {
            grouped.entry(key).or_default().push(change);
        }
    }
    grouped
}

/// Replays node changes onto a node array. Added nodes are appended.
pub fn apply_node_changes(changes: &[NodeChange], nodes: Vec<Node>) -> Vec<Node> {
    let grouped = group_by_id(changes, |c| match c {
        NodeChange::Add { .. } => None,
        other => Some(other.id()),
    });

    let mut out = Vec::with_capacity(nodes.len());
    'nodes: for mut node in nodes {
        if let Some(node_changes) = grouped.get(node.id.as_str()) {
            for change in node_changes {
                match change {
                    NodeChange::Remove { .. } => continue 'nodes,
                    NodeChange::Replace { item, .. } => node = item.clone(),
                    NodeChange::Select { selected, .. } => node.selected = *selected,
                    NodeChange::Position { position, dragging, .. } => {
                        if let Some(p) = position {
                            node.position = *p;
                        }
                        if let Some(d) = dragging {
                            node.dragging = *d;
                        }
                    }
                    NodeChange::Dimensions {
                        dimensions,
                        resizing,
                        set_attributes,
                        ..
                    } => {
                        if let Some(d) = dimensions {
                            node.measured = Some(*d);
                            if *set_attributes {
                                node.width = Some(d.width);
                                node.height = Some(d.height);
                            }
                        }
                        if let Some(r) = resizing {
                            node.resizing = *r;
                        }
                    }
                    NodeChange::Add { .. } => {}
                }
            }
        }
        out.push(node);
    }

    out.extend(changes.iter().filter_map(|c| match c {
        NodeChange::Add { item } => Some(item.clone()),
        _ => None,
    }));
    out
}

/// Replays edge changes onto an edge array. Added edges are appended.
pub fn apply_edge_changes(changes: &[EdgeChange], edges: Vec<Edge>) -> Vec<Edge> {
    let grouped = group_by_id(changes, |c| match c {
        EdgeChange::Add { .. } => None,
        other => Some(other.id()),
    });

    let mut out = Vec::with_capacity(edges.len());
    'edges: for mut edge in edges {
        if let Some(edge_changes) = grouped.get(edge.id.as_str()) {
            for change in edge_changes {
                match change {
                    EdgeChange::Remove { .. } => continue 'edges,
                    EdgeChange::Replace { item, .. } => edge = item.clone(),
                    EdgeChange::Select { selected, .. } => edge.selected = *selected,
                    EdgeChange::Add { .. } => {}
                }
            }
        }
        out.push(edge);
    }

    out.extend(changes.iter().filter_map(|c| match c {
        EdgeChange::Add { item } => Some(item.clone()),
        _ => None,
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_node_changes() {
        let nodes = vec![Node::new("a", 0.0, 0.0), Node::new("b", 0.0, 0.0), Node::new("c", 0.0, 0.0)];
        let changes = vec![
            NodeChange::select("a", true),
            NodeChange::position("b", Point::new(5.0, 6.0), Point::new(5.0, 6.0), Some(true)),
            NodeChange::Remove { id: "c".into() },
            NodeChange::Add {
                item: Node::new("d", 1.0, 1.0),
            },
        ];
        let out = apply_node_changes(&changes, nodes);
        let ids: Vec<_> = out.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert!(out[0].selected);
        assert_eq!(out[1].position, Point::new(5.0, 6.0));
        assert!(out[1].dragging);
    }

    #[test]
    fn test_apply_dimension_change_sets_attributes() {
        let nodes = vec![Node::new("a", 0.0, 0.0)];
        let changes = vec![NodeChange::Dimensions {
            id: "a".into(),
            dimensions: Some(Dimensions::new(40.0, 30.0)),
            resizing: Some(true),
            set_attributes: true,
        }];
        let out = apply_node_changes(&changes, nodes);
        assert_eq!(out[0].measured, Some(Dimensions::new(40.0, 30.0)));
        assert_eq!(out[0].width, Some(40.0));
        assert!(out[0].resizing);
    }

    #[test]
    fn test_apply_edge_changes() {
        let edges = vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "c")];
        let changes = vec![EdgeChange::Remove { id: "e1".into() }, EdgeChange::select("e2", true)];
        let out = apply_edge_changes(&changes, edges);
        assert_eq!(out.len(), 1);
        assert!(out[0].selected);
    }

    #[test]
    fn test_change_json_is_tagged() {
        let json = serde_json::to_value(NodeChange::select("a", true)).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["id"], "a");
        let json = serde_json::to_value(NodeChange::position("a", Point::ZERO, Point::ZERO, None)).unwrap();
        assert_eq!(json["type"], "position");
        assert!(json.get("positionAbsolute").is_some());
    }
}
