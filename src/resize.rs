//! Node resizing through eight compass handles and four edge lines.
//!
//! Sizes are computed from the values captured at drag start plus the
//! pointer delta, so every move is independent of the previous one. Dragging
//! a top or left control keeps the opposite edge fixed by moving the node.

use crate::changes::NodeChange;
use crate::error::FlowError;
use crate::geometry::{CoordinateExtent, Dimensions, Point};
use crate::store::NodeStore;
use crate::types::NodeExtent;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlPosition {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ControlPosition {
    pub const ALL: [ControlPosition; 8] = [
        ControlPosition::TopLeft,
        ControlPosition::Top,
        ControlPosition::TopRight,
        ControlPosition::Right,
        ControlPosition::BottomRight,
        ControlPosition::Bottom,
        ControlPosition::BottomLeft,
        ControlPosition::Left,
    ];

    pub const SIDES: [ControlPosition; 4] = [
        ControlPosition::Top,
        ControlPosition::Right,
        ControlPosition::Bottom,
        ControlPosition::Left,
    ];

    fn direction(self) -> ControlDirection {
        use ControlPosition::*;
        ControlDirection {
            is_horizontal: matches!(self, TopLeft | TopRight | Right | BottomRight | BottomLeft | Left),
            is_vertical: matches!(self, TopLeft | Top | TopRight | BottomRight | Bottom | BottomLeft),
            affects_x: matches!(self, TopLeft | BottomLeft | Left),
            affects_y: matches!(self, TopLeft | Top | TopRight),
        }
    }

    pub fn is_side(self) -> bool {
        Self::SIDES.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlVariant {
    Handle,
    Line,
}

/// A grabbable resize control on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResizeControl {
    pub position: ControlPosition,
    pub variant: ControlVariant,
}

impl ResizeControl {
    pub fn handle(position: ControlPosition) -> Self {
        Self {
            position,
            variant: ControlVariant::Handle,
        }
    }

    /// Lines only exist on the four sides.
    pub fn line(position: ControlPosition) -> Option<Self> {
        position.is_side().then_some(Self {
            position,
            variant: ControlVariant::Line,
        })
    }

    /// The eight handles followed by the four lines.
    pub fn all() -> Vec<ResizeControl> {
        ControlPosition::ALL
            .iter()
            .map(|p| Self::handle(*p))
            .chain(ControlPosition::SIDES.iter().filter_map(|p| Self::line(*p)))
            .collect()
    }
}

/// Restricts a resize to one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeDirection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ControlDirection {
    is_horizontal: bool,
    is_vertical: bool,
    /// Dragging moves the left edge.
    affects_x: bool,
    /// Dragging moves the top edge.
    affects_y: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResizeParams {
    pub min_width: f32,
    pub min_height: f32,
    pub max_width: f32,
    pub max_height: f32,
    /// Keep the width/height ratio the node had at drag start.
    pub keep_aspect_ratio: bool,
    pub resize_direction: Option<ResizeDirection>,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            min_width: 10.0,
            min_height: 10.0,
            max_width: f32::MAX,
            max_height: f32::MAX,
            keep_aspect_ratio: false,
            resize_direction: None,
        }
    }
}

/// Position (parent-relative) and size of a node being resized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeValues {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Passed to the resize hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeEvent {
    pub node_id: String,
    pub values: ResizeValues,
    /// Sign of the growth on each axis, flipped for the left and top edges.
    pub direction: (f32, f32),
}

#[derive(Debug, Clone, Copy)]
struct StartValues {
    pointer: Point,
    values: ResizeValues,
    aspect_ratio: f32,
}

fn size_clamp(size: f32, min: f32, max: f32) -> f32 {
    0f32.max(min - size).max(size - max)
}

fn lower_extent_clamp(lower_bound: f32, lower_extent: f32) -> f32 {
    0f32.max(lower_extent - lower_bound)
}

fn upper_extent_clamp(upper_bound: f32, upper_extent: f32) -> f32 {
    0f32.max(upper_bound - upper_extent)
}

/// New values for a pointer at `pointer` (flow space, snapped).
///
/// `extent` and `child_extent` are in the coordinate space of the node's
/// position: the first keeps the node inside its parent, the second keeps
/// the node around its constrained children.
#[allow(clippy::too_many_arguments)]
fn dimensions_after_resize(
    start: &StartValues,
    direction: ControlDirection,
    pointer: Point,
    params: &ResizeParams,
    node_origin: (f32, f32),
    extent: Option<&CoordinateExtent>,
    child_extent: Option<&CoordinateExtent>,
) -> ResizeValues {
    let ControlDirection {
        is_horizontal,
        is_vertical,
        mut affects_x,
        mut affects_y,
    } = direction;
    let is_diagonal = is_horizontal && is_vertical;
    let ResizeValues {
        x: start_x,
        y: start_y,
        width: start_width,
        height: start_height,
    } = start.values;
    let aspect_ratio = start.aspect_ratio;
    let keep_aspect_ratio = params.keep_aspect_ratio && aspect_ratio.is_finite() && aspect_ratio > 0.0;

    let mut dist_x = if is_horizontal { (pointer.x - start.pointer.x).floor() } else { 0.0 };
    let mut dist_y = if is_vertical { (pointer.y - start.pointer.y).floor() } else { 0.0 };

    let new_width = start_width + if affects_x { -dist_x } else { dist_x };
    let new_height = start_height + if affects_y { -dist_y } else { dist_y };

    let origin_offset_x = -node_origin.0 * start_width;
    let origin_offset_y = -node_origin.1 * start_height;

    let mut clamp_x = size_clamp(new_width, params.min_width, params.max_width);
    let mut clamp_y = size_clamp(new_height, params.min_height, params.max_height);

    if let Some(extent) = extent {
        let mut x_clamp = 0.0;
        let mut y_clamp = 0.0;
        if affects_x && dist_x < 0.0 {
            x_clamp = lower_extent_clamp(start_x + dist_x + origin_offset_x, extent.min.x);
        } else if !affects_x && dist_x > 0.0 {
            x_clamp = upper_extent_clamp(start_x + new_width + origin_offset_x, extent.max.x);
        }
        if affects_y && dist_y < 0.0 {
            y_clamp = lower_extent_clamp(start_y + dist_y + origin_offset_y, extent.min.y);
        } else if !affects_y && dist_y > 0.0 {
            y_clamp = upper_extent_clamp(start_y + new_height + origin_offset_y, extent.max.y);
        }
        clamp_x = clamp_x.max(x_clamp);
        clamp_y = clamp_y.max(y_clamp);
    }

    if let Some(child_extent) = child_extent {
        let mut x_clamp = 0.0;
        let mut y_clamp = 0.0;
        if affects_x && dist_x > 0.0 {
            x_clamp = upper_extent_clamp(start_x + dist_x, child_extent.min.x);
        } else if !affects_x && dist_x < 0.0 {
            x_clamp = lower_extent_clamp(start_x + new_width, child_extent.max.x);
        }
        if affects_y && dist_y > 0.0 {
            y_clamp = upper_extent_clamp(start_y + dist_y, child_extent.min.y);
        } else if !affects_y && dist_y < 0.0 {
            y_clamp = lower_extent_clamp(start_y + new_height, child_extent.max.y);
        }
        clamp_x = clamp_x.max(x_clamp);
        clamp_y = clamp_y.max(y_clamp);
    }

    if keep_aspect_ratio {
        if is_horizontal {
            // The height that follows from the width may hit its own limits.
            let aspect_height_clamp =
                size_clamp(new_width / aspect_ratio, params.min_height, params.max_height) * aspect_ratio;
            clamp_x = clamp_x.max(aspect_height_clamp);

            let grows_down = (!affects_x && !affects_y) || (affects_x && !affects_y && is_diagonal);
            if let Some(extent) = extent {
                let c = if grows_down {
                    upper_extent_clamp(start_y + origin_offset_y + new_width / aspect_ratio, extent.max.y) * aspect_ratio
                } else {
                    let d = if affects_x { dist_x } else { -dist_x };
                    lower_extent_clamp(start_y + origin_offset_y + d / aspect_ratio, extent.min.y) * aspect_ratio
                };
                clamp_x = clamp_x.max(c);
            }
            if let Some(child_extent) = child_extent {
                let c = if grows_down {
                    lower_extent_clamp(start_y + new_width / aspect_ratio, child_extent.max.y) * aspect_ratio
                } else {
                    let d = if affects_x { dist_x } else { -dist_x };
                    upper_extent_clamp(start_y + d / aspect_ratio, child_extent.min.y) * aspect_ratio
                };
                clamp_x = clamp_x.max(c);
            }
        }

        if is_vertical {
            let aspect_width_clamp =
                size_clamp(new_height * aspect_ratio, params.min_width, params.max_width) / aspect_ratio;
            clamp_y = clamp_y.max(aspect_width_clamp);

            let grows_right = (!affects_x && !affects_y) || (affects_y && !affects_x && is_diagonal);
            if let Some(extent) = extent {
                let c = if grows_right {
                    upper_extent_clamp(start_x + new_height * aspect_ratio + origin_offset_x, extent.max.x) / aspect_ratio
                } else {
                    let d = if affects_y { dist_y } else { -dist_y };
                    lower_extent_clamp(start_x + d * aspect_ratio + origin_offset_x, extent.min.x) / aspect_ratio
                };
                clamp_y = clamp_y.max(c);
            }
            if let Some(child_extent) = child_extent {
                let c = if grows_right {
                    lower_extent_clamp(start_x + new_height * aspect_ratio, child_extent.max.x) / aspect_ratio
                } else {
                    let d = if affects_y { dist_y } else { -dist_y };
                    upper_extent_clamp(start_x + d * aspect_ratio, child_extent.min.x) / aspect_ratio
                };
                clamp_y = clamp_y.max(c);
            }
        }
    }

    dist_x += if dist_x < 0.0 { clamp_x } else { -clamp_x };
    dist_y += if dist_y < 0.0 { clamp_y } else { -clamp_y };

    if keep_aspect_ratio {
        if is_diagonal {
            let flip = affects_x != affects_y;
            if new_width > new_height * aspect_ratio {
                dist_y = if flip { -dist_x } else { dist_x } / aspect_ratio;
            } else {
                dist_x = if flip { -dist_y } else { dist_y } * aspect_ratio;
            }
        } else if is_horizontal {
            dist_y = dist_x / aspect_ratio;
            affects_y = affects_x;
        } else {
            dist_x = dist_y * aspect_ratio;
            affects_x = affects_y;
        }
    }

    let x = if affects_x { start_x + dist_x } else { start_x };
    let y = if affects_y { start_y + dist_y } else { start_y };

    ResizeValues {
        width: start_width + if affects_x { -dist_x } else { dist_x },
        height: start_height + if affects_y { -dist_y } else { dist_y },
        x: node_origin.0 * dist_x * if affects_x { -1.0 } else { 1.0 } + x,
        y: node_origin.1 * dist_y * if affects_y { -1.0 } else { 1.0 } + y,
    }
}

fn growth_direction(values: &ResizeValues, prev: &ResizeValues, direction: ControlDirection) -> (f32, f32) {
    let sign = |d: f32| {
        if d > 0.0 {
            1.0
        } else if d < 0.0 {
            -1.0
        } else {
            0.0
        }
    };
    let dw = values.width - prev.width;
    let dh = values.height - prev.height;
    let mut dir = (sign(dw), sign(dh));
    if dw != 0.0 && direction.affects_x {
        dir.0 = -dir.0;
    }
    if dh != 0.0 && direction.affects_y {
        dir.1 = -dir.1;
    }
    dir
}

/// A proposed step, not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeStep {
    pub values: ResizeValues,
    pub direction: (f32, f32),
    position_changed: bool,
    size_changed: bool,
}

#[derive(Debug, Clone)]
pub struct NodeResize {
    node_id: String,
    control: ResizeControl,
    params: ResizeParams,
    direction: ControlDirection,
    start: StartValues,
    prev: ResizeValues,
    node_origin: (f32, f32),
    extent: Option<CoordinateExtent>,
    child_extent: Option<CoordinateExtent>,
    /// Children and their current parent-relative positions.
    children: Vec<(String, Point)>,
    expand_parent: bool,
}

impl NodeResize {
    /// Captures the start values. `None` for unknown nodes.
    pub fn start(
        node_id: &str,
        control: ResizeControl,
        params: ResizeParams,
        nodes: &NodeStore,
        pointer: Point,
        errors: &mut Vec<FlowError>,
    ) -> Option<Self> {
        let internal = nodes.get(node_id)?;
        let size = match internal.dimensions() {
            Some(size) => size,
            None => {
                errors.push(FlowError::NodeNotMeasured {
                    node_id: node_id.to_owned(),
                });
                Dimensions::default()
            }
        };
        let values = ResizeValues {
            x: internal.node.position.x,
            y: internal.node.position.y,
            width: size.width,
            height: size.height,
        };
        let node_origin = internal.node.origin.unwrap_or(nodes.options().node_origin);

        let extent = match (internal.node.extent, nodes.parent_of(node_id)) {
            (Some(NodeExtent::Parent), Some(parent)) => parent
                .dimensions()
                .map(|d| CoordinateExtent::new(0.0, 0.0, d.width, d.height)),
            _ => None,
        };

        let mut children = Vec::new();
        let mut child_extent: Option<CoordinateExtent> = None;
        for child_id in nodes.children(node_id) {
            let Some(child) = nodes.get(child_id) else { continue };
            children.push((child_id.to_owned(), child.node.position));
            if child.node.extent == Some(NodeExtent::Parent) || child.node.expand_parent {
                let origin = child.node.origin.unwrap_or(nodes.options().node_origin);
                let child_size = child.size();
                let x = values.x + child.node.position.x - origin.0 * child_size.width;
                let y = values.y + child.node.position.y - origin.1 * child_size.height;
                let e = CoordinateExtent::new(x, y, x + child_size.width, y + child_size.height);
                child_extent = Some(match child_extent {
                    Some(c) => CoordinateExtent::new(
                        c.min.x.min(e.min.x),
                        c.min.y.min(e.min.y),
                        c.max.x.max(e.max.x),
                        c.max.y.max(e.max.y),
                    ),
                    None => e,
                });
            }
        }

        let mut direction = control.position.direction();
        match params.resize_direction {
            Some(ResizeDirection::Horizontal) => direction.is_vertical = false,
            Some(ResizeDirection::Vertical) => direction.is_horizontal = false,
            None => {}
        }

        debug!(node = %node_id, control = ?control.position, "resize started");
        Some(Self {
            node_id: node_id.to_owned(),
            control,
            params,
            direction,
            start: StartValues {
                pointer,
                values,
                aspect_ratio: values.width / values.height,
            },
            prev: values,
            node_origin,
            extent,
            child_extent,
            children,
            expand_parent: internal.node.expand_parent,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn control(&self) -> ResizeControl {
        self.control
    }

    pub fn values(&self) -> ResizeValues {
        self.prev
    }

    pub fn event(&self, values: ResizeValues, direction: (f32, f32)) -> ResizeEvent {
        ResizeEvent {
            node_id: self.node_id.clone(),
            values,
            direction,
        }
    }

    /// Computes the step for `pointer`; `None` when nothing would change.
    pub fn update(&self, pointer: Point) -> Option<ResizeStep> {
        let next = dimensions_after_resize(
            &self.start,
            self.direction,
            pointer,
            &self.params,
            self.node_origin,
            self.extent.as_ref(),
            self.child_extent.as_ref(),
        );
        let prev = self.prev;
        let width_changed = next.width != prev.width;
        let height_changed = next.height != prev.height;
        let x_changed = next.x != prev.x && width_changed;
        let y_changed = next.y != prev.y && height_changed;
        if !width_changed && !height_changed && !x_changed && !y_changed {
            return None;
        }

        let origin_moves = self.node_origin.0 == 1.0 || self.node_origin.1 == 1.0;
        let values = ResizeValues {
            x: if x_changed { next.x } else { prev.x },
            y: if y_changed { next.y } else { prev.y },
            width: if width_changed { next.width } else { prev.width },
            height: if height_changed { next.height } else { prev.height },
        };
        Some(ResizeStep {
            direction: growth_direction(&values, &prev, self.direction),
            values,
            position_changed: x_changed || y_changed || origin_moves,
            size_changed: width_changed || height_changed,
        })
    }

    /// Applies an accepted step to the store.
    pub fn apply(&mut self, step: &ResizeStep, nodes: &mut NodeStore) -> Vec<NodeChange> {
        let mut changes = Vec::new();
        let prev = self.prev;
        let values = step.values;

        if step.position_changed {
            let position = Point::new(values.x, values.y);
            nodes.set_position(&self.node_id, position);
            let position_absolute = nodes.get(&self.node_id).map_or(Point::ZERO, |n| n.position_absolute());
            changes.push(NodeChange::position(&self.node_id, position, position_absolute, None));

            let x_change = values.x - prev.x;
            let y_change = values.y - prev.y;
            if x_change != 0.0 || y_change != 0.0 || (values.width != prev.width || values.height != prev.height) {
                for (child_id, child_position) in self.children.iter_mut() {
                    *child_position = Point::new(
                        child_position.x - x_change + self.node_origin.0 * (values.width - prev.width),
                        child_position.y - y_change + self.node_origin.1 * (values.height - prev.height),
                    );
                    nodes.set_position(child_id, *child_position);
                    let abs = nodes.get(child_id).map_or(Point::ZERO, |n| n.position_absolute());
                    changes.push(NodeChange::position(child_id, *child_position, abs, None));
                }
            }
        }

        if step.size_changed {
            let dimensions = Dimensions::new(values.width, values.height);
            nodes.set_dimensions(&self.node_id, dimensions, true);
            nodes.set_resizing(&self.node_id, true);
            changes.push(NodeChange::Dimensions {
                id: self.node_id.clone(),
                dimensions: Some(dimensions),
                resizing: Some(true),
                set_attributes: true,
            });
        }

        if self.expand_parent {
            changes.extend(nodes.expand_parents(&[self.node_id.clone()]));
        }

        self.prev = values;
        trace!(node = %self.node_id, width = values.width, height = values.height, "resize");
        changes
    }

    /// Ends the resize.
    pub fn finish(self, nodes: &mut NodeStore) -> (ResizeEvent, Vec<NodeChange>) {
        nodes.set_resizing(&self.node_id, false);
        debug!(node = %self.node_id, "resize ended");
        let event = self.event(self.prev, (0.0, 0.0));
        let change = NodeChange::Dimensions {
            id: self.node_id,
            dimensions: Some(Dimensions::new(self.prev.width, self.prev.height)),
            resizing: Some(false),
            set_attributes: true,
        };
        (event, vec![change])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AdoptOptions;
    use crate::types::Node;

    fn store(nodes: Vec<Node>) -> NodeStore {
        let mut store = NodeStore::new();
        store.adopt(nodes, AdoptOptions::default(), &mut Vec::new());
        store
    }

    fn resize(
        nodes: &mut NodeStore,
        id: &str,
        control: ControlPosition,
        params: ResizeParams,
        from: Point,
        to: Point,
    ) -> ResizeValues {
        let mut r = NodeResize::start(id, ResizeControl::handle(control), params, nodes, from, &mut Vec::new()).unwrap();
        if let Some(step) = r.update(to) {
            r.apply(&step, nodes);
        }
        r.values()
    }

    fn values(x: f32, y: f32, width: f32, height: f32) -> ResizeValues {
        ResizeValues { x, y, width, height }
    }

    // ========================================================================
    // Basic handles
    // ========================================================================

    #[test]
    fn test_bottom_right_grows() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::BottomRight,
            ResizeParams::default(),
            Point::new(100.0, 100.0),
            Point::new(150.0, 130.0),
        );
        assert_eq!(v, values(0.0, 0.0, 150.0, 130.0));
        assert_eq!(nodes.get("a").unwrap().size(), Dimensions::new(150.0, 130.0));
        assert_eq!(nodes.get("a").unwrap().node.width, Some(150.0));
    }

    #[test]
    fn test_top_left_keeps_opposite_corner() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::TopLeft,
            ResizeParams::default(),
            Point::ZERO,
            Point::new(20.0, 30.0),
        );
        assert_eq!(v, values(20.0, 30.0, 80.0, 70.0));
        let rect = nodes.get("a").unwrap().abs_rect();
        assert_eq!(rect.x + rect.width, 100.0);
        assert_eq!(rect.y + rect.height, 100.0);
    }

    #[test]
    fn test_side_line_only_changes_one_axis() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let mut r = NodeResize::start(
            "a",
            ResizeControl::line(ControlPosition::Right).unwrap(),
            ResizeParams::default(),
            &nodes,
            Point::new(100.0, 50.0),
            &mut Vec::new(),
        )
        .unwrap();
        let step = r.update(Point::new(140.0, 90.0)).unwrap();
        assert_eq!(step.direction, (1.0, 0.0));
        r.apply(&step, &mut nodes);
        assert_eq!(r.values(), values(0.0, 0.0, 140.0, 100.0));
        assert!(ResizeControl::line(ControlPosition::TopLeft).is_none());
        assert_eq!(ResizeControl::all().len(), 12);
    }

    #[test]
    fn test_min_width_clamp() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::Right,
            ResizeParams::default(),
            Point::new(100.0, 50.0),
            Point::new(5.0, 50.0),
        );
        assert_eq!(v.width, 10.0);
    }

    #[test]
    fn test_resize_direction_restricts_axis() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let params = ResizeParams {
            resize_direction: Some(ResizeDirection::Horizontal),
            ..Default::default()
        };
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::BottomRight,
            params,
            Point::new(100.0, 100.0),
            Point::new(120.0, 150.0),
        );
        assert_eq!(v, values(0.0, 0.0, 120.0, 100.0));
    }

    // ========================================================================
    // Aspect ratio
    // ========================================================================

    #[test]
    fn test_aspect_ratio_respects_max_width() {
        // 2:1, maxWidth 400: asking for height 300 ends at 400x200
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(200.0, 100.0)]);
        let params = ResizeParams {
            max_width: 400.0,
            keep_aspect_ratio: true,
            ..Default::default()
        };
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::Bottom,
            params,
            Point::new(100.0, 100.0),
            Point::new(100.0, 300.0),
        );
        assert_eq!(v.width, 400.0);
        assert_eq!(v.height, 200.0);
    }

    #[test]
    fn test_aspect_ratio_diagonal() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(200.0, 100.0)]);
        let params = ResizeParams {
            keep_aspect_ratio: true,
            ..Default::default()
        };
        let v = resize(
            &mut nodes,
            "a",
            ControlPosition::BottomRight,
            params,
            Point::new(200.0, 100.0),
            Point::new(300.0, 110.0),
        );
        assert_eq!(v.width, 300.0);
        assert_eq!(v.height, 150.0);
    }

    // ========================================================================
    // Parents and children
    // ========================================================================

    #[test]
    fn test_parent_extent_limits_child_resize() {
        let mut nodes = store(vec![
            Node::new("p", 0.0, 0.0).with_size(200.0, 200.0),
            Node::new("c", 100.0, 100.0).with_size(50.0, 50.0).with_parent("p").with_extent(NodeExtent::Parent),
        ]);
        let v = resize(
            &mut nodes,
            "c",
            ControlPosition::Right,
            ResizeParams::default(),
            Point::new(150.0, 125.0),
            Point::new(350.0, 125.0),
        );
        assert_eq!(v.width, 100.0);
    }

    #[test]
    fn test_parent_cannot_shrink_past_constrained_child() {
        let mut nodes = store(vec![
            Node::new("p", 0.0, 0.0).with_size(200.0, 200.0),
            Node::new("c", 150.0, 150.0).with_size(50.0, 50.0).with_parent("p").with_extent(NodeExtent::Parent),
        ]);
        let v = resize(
            &mut nodes,
            "p",
            ControlPosition::BottomRight,
            ResizeParams::default(),
            Point::new(200.0, 200.0),
            Point::new(100.0, 100.0),
        );
        assert_eq!(v, values(0.0, 0.0, 200.0, 200.0));
    }

    #[test]
    fn test_children_keep_absolute_position_when_parent_moves() {
        let mut nodes = store(vec![
            Node::new("p", 0.0, 0.0).with_size(200.0, 200.0),
            Node::new("c", 50.0, 50.0).with_size(20.0, 20.0).with_parent("p"),
        ]);
        let mut r = NodeResize::start(
            "p",
            ResizeControl::handle(ControlPosition::Left),
            ResizeParams::default(),
            &nodes,
            Point::new(0.0, 100.0),
            &mut Vec::new(),
        )
        .unwrap();
        let step = r.update(Point::new(20.0, 100.0)).unwrap();
        let changes = r.apply(&step, &mut nodes);
        assert_eq!(nodes.get("p").unwrap().position_absolute(), Point::new(20.0, 0.0));
        assert_eq!(nodes.get("c").unwrap().node.position, Point::new(30.0, 50.0));
        assert_eq!(nodes.get("c").unwrap().position_absolute(), Point::new(50.0, 50.0));
        assert!(changes.iter().any(|c| c.id() == "c"));
    }

    #[test]
    fn test_finish_clears_resizing() {
        let mut nodes = store(vec![Node::new("a", 0.0, 0.0).with_size(100.0, 100.0)]);
        let mut r = NodeResize::start(
            "a",
            ResizeControl::handle(ControlPosition::Bottom),
            ResizeParams::default(),
            &nodes,
            Point::new(50.0, 100.0),
            &mut Vec::new(),
        )
        .unwrap();
        let step = r.update(Point::new(50.0, 120.0)).unwrap();
        r.apply(&step, &mut nodes);
        assert!(nodes.get("a").unwrap().node.resizing);
        let (event, changes) = r.finish(&mut nodes);
        assert_eq!(event.values.height, 120.0);
        assert!(!nodes.get("a").unwrap().node.resizing);
        assert_eq!(changes.len(), 1);
    }
}
