//! Edge path builders.
//!
//! Every builder returns an [`EdgePath`]: SVG path commands, the label anchor,
//! and the geometry used for hit testing. [`edge_path`] is the single dispatch
//! point from [`EdgeKind`] to a builder.

use crate::geometry::{Point, Position};
use crate::types::{EdgeKind, EdgePathOptions};

pub const DEFAULT_CURVATURE: f32 = 0.25;
pub const DEFAULT_BORDER_RADIUS: f32 = 5.0;
pub const DEFAULT_STEP_OFFSET: f32 = 20.0;

/// Endpoints of an edge and the direction each handle faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathEndpoints {
    pub source: Point,
    pub source_position: Position,
    pub target: Point,
    pub target_position: Position,
}

impl PathEndpoints {
    pub fn new(source: Point, source_position: Position, target: Point, target_position: Position) -> Self {
        Self { source, source_position, target, target_position }
    }
}

/// Shape of a computed path, kept for hit testing.
#[derive(Debug, Clone, PartialEq)]
pub enum PathGeometry {
    Line(Point, Point),
    Cubic(CubicBezier),
    Polyline(Vec<Point>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePath {
    /// SVG path commands (e.g. `"M 0 0 C 100 0 100 0 200 0"`).
    pub commands: String,
    /// Where the label is centered.
    pub label: Point,
    /// Half the distance between the endpoints on each axis.
    pub offset: Point,
    pub geometry: PathGeometry,
}

impl EdgePath {
    /// Minimum distance from `point` to the path.
    pub fn distance_to(&self, point: Point, samples: usize) -> f32 {
        match &self.geometry {
            PathGeometry::Line(a, b) => distance_to_line_segment_sq(point, *a, *b).sqrt(),
            PathGeometry::Cubic(bezier) => distance_to_bezier(point, bezier, samples),
            PathGeometry::Polyline(points) => points
                .windows(2)
                .map(|w| distance_to_line_segment_sq(point, w[0], w[1]))
                .fold(f32::MAX, f32::min)
                .sqrt(),
        }
    }
}

/// Builds the path for an edge kind, applying per-edge overrides.
pub fn edge_path(kind: EdgeKind, endpoints: &PathEndpoints, options: &EdgePathOptions) -> EdgePath {
    match kind {
        EdgeKind::Default => bezier_path(endpoints, options.curvature.unwrap_or(DEFAULT_CURVATURE)),
        EdgeKind::Straight => straight_path(endpoints.source, endpoints.target),
        EdgeKind::Step => smooth_step_path(
            endpoints,
            0.0,
            options.offset.unwrap_or(DEFAULT_STEP_OFFSET),
            None,
        ),
        EdgeKind::SmoothStep => smooth_step_path(
            endpoints,
            options.border_radius.unwrap_or(DEFAULT_BORDER_RADIUS),
            options.offset.unwrap_or(DEFAULT_STEP_OFFSET),
            None,
        ),
    }
}

/// Midpoint of two points and half their per-axis distance.
pub fn edge_center(source: Point, target: Point) -> (Point, Point) {
    let offset = Point::new((target.x - source.x).abs() / 2.0, (target.y - source.y).abs() / 2.0);
    let center = Point::new(
        if target.x < source.x { target.x + offset.x } else { target.x - offset.x },
        if target.y < source.y { target.y + offset.y } else { target.y - offset.y },
    );
    (center, offset)
}

pub fn straight_path(source: Point, target: Point) -> EdgePath {
    let (label, offset) = edge_center(source, target);
    EdgePath {
        commands: format!("M {} {} L {} {}", source.x, source.y, target.x, target.y),
        label,
        offset,
        geometry: PathGeometry::Line(source, target),
    }
}

/// Control point distance for a handle.
///
/// `distance` is how far the other end lies in the facing direction. Ahead
/// of the handle the control point sits halfway; behind it, the curve bows out
/// by `curvature * 25 * sqrt(-distance)`.
fn control_offset(distance: f32, curvature: f32) -> f32 {
    if distance >= 0.0 {
        0.5 * distance
    } else {
        curvature * 25.0 * (-distance).sqrt()
    }
}

fn control_point(position: Position, from: Point, to: Point, curvature: f32) -> Point {
    match position {
        Position::Left => Point::new(from.x - control_offset(from.x - to.x, curvature), from.y),
        Position::Right => Point::new(from.x + control_offset(to.x - from.x, curvature), from.y),
        Position::Top => Point::new(from.x, from.y - control_offset(from.y - to.y, curvature)),
        Position::Bottom => Point::new(from.x, from.y + control_offset(to.y - from.y, curvature)),
    }
}

/// Cubic bezier whose control points extend along each handle's facing direction.
pub fn bezier_path(endpoints: &PathEndpoints, curvature: f32) -> EdgePath {
    let bezier = CubicBezier::from_endpoints(endpoints, curvature);
    let label = bezier.eval(0.5);
    let offset = Point::new(
        (label.x - endpoints.source.x).abs(),
        (label.y - endpoints.source.y).abs(),
    );
    EdgePath {
        commands: format!(
            "M {} {} C {} {} {} {} {} {}",
            bezier.p0.x, bezier.p0.y, bezier.p1.x, bezier.p1.y, bezier.p2.x, bezier.p2.y, bezier.p3.x, bezier.p3.y
        ),
        label,
        offset,
        geometry: PathGeometry::Cubic(bezier),
    }
}

fn step_direction(source: Point, source_position: Position, target: Point) -> Point {
    if source_position.is_horizontal() {
        if source.x < target.x { Point::new(1.0, 0.0) } else { Point::new(-1.0, 0.0) }
    } else if source.y < target.y {
        Point::new(0.0, 1.0)
    } else {
        Point::new(0.0, -1.0)
    }
}

/// Component of `p` along the main axis (`x` when `horizontal`).
fn along(p: Point, horizontal: bool) -> f32 {
    if horizontal { p.x } else { p.y }
}

fn across(p: Point, horizontal: bool) -> f32 {
    if horizontal { p.y } else { p.x }
}

fn set_along(p: &mut Point, horizontal: bool, value: f32) {
    if horizontal { p.x = value } else { p.y = value }
}

/// Orthogonal route between two handles.
///
/// Returns the polyline (source, gapped source, bends, gapped target, target)
/// and the label anchor. Opposite-facing handles get at most two bends.
fn step_points(
    endpoints: &PathEndpoints,
    center: Option<Point>,
    offset: f32,
) -> (Vec<Point>, Point, Point) {
    let PathEndpoints { source, source_position, target, target_position } = *endpoints;
    let source_dir = source_position.direction();
    let target_dir = target_position.direction();
    let source_gapped = source + source_dir * offset;
    let target_gapped = target + target_dir * offset;
    let dir = step_direction(source_gapped, source_position, target_gapped);
    let horizontal = dir.x != 0.0;
    let curr_dir = along(dir, horizontal);

    let mut source_gap_offset = Point::ZERO;
    let mut target_gap_offset = Point::ZERO;
    let (default_center, default_offset) = edge_center(source, target);

    let bends: Vec<Point>;
    let label: Point;

    if along(source_dir, horizontal) * along(target_dir, horizontal) == -1.0 {
        let c = center.unwrap_or(default_center);
        let vertical_split = vec![Point::new(c.x, source_gapped.y), Point::new(c.x, target_gapped.y)];
        let horizontal_split = vec![Point::new(source_gapped.x, c.y), Point::new(target_gapped.x, c.y)];
        let source_leads = along(source_dir, horizontal) == curr_dir;
        bends = if source_leads == horizontal { vertical_split } else { horizontal_split };
        label = c;
    } else {
        // x from source + y from target, or the other way round
        let source_target = Point::new(source_gapped.x, target_gapped.y);
        let target_source = Point::new(target_gapped.x, source_gapped.y);
        let mut corner = if horizontal {
            if source_dir.x == curr_dir { target_source } else { source_target }
        } else if source_dir.y == curr_dir {
            source_target
        } else {
            target_source
        };

        if source_position == target_position {
            // Same-facing handles closer than the offset would fold back onto
            // the gapped points.
            let diff = (along(source, horizontal) - along(target, horizontal)).abs();
            if diff <= offset {
                let gap = (offset - 1.0).min(offset - diff);
                if along(source_dir, horizontal) == curr_dir {
                    let sign = if along(source_gapped, horizontal) > along(source, horizontal) { -1.0 } else { 1.0 };
                    set_along(&mut source_gap_offset, horizontal, sign * gap);
                } else {
                    let sign = if along(target_gapped, horizontal) > along(target, horizontal) { -1.0 } else { 1.0 };
                    set_along(&mut target_gap_offset, horizontal, sign * gap);
                }
            }
        } else {
            let is_same_dir = along(source_dir, horizontal) == across(target_dir, horizontal);
            let source_gt = across(source_gapped, horizontal) > across(target_gapped, horizontal);
            let source_lt = across(source_gapped, horizontal) < across(target_gapped, horizontal);
            let flip = if along(source_dir, horizontal) == 1.0 {
                (!is_same_dir && source_gt) || (is_same_dir && source_lt)
            } else {
                (!is_same_dir && source_lt) || (is_same_dir && source_gt)
            };
            if flip {
                corner = if horizontal { source_target } else { target_source };
            }
        }

        let source_gap_point = source_gapped + source_gap_offset;
        let target_gap_point = target_gapped + target_gap_offset;
        let max_x = (source_gap_point.x - corner.x).abs().max((target_gap_point.x - corner.x).abs());
        let max_y = (source_gap_point.y - corner.y).abs().max((target_gap_point.y - corner.y).abs());

        // label goes on the longest segment
        label = if max_x >= max_y {
            Point::new((source_gap_point.x + target_gap_point.x) / 2.0, corner.y)
        } else {
            Point::new(corner.x, (source_gap_point.y + target_gap_point.y) / 2.0)
        };
        bends = vec![corner];
    }

    let mut points = Vec::with_capacity(bends.len() + 4);
    points.push(source);
    points.push(source_gapped + source_gap_offset);
    points.extend(bends);
    points.push(target_gapped + target_gap_offset);
    points.push(target);
    (points, label, default_offset)
}

fn bend(a: Point, b: Point, c: Point, size: f32) -> String {
    let bend_size = (a.distance(b) / 2.0).min(b.distance(c) / 2.0).min(size);
    let Point { x, y } = b;

    if (a.x == x && x == c.x) || (a.y == y && y == c.y) {
        return format!(" L {} {}", x, y);
    }

    if a.y == y {
        let x_dir = if a.x < c.x { -1.0 } else { 1.0 };
        let y_dir = if a.y < c.y { 1.0 } else { -1.0 };
        return format!(
            " L {} {} Q {} {} {} {}",
            x + bend_size * x_dir,
            y,
            x,
            y,
            x,
            y + bend_size * y_dir
        );
    }

    let x_dir = if a.x < c.x { 1.0 } else { -1.0 };
    let y_dir = if a.y < c.y { -1.0 } else { 1.0 };
    format!(
        " L {} {} Q {} {} {} {}",
        x,
        y + bend_size * y_dir,
        x,
        y,
        x + bend_size * x_dir,
        y
    )
}

/// Orthogonal path with rounded corners; `border_radius == 0` gives a step edge.
pub fn smooth_step_path(
    endpoints: &PathEndpoints,
    border_radius: f32,
    offset: f32,
    center: Option<Point>,
) -> EdgePath {
    let (points, label, label_offset) = step_points(endpoints, center, offset);
    let mut commands = String::with_capacity(points.len() * 24);
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            commands.push_str(&format!("M {} {}", p.x, p.y));
        } else if i == points.len() - 1 {
            commands.push_str(&format!(" L {} {}", p.x, p.y));
        } else {
            commands.push_str(&bend(points[i - 1], *p, points[i + 1], border_radius));
        }
    }
    EdgePath {
        commands,
        label,
        offset: label_offset,
        geometry: PathGeometry::Polyline(points),
    }
}

pub fn step_path(endpoints: &PathEndpoints, offset: f32) -> EdgePath {
    smooth_step_path(endpoints, 0.0, offset, None)
}

/// Cubic bezier curve for label placement and distance calculations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: Point, // Start point
    pub p1: Point, // Control point 1
    pub p2: Point, // Control point 2
    pub p3: Point, // End point
}

impl CubicBezier {
    /// Create a bezier from endpoints using the same logic as [`bezier_path`]
    pub fn from_endpoints(endpoints: &PathEndpoints, curvature: f32) -> Self {
        CubicBezier {
            p0: endpoints.source,
            p1: control_point(endpoints.source_position, endpoints.source, endpoints.target, curvature),
            p2: control_point(endpoints.target_position, endpoints.target, endpoints.source, curvature),
            p3: endpoints.target,
        }
    }

    /// Evaluate the bezier curve at parameter t (0.0 to 1.0)
    pub fn eval(&self, t: f32) -> Point {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * self.p0.x + 3.0 * mt2 * t * self.p1.x + 3.0 * mt * t2 * self.p2.x + t3 * self.p3.x;
        let y = mt3 * self.p0.y + 3.0 * mt2 * t * self.p1.y + 3.0 * mt * t2 * self.p2.y + t3 * self.p3.y;

        Point::new(x, y)
    }
}

/// Calculate squared distance from a point to a line segment
fn distance_to_line_segment_sq(point: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let ap = point - a;

    let ab_len_sq = ab.x * ab.x + ab.y * ab.y;

    if ab_len_sq < f32::EPSILON {
        // Degenerate segment (a == b)
        return ap.x * ap.x + ap.y * ap.y;
    }

    // Project point onto line, clamped to segment
    let t = ((ap.x * ab.x + ap.y * ab.y) / ab_len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;

    let d = point - closest;
    d.x * d.x + d.y * d.y
}

/// Calculate the minimum distance from a point to a cubic bezier curve
///
/// Uses subdivision approach: sample curve at regular intervals and find closest point.
///
/// # Arguments
/// * `point` - The point to measure distance from
/// * `bezier` - The bezier curve
/// * `num_samples` - Number of samples for distance calculation (default: 20)
pub fn distance_to_bezier(point: Point, bezier: &CubicBezier, num_samples: usize) -> f32 {
    let num_samples = if num_samples == 0 { 20 } else { num_samples };

    let mut min_dist_sq = f32::MAX;
    let mut prev_point = bezier.eval(0.0);

    for i in 1..=num_samples {
        let t = i as f32 / num_samples as f32;
        let curr_point = bezier.eval(t);

        let dist_sq = distance_to_line_segment_sq(point, prev_point, curr_point);
        if dist_sq < min_dist_sq {
            min_dist_sq = dist_sq;
        }

        prev_point = curr_point;
    }

    min_dist_sq.sqrt()
}
