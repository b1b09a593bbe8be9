//! Point and rectangle math shared by every other module.
//!
//! All coordinates are `f32`. "Flow" coordinates are world space (the space
//! nodes live in); "screen" coordinates are relative to the top-left corner of
//! the pane. A [`Viewport`] maps one onto the other:
//!
//! ```text
//! screen = flow * zoom + (x, y)
//! flow   = (screen - (x, y)) / zoom
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Point::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in x/y/width/height form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_position(position: Point, dimensions: Dimensions) -> Self {
        Self::new(position.x, position.y, dimensions.width, dimensions.height)
    }

    /// Normalized rect spanning two corner points, in any drag direction.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn to_box(self) -> BoundingBox {
        BoundingBox {
            x: self.x,
            y: self.y,
            x2: self.x + self.width,
            y2: self.y + self.height,
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Strict AABB intersection; rects that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Axis-aligned rectangle in min/max corner form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// The identity for [`BoundingBox::union`].
    pub const EMPTY: BoundingBox = BoundingBox {
        x: f32::INFINITY,
        y: f32::INFINITY,
        x2: f32::NEG_INFINITY,
        y2: f32::NEG_INFINITY,
    };

    pub fn union(self, other: BoundingBox) -> BoundingBox {
        BoundingBox {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x > self.x2 || self.y > self.y2
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x2 - self.x, self.y2 - self.y)
    }
}

/// Bounding rect of a set of rects, `None` when the set is empty.
pub fn bounds_of_rects<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    let b = rects
        .into_iter()
        .fold(BoundingBox::EMPTY, |acc, r| acc.union(r.to_box()));
    (!b.is_empty()).then(|| b.to_rect())
}

/// World-space box `[min, max]` limiting positions or panning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateExtent {
    pub min: Point,
    pub max: Point,
}

impl CoordinateExtent {
    pub const INFINITE: CoordinateExtent = CoordinateExtent {
        min: Point { x: f32::NEG_INFINITY, y: f32::NEG_INFINITY },
        max: Point { x: f32::INFINITY, y: f32::INFINITY },
    };

    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Point { x: min_x, y: min_y },
            max: Point { x: max_x, y: max_y },
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height)
    }

    pub fn offset(self, by: Point) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.min.x.is_infinite()
            && self.min.y.is_infinite()
            && self.max.x.is_infinite()
            && self.max.y.is_infinite()
    }
}

impl Default for CoordinateExtent {
    fn default() -> Self {
        Self::INFINITE
    }
}

/// Facing side of a handle. Edge paths leave a handle in this direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Top,
    Right,
    Bottom,
}

impl Position {
    /// Unit vector pointing away from the node.
    pub fn direction(self) -> Point {
        match self {
            Position::Left => Point::new(-1.0, 0.0),
            Position::Right => Point::new(1.0, 0.0),
            Position::Top => Point::new(0.0, -1.0),
            Position::Bottom => Point::new(0.0, 1.0),
        }
    }

    pub fn opposite(self) -> Position {
        match self {
            Position::Left => Position::Right,
            Position::Right => Position::Left,
            Position::Top => Position::Bottom,
            Position::Bottom => Position::Top,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Position::Left | Position::Right)
    }
}

/// The world-to-screen transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    pub const fn new(x: f32, y: f32, zoom: f32) -> Self {
        Self { x, y, zoom }
    }

    fn safe_zoom(&self) -> f32 {
        if self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        }
    }

    pub fn screen_to_flow(&self, p: Point) -> Point {
        let z = self.safe_zoom();
        Point::new((p.x - self.x) / z, (p.y - self.y) / z)
    }

    pub fn flow_to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.x, p.y * self.zoom + self.y)
    }

    /// Converts a screen-space rect into flow space.
    pub fn screen_rect_to_flow(&self, r: Rect) -> Rect {
        let z = self.safe_zoom();
        let p = self.screen_to_flow(r.position());
        Rect::new(p.x, p.y, r.width / z, r.height / z)
    }

    /// Flow-space rect currently visible on a surface of the given size.
    pub fn visible_rect(&self, width: f32, height: f32) -> Rect {
        self.screen_rect_to_flow(Rect::new(0.0, 0.0, width, height))
    }
}

/// `min(max(value, min), max)` without panicking when `min > max`.
///
/// A node larger than its extent collapses onto the upper bound instead of
/// aborting the drag.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Clamps a top-left position so a box of `dimensions` stays inside `extent`.
pub fn clamp_position(position: Point, extent: &CoordinateExtent, dimensions: Dimensions) -> Point {
    Point::new(
        clamp(position.x, extent.min.x, extent.max.x - dimensions.width),
        clamp(position.y, extent.min.y, extent.max.y - dimensions.height),
    )
}

/// Overlapping area of two rects, zero when they only touch.
pub fn overlapping_area(a: &Rect, b: &Rect) -> f32 {
    let x_overlap = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let y_overlap = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    x_overlap * y_overlap
}

pub fn snap_position(position: Point, grid: (f32, f32)) -> Point {
    let (gx, gy) = grid;
    let snap = |v: f32, g: f32| if g > 0.0 { (v / g).round() * g } else { v };
    Point::new(snap(position.x, gx), snap(position.y, gy))
}

/// Viewport that centers `bounds` on a surface of `width` x `height`.
///
/// `padding` is a fraction of the bounds size (0.1 leaves 10% air). When the
/// horizontal and vertical fits are identical either one wins; both produce
/// the same zoom.
pub fn viewport_for_bounds(
    bounds: Rect,
    width: f32,
    height: f32,
    min_zoom: f32,
    max_zoom: f32,
    padding: f32,
) -> Viewport {
    let x_zoom = width / (bounds.width * (1.0 + padding));
    let y_zoom = height / (bounds.height * (1.0 + padding));
    let zoom = x_zoom.min(y_zoom);
    let zoom = if zoom.is_nan() { max_zoom } else { zoom };
    let clamped_zoom = clamp(zoom, min_zoom, max_zoom);
    let center = bounds.center();
    Viewport::new(
        width / 2.0 - center.x * clamped_zoom,
        height / 2.0 - center.y * clamped_zoom,
        clamped_zoom,
    )
}

fn auto_pan_velocity(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        clamp((value - min).abs(), 1.0, min) / min
    } else if value > max {
        -clamp((value - max).abs(), 1.0, min) / min
    } else {
        0.0
    }
}

/// Pan velocity for a pointer close to the pane border.
///
/// Returns the screen-space amount the viewport should move this frame: zero
/// in the middle of the pane, up to `speed` when the pointer is on the edge.
pub fn calc_auto_pan(pointer: Point, surface: Dimensions, speed: f32, distance: f32) -> Point {
    if distance <= 0.0 {
        return Point::ZERO;
    }
    Point::new(
        auto_pan_velocity(pointer.x, distance, surface.width - distance) * speed,
        auto_pan_velocity(pointer.y, distance, surface.height - distance) * speed,
    )
}
