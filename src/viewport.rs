//! Pan/zoom state and viewport operations.
//!
//! All setters clamp zoom into `[min_zoom, max_zoom]` and keep the visible
//! area inside the translate extent the way d3-zoom's default constrain does.

use crate::geometry::{
    calc_auto_pan, clamp, snap_position, viewport_for_bounds, CoordinateExtent, Dimensions, Point, Rect, Viewport,
};
use crate::transition::{completion, Transition, TransitionOptions, ViewportFuture};
use futures::channel::oneshot;
use std::time::Duration;
use tracing::{debug, trace};

/// Zoom factor of `zoom_in` / `zoom_out`.
pub const ZOOM_STEP: f32 = 1.2;

/// Wheel delta → zoom exponent, as d3-zoom does it.
const WHEEL_DELTA_SCALE: f32 = 0.002;
const PINCH_MULTIPLIER: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FitViewOptions {
    /// Fraction of the bounds size left as air around the nodes.
    pub padding: f32,
    pub include_hidden_nodes: bool,
    pub min_zoom: Option<f32>,
    pub max_zoom: Option<f32>,
    /// Only fit these nodes.
    pub nodes: Option<Vec<String>>,
    pub transition: TransitionOptions,
}

impl Default for FitViewOptions {
    fn default() -> Self {
        Self {
            padding: 0.1,
            include_hidden_nodes: false,
            min_zoom: None,
            max_zoom: None,
            nodes: None,
            transition: TransitionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelEvent {
    /// Pointer position in screen coordinates.
    pub pointer: Point,
    pub delta: Point,
    /// Trackpad pinch (reported as ctrl + wheel by browsers).
    pub pinch: bool,
}

#[derive(Debug, Clone, Copy)]
struct PanGesture {
    start_pointer: Point,
    start_viewport: Viewport,
}

#[derive(Debug)]
struct PendingFitView {
    options: FitViewOptions,
    done: oneshot::Sender<bool>,
    future: ViewportFuture,
}

#[derive(Debug)]
pub struct ViewportController {
    viewport: Viewport,
    surface: Option<Dimensions>,
    origin: Point,
    min_zoom: f32,
    max_zoom: f32,
    translate_extent: CoordinateExtent,
    transition: Option<Transition>,
    pan: Option<PanGesture>,
    pending_fit: Option<PendingFitView>,
    revision: u64,
}

impl ViewportController {
    pub fn new(viewport: Viewport, min_zoom: f32, max_zoom: f32, translate_extent: CoordinateExtent) -> Self {
        let mut controller = Self {
            viewport,
            surface: None,
            origin: Point::ZERO,
            min_zoom,
            max_zoom,
            translate_extent,
            transition: None,
            pan: None,
            pending_fit: None,
            revision: 0,
        };
        controller.viewport = controller.constrain(viewport);
        controller
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    pub fn min_zoom(&self) -> f32 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f32 {
        self.max_zoom
    }

    /// Bumped on every viewport change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn surface(&self) -> Option<Dimensions> {
        self.surface
    }

    pub fn is_mounted(&self) -> bool {
        self.surface
            .map_or(false, |s| s.width > 0.0 && s.height > 0.0)
    }

    /// Size of the pane in screen pixels. A zero size unmounts it.
    pub fn set_surface(&mut self, width: f32, height: f32) {
        self.surface = Some(Dimensions::new(width, height));
        self.apply(self.viewport);
    }

    pub fn unmount(&mut self) {
        self.surface = None;
        self.cancel_transition();
    }

    /// Offset of the pane inside the coordinate space pointer events use.
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn set_zoom_limits(&mut self, min_zoom: f32, max_zoom: f32) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.apply(self.viewport);
    }

    pub fn set_translate_extent(&mut self, extent: CoordinateExtent) {
        self.translate_extent = extent;
        self.apply(self.viewport);
    }

    /// Flow-space rect currently on screen.
    pub fn visible_rect(&self) -> Option<Rect> {
        let surface = self.surface?;
        Some(self.viewport.visible_rect(surface.width, surface.height))
    }

    // ------------------------------------------------------------------
    // Constraint
    // ------------------------------------------------------------------

    /// Clamps zoom and keeps the visible area inside the translate extent.
    pub fn constrain(&self, viewport: Viewport) -> Viewport {
        let zoom = clamp(viewport.zoom, self.min_zoom, self.max_zoom);
        let mut v = Viewport::new(viewport.x, viewport.y, zoom);
        let Some(surface) = self.surface else {
            return v;
        };
        if self.translate_extent.is_infinite() {
            return v;
        }

        let e = &self.translate_extent;
        let dx0 = (0.0 - v.x) / zoom - e.min.x;
        let dx1 = (surface.width - v.x) / zoom - e.max.x;
        let dy0 = (0.0 - v.y) / zoom - e.min.y;
        let dy1 = (surface.height - v.y) / zoom - e.max.y;

        let shift = |d0: f32, d1: f32| {
            if d1 > d0 {
                (d0 + d1) / 2.0
            } else {
                let low = d0.min(0.0);
                if low != 0.0 { low } else { d1.max(0.0) }
            }
        };
        v.x += zoom * shift(dx0, dx1);
        v.y += zoom * shift(dy0, dy1);
        v
    }

    /// Sets the viewport immediately. Returns whether it changed.
    fn apply(&mut self, viewport: Viewport) -> bool {
        let next = self.constrain(viewport);
        if next == self.viewport {
            return false;
        }
        trace!(x = next.x, y = next.y, zoom = next.zoom, "viewport");
        self.viewport = next;
        self.revision += 1;
        true
    }

    fn cancel_transition(&mut self) {
        if let Some(t) = self.transition.take() {
            debug!("viewport transition interrupted");
            t.finish(false);
        }
    }

    /// Moves to `target`, animated if requested, resolving `done` at the end.
    fn transition_to(&mut self, target: Viewport, options: TransitionOptions, done: oneshot::Sender<bool>) {
        self.cancel_transition();
        let target = self.constrain(target);
        match options.duration {
            Some(duration) if options.is_animated() && self.is_mounted() => {
                self.transition = Some(Transition::new(self.viewport, target, duration, options.easing, done));
            }
            _ => {
                self.apply(target);
                let _ = done.send(true);
            }
        }
    }

    fn start(&mut self, target: Viewport, options: TransitionOptions) -> ViewportFuture {
        let (tx, future) = completion();
        self.transition_to(target, options, tx);
        future
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Advances a running transition. Returns whether the viewport changed.
    pub fn tick(&mut self, now: Duration) -> bool {
        let Some(transition) = self.transition.as_mut() else {
            return false;
        };
        let (viewport, finished) = transition.sample(now);
        let changed = self.apply(viewport);
        if finished {
            if let Some(t) = self.transition.take() {
                t.finish(true);
            }
        }
        changed
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub fn set_viewport(&mut self, viewport: Viewport, options: TransitionOptions) -> ViewportFuture {
        self.start(viewport, options)
    }

    fn center(&self) -> Point {
        self.surface
            .map_or(Point::ZERO, |s| Point::new(s.width / 2.0, s.height / 2.0))
    }

    /// Viewport with zoom `zoom` keeping the flow point under `anchor` (screen) fixed.
    fn zoomed_at(&self, anchor: Point, zoom: f32) -> Viewport {
        let zoom = clamp(zoom, self.min_zoom, self.max_zoom);
        let world = self.viewport.screen_to_flow(anchor);
        Viewport::new(anchor.x - world.x * zoom, anchor.y - world.y * zoom, zoom)
    }

    pub fn zoom_in(&mut self, options: TransitionOptions) -> ViewportFuture {
        self.scale_by(ZOOM_STEP, options)
    }

    pub fn zoom_out(&mut self, options: TransitionOptions) -> ViewportFuture {
        self.scale_by(1.0 / ZOOM_STEP, options)
    }

    pub fn scale_by(&mut self, factor: f32, options: TransitionOptions) -> ViewportFuture {
        let target = self.zoomed_at(self.center(), self.viewport.zoom * factor);
        self.start(target, options)
    }

    /// Zooms by `factor` keeping the screen point `anchor` in place.
    pub fn scale_at(&mut self, anchor: Point, factor: f32, options: TransitionOptions) -> ViewportFuture {
        let target = self.zoomed_at(anchor - self.origin, self.viewport.zoom * factor);
        self.start(target, options)
    }

    /// Zooms around the pane center.
    pub fn set_zoom(&mut self, zoom: f32, options: TransitionOptions) -> ViewportFuture {
        let target = self.zoomed_at(self.center(), zoom);
        self.start(target, options)
    }

    /// Centers the flow point `(x, y)`. `zoom` defaults to `max_zoom`.
    pub fn set_center(&mut self, x: f32, y: f32, zoom: Option<f32>, options: TransitionOptions) -> ViewportFuture {
        let zoom = clamp(zoom.unwrap_or(self.max_zoom), self.min_zoom, self.max_zoom);
        let center = self.center();
        let target = Viewport::new(center.x - x * zoom, center.y - y * zoom, zoom);
        self.start(target, options)
    }

    /// Frames `bounds`. Resolves `false` right away when the pane is not mounted.
    pub fn fit_bounds(&mut self, bounds: Rect, padding: f32, options: TransitionOptions) -> ViewportFuture {
        let (tx, future) = completion();
        self.fit_bounds_with(bounds, padding, None, None, options, tx);
        future
    }

    fn fit_bounds_with(
        &mut self,
        bounds: Rect,
        padding: f32,
        min_zoom: Option<f32>,
        max_zoom: Option<f32>,
        options: TransitionOptions,
        done: oneshot::Sender<bool>,
    ) {
        let Some(surface) = self.surface.filter(|_| self.is_mounted()) else {
            let _ = done.send(false);
            return;
        };
        let target = viewport_for_bounds(
            bounds,
            surface.width,
            surface.height,
            min_zoom.unwrap_or(self.min_zoom).max(self.min_zoom),
            max_zoom.unwrap_or(self.max_zoom).min(self.max_zoom),
            padding,
        );
        self.transition_to(target, options, done);
    }

    /// Runs a fitView over `bounds`, resolving `done`.
    ///
    /// `bounds` is `None` when nothing can be fitted; that resolves `false`.
    pub fn fit_view_to(&mut self, bounds: Option<Rect>, options: &FitViewOptions, done: oneshot::Sender<bool>) {
        match bounds {
            Some(bounds) => self.fit_bounds_with(
                bounds,
                options.padding,
                options.min_zoom,
                options.max_zoom,
                options.transition,
                done,
            ),
            None => {
                debug!("fitView: nothing to fit");
                let _ = done.send(false);
            }
        }
    }

    /// Queues a fitView until the nodes are measured.
    ///
    /// Calls made while one is pending share its future; the latest options win.
    pub fn queue_fit_view(&mut self, options: FitViewOptions) -> ViewportFuture {
        if let Some(pending) = self.pending_fit.as_mut() {
            pending.options = options;
            return pending.future.clone();
        }
        let (done, future) = completion();
        self.pending_fit = Some(PendingFitView {
            options,
            done,
            future: future.clone(),
        });
        future
    }

    pub fn has_pending_fit_view(&self) -> bool {
        self.pending_fit.is_some()
    }

    pub fn take_pending_fit_view(&mut self) -> Option<(FitViewOptions, oneshot::Sender<bool>)> {
        self.pending_fit.take().map(|p| (p.options, p.done))
    }

    pub fn screen_to_flow(&self, p: Point) -> Point {
        self.viewport.screen_to_flow(p - self.origin)
    }

    pub fn screen_to_flow_snapped(&self, p: Point, snap_grid: Option<(f32, f32)>) -> Point {
        let flow = self.screen_to_flow(p);
        match snap_grid {
            Some(grid) => snap_position(flow, grid),
            None => flow,
        }
    }

    pub fn flow_to_screen(&self, p: Point) -> Point {
        self.viewport.flow_to_screen(p) + self.origin
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// Pans by a screen-space delta. Returns whether the viewport moved.
    pub fn pan_by(&mut self, delta: Point) -> bool {
        self.cancel_transition();
        let v = self.viewport;
        self.apply(Viewport::new(v.x + delta.x, v.y + delta.y, v.zoom))
    }

    pub fn begin_pan(&mut self, pointer: Point) {
        self.cancel_transition();
        self.pan = Some(PanGesture {
            start_pointer: pointer,
            start_viewport: self.viewport,
        });
        debug!("pan start");
    }

    pub fn pan_to(&mut self, pointer: Point) -> bool {
        let Some(pan) = self.pan else {
            return false;
        };
        let delta = pointer - pan.start_pointer;
        let v = pan.start_viewport;
        self.apply(Viewport::new(v.x + delta.x, v.y + delta.y, v.zoom))
    }

    pub fn end_pan(&mut self) -> bool {
        let was_panning = self.pan.take().is_some();
        if was_panning {
            debug!("pan end");
        }
        was_panning
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    /// Wheel zoom anchored at the pointer, or panning with `pan_on_scroll`.
    pub fn handle_wheel(&mut self, event: WheelEvent, pan_on_scroll: bool, pan_on_scroll_speed: f32) -> bool {
        self.cancel_transition();
        if pan_on_scroll && !event.pinch {
            return self.pan_by(-event.delta * pan_on_scroll_speed);
        }
        let multiplier = if event.pinch { PINCH_MULTIPLIER } else { 1.0 };
        let factor = 2f32.powf(-event.delta.y * WHEEL_DELTA_SCALE * multiplier);
        let target = self.zoomed_at(event.pointer - self.origin, self.viewport.zoom * factor);
        self.apply(target)
    }

    /// Pans when `pointer` (screen) is near the pane border.
    ///
    /// Returns the applied screen-space movement, if any; dragged content
    /// should move by `-movement / zoom` in flow space to stay under the pointer.
    pub fn auto_pan(&mut self, pointer: Point, speed: f32, distance: f32) -> Option<Point> {
        let surface = self.surface?;
        let movement = calc_auto_pan(pointer - self.origin, surface, speed, distance);
        if movement == Point::ZERO {
            return None;
        }
        self.pan_by(movement).then_some(movement)
    }
}
