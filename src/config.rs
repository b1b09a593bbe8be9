//! Engine configuration.
//!
//! Every field has a default, so a JSON config only needs the keys it
//! changes:
//!
//! ```
//! use node_flow::FlowConfig;
//!
//! let config = FlowConfig::from_json(r#"{ "minZoom": 0.25, "snapToGrid": true }"#).unwrap();
//! assert_eq!(config.min_zoom, 0.25);
//! assert_eq!(config.max_zoom, 2.0);
//! ```

use crate::connection::ConnectionContext;
use crate::drag::DragContext;
use crate::error::{FlowError, Result};
use crate::geometry::{CoordinateExtent, Viewport};
use crate::input::ModifierKey;
use crate::selection::SelectionOptions;
use crate::store::AdoptOptions;
use crate::types::{ConnectionMode, EdgeKind, EdgeSelectionPolicy, SelectionMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowConfig {
    // Viewport
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub default_viewport: Viewport,
    /// Panning limit; `None` is unbounded.
    pub translate_extent: Option<CoordinateExtent>,
    /// Limit for node positions; `None` is unbounded.
    pub node_extent: Option<CoordinateExtent>,
    pub node_origin: (f32, f32),

    // Grid
    pub snap_to_grid: bool,
    pub snap_grid: (f32, f32),

    // Connections
    pub connection_mode: ConnectionMode,
    /// Flow-space distance within which a handle is picked up.
    pub connection_radius: f32,
    pub connection_drag_threshold: f32,

    // Dragging
    pub node_drag_threshold: f32,
    /// Screen distance a press may travel and still count as a click.
    pub pane_click_distance: f32,

    // Selection
    pub selection_mode: SelectionMode,
    pub edge_selection_policy: EdgeSelectionPolicy,
    /// A plain drag on the pane draws a marquee instead of panning.
    pub selection_on_drag: bool,
    pub select_nodes_on_drag: bool,
    pub elevate_nodes_on_select: bool,
    pub elevate_edges_on_select: bool,
    /// Held to draw a marquee.
    pub selection_key: Vec<ModifierKey>,
    /// Held to toggle elements or to add a marquee to the selection.
    pub multi_selection_key: Vec<ModifierKey>,

    // Rendering
    pub only_render_visible_elements: bool,

    // Auto-pan
    pub auto_pan_on_node_drag: bool,
    pub auto_pan_on_connect: bool,
    pub auto_pan_speed: f32,
    /// Distance from the pane border where auto-pan kicks in.
    pub auto_pan_distance: f32,

    // Input
    pub pan_on_drag: bool,
    pub pan_on_scroll: bool,
    pub pan_on_scroll_speed: f32,
    pub zoom_on_scroll: bool,
    pub zoom_on_pinch: bool,
    pub zoom_on_double_click: bool,

    // Interactivity
    pub nodes_draggable: bool,
    pub nodes_connectable: bool,
    pub elements_selectable: bool,
    pub edges_reconnectable: bool,
    pub delete_key_enabled: bool,

    // Fit
    /// Fit the view once every node is measured.
    pub fit_view: bool,
    pub fit_view_padding: f32,

    // Edges
    pub default_edge_kind: EdgeKind,
    /// Flow-space distance for picking an edge.
    pub edge_hit_distance: f32,
    /// Samples per edge path for hit testing.
    pub edge_hit_samples: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 2.0,
            default_viewport: Viewport::default(),
            translate_extent: None,
            node_extent: None,
            node_origin: (0.0, 0.0),
            snap_to_grid: false,
            snap_grid: (15.0, 15.0),
            connection_mode: ConnectionMode::Strict,
            connection_radius: 20.0,
            connection_drag_threshold: 1.0,
            node_drag_threshold: 1.0,
            pane_click_distance: 1.0,
            selection_mode: SelectionMode::Full,
            edge_selection_policy: EdgeSelectionPolicy::AnyEndpoint,
            selection_on_drag: false,
            select_nodes_on_drag: true,
            elevate_nodes_on_select: true,
            elevate_edges_on_select: false,
            selection_key: vec![ModifierKey::Shift],
            multi_selection_key: vec![ModifierKey::Meta, ModifierKey::Control],
            only_render_visible_elements: false,
            auto_pan_on_node_drag: true,
            auto_pan_on_connect: true,
            auto_pan_speed: 15.0,
            auto_pan_distance: 40.0,
            pan_on_drag: true,
            pan_on_scroll: false,
            pan_on_scroll_speed: 0.5,
            zoom_on_scroll: true,
            zoom_on_pinch: true,
            zoom_on_double_click: true,
            nodes_draggable: true,
            nodes_connectable: true,
            elements_selectable: true,
            edges_reconnectable: true,
            delete_key_enabled: true,
            fit_view: false,
            fit_view_padding: 0.1,
            default_edge_kind: EdgeKind::Default,
            edge_hit_distance: 10.0,
            edge_hit_samples: 32,
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(FlowError::invalid_config(message()))
    }
}

fn check_extent(name: &str, extent: &Option<CoordinateExtent>) -> Result<()> {
    let Some(e) = extent else { return Ok(()) };
    let values = [e.min.x, e.min.y, e.max.x, e.max.y];
    check(!values.iter().any(|v| v.is_nan()), || format!("{name} contains NaN"))?;
    check(e.min.x <= e.max.x && e.min.y <= e.max.y, || format!("{name} has min > max"))
}

impl FlowConfig {
    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FlowConfig =
            serde_json::from_str(json).map_err(|e| FlowError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FlowError::invalid_config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        check(self.min_zoom.is_finite() && self.min_zoom > 0.0, || {
            format!("minZoom must be positive, got {}", self.min_zoom)
        })?;
        check(self.max_zoom.is_finite() && self.max_zoom > 0.0, || {
            format!("maxZoom must be positive, got {}", self.max_zoom)
        })?;
        check(self.min_zoom <= self.max_zoom, || {
            format!("minZoom {} is greater than maxZoom {}", self.min_zoom, self.max_zoom)
        })?;
        let v = self.default_viewport;
        check(v.x.is_finite() && v.y.is_finite() && v.zoom.is_finite() && v.zoom > 0.0, || {
            "defaultViewport must be finite with a positive zoom".to_owned()
        })?;
        check(
            self.snap_grid.0.is_finite() && self.snap_grid.1.is_finite() && self.snap_grid.0 > 0.0 && self.snap_grid.1 > 0.0,
            || format!("snapGrid must be positive, got {:?}", self.snap_grid),
        )?;
        check_extent("translateExtent", &self.translate_extent)?;
        check_extent("nodeExtent", &self.node_extent)?;

        let non_negative = [
            ("connectionRadius", self.connection_radius),
            ("connectionDragThreshold", self.connection_drag_threshold),
            ("nodeDragThreshold", self.node_drag_threshold),
            ("paneClickDistance", self.pane_click_distance),
            ("autoPanSpeed", self.auto_pan_speed),
            ("autoPanDistance", self.auto_pan_distance),
            ("panOnScrollSpeed", self.pan_on_scroll_speed),
            ("fitViewPadding", self.fit_view_padding),
            ("edgeHitDistance", self.edge_hit_distance),
        ];
        for (name, value) in non_negative {
            check(value.is_finite() && value >= 0.0, || format!("{name} must be a non-negative number, got {value}"))?;
        }
        let (ox, oy) = self.node_origin;
        check(ox.is_finite() && oy.is_finite(), || "nodeOrigin must be finite".to_owned())
    }

    pub fn translate_extent(&self) -> CoordinateExtent {
        self.translate_extent.unwrap_or(CoordinateExtent::INFINITE)
    }

    pub fn node_extent(&self) -> CoordinateExtent {
        self.node_extent.unwrap_or(CoordinateExtent::INFINITE)
    }

    pub fn snap_grid(&self) -> Option<(f32, f32)> {
        self.snap_to_grid.then_some(self.snap_grid)
    }

    pub fn adopt_options(&self) -> AdoptOptions {
        AdoptOptions {
            node_origin: self.node_origin,
            node_extent: self.node_extent(),
            elevate_on_select: self.elevate_nodes_on_select,
            check_equality: true,
        }
    }

    pub fn drag_context(&self) -> DragContext {
        DragContext {
            node_extent: self.node_extent(),
            snap_grid: self.snap_grid(),
            threshold: self.node_drag_threshold,
            nodes_draggable: self.nodes_draggable,
        }
    }

    pub fn connection_context(&self) -> ConnectionContext<'static> {
        ConnectionContext {
            drag_threshold: self.connection_drag_threshold,
            nodes_connectable: self.nodes_connectable,
            ..ConnectionContext::new(self.connection_mode, self.connection_radius)
        }
    }

    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            mode: self.selection_mode,
            edge_policy: self.edge_selection_policy,
            elements_selectable: self.elements_selectable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.min_zoom, 0.5);
        assert_eq!(config.max_zoom, 2.0);
        assert_eq!(config.connection_radius, 20.0);
        assert_eq!(config.snap_grid, (15.0, 15.0));
        assert!(config.snap_grid().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = FlowConfig::from_json(
            r#"{ "maxZoom": 4, "connectionMode": "loose", "selectionMode": "partial", "snapToGrid": true, "snapGrid": [10, 20] }"#,
        )
        .unwrap();
        assert_eq!(config.max_zoom, 4.0);
        assert_eq!(config.connection_mode, ConnectionMode::Loose);
        assert_eq!(config.selection_mode, SelectionMode::Partial);
        assert_eq!(config.snap_grid(), Some((10.0, 20.0)));
        assert_eq!(config.min_zoom, 0.5);
    }

    #[test]
    fn test_translate_extent_from_json() {
        let config = FlowConfig::from_json(
            r#"{ "translateExtent": { "min": { "x": 0, "y": 0 }, "max": { "x": 1000, "y": 800 } } }"#,
        )
        .unwrap();
        assert_eq!(config.translate_extent(), CoordinateExtent::new(0.0, 0.0, 1000.0, 800.0));
        assert!(FlowConfig::default().translate_extent().is_infinite());
    }

    #[test]
    fn test_min_greater_than_max_rejected() {
        let err = FlowConfig::from_json(r#"{ "minZoom": 3, "maxZoom": 2 }"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_non_positive_zoom_rejected() {
        let config = FlowConfig {
            min_zoom: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_grid_rejected() {
        let config = FlowConfig {
            snap_grid: (-5.0, 10.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let config = FlowConfig {
            connection_radius: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_invalid_config() {
        let err = FlowConfig::from_json("{ nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_json_round_trip_keeps_keys_camel_case() {
        let json = FlowConfig::default().to_json().unwrap();
        assert!(json.contains("\"minZoom\""));
        assert!(json.contains("\"multiSelectionKey\""));
        assert_eq!(FlowConfig::from_json(&json).unwrap(), FlowConfig::default());
    }
}
