//! Level 7: Scalability Tests
//!
//! These tests drive the engine with large graphs (1K-10K nodes and edges)
//! to catch accidental quadratic behavior. Thresholds are generous (several
//! times the expected cost) so they don't flake on slow CI machines.
//!
//! **IMPORTANT:** Run with `cargo test level7 --release` for meaningful numbers.
//! Debug builds are much slower, so timing assertions only warn there.

mod common;

use common::harness::{grid, FlowHarness};
use futures::FutureExt;
use node_flow::hit_test::{nodes_inside, InsideQuery};
use node_flow::{
    Edge, FitViewOptions, FlowConfig, Modifiers, Node, Point, PointerTarget, Rect, SelectionMode, Viewport,
};
use std::rc::Rc;
use std::time::{Duration, Instant};

// ============================================================================
// Debug Mode Detection
// ============================================================================

/// Returns true when built without optimizations.
const fn is_debug_mode() -> bool {
    cfg!(debug_assertions)
}

/// Asserts `elapsed <= threshold` in release builds; only warns in debug builds.
macro_rules! assert_timing {
    ($elapsed:expr, $threshold:expr, $($msg:tt)+) => {
        if is_debug_mode() {
            if $elapsed > $threshold {
                eprintln!(
                    "timing skipped (debug build): {} took {:?}, threshold {:?}",
                    format!($($msg)+),
                    $elapsed,
                    $threshold
                );
            }
        } else {
            assert!(
                $elapsed <= $threshold,
                "{} took {:?}, expected <= {:?}",
                format!($($msg)+),
                $elapsed,
                $threshold
            );
        }
    };
}

// ============================================================================
// Constants
// ============================================================================

/// Small scale: 1,000 items
const SCALE_SMALL: usize = 1_000;

/// Medium scale: 5,000 items
const SCALE_MEDIUM: usize = 5_000;

/// Large scale: 10,000 items
const SCALE_LARGE: usize = 10_000;

// ============================================================================
// Timing Thresholds
// ============================================================================

mod thresholds {
    use super::*;

    pub const ADOPT_1K: Duration = Duration::from_millis(50);
    pub const ADOPT_10K: Duration = Duration::from_millis(300);

    /// Nodes nested in groups of four under 1K parents
    pub const ADOPT_NESTED_5K: Duration = Duration::from_millis(200);

    pub const MEASURE_10K: Duration = Duration::from_millis(300);

    pub const EDGE_LAYOUTS_1K: Duration = Duration::from_millis(50);
    pub const EDGE_LAYOUTS_5K: Duration = Duration::from_millis(200);

    /// Second call without changes reuses the cache
    pub const EDGE_LAYOUTS_CACHED: Duration = Duration::from_millis(5);

    pub const EDGE_HIT_100_QUERIES_1K: Duration = Duration::from_millis(500);

    pub const MARQUEE_10K: Duration = Duration::from_millis(300);

    pub const NODES_INSIDE_10K: Duration = Duration::from_millis(50);

    pub const SELECT_ALL_10K: Duration = Duration::from_millis(100);

    pub const DRAG_SELECTION_1K_OF_10K: Duration = Duration::from_millis(300);

    pub const FIT_VIEW_10K: Duration = Duration::from_millis(50);

    pub const DELETE_1K_OF_5K: Duration = Duration::from_millis(300);

    pub const VISIBLE_NODES_10K: Duration = Duration::from_millis(50);
}

// ============================================================================
// Data Generators
// ============================================================================

/// A measured grid of `count` nodes with edges to each right-hand neighbour.
fn measured_grid(config: FlowConfig, count: usize) -> FlowHarness {
    let (nodes, edges) = grid(count);
    FlowHarness::measured(config, nodes, edges)
}

/// `parents` groups of 400x400, each holding four 50x50 children.
fn nested_groups(parents: usize) -> Vec<Node> {
    let cols = (parents as f32).sqrt().ceil() as usize;
    let mut nodes = Vec::with_capacity(parents * 5);
    for p in 0..parents {
        let (col, row) = (p % cols, p / cols);
        let group = format!("g{p}");
        // Children first to exercise out-of-order parents.
        for c in 0..4 {
            nodes.push(
                Node::new(format!("{group}-c{c}"), 20.0 + c as f32 * 60.0, 20.0)
                    .with_size(50.0, 50.0)
                    .with_parent(group.clone()),
            );
        }
        nodes.push(Node::new(group, col as f32 * 500.0, row as f32 * 500.0).with_size(400.0, 400.0));
    }
    nodes
}

// ============================================================================
// Adoption
// ============================================================================

#[test]
fn test_adopt_1k_nodes() {
    let (nodes, edges) = grid(SCALE_SMALL);
    let start = Instant::now();
    let harness = FlowHarness::with_graph(FlowConfig::default(), nodes, edges);
    let elapsed = start.elapsed();

    assert_eq!(harness.engine.nodes().len(), SCALE_SMALL);
    assert!(!harness.engine.edges().is_empty());
    assert_timing!(elapsed, thresholds::ADOPT_1K, "Adoption (1K)");
}

#[test]
fn test_adopt_10k_nodes() {
    let (nodes, edges) = grid(SCALE_LARGE);
    let edge_count = edges.len();
    let start = Instant::now();
    let harness = FlowHarness::with_graph(FlowConfig::default(), nodes, edges);
    let elapsed = start.elapsed();

    assert_eq!(harness.engine.nodes().len(), SCALE_LARGE);
    assert_eq!(harness.engine.edges().len(), edge_count);
    assert_timing!(elapsed, thresholds::ADOPT_10K, "Adoption (10K)");
}

#[test]
fn test_adopt_nested_groups() {
    let nodes = nested_groups(SCALE_SMALL);
    let start = Instant::now();
    let harness = FlowHarness::with_graph(FlowConfig::default(), nodes, vec![]);
    let elapsed = start.elapsed();

    assert_eq!(harness.engine.nodes().len(), SCALE_MEDIUM);
    let parent = harness.position_absolute("g999");
    assert_eq!(harness.position_absolute("g999-c3"), Point::new(parent.x + 200.0, parent.y + 20.0));
    assert!(harness.tracker.errors.borrow().is_empty());
    assert_timing!(elapsed, thresholds::ADOPT_NESTED_5K, "Nested adoption (5K)");
}

#[test]
fn test_measure_10k_nodes() {
    let (nodes, edges) = grid(SCALE_LARGE);
    let mut harness = FlowHarness::with_graph(FlowConfig::default(), nodes, edges);

    let start = Instant::now();
    harness.measure_all();
    let elapsed = start.elapsed();

    assert!(harness.engine.nodes().all_measured());
    assert_eq!(*harness.tracker.inits.borrow(), 1);
    assert_timing!(elapsed, thresholds::MEASURE_10K, "Measure + flush (10K)");
}

// ============================================================================
// Edge layouts & hit testing
// ============================================================================

#[test]
fn test_edge_layouts_1k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_SMALL);
    let edge_count = harness.engine.edges().len();

    let start = Instant::now();
    let count = harness.engine.edge_layouts().len();
    let elapsed = start.elapsed();

    assert_eq!(count, edge_count);
    assert_timing!(elapsed, thresholds::EDGE_LAYOUTS_1K, "Edge layouts (1K)");
}

#[test]
fn test_edge_layouts_5k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_MEDIUM);

    let start = Instant::now();
    let count = harness.engine.edge_layouts().len();
    let elapsed = start.elapsed();

    assert!(count > SCALE_MEDIUM / 2);
    assert_timing!(elapsed, thresholds::EDGE_LAYOUTS_5K, "Edge layouts (5K)");
}

#[test]
fn test_edge_layouts_are_cached() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_MEDIUM);
    let first = harness.engine.edge_layouts()[0].clone();

    let start = Instant::now();
    let again = harness.engine.edge_layouts()[0].clone();
    let elapsed = start.elapsed();

    assert!(Rc::ptr_eq(&first, &again));
    assert_timing!(elapsed, thresholds::EDGE_LAYOUTS_CACHED, "Cached edge layouts (5K)");

    // Moving one node recomputes.
    harness.engine.update_node("n0", |n| n.position = Point::new(0.0, 30.0));
    let moved = harness.engine.edge_layouts()[0].clone();
    assert!(!Rc::ptr_eq(&first, &moved));
}

#[test]
fn test_edge_hit_100_queries() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_SMALL);
    harness.engine.edge_layouts();

    let start = Instant::now();
    let mut hits = 0;
    for i in 0..100 {
        // Points along the first row of edges, between the nodes.
        let x = 150.0 + (i % 30) as f32 * 200.0;
        if harness.engine.edge_at(Point::new(x, 25.0)).is_some() {
            hits += 1;
        }
    }
    let elapsed = start.elapsed();

    assert!(hits > 0);
    assert_timing!(elapsed, thresholds::EDGE_HIT_100_QUERIES_1K, "Edge hit testing (100 queries, 1K)");
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_marquee_over_10k_nodes() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_LARGE);

    let start = Instant::now();
    harness.marquee((-10.0, -10.0), (25_000.0, 25_000.0));
    let elapsed = start.elapsed();

    assert_eq!(harness.engine.selection().nodes.len(), SCALE_LARGE);
    assert_eq!(harness.tracker.selection_changes.borrow().len(), 4);
    assert_timing!(elapsed, thresholds::MARQUEE_10K, "Marquee (10K, full canvas)");
}

#[test]
fn test_nodes_inside_10k() {
    let harness = measured_grid(FlowConfig::default(), SCALE_LARGE);
    let viewport = Viewport::default();

    let start = Instant::now();
    let inside = nodes_inside(
        harness.engine.nodes().iter(),
        Rect::new(0.0, 0.0, 1000.0, 1000.0),
        &viewport,
        InsideQuery::marquee(SelectionMode::Full),
    );
    let elapsed = start.elapsed();

    // Columns and rows at 0, 200, 400, 600 and 800.
    assert_eq!(inside.len(), 25);
    assert_timing!(elapsed, thresholds::NODES_INSIDE_10K, "nodes_inside (10K)");
}

#[test]
fn test_select_all_10k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_LARGE);

    let start = Instant::now();
    harness.engine.select_all();
    harness.engine.unselect_all();
    let elapsed = start.elapsed();

    assert_eq!(harness.tracker.selection_changes.borrow().len(), 2);
    assert_timing!(elapsed, thresholds::SELECT_ALL_10K, "select_all + unselect_all (10K)");
}

// ============================================================================
// Dragging & deletion
// ============================================================================

#[test]
fn test_drag_1k_selected_of_10k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_LARGE);
    let selected: Vec<String> = (0..SCALE_SMALL).map(|i| format!("n{i}")).collect();
    harness.engine.set_selection(&selected, &[]);
    harness.tracker.clear();

    let start = Instant::now();
    harness.drag(PointerTarget::Node("n0".into()), (10.0, 10.0), (60.0, 30.0), Modifiers::NONE);
    let elapsed = start.elapsed();

    assert_eq!(harness.position("n0"), Point::new(50.0, 20.0));
    // 100 columns: n999 sits at column 99, row 9; n1000 starts row 10.
    assert_eq!(harness.position("n999"), Point::new(19_850.0, 1_820.0));
    assert_eq!(harness.position("n1000"), Point::new(0.0, 2_000.0));
    assert_eq!(harness.tracker.drag_stops.borrow()[0].1, SCALE_SMALL);
    assert_timing!(elapsed, thresholds::DRAG_SELECTION_1K_OF_10K, "Selection drag (1K of 10K)");
}

#[test]
fn test_delete_1k_of_5k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_MEDIUM);
    let doomed: Vec<String> = (0..SCALE_SMALL).map(|i| format!("n{i}")).collect();

    let start = Instant::now();
    assert!(harness.engine.delete_elements(&doomed, &[]));
    let elapsed = start.elapsed();

    assert_eq!(harness.engine.nodes().len(), SCALE_MEDIUM - SCALE_SMALL);
    assert!(harness
        .engine
        .edges()
        .iter()
        .all(|e: &Edge| !doomed.contains(&e.source) && !doomed.contains(&e.target)));
    assert_timing!(elapsed, thresholds::DELETE_1K_OF_5K, "Delete (1K of 5K)");
}

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn test_fit_view_10k() {
    let mut harness = measured_grid(FlowConfig::default(), SCALE_LARGE);

    let start = Instant::now();
    let done = harness.engine.fit_view(FitViewOptions::default());
    let elapsed = start.elapsed();

    assert_eq!(done.now_or_never(), Some(true));
    // The grid is far larger than the pane, so zoom bottoms out.
    assert_eq!(harness.engine.viewport().zoom, 0.5);
    assert_timing!(elapsed, thresholds::FIT_VIEW_10K, "fitView (10K)");
}

#[test]
fn test_visible_nodes_culled_10k() {
    let config = FlowConfig {
        only_render_visible_elements: true,
        ..Default::default()
    };
    let mut harness = measured_grid(config, SCALE_LARGE);

    let start = Instant::now();
    let visible = harness.engine.visible_nodes().len();
    let elapsed = start.elapsed();

    assert!(visible > 0 && visible < 50, "{visible} nodes visible");
    let layouts = harness.engine.edge_layouts().len();
    assert!(layouts < 50, "{layouts} edges visible");
    assert_timing!(elapsed, thresholds::VISIBLE_NODES_10K, "Visible nodes (10K)");
}
