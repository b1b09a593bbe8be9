//! # node-flow
//!
//! A headless engine for interactive node-link diagrams: node editors, data
//! flow graphs, state machines and anything else drawn as boxes joined by
//! edges.
//!
//! The engine keeps the derived state (absolute positions of nested nodes,
//! viewport transform, edge paths) and runs the pointer gestures (drag,
//! connect, reconnect, resize, marquee select). Drawing is left to the host
//! toolkit, which reports measured sizes and pointer events and reads the
//! results back.
//!
//! ## Features
//!
//! - **Nested nodes** - parent-relative positions, extents, `expandParent`
//! - **Viewport** - pan, zoom, fitView with animated transitions
//! - **Gestures** - one state machine per gesture kind, one active at a time
//! - **Batched changes** - `on_nodes_change` / `on_edges_change` fire once per batch
//! - **Slint models** - optional `slint` feature syncs render state into `VecModel`s
//!
//! ## Quick Start
//!
//! ```
//! use node_flow::{Edge, FlowConfig, FlowEngine, FitViewOptions, Hooks, Node};
//! use futures::FutureExt;
//!
//! let hooks = Hooks::new().on_nodes_change(|changes| println!("{} node changes", changes.len()));
//! let mut engine = FlowEngine::new(FlowConfig::default()).unwrap().with_hooks(hooks);
//! engine.set_surface(800.0, 600.0);
//! engine.set_nodes(vec![Node::new("a", 0.0, 0.0), Node::new("b", 250.0, 100.0)]);
//! engine.set_edges(vec![Edge::new("a-b", "a", "b")]);
//!
//! // Waits until the rendering layer has measured every node.
//! let fitted = engine.fit_view(FitViewOptions::default());
//! engine.report_measured("a", 150.0, 60.0);
//! engine.report_measured("b", 150.0, 60.0);
//! engine.flush_updates();
//! assert_eq!(fitted.now_or_never(), Some(true));
//!
//! for layout in engine.edge_layouts() {
//!     println!("{}: {}", layout.id, layout.path.commands);
//! }
//! ```
//!
//! ## Core Types
//!
//! - [`FlowEngine`] - owns the stores, the viewport and the running gesture
//! - [`FlowController`] - shared handle with ready-made UI callbacks
//! - [`FlowConfig`] - behavior switches, loadable from JSON
//! - [`Hooks`] - host callbacks
//! - [`Snapshot`] - nodes, edges and viewport as JSON

pub mod changes;
pub mod config;
pub mod connection;
pub mod controller;
pub mod drag;
pub mod edges;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod hooks;
pub mod input;
pub mod path;
pub mod resize;
pub mod selection;
pub mod snapshot;
pub mod store;
pub mod transition;
pub mod types;
pub mod viewport;

#[cfg(feature = "slint")]
pub mod bindings;

pub use changes::{apply_edge_changes, apply_node_changes, EdgeChange, NodeChange};
pub use config::FlowConfig;
pub use connection::{ConnectionLine, ConnectionOutcome, ConnectionStatus};
pub use controller::FlowController;
pub use edges::EdgeLayout;
pub use engine::{FlowEngine, GestureKind};
pub use error::{ErrorCode, FlowError, Result};
pub use geometry::{CoordinateExtent, Dimensions, Point, Position, Rect, Viewport};
pub use graph::{
    CompositeValidator, ConnectionModeValidator, ConnectionValidator, MaxConnectionsValidator,
    NoDuplicatesValidator, NoSelfConnectionValidator, ValidationError, ValidationResult,
};
pub use hit_test::HandleAnchor;
pub use hooks::{ConnectionStart, Hooks};
pub use input::{Key, ModifierKey, Modifiers, MouseButton, PointerEvent, PointerTarget};
pub use path::EdgePath;
pub use resize::{ControlPosition, ResizeControl, ResizeDirection, ResizeEvent, ResizeParams, ResizeValues};
pub use selection::SelectionSet;
pub use snapshot::Snapshot;
pub use store::InternalNode;
pub use transition::{Easing, TransitionOptions, ViewportFuture};
pub use types::{
    Connection, ConnectionMode, Edge, EdgeKind, EdgeSelectionPolicy, Handle, HandleType, Node, NodeExtent,
    SelectionMode, SelectionRect,
};
pub use viewport::{FitViewOptions, WheelEvent};

#[cfg(feature = "slint")]
pub use bindings::ModelSync;
