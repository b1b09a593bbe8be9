//! Host callbacks.
//!
//! [`Hooks`] is built once and handed to the engine:
//!
//! ```
//! use node_flow::Hooks;
//!
//! let hooks = Hooks::new()
//!     .on_connect(|connection| println!("{} -> {}", connection.source, connection.target))
//!     .on_error(|code, message| eprintln!("{code}: {message}"));
//! ```
//!
//! Hooks receive data, never the engine, so they cannot re-enter it. The
//! `on_before_*` hooks and `should_resize` can veto or transform what the
//! engine is about to do.

use crate::changes::{EdgeChange, NodeChange};
use crate::connection::ConnectionOutcome;
use crate::error::ErrorCode;
use crate::geometry::{Point, Viewport};
use crate::resize::ResizeEvent;
use crate::selection::SelectionSet;
use crate::types::{Connection, Edge, HandleType, Node};
use std::fmt;
use tracing::warn;

/// Where a connection drag started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStart {
    pub node_id: String,
    pub handle_id: Option<String>,
    pub handle_type: HandleType,
}

type Callback<A> = Option<Box<dyn FnMut(A)>>;

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident, $($bound:tt)+) => {
        $(#[$doc])*
        pub fn $name<F>(mut self, f: F) -> Self
        where
            F: $($bound)+ + 'static,
        {
            self.$name = Some(Box::new(f));
            self
        }
    };
}

#[derive(Default)]
pub struct Hooks {
    pub(crate) on_nodes_change: Option<Box<dyn FnMut(&[NodeChange])>>,
    pub(crate) on_edges_change: Option<Box<dyn FnMut(&[EdgeChange])>>,

    pub(crate) on_connect: Option<Box<dyn FnMut(&Connection)>>,
    pub(crate) on_connect_start: Option<Box<dyn FnMut(&ConnectionStart)>>,
    pub(crate) on_connect_end: Option<Box<dyn FnMut(&ConnectionOutcome)>>,
    pub(crate) on_before_connect: Option<Box<dyn FnMut(Edge) -> Option<Edge>>>,
    pub(crate) is_valid_connection: Option<Box<dyn Fn(&Connection) -> bool>>,

    pub(crate) on_reconnect_start: Option<Box<dyn FnMut(&Edge, HandleType)>>,
    pub(crate) on_reconnect: Option<Box<dyn FnMut(&Edge, &Connection)>>,
    pub(crate) on_reconnect_end: Option<Box<dyn FnMut(&Edge, HandleType, bool)>>,
    pub(crate) on_before_reconnect: Option<Box<dyn FnMut(&Edge, Connection) -> Option<Connection>>>,

    pub(crate) on_node_drag_start: Option<Box<dyn FnMut(&str, &[Node])>>,
    pub(crate) on_node_drag: Option<Box<dyn FnMut(&str, &[Node])>>,
    pub(crate) on_node_drag_stop: Option<Box<dyn FnMut(&str, &[Node])>>,
    pub(crate) on_selection_drag_start: Option<Box<dyn FnMut(&[Node])>>,
    pub(crate) on_selection_drag: Option<Box<dyn FnMut(&[Node])>>,
    pub(crate) on_selection_drag_stop: Option<Box<dyn FnMut(&[Node])>>,

    pub(crate) on_selection_change: Option<Box<dyn FnMut(&SelectionSet)>>,
    pub(crate) on_selection_start: Option<Box<dyn FnMut()>>,
    pub(crate) on_selection_end: Option<Box<dyn FnMut()>>,

    pub(crate) on_resize_start: Option<Box<dyn FnMut(&ResizeEvent)>>,
    pub(crate) on_resize: Option<Box<dyn FnMut(&ResizeEvent)>>,
    pub(crate) on_resize_end: Option<Box<dyn FnMut(&ResizeEvent)>>,
    pub(crate) should_resize: Option<Box<dyn FnMut(&ResizeEvent) -> bool>>,

    pub(crate) on_error: Option<Box<dyn FnMut(ErrorCode, &str)>>,

    pub(crate) on_init: Option<Box<dyn FnMut()>>,
    pub(crate) on_viewport_change: Callback<Viewport>,
    pub(crate) on_move_start: Callback<Viewport>,
    pub(crate) on_move_end: Callback<Viewport>,

    pub(crate) on_delete: Option<Box<dyn FnMut(&[Node], &[Edge])>>,
    pub(crate) on_before_delete: Option<Box<dyn FnMut(&[Node], &[Edge]) -> bool>>,

    pub(crate) on_node_click: Option<Box<dyn FnMut(&str)>>,
    pub(crate) on_edge_click: Option<Box<dyn FnMut(&str)>>,
    pub(crate) on_pane_click: Callback<Point>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(
        /// Changes from one outermost batch.
        on_nodes_change, FnMut(&[NodeChange])
    );
    setter!(on_edges_change, FnMut(&[EdgeChange]));

    setter!(on_connect, FnMut(&Connection));
    setter!(on_connect_start, FnMut(&ConnectionStart));
    setter!(on_connect_end, FnMut(&ConnectionOutcome));
    setter!(
        /// Sees the edge about to be added; `None` vetoes it.
        on_before_connect, FnMut(Edge) -> Option<Edge>
    );
    setter!(
        /// Asked for every candidate handle during a connection drag.
        is_valid_connection, Fn(&Connection) -> bool
    );

    setter!(on_reconnect_start, FnMut(&Edge, HandleType));
    setter!(
        /// The old edge and its new endpoints.
        on_reconnect, FnMut(&Edge, &Connection)
    );
    setter!(
        /// The edge, the end that moved, and whether the reconnect succeeded.
        on_reconnect_end, FnMut(&Edge, HandleType, bool)
    );
    setter!(
        /// Can substitute the new endpoints; `None` vetoes the reconnect.
        on_before_reconnect, FnMut(&Edge, Connection) -> Option<Connection>
    );

    setter!(
        /// The grabbed node and every node that moves with it.
        on_node_drag_start, FnMut(&str, &[Node])
    );
    setter!(on_node_drag, FnMut(&str, &[Node]));
    setter!(on_node_drag_stop, FnMut(&str, &[Node]));
    setter!(on_selection_drag_start, FnMut(&[Node]));
    setter!(on_selection_drag, FnMut(&[Node]));
    setter!(on_selection_drag_stop, FnMut(&[Node]));

    setter!(on_selection_change, FnMut(&SelectionSet));
    setter!(
        /// A marquee started.
        on_selection_start, FnMut()
    );
    setter!(on_selection_end, FnMut());

    setter!(on_resize_start, FnMut(&ResizeEvent));
    setter!(on_resize, FnMut(&ResizeEvent));
    setter!(on_resize_end, FnMut(&ResizeEvent));
    setter!(
        /// Returning `false` skips that resize step.
        should_resize, FnMut(&ResizeEvent) -> bool
    );

    setter!(
        /// Replaces the default `tracing::warn!` reporting.
        on_error, FnMut(ErrorCode, &str)
    );

    setter!(
        /// Called once, the first time every node is measured.
        on_init, FnMut()
    );
    setter!(on_viewport_change, FnMut(Viewport));
    setter!(on_move_start, FnMut(Viewport));
    setter!(on_move_end, FnMut(Viewport));

    setter!(on_delete, FnMut(&[Node], &[Edge]));
    setter!(
        /// Returning `false` cancels the deletion.
        on_before_delete, FnMut(&[Node], &[Edge]) -> bool
    );

    setter!(on_node_click, FnMut(&str));
    setter!(on_edge_click, FnMut(&str));
    setter!(
        /// Flow-space position of the click.
        on_pane_click, FnMut(Point)
    );

    pub(crate) fn error(&mut self, code: ErrorCode, message: &str) {
        match self.on_error.as_mut() {
            Some(f) => f(code, message),
            None => warn!(%code, "{message}"),
        }
    }

    fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        macro_rules! collect {
            ($($field:ident),+ $(,)?) => {
                $(if self.$field.is_some() { names.push(stringify!($field)); })+
            };
        }
        collect!(
            on_nodes_change,
            on_edges_change,
            on_connect,
            on_connect_start,
            on_connect_end,
            on_before_connect,
            is_valid_connection,
            on_reconnect_start,
            on_reconnect,
            on_reconnect_end,
            on_before_reconnect,
            on_node_drag_start,
            on_node_drag,
            on_node_drag_stop,
            on_selection_drag_start,
            on_selection_drag,
            on_selection_drag_stop,
            on_selection_change,
            on_selection_start,
            on_selection_end,
            on_resize_start,
            on_resize,
            on_resize_end,
            should_resize,
            on_error,
            on_init,
            on_viewport_change,
            on_move_start,
            on_move_end,
            on_delete,
            on_before_delete,
            on_node_click,
            on_edge_click,
            on_pane_click,
        );
        names
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("set", &self.names()).finish()
    }
}
