//! Connection drag state machine.
//!
//! A [`ConnectionDrag`] starts on a handle, follows the pointer, and looks
//! for the closest handle within the connection radius. Every move
//! re-evaluates the candidate:
//!
//! ```text
//! Pending --threshold--> Searching <--> Valid | Invalid
//!                                  \-- pointer up --> outcome
//! ```
//!
//! Reconnecting an existing edge uses the same machine, anchored at the
//! edge's fixed end.

use crate::geometry::{Point, Position};
use crate::graph::{connection_between, ConnectionModeValidator, ConnectionValidator, EdgeStore, ValidationError, ValidationResult};
use crate::hit_test::{find_closest_handle, HandleAnchor};
use crate::path::{edge_path, EdgePath, PathEndpoints};
use crate::store::NodeStore;
use crate::types::{Connection, ConnectionMode, EdgeKind, EdgePathOptions, HandleType};
use tracing::{debug, trace};

/// Rules applied while looking for a target handle.
pub struct ConnectionContext<'a> {
    pub mode: ConnectionMode,
    /// Flow-space radius around the pointer searched for handles.
    pub radius: f32,
    /// Screen distance the pointer must travel before the drag starts.
    pub drag_threshold: f32,
    /// Default for nodes without an explicit `connectable`.
    pub nodes_connectable: bool,
    /// Extra rules on top of the connection mode.
    pub validator: Option<&'a dyn ConnectionValidator>,
    /// Host predicate, asked last.
    pub is_valid_connection: Option<&'a dyn Fn(&Connection) -> bool>,
}

impl<'a> ConnectionContext<'a> {
    pub fn new(mode: ConnectionMode, radius: f32) -> Self {
        Self {
            mode,
            radius,
            drag_threshold: 0.0,
            nodes_connectable: true,
            validator: None,
            is_valid_connection: None,
        }
    }
}

/// The edge being reconnected and the end that follows the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnect {
    pub edge_id: String,
    pub moving_end: HandleType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Below the drag threshold.
    Pending,
    /// No handle in range.
    Searching,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutcome {
    Connect(Connection),
    Reconnect { edge_id: String, connection: Connection },
    /// Released away from a valid handle.
    Invalid,
    /// Released before the drag threshold, or cancelled.
    Cancelled,
}

/// Render state of an in-progress connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionLine {
    pub from: Point,
    pub from_position: Position,
    pub to: Point,
    pub to_position: Position,
    pub status: ConnectionStatus,
}

#[derive(Debug, Clone)]
pub struct ConnectionDrag {
    from: HandleAnchor,
    reconnect: Option<Reconnect>,
    start_screen: Point,
    pointer: Point,
    target: Option<HandleAnchor>,
    status: ConnectionStatus,
    error: Option<ValidationError>,
}

impl ConnectionDrag {
    pub fn new(from: HandleAnchor, pointer_screen: Point, pointer_flow: Point, reconnect: Option<Reconnect>) -> Self {
        debug!(node = %from.node_id, handle = ?from.id, kind = ?from.handle_type, "connection pending");
        Self {
            from,
            reconnect,
            start_screen: pointer_screen,
            pointer: pointer_flow,
            target: None,
            status: ConnectionStatus::Pending,
            error: None,
        }
    }

    pub fn from(&self) -> &HandleAnchor {
        &self.from
    }

    pub fn reconnect(&self) -> Option<&Reconnect> {
        self.reconnect.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status != ConnectionStatus::Pending
    }

    /// The handle under consideration, valid or not.
    pub fn target(&self) -> Option<&HandleAnchor> {
        self.target.as_ref()
    }

    /// Why the current target was rejected.
    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    /// Follows the pointer. Returns `true` on the move that crosses the drag threshold.
    pub fn update(
        &mut self,
        pointer_screen: Point,
        pointer_flow: Point,
        nodes: &NodeStore,
        edges: &EdgeStore,
        ctx: &ConnectionContext<'_>,
    ) -> bool {
        self.pointer = pointer_flow;
        let mut started = false;
        if self.status == ConnectionStatus::Pending {
            if pointer_screen.distance(self.start_screen) <= ctx.drag_threshold {
                return false;
            }
            debug!(node = %self.from.node_id, "connection started");
            self.status = ConnectionStatus::Searching;
            started = true;
        }

        let candidates: Vec<HandleAnchor> = nodes
            .iter()
            .filter(|n| !n.node.hidden)
            .flat_map(|n| n.anchors())
            .collect();
        let closest = find_closest_handle(pointer_flow, ctx.radius, &candidates, Some(self.from.handle_type)).cloned();

        match closest {
            None => {
                self.target = None;
                self.error = None;
                self.status = ConnectionStatus::Searching;
            }
            Some(handle) => {
                let result = self.evaluate(&handle, nodes, edges, ctx);
                trace!(node = %handle.node_id, handle = ?handle.id, valid = result.is_valid(), "connection candidate");
                match result {
                    ValidationResult::Valid => {
                        self.status = ConnectionStatus::Valid;
                        self.error = None;
                    }
                    ValidationResult::Invalid(err) => {
                        self.status = ConnectionStatus::Invalid;
                        self.error = Some(err);
                    }
                }
                self.target = Some(handle);
            }
        }
        started
    }

    fn evaluate(&self, to: &HandleAnchor, nodes: &NodeStore, edges: &EdgeStore, ctx: &ConnectionContext<'_>) -> ValidationResult {
        let connectable = nodes
            .get(&to.node_id)
            .map_or(false, |n| n.node.connectable.unwrap_or(ctx.nodes_connectable));
        if !connectable {
            return ValidationResult::Invalid(ValidationError::NotConnectable(to.node_id.clone()));
        }

        let mut result = ConnectionModeValidator::new(ctx.mode).validate(&self.from, to, nodes, edges);
        if let Some(validator) = ctx.validator {
            result = result.and(validator.validate(&self.from, to, nodes, edges));
        }
        if result.is_valid() {
            if let Some(is_valid) = ctx.is_valid_connection {
                if !is_valid(&connection_between(&self.from, to)) {
                    result = ValidationResult::Invalid(ValidationError::Custom("rejected by isValidConnection".into()));
                }
            }
        }
        result
    }

    /// The connection the drag would create right now.
    pub fn connection(&self) -> Option<Connection> {
        match (&self.target, self.status) {
            (Some(to), ConnectionStatus::Valid) => Some(connection_between(&self.from, to)),
            _ => None,
        }
    }

    /// Line from the start handle to the pointer, snapped to a valid target.
    pub fn line(&self) -> ConnectionLine {
        let (to, to_position) = match (&self.target, self.status) {
            (Some(t), ConnectionStatus::Valid) => (t.anchor(), t.position),
            _ => (self.pointer, self.from.position.opposite()),
        };
        ConnectionLine {
            from: self.from.anchor(),
            from_position: self.from.position,
            to,
            to_position,
            status: self.status,
        }
    }

    /// Path of [`line`](Self::line) for drawing.
    pub fn path(&self, kind: EdgeKind) -> EdgePath {
        let line = self.line();
        edge_path(
            kind,
            &PathEndpoints::new(line.from, line.from_position, line.to, line.to_position),
            &EdgePathOptions::default(),
        )
    }

    pub fn finish(self) -> ConnectionOutcome {
        let outcome = match self.status {
            ConnectionStatus::Pending => ConnectionOutcome::Cancelled,
            ConnectionStatus::Valid => match (self.connection(), self.reconnect) {
                (Some(connection), Some(reconnect)) => ConnectionOutcome::Reconnect {
                    edge_id: reconnect.edge_id,
                    connection,
                },
                (Some(connection), None) => ConnectionOutcome::Connect(connection),
                (None, _) => ConnectionOutcome::Invalid,
            },
            ConnectionStatus::Searching | ConnectionStatus::Invalid => ConnectionOutcome::Invalid,
        };
        debug!(?outcome, "connection finished");
        outcome
    }
}
