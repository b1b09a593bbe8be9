use crate::error::FlowError;
use crate::hit_test::HandleAnchor;
use crate::store::NodeStore;
use crate::types::{Connection, ConnectionMode, Edge, HandleType};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Key into the connection index, at node, handle-type or handle granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandleKey {
    Node(String),
    Type(String, HandleType),
    Handle(String, HandleType, Option<String>),
}

impl HandleKey {
    pub fn node(node_id: &str) -> Self {
        HandleKey::Node(node_id.to_owned())
    }

    pub fn handle_type(node_id: &str, handle_type: HandleType) -> Self {
        HandleKey::Type(node_id.to_owned(), handle_type)
    }

    pub fn handle(node_id: &str, handle_type: HandleType, handle_id: Option<&str>) -> Self {
        HandleKey::Handle(node_id.to_owned(), handle_type, handle_id.map(str::to_owned))
    }
}

/// One edge as seen from one of its handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleConnection {
    pub edge_id: String,
    pub connection: Connection,
}

/// Builds the connection for a drag from `from` to `to`.
///
/// The direction follows the handle the drag started on: starting on a
/// target handle makes `to` the source.
pub fn connection_between(from: &HandleAnchor, to: &HandleAnchor) -> Connection {
    let (source, target) = if from.handle_type == HandleType::Target {
        (to, from)
    } else {
        (from, to)
    };
    Connection {
        source: source.node_id.clone(),
        target: target.node_id.clone(),
        source_handle: source.id.clone(),
        target_handle: target.id.clone(),
    }
}

fn same_connection(a: &Connection, b: &Connection) -> bool {
    a.source == b.source
        && a.target == b.target
        && a.source_handle == b.source_handle
        && a.target_handle == b.target_handle
}

/// Edge registry plus the handle → connections index.
#[derive(Debug, Default)]
pub struct EdgeStore {
    edges: IndexMap<String, Edge>,
    connections: HashMap<HandleKey, IndexMap<String, HandleConnection>>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all edges. Edges whose endpoints are missing are dropped.
    pub fn set_edges(&mut self, edges: Vec<Edge>, nodes: &NodeStore, errors: &mut Vec<FlowError>) {
        self.edges.clear();
        for edge in edges {
            if let Some(missing) = [&edge.source, &edge.target].into_iter().find(|id| !nodes.contains(id)) {
                errors.push(FlowError::MissingEdgeNode {
                    edge_id: edge.id.clone(),
                    node_id: missing.clone(),
                });
                continue;
            }
            self.edges.insert(edge.id.clone(), edge);
        }
        self.rebuild_connections();
    }

    /// Drops edges whose endpoints no longer exist and reports each one.
    /// Returns the dropped edges.
    pub fn prune(&mut self, nodes: &NodeStore, errors: &mut Vec<FlowError>) -> Vec<Edge> {
        let mut dropped = Vec::new();
        for edge in self.edges.values() {
            if let Some(missing) = [&edge.source, &edge.target].into_iter().find(|id| !nodes.contains(id)) {
                errors.push(FlowError::MissingEdgeNode {
                    edge_id: edge.id.clone(),
                    node_id: missing.clone(),
                });
                dropped.push(edge.id.clone());
            }
        }
        if dropped.is_empty() {
            return Vec::new();
        }
        self.remove(&dropped)
    }

    fn rebuild_connections(&mut self) {
        self.connections.clear();
        let edges: Vec<Edge> = self.edges.values().cloned().collect();
        for edge in &edges {
            self.index_edge(edge);
        }
    }

    fn keys_for(edge: &Edge) -> [HandleKey; 6] {
        [
            HandleKey::node(&edge.source),
            HandleKey::handle_type(&edge.source, HandleType::Source),
            HandleKey::handle(&edge.source, HandleType::Source, edge.source_handle.as_deref()),
            HandleKey::node(&edge.target),
            HandleKey::handle_type(&edge.target, HandleType::Target),
            HandleKey::handle(&edge.target, HandleType::Target, edge.target_handle.as_deref()),
        ]
    }

    fn index_edge(&mut self, edge: &Edge) {
        let connection = edge.connection();
        for key in Self::keys_for(edge) {
            self.connections.entry(key).or_default().insert(
                edge.id.clone(),
                HandleConnection {
                    edge_id: edge.id.clone(),
                    connection: connection.clone(),
                },
            );
        }
    }

    fn unindex_edge(&mut self, edge: &Edge) {
        for key in Self::keys_for(edge) {
            if let Some(map) = self.connections.get_mut(&key) {
                map.shift_remove(&edge.id);
                if map.is_empty() {
                    self.connections.remove(&key);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn user_edges(&self) -> Vec<Edge> {
        self.edges.values().cloned().collect()
    }

    /// Connections recorded under `key`, in insertion order.
    pub fn connections(&self, key: &HandleKey) -> impl Iterator<Item = &HandleConnection> {
        self.connections
            .get(key)
            .into_iter()
            .flat_map(|map| map.values())
    }

    pub fn connection_count(&self, key: &HandleKey) -> usize {
        self.connections.get(key).map_or(0, IndexMap::len)
    }

    /// Ids of edges touching any of `node_ids`.
    pub fn edges_of_nodes<'a, I>(&self, node_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out: IndexSet<String> = IndexSet::new();
        for id in node_ids {
            out.extend(self.connections(&HandleKey::node(id)).map(|c| c.edge_id.clone()));
        }
        out.into_iter().collect()
    }

    pub fn has_connection(&self, connection: &Connection) -> bool {
        self.connections(&HandleKey::node(&connection.source))
            .any(|c| same_connection(&c.connection, connection))
    }

    /// Adds an edge unless it duplicates an existing connection or id.
    pub fn add_edge(&mut self, edge: Edge, nodes: &NodeStore, errors: &mut Vec<FlowError>) -> bool {
        if self.edges.contains_key(&edge.id) || self.has_connection(&edge.connection()) {
            debug!(edge = %edge.id, "edge already exists");
            return false;
        }
        if let Some(missing) = [&edge.source, &edge.target].into_iter().find(|id| !nodes.contains(id)) {
            errors.push(FlowError::MissingEdgeNode {
                edge_id: edge.id.clone(),
                node_id: missing.clone(),
            });
            return false;
        }
        self.index_edge(&edge);
        self.edges.insert(edge.id.clone(), edge);
        true
    }

    /// Moves an edge onto a new connection, keeping its id.
    pub fn reconnect(&mut self, edge_id: &str, connection: &Connection) -> Option<Edge> {
        let old = self.edges.get(edge_id)?.clone();
        self.unindex_edge(&old);
        let mut edge = old;
        edge.source = connection.source.clone();
        edge.target = connection.target.clone();
        edge.source_handle = connection.source_handle.clone();
        edge.target_handle = connection.target_handle.clone();
        self.index_edge(&edge);
        self.edges.insert(edge_id.to_owned(), edge.clone());
        Some(edge)
    }

    /// Replaces an edge wholesale; `None` if `edge_id` is unknown.
    pub fn replace(&mut self, edge_id: &str, edge: Edge) -> Option<Edge> {
        let old = self.edges.shift_remove(edge_id)?;
        self.unindex_edge(&old);
        self.index_edge(&edge);
        self.edges.insert(edge.id.clone(), edge);
        Some(old)
    }

    pub fn remove(&mut self, ids: &[String]) -> Vec<Edge> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(edge) = self.edges.shift_remove(id) {
                self.unindex_edge(&edge);
                removed.push(edge);
            }
        }
        removed
    }

    /// Returns whether the flag flipped.
    pub fn set_selected(&mut self, id: &str, selected: bool) -> bool {
        match self.edges.get_mut(id) {
            Some(edge) if edge.selected != selected => {
                edge.selected = selected;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Connection Validation Framework
// ============================================================================

/// Result of connection validation with optional rejection reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Connection is valid
    Valid,
    /// Connection is invalid with a reason
    Invalid(ValidationError),
}

impl ValidationResult {
    /// Check if the result is valid
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Combine two results (AND logic): returns first error if any
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }
}

/// Reasons why a connection validation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cannot connect a handle to itself
    SameHandle,
    /// Cannot connect two handles of the same node
    SameNode,
    /// Both handles are sources or both are targets
    IncompatibleHandleTypes,
    /// A connection between these handles already exists
    DuplicateConnection,
    /// Handle has reached maximum connections
    MaxConnectionsReached {
        node_id: String,
        handle_id: Option<String>,
        max: usize,
    },
    /// The node does not accept connections
    NotConnectable(String),
    /// Custom validation failure
    Custom(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameHandle => write!(f, "Cannot connect handle to itself"),
            Self::SameNode => write!(f, "Cannot connect handles on same node"),
            Self::IncompatibleHandleTypes => write!(f, "Must connect source to target"),
            Self::DuplicateConnection => write!(f, "Connection already exists"),
            Self::MaxConnectionsReached { node_id, handle_id, max } => write!(
                f,
                "Handle {}:{} has reached max {} connections",
                node_id,
                handle_id.as_deref().unwrap_or("-"),
                max
            ),
            Self::NotConnectable(node_id) => write!(f, "Node {} is not connectable", node_id),
            Self::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

/// Trait for connection validation logic.
///
/// Implement this to add rules for connecting handles. Use with
/// [`validate_connection`] or compose with [`CompositeValidator`].
///
/// # Example
///
/// ```ignore
/// struct OnlyIntoSinks;
///
/// impl ConnectionValidator for OnlyIntoSinks {
///     fn validate(
///         &self,
///         _from: &HandleAnchor,
///         to: &HandleAnchor,
///         nodes: &NodeStore,
///         _edges: &EdgeStore,
///     ) -> ValidationResult {
///         match nodes.get(&to.node_id).and_then(|n| n.node.node_type.as_deref()) {
///             Some("sink") => ValidationResult::Valid,
///             _ => ValidationResult::Invalid(ValidationError::Custom("sinks only".into())),
///         }
///     }
/// }
/// ```
pub trait ConnectionValidator {
    /// Check if a connection from `from` (where the drag started) to `to` is valid
    fn validate(
        &self,
        from: &HandleAnchor,
        to: &HandleAnchor,
        nodes: &NodeStore,
        edges: &EdgeStore,
    ) -> ValidationResult;
}

/// The structural rule of a [`ConnectionMode`].
///
/// `Strict` only connects a source to a target. `Loose` connects any two
/// handles that are not the same handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionModeValidator {
    mode: ConnectionMode,
}

impl ConnectionModeValidator {
    pub fn new(mode: ConnectionMode) -> Self {
        Self { mode }
    }
}

impl ConnectionValidator for ConnectionModeValidator {
    fn validate(&self, from: &HandleAnchor, to: &HandleAnchor, _nodes: &NodeStore, _edges: &EdgeStore) -> ValidationResult {
        match self.mode {
            ConnectionMode::Strict if from.handle_type == to.handle_type => {
                if from.is_same_handle(to) {
                    ValidationResult::Invalid(ValidationError::SameHandle)
                } else {
                    ValidationResult::Invalid(ValidationError::IncompatibleHandleTypes)
                }
            }
            ConnectionMode::Loose if from.is_same_handle(to) => {
                ValidationResult::Invalid(ValidationError::SameHandle)
            }
            _ => ValidationResult::Valid,
        }
    }
}

/// Validator that prevents connecting a node to itself
#[derive(Clone, Debug, Default)]
pub struct NoSelfConnectionValidator;

impl ConnectionValidator for NoSelfConnectionValidator {
    fn validate(&self, from: &HandleAnchor, to: &HandleAnchor, _nodes: &NodeStore, _edges: &EdgeStore) -> ValidationResult {
        if from.node_id == to.node_id {
            ValidationResult::Invalid(ValidationError::SameNode)
        } else {
            ValidationResult::Valid
        }
    }
}

/// Validator that prevents duplicate connections
#[derive(Clone, Debug, Default)]
pub struct NoDuplicatesValidator;

impl ConnectionValidator for NoDuplicatesValidator {
    fn validate(&self, from: &HandleAnchor, to: &HandleAnchor, _nodes: &NodeStore, edges: &EdgeStore) -> ValidationResult {
        if edges.has_connection(&connection_between(from, to)) {
            ValidationResult::Invalid(ValidationError::DuplicateConnection)
        } else {
            ValidationResult::Valid
        }
    }
}

/// Validator that caps the number of connections on the target handle
#[derive(Clone, Copy, Debug)]
pub struct MaxConnectionsValidator {
    max: usize,
}

impl MaxConnectionsValidator {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl ConnectionValidator for MaxConnectionsValidator {
    fn validate(&self, _from: &HandleAnchor, to: &HandleAnchor, _nodes: &NodeStore, edges: &EdgeStore) -> ValidationResult {
        let key = HandleKey::handle(&to.node_id, to.handle_type, to.id.as_deref());
        if edges.connection_count(&key) >= self.max {
            ValidationResult::Invalid(ValidationError::MaxConnectionsReached {
                node_id: to.node_id.clone(),
                handle_id: to.id.clone(),
                max: self.max,
            })
        } else {
            ValidationResult::Valid
        }
    }
}

/// Composite validator that combines multiple validators
///
/// All validators must return Valid for the connection to be valid (AND
/// logic). Returns the first error encountered.
///
/// # Example
///
/// ```ignore
/// let validator = CompositeValidator::new()
///     .add(ConnectionModeValidator::new(ConnectionMode::Strict))
///     .add(NoDuplicatesValidator);
/// ```
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn ConnectionValidator>>,
}

impl CompositeValidator {
    /// Create a new empty composite validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the composite
    ///
    /// Validators are checked in the order they were added.
    pub fn add<V: ConnectionValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl ConnectionValidator for CompositeValidator {
    fn validate(&self, from: &HandleAnchor, to: &HandleAnchor, nodes: &NodeStore, edges: &EdgeStore) -> ValidationResult {
        for v in &self.validators {
            let result = v.validate(from, to, nodes, edges);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}

impl fmt::Debug for CompositeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeValidator")
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Convenience function to validate a connection with any validator
pub fn validate_connection<V>(
    from: &HandleAnchor,
    to: &HandleAnchor,
    nodes: &NodeStore,
    edges: &EdgeStore,
    validator: &V,
) -> ValidationResult
where
    V: ConnectionValidator + ?Sized,
{
    validator.validate(from, to, nodes, edges)
}

// ============================================================================
// Tests
// ============================================================================
