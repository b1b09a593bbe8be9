use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T, E = FlowError> = std::result::Result<T, E>;

/// Stable codes handed to the `on_error` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    DuplicateNode,
    MissingParent,
    ParentCycle,
    MissingEdgeNode,
    MissingHandle,
    NodeNotMeasured,
    InvalidConfig,
    InvalidSnapshot,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateNode => "duplicate-node",
            ErrorCode::MissingParent => "missing-parent",
            ErrorCode::ParentCycle => "parent-cycle",
            ErrorCode::MissingEdgeNode => "missing-edge-node",
            ErrorCode::MissingHandle => "missing-handle",
            ErrorCode::NodeNotMeasured => "node-not-measured",
            ErrorCode::InvalidConfig => "invalid-config",
            ErrorCode::InvalidSnapshot => "invalid-snapshot",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Duplicate node id `{id}`, keeping the last occurrence")]
    DuplicateNode { id: String },

    #[error("Parent node `{parent_id}` of node `{node_id}` not found, treating it as a root")]
    MissingParent { node_id: String, parent_id: String },

    #[error("Node `{node_id}` is part of a parent cycle, treating it as a root")]
    ParentCycle { node_id: String },

    #[error("Edge `{edge_id}` references missing node `{node_id}`")]
    MissingEdgeNode { edge_id: String, node_id: String },

    #[error("Edge `{edge_id}`: no {handle} handle on node `{node_id}`")]
    MissingHandle {
        edge_id: String,
        node_id: String,
        handle: String,
    },

    #[error("Node `{node_id}` has not been measured yet")]
    NodeNotMeasured { node_id: String },

    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    InvalidSnapshot(#[from] serde_json::Error),
}

impl FlowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FlowError::DuplicateNode { .. } => ErrorCode::DuplicateNode,
            FlowError::MissingParent { .. } => ErrorCode::MissingParent,
            FlowError::ParentCycle { .. } => ErrorCode::ParentCycle,
            FlowError::MissingEdgeNode { .. } => ErrorCode::MissingEdgeNode,
            FlowError::MissingHandle { .. } => ErrorCode::MissingHandle,
            FlowError::NodeNotMeasured { .. } => ErrorCode::NodeNotMeasured,
            FlowError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            FlowError::InvalidSnapshot(_) => ErrorCode::InvalidSnapshot,
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        FlowError::InvalidConfig {
            message: message.into(),
        }
    }
}
