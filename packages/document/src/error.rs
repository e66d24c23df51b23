use crate::NodeKey;
use thiserror::Error;

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Parent not found: {0}")]
    ParentNotFound(NodeKey),

    #[error("Would create cycle moving {0}")]
    CycleDetected(NodeKey),

    #[error("Node {0} is not text")]
    NotText(NodeKey),

    #[error("Node {0} cannot have children")]
    CannotHaveChildren(NodeKey),

    #[error("Offset {offset} out of range for node {key}")]
    InvalidOffset { key: NodeKey, offset: usize },

    #[error("Cannot detach the root node")]
    DetachRoot,

    #[error("Duplicate node key: {0}")]
    DuplicateKey(NodeKey),

    #[error("Serialized node is missing a key")]
    MissingKey,

    #[error("Invalid serialized node: {0}")]
    InvalidNode(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        DocumentError::Json(e.to_string())
    }
}
