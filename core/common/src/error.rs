//! Common error types for nodesync.

use thiserror::Error;

use crate::path::NodePath;

/// Top-level error type for namespace and engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The node does not exist.
    #[error("No such path: {0}")]
    NoSuchPath(NodePath),

    /// The node already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(NodePath),

    /// Optimistic write rejected because the node moved on.
    #[error("Version conflict on {path}: expected {expected}, found {actual}")]
    VersionConflict {
        path: NodePath,
        expected: i32,
        actual: i32,
    },

    /// Plain delete of a node that still has children.
    #[error("Node not empty: {0}")]
    NotEmpty(NodePath),

    /// The service refused access to the node.
    #[error("Not authorized: {0}")]
    NotAuthorized(NodePath),

    /// Malformed input such as an invalid path or child name.
    #[error("Bad arguments: {0}")]
    BadArguments(String),

    /// Operation is never allowed, e.g. deleting the root.
    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    /// The session with the coordination service is gone.
    #[error("Connection lost: {0}")]
    ConnectionLoss(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Path the failure is about, for path-scoped variants.
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Error::NoSuchPath(path)
            | Error::AlreadyExists(path)
            | Error::NotEmpty(path)
            | Error::NotAuthorized(path)
            | Error::VersionConflict { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_scoped_errors_expose_path() {
        let path = NodePath::parse("/a/b").unwrap();
        let err = Error::VersionConflict {
            path: path.clone(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.path(), Some(&path));
        assert_eq!(
            err.to_string(),
            "Version conflict on /a/b: expected 1, found 2"
        );

        assert!(Error::BadArguments("x".to_string()).path().is_none());
    }
}
