//! Error types for omerotag

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(String),

    #[error("invalid attribute path {path}: {reason}")]
    PathValidation { path: String, reason: String },

    #[error("traversal error on {object}: {message}")]
    Traversal { object: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    pub fn path_validation(path: &[String], reason: impl Into<String>) -> Self {
        Self::PathValidation {
            path: path.join("."),
            reason: reason.into(),
        }
    }

    pub fn traversal(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Traversal {
            object: object.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Traversal errors only cost the branch they happened in; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Traversal { .. })
    }
}
