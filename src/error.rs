//! Error types for marktask
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown list, bad config)
//! - 3: Stale state (file changed since it was read; re-extract and retry)
//! - 4: Operation failed (I/O, serialization, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the marktask CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const STALE_STATE: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for marktask operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown list: {0}")]
    UnknownList(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Stale state (exit code 3)
    #[error("Task at {path}:{line} no longer matches the file content")]
    TaskMoved { path: PathBuf, line: usize },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::UnknownList(_)
            | Error::TaskNotFound(_) => exit_codes::USER_ERROR,

            Error::TaskMoved { .. } => exit_codes::STALE_STATE,

            Error::Persist { source, .. } if source.is_recoverable() => exit_codes::STALE_STATE,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::Persist { .. }
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True when the caller should re-extract the affected file and retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::TaskMoved { .. } => true,
            Error::Persist { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Wrap an error with the path of the file that failed to persist
    pub fn persist(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Persist {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for marktask operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::TaskMoved { path, line } => Some(serde_json::json!({
                "path": path,
                "line": line,
            })),
            Error::Persist { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details,
        }
    }
}
