//! Error types
//!
//! One enum per concern. Recognition and move faults are recovered inside
//! their owning component and never reach the session; the rest surface as
//! notifications or as `Err` from the session handle.

use crate::models::ImageId;
use std::path::PathBuf;
use thiserror::Error;

/// Media index query failed
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Library root not found: {0}")]
    RootMissing(PathBuf),

    #[error("Failed to read media index: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk library: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Text recognition engine fault (mapped to "no text" by the client)
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Failed to start OCR engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("OCR engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },

    #[error("Image not found: {0}")]
    NotFound(String),
}

/// A single move primitive failed
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Write access denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Move failed: {0}")]
    Io(#[from] std::io::Error),
}

impl MoveError {
    /// Classify an I/O error for `handle`, separating permission faults
    pub fn from_io(handle: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => MoveError::PermissionDenied(handle.to_string()),
            std::io::ErrorKind::NotFound => MoveError::NotFound(handle.to_string()),
            // EPERM surfaces as `Other` on some platforms
            _ if err.raw_os_error() == Some(1) => MoveError::PermissionDenied(handle.to_string()),
            _ => MoveError::Io(err),
        }
    }
}

/// Authorization request could not be produced
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Authorization batch of {requested} exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    #[error("Authorization request failed: {0}")]
    Request(String),
}

/// Classification run aborted
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Scan cancelled")]
    Cancelled,
}

/// Relocation could not reach an outcome
#[derive(Debug, Error)]
pub enum RelocationError {
    /// The broker failed after some resources had already moved
    #[error("Could not request write access: {source}")]
    Broker {
        #[source]
        source: BrokerError,
        moved: Vec<ImageId>,
    },
}

/// Intent rejected by the session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A relocation is already running")]
    RelocationInFlight,

    #[error("An authorization request is still waiting for the user")]
    AuthorizationPending,

    #[error("No authorization request is pending")]
    NoPendingAuthorization,

    #[error("Session has shut down")]
    Closed,
}

/// Settings could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

macro_rules! into_string {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for String {
                fn from(err: $ty) -> Self {
                    err.to_string()
                }
            }
        )*
    };
}

into_string!(
    MediaError,
    RecognitionError,
    MoveError,
    BrokerError,
    PipelineError,
    RelocationError,
    SessionError,
    ConfigError
);
