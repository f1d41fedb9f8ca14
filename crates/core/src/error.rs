//! Error taxonomy for operations against a document database.
//!
//! Every failure an operation can produce is represented by [`Error`]. The
//! variants are grouped into the categories returned by [`Error::kind`]:
//!
//! | Kind | Variants | Surfaces |
//! |------|----------|----------|
//! | Validation | `Validation`, `Config` | synchronously, before any request is sent |
//! | Transport | `Transport`, `Timeout`, `Cancelled` | completion |
//! | NotFound | `NotFound` | completion |
//! | ResourceMissing | `ResourceMissing` | completion |
//! | Conflict | `Conflict` | completion |
//! | Unauthorized | `Unauthorized` | completion |
//! | Server | `BadRequest`, `Server` | completion |
//! | Decoding | `Decoding` | completion |
//!
//! Errors are `Clone + PartialEq` so that a completion can be inspected,
//! forwarded and compared without losing the status code.

use serde::{Deserialize, Serialize};

/// Result type alias for settee operations
pub type Result<T> = std::result::Result<T, Error>;

/// Operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Caller misuse ====================
    /// The operation was rejected before anything was sent
    #[error("invalid operation: {reason}")]
    Validation { reason: String },

    /// Client configuration is invalid
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // ==================== Transport ====================
    /// Connection failure or broken response stream
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The operation's deadline expired
    #[error("operation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The operation was cancelled by its handle or by dispatcher shutdown
    #[error("operation cancelled")]
    Cancelled,

    // ==================== Server responses ====================
    /// The requested document does not exist (or was deleted)
    #[error("document not found ({status}): {reason}")]
    NotFound { status: u16, reason: String },

    /// A database, design document, view or index does not exist
    #[error("resource missing ({status}): {reason}")]
    ResourceMissing { status: u16, reason: String },

    /// Revision mismatch on write or delete, or the resource already exists
    #[error("conflict ({status}): {reason}")]
    Conflict { status: u16, reason: String },

    /// Credentials missing, wrong, or insufficient
    #[error("unauthorized ({status}): {reason}")]
    Unauthorized { status: u16, reason: String },

    /// The server rejected the request as malformed
    #[error("bad request ({status}): {reason}")]
    BadRequest { status: u16, reason: String },

    /// 5xx or any other unexpected status
    #[error("server error ({status}): {reason}")]
    Server { status: u16, reason: String },

    // ==================== Response shape ====================
    /// The response body did not match the expected shape
    #[error("decoding error: {reason}")]
    Decoding { reason: String },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller misuse, never sent over the wire
    Validation,
    /// Connection failure, broken stream
    Transport,
    /// Deadline expired
    Timeout,
    /// Cancelled by the caller
    Cancelled,
    /// Document not found
    NotFound,
    /// Database, view, design document or index missing
    ResourceMissing,
    /// Revision mismatch
    Conflict,
    /// Authentication or authorization failure
    Unauthorized,
    /// Server-side failure or rejected request
    Server,
    /// Unexpected response body
    Decoding,
}

impl Error {
    /// Shorthand for a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Shorthand for a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Error::Transport {
            reason: reason.into(),
        }
    }

    /// Shorthand for a decoding error.
    pub fn decoding(reason: impl Into<String>) -> Self {
        Error::Decoding {
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } | Error::Config { .. } => ErrorKind::Validation,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::ResourceMissing { .. } => ErrorKind::ResourceMissing,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::BadRequest { .. } | Error::Server { .. } => ErrorKind::Server,
            Error::Decoding { .. } => ErrorKind::Decoding,
        }
    }

    /// HTTP status code of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound { status, .. }
            | Error::ResourceMissing { status, .. }
            | Error::Conflict { status, .. }
            | Error::Unauthorized { status, .. }
            | Error::BadRequest { status, .. }
            | Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for errors raised before any network activity.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// True for cancellation and timeout, the two ways an operation is cut short.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decoding {
            reason: err.to_string(),
        }
    }
}
