//! Domain error types
//!
//! This module defines the error taxonomy shared by the tree cache, the
//! mutation reconciler, the upload coordinator and every remote-store
//! adapter. Callers branch on the variant (e.g. to surface a permission
//! dialog versus a re-login prompt), so adapters must map their failures
//! onto these variants rather than wrapping them opaquely.

use thiserror::Error;

/// Errors that can occur while mirroring or mutating the remote tree
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FmError {
    /// The backend refused the operation (HTTP 403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Authentication failed even after the interactive re-auth retry
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The backend rejected the request as malformed (HTTP 400)
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The backend answered with a payload that could not be decoded
    #[error("Could not decode server response: {0}")]
    ServerDecode(String),

    /// The path does not exist locally or remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// A batch names the same source or destination more than once
    #[error("Duplicate path in batch: {0}")]
    DuplicatePath(String),

    /// Any other non-success status from the backend
    #[error("Request failed with status {status}: {detail}")]
    Request {
        /// HTTP status code
        status: u16,
        /// Response body returned by the server
        detail: String,
    },

    /// The user declined a confirmation or cancelled a picker
    #[error("Aborted by user: {0}")]
    UserAborted(String),

    /// The request never produced an HTTP status (connect failure, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// A directory was required but the path names a file
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but the path names a directory
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Reading a local upload source failed
    #[error("Local I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FmError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FmError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => FmError::PermissionDenied(err.to_string()),
            _ => FmError::Io(err.to_string()),
        }
    }
}

impl FmError {
    /// Returns true for errors raised by the local user rather than the backend
    pub fn is_user_abort(&self) -> bool {
        matches!(self, FmError::UserAborted(_))
    }
}
