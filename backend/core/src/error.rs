use thiserror::Error;

use crate::size_guard::Rejection;
use crate::types::MessageId;

/// Top-level error type for QuickZip sessions.
#[derive(Debug, Error)]
pub enum QuickZipError {
    /// Size-ceiling violation; nothing was mutated.
    #[error("admission rejected: {0}")]
    Admission(#[from] Rejection),

    /// Group expansion failed; the finalize run cannot trust its member set.
    #[error("could not resolve media group around message {message_id}: {message}")]
    Resolution { message_id: MessageId, message: String },

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("no task is open for this session")]
    NoTask,

    #[error("the task has no files")]
    EmptyTask,

    #[error("the task is already being finalized")]
    Busy,

    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single Transfer Unit. Never cancels sibling units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),

    #[error("permission denied: {0}")]
    Permission(String),

    /// The remote post was deleted or its payload is no longer reachable.
    #[error("remote payload is gone: {0}")]
    RemoteGone(String),

    #[error("local i/o error: {0}")]
    Io(String),

    #[error("transfer cancelled")]
    Cancelled,
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => TransferError::Permission(e.to_string()),
            _ => TransferError::Io(e.to_string()),
        }
    }
}

/// Archive append / extract failures, kept distinct so callers can tell the
/// user whether the problem is permissions, disk, or the archive itself.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("permission denied on {path}: {message}")]
    Permission { path: String, message: String },

    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed archive {path}: {message}")]
    Format { path: String, message: String },

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),
}

impl ArchiveError {
    pub fn from_io(path: &std::path::Path, e: std::io::Error) -> Self {
        let path = path.display().to_string();
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ArchiveError::Permission {
                path,
                message: e.to_string(),
            },
            _ => ArchiveError::Io {
                path,
                message: e.to_string(),
            },
        }
    }
}

pub type Result<T, E = QuickZipError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_io_errors_map_to_permission() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(TransferError::from(io), TransferError::Permission(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = ArchiveError::from_io(std::path::Path::new("/tmp/a.zip"), io);
        assert!(matches!(err, ArchiveError::Permission { .. }));
    }

    #[test]
    fn other_io_errors_stay_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(TransferError::from(io), TransferError::Io("disk full".into()));
    }
}
