//! Centralized error types for mailfs.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailfs library.
#[derive(Error, Debug)]
pub enum MailFsError {
    /// The mailbox service could not be reached, refused the credentials,
    /// or answered with a protocol error.
    #[error("Mailbox fetch failed: {reason}")]
    FetchFailed { reason: String },

    /// A message has no `Subject:` header and is left out of the tree.
    #[error("Message {uid} has no subject header")]
    MissingSubject { uid: u32 },

    /// Any other per-message problem that causes the message to be skipped.
    #[error("Cannot parse message {uid}: {reason}")]
    Parse { uid: u32, reason: String },

    /// The inode (or the named child) does not exist in the current snapshot.
    #[error("No such entry: inode {0}")]
    NotFound(u64),

    /// A directory operation was attempted on a file.
    #[error("Inode {0} is not a directory")]
    NotADirectory(u64),

    /// The filesystem is read-only; write access is always refused.
    #[error("Write access to inode {0} is not permitted")]
    WriteNotPermitted(u64),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The filesystem could not be mounted.
    #[error("Mount failed: {0}")]
    Mount(#[source] std::io::Error),
}

/// Convenience alias for `Result<T, MailFsError>`.
pub type Result<T> = std::result::Result<T, MailFsError>;

impl MailFsError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap anything printable as a `FetchFailed`.
    pub fn fetch(reason: impl std::fmt::Display) -> Self {
        Self::FetchFailed {
            reason: reason.to_string(),
        }
    }

    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => libc::ENOENT,
            Self::NotADirectory(_) => libc::ENOTDIR,
            Self::WriteNotPermitted(_) => libc::EPERM,
            Self::Io { source, .. } | Self::Mount(source) => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            Self::FetchFailed { .. }
            | Self::MissingSubject { .. }
            | Self::Parse { .. }
            | Self::Config(_) => libc::EIO,
        }
    }

    /// Whether this error is part of normal browsing and should not be
    /// reported as a failure.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotADirectory(_))
    }
}
