//! The coarse, user-visible error surface. Every operation returns one
//! of these; the finer-grained story (which `errno`, which policy
//! flag tripped) is retained on [`crate::VfsSession`] as an
//! [`InternalErrorRecord`] for logs, never handed to the client.

use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("too many open handles")]
    OutOfHandles,
    #[error("permission denied")]
    PermissionDenied,
    #[error("no such file or directory")]
    NoSuchFileOrDirectory,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a file")]
    NotAFile,
    #[error("internal error")]
    InternalError,
    #[error("I/O error")]
    IoError,
}

impl VfsError {
    /// Maps a host `io::Error` the way the `errno` table in `spec.md`
    /// §6 does: `EACCES` → permission denied, `ENOENT` → not found,
    /// everything else → internal error.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => VfsError::PermissionDenied,
            io::ErrorKind::NotFound => VfsError::NoSuchFileOrDirectory,
            _ => VfsError::InternalError,
        }
    }
}

/// The fine-grained record kept alongside a coarse [`VfsError`] for
/// operator-facing logs. Overwritten by every failing operation.
#[derive(Debug, Clone)]
pub struct InternalErrorRecord {
    pub code: VfsError,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, VfsError>;
