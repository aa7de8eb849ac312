//! Internal, fine-grained errors for inode-store and lookup-engine
//! operations. These never reach an SFTP client directly — `vfs-session`
//! folds them into the coarse, user-visible `VfsError` while keeping
//! this context around for logs.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A supplied path failed a structural precondition (e.g. not absolute).
    ParameterError,
    /// `InodeStore::add` was called with a virtual path that already has an inode.
    AlreadyExists,
    /// `freeze` was called twice, or a mutating call happened before/after freeze.
    FinalizationError,
    /// `lookup` was called with a non-absolute path.
    NonAbsolutePath,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {context}")]
pub struct Error {
    kind: ErrorKind,
    context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        let context = context.into();
        tracing::debug!(?kind, %context, "vfs-core error");
        Self { kind, context }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

pub type Result<T> = std::result::Result<T, Error>;
