//! Session-scoped virtual filesystem: the layer an SFTP connection
//! handler embeds directly. Wraps a frozen `vfs-core` inode tree with
//! a current working directory, a handle quota, and the host-syscall
//! operations (`chdir`, `opendir`/`readdir`, `stat`, `open`/`read`/
//! `write`, `close_handle`) that turn a [`vfs_core::LookupResult`]
//! into bytes on disk.

pub mod error;
pub mod handle;
pub mod session;

pub use error::{InternalErrorRecord, Result, VfsError};
pub use handle::{DirEnt, DirHandle, FileHandle, FileMode, Handle};
pub use session::VfsSession;
