//! Inode tree and lookup engine for a virtual filesystem: the part of
//! the stack that decides *which* policy flags and *which* host path
//! apply to a canonical virtual path, without touching the host
//! filesystem itself. Path canonicalization lives in `vfs-path`;
//! turning a [`lookup::LookupResult`] into an open file descriptor or
//! directory stream is `vfs-session`'s job.

pub mod error;
pub mod flags;
pub mod inode;
pub mod lookup;

pub use error::{Error, ErrorKind, Result};
pub use flags::PolicyFlags;
pub use inode::{Inode, InodeId, InodeSpec, InodeStore};
pub use lookup::{LookupEngine, LookupResult};
