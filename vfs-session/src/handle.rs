//! Handle types returned by `opendir`/`open` and the directory-entry
//! shape `readdir`/`stat` synthesize.

use std::fs::File;
use std::time::SystemTime;

use vfs_core::{InodeId, PolicyFlags};

/// Write permission bits (owner/group/other) stripped when a lookup's
/// effective flags include `READ_ONLY`.
pub(crate) const WRITE_BITS: u32 = 0o222;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

/// A handle returned by `opendir`. Readdir drains `inode`'s virtual
/// children before falling back to `host_stream`, so a directory with
/// no host backing at all (`host_stream: None`) still lists its
/// virtual entries.
pub struct DirHandle {
    pub(crate) virtual_path: String,
    pub(crate) host_stream: Option<std::fs::ReadDir>,
    pub(crate) inode: Option<InodeId>,
    pub(crate) child_cursor: usize,
    pub(crate) flags: PolicyFlags,
    pub(crate) closed: bool,
}

impl DirHandle {
    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }
}

pub struct FileHandle {
    pub(crate) virtual_path: String,
    pub(crate) file: File,
    pub(crate) flags: PolicyFlags,
    pub(crate) mode: FileMode,
    pub(crate) closed: bool,
}

impl FileHandle {
    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }
}

/// A handle as the caller holds it. Rust's ownership already gives us
/// the `Created -> Open -> Closed` state machine `spec.md` §4.6
/// describes: a moved-from `Handle` can't be used again, and
/// `read`/`write` are only callable on the matching variant because
/// they take `&mut FileHandle`/`&mut DirHandle` directly rather than
/// an untyped union.
pub enum Handle {
    Dir(DirHandle),
    File(FileHandle),
}

impl Handle {
    pub(crate) fn mark_closed(&mut self) {
        match self {
            Handle::Dir(d) => d.closed = true,
            Handle::File(f) => f.closed = true,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        match self {
            Handle::Dir(d) => d.closed,
            Handle::File(f) => f.closed,
        }
    }
}

impl From<DirHandle> for Handle {
    fn from(dir: DirHandle) -> Self {
        Handle::Dir(dir)
    }
}

impl From<FileHandle> for Handle {
    fn from(file: FileHandle) -> Self {
        Handle::File(file)
    }
}

/// A single directory entry, synthetic (virtual child) or stat-backed
/// (host entry).
#[derive(Debug, Clone)]
pub struct DirEnt {
    pub filename: String,
    pub eof: bool,
    pub is_file: bool,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mode: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl DirEnt {
    pub(crate) fn eof_marker() -> Self {
        DirEnt {
            filename: String::new(),
            eof: true,
            is_file: false,
            uid: 0,
            gid: 0,
            size: 0,
            mode: 0,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
        }
    }

    pub(crate) fn synthetic_dir(filename: String, read_only: bool) -> Self {
        DirEnt {
            filename,
            eof: false,
            is_file: false,
            uid: 0,
            gid: 0,
            size: 0,
            mode: if read_only { 0o555 } else { 0o755 },
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
        }
    }
}
