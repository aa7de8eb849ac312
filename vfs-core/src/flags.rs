//! Per-subtree access policy bits. An inode's effective flags are the
//! accumulation of every ancestor's `flags_set` minus every ancestor's
//! `flags_reset`, applied root-to-leaf (see [`crate::lookup::LookupEngine`]).

bitflags::bitflags! {
    pub struct PolicyFlags: u32 {
        /// Writes forbidden; write bits stripped from reported modes.
        const READ_ONLY = 1 << 0;
        /// The subtree is invisible: any access reports not-found.
        const FILTER_ALL = 1 << 1;
        /// Paths containing a dot-prefixed component are inaccessible.
        const FILTER_HIDDEN = 1 << 2;
        /// New file creation must be rejected.
        const DISALLOW_CREATE_FILE = 1 << 3;
        /// New directory creation must be rejected.
        const DISALLOW_CREATE_DIR = 1 << 4;
        /// File/directory removal must be rejected.
        const DISALLOW_UNLINK = 1 << 5;
        /// Disables the symlink-containment check on mapped host paths.
        const ALLOW_SYMLINKS = 1 << 6;
    }
}

impl Default for PolicyFlags {
    fn default() -> Self {
        PolicyFlags::empty()
    }
}
