//! Walks a canonical path against the frozen [`InodeStore`], accumulating
//! policy flags from every ancestor and tracking both the deepest
//! mountpoint and an exact terminal match, if any.

use crate::error::{Error, ErrorKind, Result};
use crate::flags::PolicyFlags;
use crate::inode::{InodeId, InodeStore};

/// The outcome of walking a virtual path from the root.
#[derive(Debug, Clone)]
pub struct LookupResult {
    /// `flags_set` of every ancestor, OR'd together, minus every
    /// ancestor's `flags_reset`, applied root-to-leaf in path order.
    pub flags: PolicyFlags,
    /// The deepest ancestor (inclusive of an exact match) that carries
    /// a host mountpoint. `None` if no inode on the walk has a target.
    pub mountpoint: Option<InodeId>,
    /// The inode whose virtual path exactly equals the looked-up path,
    /// if one exists.
    pub inode: Option<InodeId>,
}

impl LookupResult {
    pub fn is_readonly(&self) -> bool {
        self.flags.contains(PolicyFlags::READ_ONLY)
    }

    pub fn is_filtered(&self) -> bool {
        self.flags.contains(PolicyFlags::FILTER_ALL)
    }

    pub fn hides_dotfiles(&self) -> bool {
        self.flags.contains(PolicyFlags::FILTER_HIDDEN)
    }
}

/// Resolves canonical virtual paths against a frozen [`InodeStore`].
pub struct LookupEngine<'a> {
    store: &'a InodeStore,
    base_flags: PolicyFlags,
}

impl<'a> LookupEngine<'a> {
    pub fn new(store: &'a InodeStore) -> Result<Self> {
        Self::with_base_flags(store, PolicyFlags::empty())
    }

    /// `base_flags` seeds the accumulation before any inode is visited;
    /// always empty unless a deployment explicitly configures a
    /// process-wide floor policy.
    pub fn with_base_flags(store: &'a InodeStore, base_flags: PolicyFlags) -> Result<Self> {
        if !store.is_frozen() {
            return Err(Error::new(
                ErrorKind::FinalizationError,
                "lookup requires a frozen inode store",
            ));
        }
        Ok(Self { store, base_flags })
    }

    pub fn lookup(&self, path: &str) -> Result<LookupResult> {
        if !vfs_path::is_absolute(path) {
            return Err(Error::new(
                ErrorKind::NonAbsolutePath,
                format!("'{path}' is not an absolute path"),
            ));
        }

        let mut flags = self.base_flags;
        let mut mountpoint: Option<InodeId> = None;
        let mut inode: Option<InodeId> = None;

        for (prefix, is_full_path) in vfs_path::split(path) {
            if let Some(id) = self.store.find(&prefix) {
                let node = self.store.get(id);
                flags = (flags | node.flags_set()) & !node.flags_reset();
                if node.target_path().is_some() {
                    mountpoint = Some(id);
                }
                if is_full_path {
                    inode = Some(id);
                }
            }
        }

        tracing::trace!(path, ?flags, has_mountpoint = mountpoint.is_some(), has_inode = inode.is_some(), "lookup resolved");

        Ok(LookupResult {
            flags,
            mountpoint,
            inode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeStore;

    fn frozen(build: impl FnOnce(&mut InodeStore)) -> InodeStore {
        let mut store = InodeStore::new();
        build(&mut store);
        store.freeze().unwrap();
        store
    }

    #[test]
    fn lookup_merges_flags_scenario() {
        let store = frozen(|s| {
            s.add("/", None, PolicyFlags::READ_ONLY, PolicyFlags::empty())
                .unwrap();
            s.add("/pics", Some("/home/joe/pics"), PolicyFlags::empty(), PolicyFlags::empty())
                .unwrap();
            s.add(
                "/incoming",
                Some("/tmp/write"),
                PolicyFlags::DISALLOW_UNLINK,
                PolicyFlags::empty(),
            )
            .unwrap();
        });
        let engine = LookupEngine::new(&store).unwrap();

        let result = engine.lookup("/incoming/x.jpg").unwrap();
        assert_eq!(result.flags, PolicyFlags::READ_ONLY | PolicyFlags::DISALLOW_UNLINK);
        let mountpoint = store.get(result.mountpoint.unwrap());
        assert_eq!(mountpoint.virtual_path(), "/incoming");
        assert_eq!(mountpoint.target_path(), Some("/tmp/write"));
        assert!(result.inode.is_none());
    }

    #[test]
    fn incoming_resets_read_only() {
        let store = frozen(|s| {
            s.add("/pics", Some("/srv/pics"), PolicyFlags::READ_ONLY, PolicyFlags::empty())
                .unwrap();
            s.add(
                "/pics/incoming",
                None,
                PolicyFlags::empty(),
                PolicyFlags::READ_ONLY,
            )
            .unwrap();
        });
        let engine = LookupEngine::new(&store).unwrap();

        let incoming = engine.lookup("/pics/incoming").unwrap();
        assert!(!incoming.is_readonly());
    }

    #[test]
    fn deep_inode_auto_creation_scenario() {
        let store = frozen(|s| {
            s.add("/this/is/deeply/nested", None, PolicyFlags::empty(), PolicyFlags::empty())
                .unwrap();
        });
        let engine = LookupEngine::new(&store).unwrap();

        let this = engine.lookup("/this").unwrap();
        assert!(this.inode.is_some());
        assert!(this.mountpoint.is_none());
    }

    #[test]
    fn lookup_of_pure_virtual_directory_has_no_mountpoint() {
        let store = frozen(|s| {
            s.add("/a/b", None, PolicyFlags::empty(), PolicyFlags::empty())
                .unwrap();
        });
        let engine = LookupEngine::new(&store).unwrap();

        let result = engine.lookup("/a/b").unwrap();
        assert!(result.inode.is_some());
        assert!(result.mountpoint.is_none());
    }

    #[test]
    fn lookup_below_a_mountpoint_has_no_exact_inode() {
        let store = frozen(|s| {
            s.add("/pics", Some("/srv/pics"), PolicyFlags::empty(), PolicyFlags::empty())
                .unwrap();
        });
        let engine = LookupEngine::new(&store).unwrap();

        let result = engine.lookup("/pics/vacation/beach.jpg").unwrap();
        assert!(result.inode.is_none());
        assert_eq!(
            store.get(result.mountpoint.unwrap()).target_path(),
            Some("/srv/pics")
        );
    }

    #[test]
    fn lookup_requires_absolute_path() {
        let store = frozen(|_| {});
        let engine = LookupEngine::new(&store).unwrap();
        let err = engine.lookup("relative").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonAbsolutePath);
    }

    #[test]
    fn lookup_requires_frozen_store() {
        let mut store = InodeStore::new();
        store
            .add("/", Some("/srv/root"), PolicyFlags::empty(), PolicyFlags::empty())
            .unwrap();
        let err = LookupEngine::new(&store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FinalizationError);
    }
}
