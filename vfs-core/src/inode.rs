//! The virtual namespace: an arena of [`Inode`]s keyed by canonical
//! virtual path, with parent links stored as indices rather than
//! owning pointers (the tree is acyclic, so indices avoid a
//! `Weak`/`Rc` dance entirely).

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::error::{Error, ErrorKind, Result};
use crate::flags::PolicyFlags;

/// A stable handle into an [`InodeStore`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeId(u32);

impl InodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in the virtual namespace. See `spec.md` §3.
#[derive(Debug)]
pub struct Inode {
    virtual_path: String,
    target_path: Option<String>,
    flags_set: PolicyFlags,
    flags_reset: PolicyFlags,
    parent: Option<InodeId>,
    virtual_children: IndexSet<String>,
}

impl Inode {
    /// Canonicalized absolute path with no trailing slash — the empty
    /// string for the root.
    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    /// `None` for a pure virtual directory.
    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn flags_set(&self) -> PolicyFlags {
        self.flags_set
    }

    pub fn flags_reset(&self) -> PolicyFlags {
        self.flags_reset
    }

    pub fn parent(&self) -> Option<InodeId> {
        self.parent
    }

    /// Child base names in insertion order, used to overlay virtual
    /// entries on top of a real directory listing.
    pub fn virtual_children(&self) -> impl Iterator<Item = &str> {
        self.virtual_children.iter().map(String::as_str)
    }

    pub fn has_virtual_child(&self, name: &str) -> bool {
        self.virtual_children.contains(name)
    }
}

/// A raw inode definition as a configuration layer would produce it,
/// before it's fed to [`InodeStore::add`].
#[derive(Debug, Clone)]
pub struct InodeSpec {
    pub virtual_path: String,
    pub target_path: Option<String>,
    pub flags_set: PolicyFlags,
    pub flags_reset: PolicyFlags,
}

/// The virtual inode tree: unique paths, auto-completing ancestors,
/// freeze-then-lookup lifecycle.
#[derive(Debug, Default)]
pub struct InodeStore {
    arena: Vec<Inode>,
    by_path: HashMap<String, InodeId>,
    sorted: Option<Vec<InodeId>>,
    frozen: bool,
}

fn normalize_key(path: &str) -> String {
    vfs_path::canonical_key(path)
}

impl InodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Adds `virtual_path`, auto-creating missing ancestors as pure
    /// virtual directories. Only the exact leaf receives the supplied
    /// flags and target; an ancestor that already exists keeps its
    /// existing flags/target untouched.
    pub fn add(
        &mut self,
        virtual_path: &str,
        target_path: Option<&str>,
        flags_set: PolicyFlags,
        flags_reset: PolicyFlags,
    ) -> Result<InodeId> {
        if self.frozen {
            return Err(Error::new(
                ErrorKind::FinalizationError,
                "cannot add inodes after freeze",
            ));
        }
        if !vfs_path::is_absolute(virtual_path) {
            return Err(Error::new(
                ErrorKind::ParameterError,
                "virtual path must start with a '/' character",
            ));
        }
        if let Some(target) = target_path {
            if !vfs_path::is_absolute(target) {
                return Err(Error::new(
                    ErrorKind::ParameterError,
                    "target path must start with a '/' character",
                ));
            }
        }
        if self.find(virtual_path).is_some() {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("virtual path inode for '{virtual_path}' is duplicate"),
            ));
        }

        let mut previous: Option<InodeId> = None;
        let mut leaf: Option<InodeId> = None;
        for (prefix, is_full_path) in vfs_path::split(virtual_path) {
            let key = normalize_key(&prefix);
            let id = match self.by_path.get(&key) {
                Some(existing) => *existing,
                None => {
                    let (leaf_target, leaf_set, leaf_reset) = if is_full_path {
                        (target_path.map(str::to_string), flags_set, flags_reset)
                    } else {
                        (None, PolicyFlags::empty(), PolicyFlags::empty())
                    };
                    let inode = Inode {
                        virtual_path: key.clone(),
                        target_path: leaf_target,
                        flags_set: leaf_set,
                        flags_reset: leaf_reset,
                        parent: previous,
                        virtual_children: IndexSet::new(),
                    };
                    let id = InodeId(self.arena.len() as u32);
                    self.arena.push(inode);
                    self.by_path.insert(key.clone(), id);
                    if let Some(parent_id) = previous {
                        let child_name = vfs_path::basename(&prefix).to_string();
                        self.arena[parent_id.index()]
                            .virtual_children
                            .insert(child_name);
                    }
                    id
                }
            };
            previous = Some(id);
            leaf = Some(id);
        }

        leaf.ok_or_else(|| Error::new(ErrorKind::ParameterError, "empty virtual path"))
    }

    pub fn add_spec(&mut self, spec: &InodeSpec) -> Result<InodeId> {
        self.add(
            &spec.virtual_path,
            spec.target_path.as_deref(),
            spec.flags_set,
            spec.flags_reset,
        )
    }

    /// Sorts inodes lexicographically by virtual path and forbids
    /// further `add`. A second call is an error and leaves state
    /// untouched.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(Error::new(
                ErrorKind::FinalizationError,
                "inodes already frozen",
            ));
        }
        let arena = &self.arena;
        let mut order: Vec<InodeId> = (0..arena.len() as u32).map(InodeId).collect();
        order.sort_by(|a, b| arena[a.index()].virtual_path.cmp(&arena[b.index()].virtual_path));
        self.sorted = Some(order);
        self.frozen = true;
        Ok(())
    }

    pub fn find(&self, virtual_path: &str) -> Option<InodeId> {
        self.by_path.get(&normalize_key(virtual_path)).copied()
    }

    pub fn get(&self, id: InodeId) -> &Inode {
        &self.arena[id.index()]
    }

    /// Iterates inodes in lexicographic virtual-path order once
    /// frozen, or insertion order beforehand.
    pub fn iter(&self) -> impl Iterator<Item = (InodeId, &Inode)> {
        let order: Vec<InodeId> = match &self.sorted {
            Some(sorted) => sorted.clone(),
            None => (0..self.arena.len() as u32).map(InodeId).collect(),
        };
        order.into_iter().map(move |id| (id, &self.arena[id.index()]))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}
