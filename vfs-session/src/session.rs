//! The per-connection virtual filesystem: owns the frozen inode tree,
//! the current working directory, and the handle quota, and exposes
//! the operations an SFTP request loop drives serially. No internal
//! threads, no locks — one `VfsSession` belongs to exactly one caller.

use std::fs;
use std::io::{Read as IoRead, Write as IoWrite};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use vfs_core::{InodeId, InodeStore, LookupEngine, PolicyFlags};

use crate::error::{InternalErrorRecord, Result, VfsError};
use crate::handle::{DirEnt, DirHandle, FileHandle, FileMode, Handle, WRITE_BITS};

/// Output of the shared `opendir`/`open`/`stat`/`chdir` prologue
/// (`spec.md` §4.4): a canonicalized path, the host path it maps to
/// (if any mountpoint applies), the exact terminal inode (if any), and
/// the accumulated policy flags.
struct Resolved {
    virtual_path: String,
    mapped_path: Option<String>,
    inode: Option<InodeId>,
    flags: PolicyFlags,
}

pub struct VfsSession {
    cwd: String,
    store: InodeStore,
    handle_count: u32,
    handle_quota: u32,
    last_error: Option<InternalErrorRecord>,
}

impl VfsSession {
    pub const DEFAULT_HANDLE_QUOTA: u32 = 10;

    /// `store` must already be frozen; every lookup fails otherwise.
    pub fn new(store: InodeStore) -> Self {
        Self::with_handle_quota(store, Self::DEFAULT_HANDLE_QUOTA)
    }

    pub fn with_handle_quota(store: InodeStore, handle_quota: u32) -> Self {
        Self {
            cwd: "/".to_string(),
            store,
            handle_count: 0,
            handle_quota,
            last_error: None,
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn handle_count(&self) -> u32 {
        self.handle_count
    }

    pub fn handle_quota(&self) -> u32 {
        self.handle_quota
    }

    /// The most recent operator-facing diagnostic, if the last
    /// operation failed. Overwritten on every failure, cleared by
    /// nothing — callers read it immediately after a failing call.
    pub fn last_error(&self) -> Option<&InternalErrorRecord> {
        self.last_error.as_ref()
    }

    fn fail(&mut self, code: VfsError, context: impl Into<String>) -> VfsError {
        let message = context.into();
        tracing::debug!(?code, %message, "vfs-session operation failed");
        self.last_error = Some(InternalErrorRecord { code, message });
        code
    }

    fn fail_internal(&mut self, err: vfs_core::Error) -> VfsError {
        self.fail(VfsError::InternalError, err.to_string())
    }

    fn open_node(&mut self, path: &str) -> Result<Resolved> {
        if self.handle_count >= self.handle_quota {
            return Err(self.fail(VfsError::OutOfHandles, "handle quota exhausted"));
        }

        let canonical = vfs_path::sanitize(&self.cwd, path);
        let lookup = {
            let engine = LookupEngine::new(&self.store).map_err(|e| self.fail_internal(e))?;
            engine.lookup(&canonical).map_err(|e| self.fail_internal(e))?
        };

        if lookup.is_filtered() {
            return Err(self.fail(
                VfsError::NoSuchFileOrDirectory,
                format!("{canonical} is filtered"),
            ));
        }
        if lookup.hides_dotfiles() && vfs_path::contains_hidden(&canonical) {
            return Err(self.fail(
                VfsError::PermissionDenied,
                format!("{canonical} has a hidden component"),
            ));
        }
        if lookup.inode.is_none() && lookup.mountpoint.is_none() {
            return Err(self.fail(
                VfsError::NoSuchFileOrDirectory,
                format!("{canonical} resolves to no inode or mountpoint"),
            ));
        }

        let mapped_path = match lookup.mountpoint {
            Some(id) => {
                let mount = self.store.get(id);
                let target = mount
                    .target_path()
                    .expect("a mountpoint inode always carries a target path");
                let suffix = &canonical[mount.virtual_path().len()..];
                Some(format!("{target}{suffix}"))
            }
            None => None,
        };

        if let Some(mapped) = &mapped_path {
            if !lookup.flags.contains(PolicyFlags::ALLOW_SYMLINKS) {
                match vfs_path::contains_symlink(Path::new(mapped)) {
                    Ok(check) if check.contains_symlink => {
                        return Err(self.fail(
                            VfsError::NoSuchFileOrDirectory,
                            format!("{mapped} traverses a symlink"),
                        ));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        return Err(self.fail(
                            VfsError::InternalError,
                            format!("symlink check on {mapped} failed: {err}"),
                        ));
                    }
                }
            }
        }

        Ok(Resolved {
            virtual_path: canonical,
            mapped_path,
            inode: lookup.inode,
            flags: lookup.flags,
        })
    }

    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let resolved = self.open_node(path)?;
        if resolved.inode.is_some() {
            self.cwd = resolved.virtual_path;
            return Ok(());
        }
        let mapped = resolved
            .mapped_path
            .expect("no terminal inode implies lookup resolved through a mountpoint");
        match fs::metadata(&mapped) {
            Ok(meta) if meta.is_dir() => {
                self.cwd = resolved.virtual_path;
                Ok(())
            }
            Ok(_) => Err(self.fail(
                VfsError::NotADirectory,
                format!("{mapped} is not a directory"),
            )),
            Err(err) => {
                let code = VfsError::from_io_error(&err);
                Err(self.fail(code, format!("stat {mapped} failed: {err}")))
            }
        }
    }

    pub fn opendir(&mut self, path: &str) -> Result<DirHandle> {
        let resolved = self.open_node(path)?;
        let host_stream = match &resolved.mapped_path {
            Some(mapped) => match fs::read_dir(mapped) {
                Ok(read_dir) => Some(read_dir),
                Err(err) if resolved.inode.is_some() => {
                    tracing::debug!(%mapped, %err, "host opendir failed, falling back to virtual listing");
                    None
                }
                Err(err) => {
                    let code = VfsError::from_io_error(&err);
                    return Err(self.fail(code, format!("opendir {mapped} failed: {err}")));
                }
            },
            None => None,
        };

        self.handle_count += 1;
        Ok(DirHandle {
            virtual_path: resolved.virtual_path,
            host_stream,
            inode: resolved.inode,
            child_cursor: 0,
            flags: resolved.flags,
            closed: false,
        })
    }

    pub fn readdir(&mut self, handle: &mut DirHandle) -> Result<DirEnt> {
        if handle.closed {
            return Err(self.fail(VfsError::InternalError, "readdir on a closed handle"));
        }

        if let Some(inode_id) = handle.inode {
            let node = self.store.get(inode_id);
            let children: Vec<String> =
                node.virtual_children().map(str::to_string).collect();
            if handle.child_cursor < children.len() {
                let name = children[handle.child_cursor].clone();
                handle.child_cursor += 1;
                return Ok(DirEnt::synthetic_dir(
                    name,
                    handle.flags.contains(PolicyFlags::READ_ONLY),
                ));
            }
        }

        let shadow_names: Vec<String> = handle
            .inode
            .map(|id| self.store.get(id).virtual_children().map(str::to_string).collect())
            .unwrap_or_default();

        loop {
            let Some(stream) = handle.host_stream.as_mut() else {
                return Ok(DirEnt::eof_marker());
            };
            match stream.next() {
                None => {
                    handle.host_stream = None;
                    return Ok(DirEnt::eof_marker());
                }
                Some(Err(err)) => {
                    let code = VfsError::from_io_error(&err);
                    return Err(self.fail(code, format!("readdir entry failed: {err}")));
                }
                Some(Ok(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name == "." || name == ".." || shadow_names.contains(&name) {
                        continue;
                    }
                    let Ok(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !(file_type.is_file() || file_type.is_dir() || file_type.is_symlink()) {
                        continue;
                    }
                    let Ok(meta) = fs::metadata(entry.path()) else {
                        continue;
                    };
                    if !(meta.is_file() || meta.is_dir()) {
                        continue;
                    }
                    let mut mode = meta.mode() & 0o777;
                    if handle.flags.contains(PolicyFlags::READ_ONLY) {
                        mode &= !WRITE_BITS;
                    }
                    return Ok(DirEnt {
                        filename: name,
                        eof: false,
                        is_file: meta.is_file(),
                        uid: meta.uid(),
                        gid: meta.gid(),
                        size: meta.len(),
                        mode,
                        atime: meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
                        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        ctime: system_time_from_secs(meta.ctime()),
                    });
                }
            }
        }
    }

    pub fn stat(&mut self, path: &str) -> Result<DirEnt> {
        let resolved = self.open_node(path)?;
        let filename = vfs_path::basename(&resolved.virtual_path).to_string();

        if resolved.inode.is_some() {
            return Ok(DirEnt::synthetic_dir(
                filename,
                resolved.flags.contains(PolicyFlags::READ_ONLY),
            ));
        }
        let mapped = resolved
            .mapped_path
            .expect("no terminal inode implies lookup resolved through a mountpoint");

        let meta = fs::metadata(&mapped).map_err(|err| {
            let code = VfsError::from_io_error(&err);
            self.fail(code, format!("stat {mapped} failed: {err}"))
        })?;

        let mut mode = meta.mode() & 0o777;
        if resolved.flags.contains(PolicyFlags::READ_ONLY) {
            mode &= !WRITE_BITS;
        }
        Ok(DirEnt {
            filename,
            eof: false,
            is_file: meta.is_file(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len(),
            mode,
            atime: meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            ctime: system_time_from_secs(meta.ctime()),
        })
    }

    pub fn open(&mut self, path: &str, mode: FileMode) -> Result<FileHandle> {
        let resolved = self.open_node(path)?;
        let virtual_path = resolved.virtual_path.clone();
        let Some(mapped) = resolved.mapped_path else {
            return Err(self.fail(
                VfsError::NotAFile,
                format!("{virtual_path} has no host backing"),
            ));
        };

        match fs::metadata(&mapped) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(self.fail(
                    VfsError::NotAFile,
                    format!("{mapped} is not a regular file"),
                ));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && mode != FileMode::Read => {}
            Err(err) => {
                let code = VfsError::from_io_error(&err);
                return Err(self.fail(code, format!("stat {mapped} failed: {err}")));
            }
        }

        if mode != FileMode::Read && resolved.flags.contains(PolicyFlags::READ_ONLY) {
            return Err(self.fail(
                VfsError::PermissionDenied,
                format!("{virtual_path} is read-only"),
            ));
        }

        let file = match mode {
            FileMode::Read => fs::File::open(&mapped),
            FileMode::Write => fs::File::create(&mapped),
            FileMode::Append => fs::OpenOptions::new().append(true).create(true).open(&mapped),
        }
        .map_err(|err| {
            let code = VfsError::from_io_error(&err);
            self.fail(code, format!("open {mapped} failed: {err}"))
        })?;

        self.handle_count += 1;
        Ok(FileHandle {
            virtual_path,
            file,
            flags: resolved.flags,
            mode,
            closed: false,
        })
    }

    pub fn read(&mut self, handle: &mut FileHandle, buf: &mut [u8]) -> Result<usize> {
        if handle.closed {
            return Err(self.fail(VfsError::InternalError, "read on a closed handle"));
        }
        if handle.mode != FileMode::Read {
            return Err(self.fail(
                VfsError::InternalError,
                "read on a handle not opened for reading",
            ));
        }
        handle
            .file
            .read(buf)
            .map_err(|err| self.fail(VfsError::IoError, format!("read failed: {err}")))
    }

    pub fn write(&mut self, handle: &mut FileHandle, buf: &[u8]) -> Result<usize> {
        if handle.closed {
            return Err(self.fail(VfsError::InternalError, "write on a closed handle"));
        }
        if handle.mode == FileMode::Read {
            return Err(self.fail(
                VfsError::InternalError,
                "write on a handle opened for reading",
            ));
        }
        handle
            .file
            .write(buf)
            .map_err(|err| self.fail(VfsError::IoError, format!("write failed: {err}")))
    }

    /// Releases a handle and frees its quota slot. A no-op on `None`,
    /// mirroring the source's "safe on nil" contract; a handle that
    /// already reports itself closed is likewise left alone.
    pub fn close_handle(&mut self, handle: Option<Handle>) {
        let Some(mut handle) = handle else {
            return;
        };
        if handle.is_closed() {
            return;
        }
        if let Handle::Dir(dir) = &mut handle {
            dir.host_stream = None;
        }
        handle.mark_closed();
        self.handle_count = self.handle_count.saturating_sub(1);
    }
}

fn system_time_from_secs(secs: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_core::InodeStore;

    fn session_over(root: &std::path::Path) -> VfsSession {
        let mut store = InodeStore::new();
        store
            .add("/", root.to_str(), PolicyFlags::empty(), PolicyFlags::empty())
            .unwrap();
        store.freeze().unwrap();
        VfsSession::new(store)
    }

    #[test]
    fn chdir_into_a_file_fails_with_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain.txt"), b"x").unwrap();
        let mut session = session_over(dir.path());

        let err = session.chdir("/plain.txt").unwrap_err();
        assert_eq!(err, VfsError::NotADirectory);
    }

    #[test]
    fn open_for_write_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_over(dir.path());

        let handle = session.open("/new.txt", FileMode::Write).unwrap();
        session.close_handle(Some(Handle::File(handle)));
        assert!(dir.path().join("new.txt").exists());
    }

    #[test]
    fn open_for_read_rejects_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_over(dir.path());

        let err = session.open("/missing.txt", FileMode::Read).unwrap_err();
        assert_eq!(err, VfsError::NoSuchFileOrDirectory);
    }

    #[test]
    fn close_handle_on_none_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_over(dir.path());
        session.close_handle(None);
        assert_eq!(session.handle_count(), 0);
    }

    #[test]
    fn last_error_records_context_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_over(dir.path());
        let _ = session.open("/missing.txt", FileMode::Read).unwrap_err();
        assert!(session.last_error().is_some());
    }
}
