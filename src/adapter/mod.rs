//! The `fuser::Filesystem` implementation: the POSIX semantic layer that
//! ties the [`crate::remote`] client and the [`crate::cache`] staging
//! cache together, translating identities and POSIX permission checks and
//! mapping every failure onto a POSIX errno.
//!
//! `fuser` is inode-keyed; the remote protocol and the staging cache are
//! path-keyed. `inode_to_path`/`path_to_inode` are the bridging layer —
//! `lookup`/`readdir` allocate inodes for newly observed paths, every
//! other upcall resolves `ino -> path` before delegating to the
//! path-keyed logic in the submodules below.

mod access;
mod attr;
mod create;
mod delete;
mod errno;
mod read;
mod rename;
mod write;
mod xattr;

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{FileAttr, FileType, Filesystem, Request};

use crate::cache::StagingCache;
use crate::config::Config;
use crate::identity;
use crate::remote::{RemoteError, RemoteFileStatus};

pub use errno::remote_error_to_errno;

/// Root directory is always inode 1, matching the `fuser` convention.
pub const ROOT_INO: u64 = 1;

pub struct RemoteFs {
    pub(crate) client: crate::remote::RemoteClient,
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) cache: StagingCache,
    pub(crate) inode_to_path: HashMap<u64, String>,
    pub(crate) path_to_inode: HashMap<String, u64>,
    pub(crate) next_inode: u64,
    pub(crate) config: Config,
}

impl RemoteFs {
    pub fn new(config: Config) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let cache = StagingCache::new(&config.file.scratch_dir_prefix)?;
        let client = crate::remote::RemoteClient::new(config.base_url());

        let mut inode_to_path = HashMap::new();
        let mut path_to_inode = HashMap::new();
        inode_to_path.insert(ROOT_INO, "/".to_string());
        path_to_inode.insert("/".to_string(), ROOT_INO);

        Ok(Self {
            client,
            runtime,
            cache,
            inode_to_path,
            path_to_inode,
            next_inode: ROOT_INO + 1,
            config,
        })
    }

    pub(crate) fn path_of(&self, ino: u64) -> Option<String> {
        self.inode_to_path.get(&ino).cloned()
    }

    pub(crate) fn as_user(&self, req: &Request<'_>) -> String {
        identity::as_user_for_uid(req.uid())
    }

    /// Joins a parent path and child name into a full remote path.
    pub(crate) fn join(parent: &str, name: &str) -> String {
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }

    /// Allocates (or reuses) the inode for `path`.
    pub(crate) fn inode_for_path(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.path_to_inode.get(path) {
            return ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.to_string(), ino);
        self.inode_to_path.insert(ino, path.to_string());
        ino
    }

    pub(crate) fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.path_to_inode.remove(path) {
            self.inode_to_path.remove(&ino);
        }
    }

    pub(crate) fn rename_path(&mut self, old: &str, new: &str) {
        if let Some(ino) = self.path_to_inode.remove(old) {
            self.path_to_inode.insert(new.to_string(), ino);
            self.inode_to_path.insert(ino, new.to_string());
        }
    }

    /// Translates a `RemoteFileStatus` into the POSIX stat record `fuser`
    /// expects, resolving owner/group names to local numeric ids.
    pub(crate) fn stat_from_remote(ino: u64, status: &RemoteFileStatus) -> FileAttr {
        let kind = match status.kind {
            crate::remote::FileKind::Directory => FileType::Directory,
            crate::remote::FileKind::File => FileType::RegularFile,
            crate::remote::FileKind::Symlink => FileType::Symlink,
        };
        let perm = status.permission_bits() as u16;
        let uid = identity::uid_of_name(&status.owner);
        let gid = identity::gid_of_name(&status.group);
        let atime = UNIX_EPOCH + Duration::from_millis(status.access_time.max(0) as u64);
        let mtime = UNIX_EPOCH + Duration::from_millis(status.modification_time.max(0) as u64);

        FileAttr {
            ino,
            size: status.length,
            blocks: status.length.div_ceil(512),
            atime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind,
            perm,
            nlink: if kind == FileType::Directory { 2 } else { 1 },
            uid,
            gid,
            rdev: 0,
            flags: 0,
            blksize: 4096,
        }
    }

    pub(crate) fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Fetches and translates attributes for `path`. `ino` is only used to
    /// stamp the resulting `FileAttr`.
    pub(crate) fn getattr_path(&self, ino: u64, path: &str, as_user: &str) -> Result<FileAttr, RemoteError> {
        let status = self.block_on(self.client.getattr(path, Some(as_user)))?;
        Ok(Self::stat_from_remote(ino, &status))
    }

    pub(crate) fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Kernel-facing attribute/entry cache TTL; re-derived from config on every
/// reply so tests can construct a `RemoteFs` with arbitrary TTLs.
impl RemoteFs {
    pub(crate) fn attr_ttl(&self) -> Duration {
        self.config.kernel_attr_ttl()
    }
    pub(crate) fn entry_ttl(&self) -> Duration {
        self.config.kernel_entry_ttl()
    }
}

impl Filesystem for RemoteFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut fuser::KernelConfig) -> Result<(), libc::c_int> {
        tracing::info!(mountpoint = ?self.config.mountpoint, "filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!("unmounting, closing remote session and removing scratch directory");
        // The TempDir inside `cache` removes the scratch directory on drop;
        // nothing further to do here beyond letting `self` drop normally.
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: fuser::ReplyEntry) {
        read::lookup(self, req, parent, name, reply)
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: fuser::ReplyAttr) {
        attr::getattr(self, req, ino, reply)
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<fuser::TimeOrNow>,
        mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        attr::setattr(self, req, ino, mode, uid, gid, size, atime, mtime, fh, reply)
    }

    fn access(&mut self, req: &Request<'_>, ino: u64, mask: i32, reply: fuser::ReplyEmpty) {
        access::access(self, req, ino, mask, reply)
    }

    fn readdir(&mut self, req: &Request<'_>, ino: u64, fh: u64, offset: i64, reply: fuser::ReplyDirectory) {
        read::readdir(self, req, ino, fh, offset, reply)
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        read::open(self, req, ino, flags, reply)
    }

    fn read(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        read::read(self, req, ino, fh, offset, size, flags, lock_owner, reply)
    }

    fn write(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        write_flags: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        write::write(self, req, ino, fh, offset, data, write_flags, flags, lock_owner, reply)
    }

    fn flush(&mut self, req: &Request<'_>, ino: u64, fh: u64, lock_owner: u64, reply: fuser::ReplyEmpty) {
        write::flush(self, req, ino, fh, lock_owner, reply)
    }

    fn fsync(&mut self, req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: fuser::ReplyEmpty) {
        write::fsync(self, req, ino, fh, datasync, reply)
    }

    fn release(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: i32,
        lock_owner: Option<u64>,
        flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        write::release(self, req, ino, fh, flags, lock_owner, flush, reply)
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        create::create(self, req, parent, name, mode, umask, flags, reply)
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        create::mkdir(self, req, parent, name, mode, umask, reply)
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: fuser::ReplyEmpty) {
        delete::unlink(self, req, parent, name, reply)
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: fuser::ReplyEmpty) {
        delete::rmdir(self, req, parent, name, reply)
    }

    fn rename(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &std::ffi::OsStr,
        newparent: u64,
        newname: &std::ffi::OsStr,
        flags: u32,
        reply: fuser::ReplyEmpty,
    ) {
        rename::rename(self, req, parent, name, newparent, newname, flags, reply)
    }

    fn getxattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        name: &std::ffi::OsStr,
        size: u32,
        reply: fuser::ReplyXattr,
    ) {
        xattr::getxattr(self, req, ino, name, size, reply)
    }

    fn setxattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        name: &std::ffi::OsStr,
        value: &[u8],
        flags: i32,
        position: u32,
        reply: fuser::ReplyEmpty,
    ) {
        xattr::setxattr(self, req, ino, name, value, flags, position, reply)
    }

    fn listxattr(&mut self, req: &Request<'_>, ino: u64, size: u32, reply: fuser::ReplyXattr) {
        xattr::listxattr(self, req, ino, size, reply)
    }

    fn removexattr(&mut self, req: &Request<'_>, ino: u64, name: &std::ffi::OsStr, reply: fuser::ReplyEmpty) {
        xattr::removexattr(self, req, ino, name, reply)
    }
}
