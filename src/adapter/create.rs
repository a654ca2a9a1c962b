//! `create`, `mkdir`.

use fuser::{ReplyCreate, ReplyEntry, Request};
use libc::{EIO, EREMOTEIO, ENOENT};

use super::errno::remote_error_to_errno;
use super::RemoteFs;

#[allow(clippy::too_many_arguments)]
pub fn create(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    parent: u64,
    name: &std::ffi::OsStr,
    mode: u32,
    _umask: u32,
    _flags: i32,
    reply: ReplyCreate,
) {
    let Some(parent_path) = fs.path_of(parent) else {
        reply.error(ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(ENOENT);
        return;
    };
    let child_path = RemoteFs::join(&parent_path, name);
    let as_user = fs.as_user(req);
    let perms = mode & 0o7777;

    if fs.cache.contains(&child_path) {
        reply.error(EIO);
        return;
    }

    if let Err(e) = fs.block_on(fs.client.create(&child_path, perms, Some(&as_user))) {
        reply.error(remote_error_to_errno(&e));
        return;
    }

    if fs.cache.open_entry(&child_path).is_err() {
        reply.error(EIO);
        return;
    }
    let _ = fs
        .runtime
        .block_on(fs.cache.set_checksum(&fs.client, &child_path, Some(&as_user)));

    let ino = fs.inode_for_path(&child_path);
    match fs.getattr_path(ino, &child_path, &as_user) {
        Ok(attr) => reply.created(&fs.entry_ttl(), &attr, 0, ino, 0),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

pub fn mkdir(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    parent: u64,
    name: &std::ffi::OsStr,
    mode: u32,
    _umask: u32,
    reply: ReplyEntry,
) {
    let Some(parent_path) = fs.path_of(parent) else {
        reply.error(ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(ENOENT);
        return;
    };
    let child_path = RemoteFs::join(&parent_path, name);
    let as_user = fs.as_user(req);
    let perms = mode & 0o7777;

    match fs.block_on(fs.client.mkdir(&child_path, Some(perms), Some(&as_user))) {
        Ok(true) => {
            let ino = fs.inode_for_path(&child_path);
            match fs.getattr_path(ino, &child_path, &as_user) {
                Ok(attr) => reply.entry(&fs.entry_ttl(), &attr, 0),
                Err(e) => reply.error(remote_error_to_errno(&e)),
            }
        }
        Ok(false) => reply.error(EREMOTEIO),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}
