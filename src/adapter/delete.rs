//! `unlink`, `rmdir`.

use fuser::{ReplyEmpty, Request};
use libc::{EREMOTEIO, ENOENT};

use super::errno::remote_error_to_errno;
use super::RemoteFs;

pub fn unlink(fs: &mut RemoteFs, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
    let Some(parent_path) = fs.path_of(parent) else {
        reply.error(ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(ENOENT);
        return;
    };
    let path = RemoteFs::join(&parent_path, name);
    let as_user = fs.as_user(req);

    match fs.block_on(fs.client.delete(&path, false, Some(&as_user))) {
        Ok(true) => {
            fs.forget_path(&path);
            reply.ok();
        }
        Ok(false) => reply.error(EREMOTEIO),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

pub fn rmdir(fs: &mut RemoteFs, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
    let Some(parent_path) = fs.path_of(parent) else {
        reply.error(ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(ENOENT);
        return;
    };
    let path = RemoteFs::join(&parent_path, name);
    let as_user = fs.as_user(req);

    debug_assert!(
        !fs.cache.contains_with_descendants(&path),
        "rmdir on a path with an open staging entry beneath it"
    );

    match fs.block_on(fs.client.delete(&path, false, Some(&as_user))) {
        Ok(true) => {
            fs.forget_path(&path);
            reply.ok();
        }
        Ok(false) => reply.error(EREMOTEIO),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}
