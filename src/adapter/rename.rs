//! `rename`: unlink-then-rename-over for an existing destination, with the
//! destination's own non-empty-directory failure surfaced as `ENOTEMPTY`.

use fuser::{ReplyEmpty, Request};
use libc::{EREMOTEIO, ENOENT};

use super::errno::remote_error_to_errno;
use super::RemoteFs;

#[allow(clippy::too_many_arguments)]
pub fn rename(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    parent: u64,
    name: &std::ffi::OsStr,
    newparent: u64,
    newname: &std::ffi::OsStr,
    _flags: u32,
    reply: ReplyEmpty,
) {
    let (Some(old_parent), Some(new_parent)) = (fs.path_of(parent), fs.path_of(newparent)) else {
        reply.error(ENOENT);
        return;
    };
    let (Some(name), Some(newname)) = (name.to_str(), newname.to_str()) else {
        reply.error(ENOENT);
        return;
    };
    let old = RemoteFs::join(&old_parent, name);
    let new = RemoteFs::join(&new_parent, newname);
    let as_user = fs.as_user(req);

    debug_assert!(
        !fs.cache.contains(&old) && !fs.cache.contains(&new),
        "rename touching a path with an open staging entry"
    );

    if fs.block_on(fs.client.getattr(&new, Some(&as_user))).is_ok() {
        if let Err(e) = fs.block_on(fs.client.delete(&new, false, Some(&as_user))) {
            reply.error(remote_error_to_errno(&e));
            return;
        }
    }

    match fs.block_on(fs.client.rename(&old, &new, Some(&as_user))) {
        Ok(true) => {
            fs.rename_path(&old, &new);
            reply.ok();
        }
        Ok(false) => reply.error(EREMOTEIO),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}
