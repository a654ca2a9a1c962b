//! `getattr`/`setattr`: attribute fetch, and chmod/chown/utimens/truncate
//! dispatch (the kernel folds all four into one `setattr` upcall).

use std::time::UNIX_EPOCH;

use fuser::{ReplyAttr, Request, TimeOrNow};
use libc::ENOENT;

use super::errno::remote_error_to_errno;
use super::{write, RemoteFs};
use crate::identity;

pub fn getattr(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);
    match fs.getattr_path(ino, &path, &as_user) {
        Ok(attr) => reply.attr(&fs.attr_ttl(), &attr),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

fn time_or_now_to_secs(t: TimeOrNow) -> i64 {
    match t {
        TimeOrNow::SpecificTime(st) => st
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        TimeOrNow::Now => RemoteFs::now_secs(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn setattr(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    ino: u64,
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
    size: Option<u64>,
    atime: Option<TimeOrNow>,
    mtime: Option<TimeOrNow>,
    _fh: Option<u64>,
    reply: ReplyAttr,
) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);

    if let Some(mode) = mode {
        let perms = mode & 0o7777;
        if let Err(e) = fs.block_on(fs.client.chmod(&path, perms, Some(&as_user))) {
            reply.error(remote_error_to_errno(&e));
            return;
        }
    }

    if uid.is_some() || gid.is_some() {
        let user_name = uid.map(identity::name_of_uid).unwrap_or_else(|| as_user.clone());
        // Preserved behavior: the group name is resolved via the *user*
        // database too, not the group database. This matches the canonical
        // revision and is almost certainly a bug, but it is not ours to fix.
        let group_name = gid.map(identity::name_of_uid).unwrap_or_else(|| as_user.clone());
        if let Err(e) = fs.block_on(fs.client.chown(&path, &user_name, &group_name, Some(&as_user))) {
            let errno = match e {
                crate::remote::RemoteError::PermissionDenied => libc::EPERM,
                other => remote_error_to_errno(&other),
            };
            reply.error(errno);
            return;
        }
    }

    if let Some(length) = size {
        if let Err(errno) = write::do_truncate(fs, &path, length, &as_user) {
            reply.error(errno);
            return;
        }
    }

    if atime.is_some() || mtime.is_some() {
        let atime_s = atime.map(time_or_now_to_secs).unwrap_or_else(RemoteFs::now_secs);
        let mtime_s = mtime.map(time_or_now_to_secs).unwrap_or_else(RemoteFs::now_secs);
        if let Err(e) = fs.block_on(fs.client.utime(&path, atime_s, mtime_s, Some(&as_user))) {
            reply.error(remote_error_to_errno(&e));
            return;
        }
    }

    match fs.getattr_path(ino, &path, &as_user) {
        Ok(attr) => reply.attr(&fs.attr_ttl(), &attr),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

/// Used only by tests that want a fixed timestamp without going through
/// `SystemTime::now()`.
#[cfg(test)]
pub(crate) fn secs_since_epoch(t: std::time::SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
