//! `write`, `flush`, `fsync`, `release`, and the shared `truncate` logic
//! used both by `setattr`'s size field and (if ever exposed directly) a
//! standalone truncate upcall.

use fuser::{ReplyEmpty, ReplyWrite, Request};
use libc::{EIO, ENOENT};

use super::errno::remote_error_to_errno;
use super::RemoteFs;

pub fn write(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    data: &[u8],
    _write_flags: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyWrite,
) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);

    if let Err(e) = fs.runtime.block_on(fs.cache.refresh(&fs.client, &path, Some(&as_user))) {
        reply.error(remote_error_to_errno(&e));
        return;
    }

    match fs.cache.write_at(&path, offset.max(0) as u64, data) {
        Ok(()) => reply.written(data.len() as u32),
        Err(_) => reply.error(EIO),
    }
}

pub fn flush(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);
    refresh_then_push(fs, &path, &as_user, reply);
}

pub fn fsync(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);
    refresh_then_push(fs, &path, &as_user, reply);
}

/// `fsync`/`flush` share one contract: refresh first, push second.
/// Refreshing first means a newer remote copy wins over any local dirty
/// bytes — nothing gets pushed if the remote already moved on.
fn refresh_then_push(fs: &mut RemoteFs, path: &str, as_user: &str, reply: ReplyEmpty) {
    if let Err(e) = fs.runtime.block_on(fs.cache.refresh(&fs.client, path, Some(as_user))) {
        reply.error(remote_error_to_errno(&e));
        return;
    }
    match fs.runtime.block_on(fs.cache.push_if_dirty(&fs.client, path, None, Some(as_user))) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

pub fn release(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    ino: u64,
    _fh: u64,
    _flags: i32,
    _lock_owner: Option<u64>,
    _flush: bool,
    reply: ReplyEmpty,
) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);

    let push_result = fs.runtime.block_on(fs.cache.push_if_dirty(&fs.client, &path, None, Some(&as_user)));
    let _ = fs.cache.remove(&path);

    match push_result {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

/// Implements the spec's truncate contract for both a cached (already
/// open) path and an uncached one. For the uncached case, a transient
/// staging entry is opened for the duration of the call and is guaranteed
/// to be removed on every exit path, success or failure.
pub fn do_truncate(fs: &mut RemoteFs, path: &str, length: u64, as_user: &str) -> Result<(), i32> {
    let transient = !fs.cache.contains(path);
    if transient && fs.cache.open_entry(path).is_err() {
        return Err(EIO);
    }

    let outcome = (|| -> Result<(), i32> {
        fs.runtime
            .block_on(fs.cache.refresh(&fs.client, path, Some(as_user)))
            .map_err(|e| remote_error_to_errno(&e))?;
        fs.cache.truncate(path, length).map_err(|_| EIO)?;
        fs.runtime
            .block_on(fs.cache.push_if_dirty(&fs.client, path, None, Some(as_user)))
            .map_err(|e| remote_error_to_errno(&e))?;
        Ok(())
    })();

    if transient {
        let _ = fs.cache.remove(path);
    }
    outcome
}
