//! `lookup`, `readdir`, `open`, `read`.

use fuser::{FileType, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen, Request};
use libc::{EIO, ENOENT};

use super::errno::remote_error_to_errno;
use super::RemoteFs;
use crate::remote::FileKind;

pub fn lookup(fs: &mut RemoteFs, req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEntry) {
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

    match fs.block_on(fs.client.getattr(&child_path, Some(&as_user))) {
        Ok(status) => {
            let ino = fs.inode_for_path(&child_path);
            let attr = RemoteFs::stat_from_remote(ino, &status);
            reply.entry(&fs.entry_ttl(), &attr, 0);
        }
        Err(e) => reply.error(remote_error_to_errno(&e)),
    }
}

fn file_kind_to_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::Directory => FileType::Directory,
        FileKind::File => FileType::RegularFile,
        FileKind::Symlink => FileType::Symlink,
    }
}

pub fn readdir(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);

    let listing = match fs.block_on(fs.client.list(&path, Some(&as_user))) {
        Ok(listing) => listing,
        Err(e) => {
            reply.error(remote_error_to_errno(&e));
            return;
        }
    };

    let mut entries: Vec<(u64, FileType, String)> = vec![
        (ino, FileType::Directory, ".".to_string()),
        (ino, FileType::Directory, "..".to_string()),
    ];
    for status in &listing {
        let child_path = RemoteFs::join(&path, &status.path_suffix);
        let child_ino = fs.inode_for_path(&child_path);
        entries.push((child_ino, file_kind_to_type(status.kind), status.path_suffix.clone()));
    }

    for (i, (ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
        if reply.add(*ino, (i + 1) as i64, *kind, name) {
            break;
        }
    }
    reply.ok();
}

pub fn open(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };

    if fs.cache.contains(&path) {
        reply.error(EIO);
        return;
    }
    if fs.cache.open_entry(&path).is_err() {
        reply.error(EIO);
        return;
    }

    let as_user = fs.as_user(req);
    let result = fs.runtime.block_on(fs.cache.refresh(&fs.client, &path, Some(&as_user)));
    if let Err(e) = result {
        let _ = fs.cache.remove(&path);
        reply.error(remote_error_to_errno(&e));
        return;
    }

    // fh == ino: single-open-per-path means the path's inode unambiguously
    // identifies the one staging entry that can exist for it.
    reply.opened(ino, 0);
}

pub fn read(
    fs: &mut RemoteFs,
    req: &Request<'_>,
    ino: u64,
    _fh: u64,
    offset: i64,
    size: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyData,
) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };

    let as_user = fs.as_user(req);
    let result = fs.runtime.block_on(fs.cache.refresh(&fs.client, &path, Some(&as_user)));
    if let Err(e) = result {
        reply.error(remote_error_to_errno(&e));
        return;
    }

    match fs.cache.read_at(&path, offset.max(0) as u64, size as usize) {
        Ok(data) => reply.data(&data),
        Err(_) => reply.error(EIO),
    }
}
