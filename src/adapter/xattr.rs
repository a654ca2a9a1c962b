//! Extended attributes. The remote protocol has no xattr concept, so these
//! are safe no-ops rather than wired to any remote operation — reporting
//! truthfully that no attributes exist rather than erroring out probes
//! from userspace tools that expect xattr support to at least be present.

use fuser::{ReplyEmpty, ReplyXattr, Request};
use libc::ENODATA;

use super::RemoteFs;

pub fn getxattr(_fs: &mut RemoteFs, _req: &Request<'_>, _ino: u64, _name: &std::ffi::OsStr, _size: u32, reply: ReplyXattr) {
    reply.error(ENODATA);
}

pub fn setxattr(
    _fs: &mut RemoteFs,
    _req: &Request<'_>,
    _ino: u64,
    _name: &std::ffi::OsStr,
    _value: &[u8],
    _flags: i32,
    _position: u32,
    reply: ReplyEmpty,
) {
    reply.ok();
}

pub fn listxattr(_fs: &mut RemoteFs, _req: &Request<'_>, _ino: u64, size: u32, reply: ReplyXattr) {
    if size == 0 {
        reply.size(0);
    } else {
        reply.data(&[]);
    }
}

pub fn removexattr(_fs: &mut RemoteFs, _req: &Request<'_>, _ino: u64, _name: &std::ffi::OsStr, reply: ReplyEmpty) {
    reply.error(ENODATA);
}
