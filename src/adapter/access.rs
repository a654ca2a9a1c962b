//! `access`: POSIX permission-bit checking against the caller's identity.
//!
//! `F_OK` needs no bit-level check here — `getattr` already had to succeed
//! to produce a stat record, so existence is established by the time this
//! runs.

use fuser::{ReplyEmpty, Request};
use libc::{EACCES, ENOENT, R_OK, W_OK, X_OK};

use super::errno::remote_error_to_errno;
use super::RemoteFs;

pub fn access(fs: &mut RemoteFs, req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
    let Some(path) = fs.path_of(ino) else {
        reply.error(ENOENT);
        return;
    };
    let as_user = fs.as_user(req);

    let attr = match fs.getattr_path(ino, &path, &as_user) {
        Ok(attr) => attr,
        Err(e) => {
            reply.error(remote_error_to_errno(&e));
            return;
        }
    };

    let perm = attr.perm as u32;
    let user_bits = (perm >> 6) & 0o7;
    let group_bits = (perm >> 3) & 0o7;
    let other_bits = perm & 0o7;

    let mut applicable = other_bits;
    if req.gid() == attr.gid {
        applicable |= group_bits;
    }
    if req.uid() == attr.uid {
        applicable |= user_bits;
    }

    for (bit, want) in [(R_OK, 0o4u32), (W_OK, 0o2u32), (X_OK, 0o1u32)] {
        if mask & bit != 0 && applicable & want == 0 {
            reply.error(EACCES);
            return;
        }
    }

    reply.ok();
}
