//! Default translation from the remote error taxonomy to POSIX errno.
//!
//! This is the fallback every upcall uses for conditions the upcall itself
//! does not special-case (e.g. `chown` maps `PermissionDenied` to `EPERM`
//! instead of this module's default `EACCES`).

use libc::{EACCES, EIO, ENOENT, ENOTEMPTY};

use crate::remote::RemoteError;

pub fn remote_error_to_errno(err: &RemoteError) -> i32 {
    match err {
        RemoteError::NotFound => ENOENT,
        RemoteError::PermissionDenied => EACCES,
        RemoteError::DirectoryNotEmpty => ENOTEMPTY,
        RemoteError::MissingLocation => EIO,
        RemoteError::Generic { method, url, status, body } => {
            tracing::error!(method, url, status, body, "unclassified remote error");
            EIO
        }
        RemoteError::Transport(e) => {
            tracing::error!(error = %e, "transport error");
            EIO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_enoent() {
        assert_eq!(remote_error_to_errno(&RemoteError::NotFound), ENOENT);
    }

    #[test]
    fn directory_not_empty_maps_to_enotempty() {
        assert_eq!(remote_error_to_errno(&RemoteError::DirectoryNotEmpty), ENOTEMPTY);
    }

    #[test]
    fn permission_denied_defaults_to_eacces() {
        assert_eq!(remote_error_to_errno(&RemoteError::PermissionDenied), EACCES);
    }
}
