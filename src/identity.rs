//! Translation between local numeric uid/gid and the remote's user/group
//! **names**. The remote protocol has no numeric identity concept; every
//! request carries a name (`as_user`, `owner`, `group`), and every reply
//! carries names back that must be turned into numbers for `st_uid`/`st_gid`.
//!
//! Misses default to uid/gid 0 ("root") on the numeric side and `"root"` on
//! the name side, per spec.

use nix::unistd::{Gid, Group, Uid, User};

const ROOT: &str = "root";

/// Local user database lookup: name -> uid, defaulting to 0 on miss.
pub fn uid_of_name(name: &str) -> u32 {
    User::from_name(name)
        .ok()
        .flatten()
        .map(|u| u.uid.as_raw())
        .unwrap_or(0)
}

/// Local group database lookup: name -> gid, defaulting to 0 on miss.
pub fn gid_of_name(name: &str) -> u32 {
    Group::from_name(name)
        .ok()
        .flatten()
        .map(|g| g.gid.as_raw())
        .unwrap_or(0)
}

/// Local user database lookup: uid -> name, defaulting to "root" on miss.
pub fn name_of_uid(uid: u32) -> String {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| ROOT.to_string())
}

/// Local group database lookup: gid -> name, defaulting to "root" on miss.
pub fn name_of_gid(gid: u32) -> String {
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name)
        .unwrap_or_else(|| ROOT.to_string())
}

/// The remote username used for `as_user` on every request issued on
/// behalf of a caller with the given uid. Unresolvable uids act as root,
/// per spec.
pub fn as_user_for_uid(uid: u32) -> String {
    name_of_uid(uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_defaults_to_zero() {
        assert_eq!(uid_of_name("definitely-not-a-real-user-xyz"), 0);
        assert_eq!(gid_of_name("definitely-not-a-real-group-xyz"), 0);
    }

    #[test]
    fn unknown_id_defaults_to_root() {
        assert_eq!(name_of_uid(u32::MAX), ROOT);
        assert_eq!(name_of_gid(u32::MAX), ROOT);
    }

    #[test]
    fn root_round_trips() {
        // uid/gid 0 is always "root" on any POSIX system.
        assert_eq!(name_of_uid(0), ROOT);
        assert_eq!(as_user_for_uid(0), ROOT);
    }
}
