//! JSON-shaped records returned by the remote namespace, and the typed
//! structs downstream code actually works with. Parsing happens only here;
//! nothing past this module touches a raw `serde_json::Value`.
//!
//! Field names and wrapper shapes are bit-exact with the WebHDFS REST
//! protocol (`{"FileStatus": {...}}`, `{"FileStatuses": {"FileStatus": [...]}}`,
//! `{"FileChecksum": {...}}`, `{"boolean": ...}`, `{"RemoteException": {...}}`).

use serde::Deserialize;

/// `type` field of a `FileStatus` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    Directory,
    File,
    Symlink,
}

/// A single file or directory's metadata as returned by the remote.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileStatus {
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub permission: String,
    pub owner: String,
    pub group: String,
    pub length: u64,
    pub access_time: i64,
    pub modification_time: i64,
    #[serde(default)]
    pub path_suffix: String,
}

impl RemoteFileStatus {
    /// The permission octal string parsed to an integer, e.g. `"755"` -> `0o755`.
    pub fn permission_bits(&self) -> u32 {
        u32::from_str_radix(&self.permission, 8).unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct FileStatusWrapper {
    pub file_status: RemoteFileStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct FileStatusesWrapper {
    pub file_statuses: FileStatusesBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct FileStatusesBody {
    pub file_status: Vec<RemoteFileStatus>,
}

/// An opaque remote checksum identifier. Only equality between two
/// instances is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChecksum(pub(super) String);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct FileChecksumWrapper {
    pub file_checksum: FileChecksumBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FileChecksumBody {
    #[serde(default)]
    pub algorithm: String,
    pub bytes: String,
    #[serde(default)]
    pub length: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct BooleanResponse {
    pub boolean: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoteExceptionWrapper {
    #[serde(rename = "RemoteException")]
    pub remote_exception: RemoteExceptionBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoteExceptionBody {
    pub exception: String,
    pub message: String,
}

pub(super) use FileStatusWrapper as StatusWrapper;
pub(super) use FileStatusesWrapper as ListWrapper;
pub(super) use FileChecksumWrapper as ChecksumWrapper;
