//! Per-path local scratch file that mirrors one currently-open remote
//! file's bytes, plus the checksum-anchored coherence protocol that keeps
//! it in sync with the remote copy.
//!
//! Only one entry may exist per path at a time (single-open-per-path is
//! enforced by the caller, `adapter`, which checks [`StagingCache::contains`]
//! before calling [`StagingCache::open_entry`]).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;

use crate::remote::{RemoteChecksum, RemoteClient};

struct CacheEntry {
    staging_path: PathBuf,
    staging_handle: File,
    last_checksum: Option<RemoteChecksum>,
    dirty: bool,
}

pub struct StagingCache {
    scratch_dir: TempDir,
    entries: HashMap<String, CacheEntry>,
}

impl StagingCache {
    pub fn new(prefix: &str) -> io::Result<Self> {
        let scratch_dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            scratch_dir,
            entries: HashMap::new(),
        })
    }

    pub fn scratch_root(&self) -> &Path {
        self.scratch_dir.path()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// True if `path` itself is cached, or any cached entry's path is
    /// nested beneath it (e.g. `/dir/file` while checking `/dir`).
    pub fn contains_with_descendants(&self, path: &str) -> bool {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        self.entries.keys().any(|k| k == path || k.starts_with(&prefix))
    }

    pub fn is_dirty(&self, path: &str) -> bool {
        self.entries.get(path).map(|e| e.dirty).unwrap_or(false)
    }

    fn staging_path_for(&self, path: &str) -> PathBuf {
        self.scratch_dir.path().join(path.trim_start_matches('/'))
    }

    /// Creates (or truncates) the staging file for `path` and opens it
    /// read/write. Fails if an entry already exists for `path`.
    pub fn open_entry(&mut self, path: &str) -> io::Result<()> {
        if self.entries.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "staging entry already open for this path",
            ));
        }

        let staging_path = self.staging_path_for(path);
        if let Some(parent) = staging_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging_handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging_path)?;

        self.entries.insert(
            path.to_string(),
            CacheEntry {
                staging_path,
                staging_handle,
                last_checksum: None,
                dirty: false,
            },
        );
        Ok(())
    }

    fn entry_mut(&mut self, path: &str) -> io::Result<&mut CacheEntry> {
        self.entries
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no staging entry for path"))
    }

    pub async fn set_checksum(
        &mut self,
        client: &RemoteClient,
        path: &str,
        as_user: Option<&str>,
    ) -> Result<(), crate::remote::RemoteError> {
        let checksum = client.checksum(path, as_user).await?;
        if let Ok(entry) = self.entry_mut(path) {
            entry.last_checksum = Some(checksum);
        }
        Ok(())
    }

    /// The coherence protocol: compares the remote checksum to the last
    /// observed one. On divergence, the server wins — any local dirty
    /// writes are discarded and the staging file is overwritten with fresh
    /// remote content.
    pub async fn refresh(
        &mut self,
        client: &RemoteClient,
        path: &str,
        as_user: Option<&str>,
    ) -> Result<(), crate::remote::RemoteError> {
        let remote_checksum = client.checksum(path, as_user).await?;

        let unchanged = self
            .entries
            .get(path)
            .map(|e| e.last_checksum.as_ref() == Some(&remote_checksum))
            .unwrap_or(false);
        if unchanged {
            return Ok(());
        }

        let content = client.get(path, as_user).await?;

        if let Ok(entry) = self.entry_mut(path) {
            entry.dirty = false;
            write_whole(&mut entry.staging_handle, &content)?;
        }

        // The remote may have raced between the checksum fetch above and
        // this `get`; re-observe rather than trust `remote_checksum`, so
        // `last_checksum` always corresponds to what is actually staged.
        let post_write_checksum = client.checksum(path, as_user).await?;
        if let Ok(entry) = self.entry_mut(path) {
            entry.last_checksum = Some(post_write_checksum);
        }
        Ok(())
    }

    /// Pushes the full staging contents to the remote if dirty, then
    /// clears the dirty flag and re-records the post-push checksum.
    pub async fn push_if_dirty(
        &mut self,
        client: &RemoteClient,
        path: &str,
        perms: Option<u32>,
        as_user: Option<&str>,
    ) -> Result<(), crate::remote::RemoteError> {
        let dirty = self.entries.get(path).map(|e| e.dirty).unwrap_or(false);
        if !dirty {
            return Ok(());
        }

        let bytes = {
            let entry = self.entry_mut(path)?;
            read_whole(&mut entry.staging_handle)?
        };

        client.put(path, Bytes::from(bytes), perms, as_user).await?;

        if let Ok(entry) = self.entry_mut(path) {
            entry.dirty = false;
        }
        self.set_checksum(client, path, as_user).await
    }

    pub fn mark_dirty(&mut self, path: &str) -> io::Result<()> {
        self.entry_mut(path)?.dirty = true;
        Ok(())
    }

    pub fn read_at(&mut self, path: &str, offset: u64, size: usize) -> io::Result<Vec<u8>> {
        let entry = self.entry_mut(path)?;
        entry.staging_handle.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        let n = read_up_to(&mut entry.staging_handle, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    pub fn write_at(&mut self, path: &str, offset: u64, data: &[u8]) -> io::Result<()> {
        let entry = self.entry_mut(path)?;
        entry.staging_handle.seek(SeekFrom::Start(offset))?;
        entry.staging_handle.write_all(data)?;
        entry.dirty = true;
        Ok(())
    }

    pub fn truncate(&mut self, path: &str, length: u64) -> io::Result<()> {
        let entry = self.entry_mut(path)?;
        entry.staging_handle.set_len(length)?;
        entry.dirty = true;
        Ok(())
    }

    /// Closes the staging handle, unlinks the staging file, and drops the
    /// entry.
    pub fn remove(&mut self, path: &str) -> io::Result<()> {
        if let Some(entry) = self.entries.remove(path) {
            drop(entry.staging_handle);
            // Tolerate a staging file that was already gone (e.g. a prior
            // crash cleaned up partway); nothing downstream depends on the
            // unlink itself succeeding.
            let _ = std::fs::remove_file(&entry.staging_path);
        }
        Ok(())
    }
}

fn write_whole(file: &mut File, content: &Bytes) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content)?;
    file.set_len(content.len() as u64)?;
    Ok(())
}

fn read_whole(file: &mut File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_entry_rejects_duplicate() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/a/b").unwrap();
        assert!(cache.open_entry("/a/b").is_err());
    }

    #[test]
    fn write_then_read_round_trips_within_entry() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/x").unwrap();
        cache.write_at("/x", 0, b"HELLO").unwrap();
        assert!(cache.is_dirty("/x"));
        let data = cache.read_at("/x", 0, 5).unwrap();
        assert_eq!(data, b"HELLO");
    }

    #[test]
    fn short_read_near_eof_is_permitted() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/x").unwrap();
        cache.write_at("/x", 0, b"HI").unwrap();
        let data = cache.read_at("/x", 0, 100).unwrap();
        assert_eq!(data, b"HI");
    }

    #[test]
    fn truncate_marks_dirty_and_resizes() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/x").unwrap();
        cache.write_at("/x", 0, b"HELLO WORLD").unwrap();
        cache.truncate("/x", 5).unwrap();
        let data = cache.read_at("/x", 0, 100).unwrap();
        assert_eq!(data, b"HELLO");
        assert!(cache.is_dirty("/x"));
    }

    #[test]
    fn remove_drops_entry_and_unlinks_file() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/x").unwrap();
        let path_on_disk = cache.scratch_root().join("x");
        assert!(path_on_disk.exists());
        cache.remove("/x").unwrap();
        assert!(!cache.contains("/x"));
        assert!(!path_on_disk.exists());
    }

    #[test]
    fn contains_with_descendants_catches_a_nested_open_entry() {
        let mut cache = StagingCache::new("test-").unwrap();
        cache.open_entry("/dir/file").unwrap();
        assert!(!cache.contains("/dir"));
        assert!(cache.contains_with_descendants("/dir"));
        assert!(!cache.contains_with_descendants("/other"));
    }
}
