//! Mount configuration: CLI-supplied connection parameters plus the
//! optional `config.toml` overrides for kernel-cache tuning.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default WebHDFS namenode HTTP port.
pub const DEFAULT_PORT: u16 = 50070;

/// Knobs loaded from an optional `config.toml`, merged on top of defaults.
///
/// Connection parameters (host/port/mountpoint/debug/foreground) come from
/// the CLI, not this file — `config.toml` only tunes the kernel-side
/// attribute/entry cache TTLs and the staging scratch directory prefix.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub kernel_attr_timeout_seconds: u64,
    pub kernel_entry_timeout_seconds: u64,
    pub scratch_dir_prefix: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            kernel_attr_timeout_seconds: 1,
            kernel_entry_timeout_seconds: 1,
            scratch_dir_prefix: "webhdfs-fuse-".to_string(),
        }
    }
}

impl FileConfig {
    /// Loads `path` if it exists; falls back to defaults (with a logged
    /// warning) if the file is missing, unreadable, or malformed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config file, using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not parse config file, using defaults");
                Self::default()
            }
        }
    }
}

/// Fully resolved mount configuration: CLI parameters plus file overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mountpoint: PathBuf,
    pub debug: bool,
    pub foreground: bool,
    pub file: FileConfig,
}

impl Config {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/webhdfs/v1/", self.host, self.port)
    }

    pub fn kernel_attr_ttl(&self) -> Duration {
        Duration::from_secs(self.file.kernel_attr_timeout_seconds)
    }

    pub fn kernel_entry_ttl(&self) -> Duration {
        Duration::from_secs(self.file.kernel_entry_timeout_seconds)
    }
}
