//! Domain configuration via `tessera.toml`
//!
//! On first use a commented default file can be dropped next to the data
//! with [`TesseraConfig::write_default_if_missing`]. Every key is optional;
//! missing keys take their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessera_codec::CodecOptions;
use tessera_core::DEFAULT_MAX_DEPTH;
use tessera_export::JournalRetention;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Snapshot file extension used by [`TesseraConfig::snapshot_path`]
pub const SNAPSHOT_EXTENSION: &str = "tsnp";

/// Fragment journal limits, persisted under `[journal]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalConfig {
    /// Maximum cached fragments (default: 1024)
    #[serde(default = "default_max_fragments", skip_serializing_if = "Option::is_none")]
    pub max_fragments: Option<usize>,
    /// Maximum total fragment size in bytes (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<usize>,
    /// Maximum fragment age in seconds (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

fn default_max_fragments() -> Option<usize> {
    Some(1024)
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            max_fragments: default_max_fragments(),
            max_bytes: None,
            max_age_secs: None,
        }
    }
}

/// Domain configuration loaded from `tessera.toml`.
///
/// # Example
///
/// ```toml
/// debug_stream = false
/// max_depth = 16384
/// snapshot_dir = "snapshots"
///
/// [journal]
/// max_fragments = 1024
/// max_bytes = 8388608
/// max_age_secs = 3600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TesseraConfig {
    /// Write debug sentinels into snapshot streams.
    #[serde(default)]
    pub debug_stream: bool,
    /// Deepest value nesting accepted by snapshots and exports
    /// (default: 16384).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Journal retention.
    #[serde(default)]
    pub journal: JournalConfig,
    /// Directory for snapshot files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

impl TesseraConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera domain configuration
#
# Write debug sentinels into snapshot streams (default: false).
# Streams get larger but a mismatched reader reports the first point of
# divergence instead of failing somewhere later.
debug_stream = false

# Deepest value nesting a snapshot or export may reach (default: 16384).
# A chain of objects reached only through each other nests once per link.
# max_depth = 16384

# Directory for snapshot files (default: none, callers pass explicit paths).
# snapshot_dir = "snapshots"

[journal]
# Cached per-transaction export fragments.
# Observers further behind than the journal reaches need a full export.
max_fragments = 1024
# max_bytes = 8388608
# max_age_secs = 3600
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TesseraConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject limits that would make the journal useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |key: &'static str, value: Option<u64>| match value {
            Some(0) => Err(ConfigError::Invalid {
                key,
                reason: "must be at least 1".to_string(),
            }),
            _ => Ok(()),
        };
        positive("max_depth", self.max_depth.map(|v| v as u64))?;
        positive("journal.max_fragments", self.journal.max_fragments.map(|v| v as u64))?;
        positive("journal.max_bytes", self.journal.max_bytes.map(|v| v as u64))?;
        positive("journal.max_age_secs", self.journal.max_age_secs)?;
        Ok(())
    }

    /// Codec options for snapshot encoding
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            debug: self.debug_stream,
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        }
    }

    /// Journal retention policy
    pub fn journal_retention(&self) -> JournalRetention {
        JournalRetention {
            max_count: self.journal.max_fragments,
            max_bytes: self.journal.max_bytes,
            max_age: self.journal.max_age_secs.map(Duration::from_secs),
        }
    }

    /// Where the snapshot of `domain` lives, if a snapshot directory is set
    pub fn snapshot_path(&self, domain: &str) -> Option<PathBuf> {
        self.snapshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", domain, SNAPSHOT_EXTENSION)))
    }
}
