//! Memory configuration and its TOML representation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ScError, ScResult};
use crate::primitives::concurrency::DEFAULT_MONITOR_SHARDS;
use crate::storage::{DEFAULT_MAX_SEGMENTS, DEFAULT_SEGMENT_CAPACITY};

/// Settings for one [`crate::ScMemory`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum number of segments; allocation fails with `FullMemory` beyond it.
    pub max_segments: u16,
    /// Slots per segment.
    pub segment_capacity: u16,
    /// Shards of the monitor table.
    pub monitor_shards: usize,
    /// Directory holding the persisted dump.
    pub repo_path: Option<PathBuf>,
    /// Ignore an existing dump and start empty.
    pub clear: bool,
    /// Write the dump on shutdown.
    pub save_on_shutdown: bool,
    /// Filter passed to the logging subscriber, if logging should be installed.
    pub log_level: Option<String>,
    /// Collect counting metrics instead of discarding them.
    pub metrics: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_segments: DEFAULT_MAX_SEGMENTS,
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            monitor_shards: DEFAULT_MONITOR_SHARDS,
            repo_path: None,
            clear: false,
            save_on_shutdown: false,
            log_level: None,
            metrics: false,
        }
    }
}

impl MemoryConfig {
    /// Same as [`MemoryConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Small segments for tests and embedded use.
    pub fn small() -> Self {
        Self {
            max_segments: 256,
            segment_capacity: 4096,
            monitor_shards: 16,
            metrics: true,
            ..Self::default()
        }
    }

    /// Sets the segment limit.
    pub fn max_segments(mut self, count: u16) -> Self {
        self.max_segments = count;
        self
    }

    /// Sets slots per segment.
    pub fn segment_capacity(mut self, slots: u16) -> Self {
        self.segment_capacity = slots;
        self
    }

    /// Sets monitor table shards.
    pub fn monitor_shards(mut self, shards: usize) -> Self {
        self.monitor_shards = shards;
        self
    }

    /// Sets the dump directory.
    pub fn repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = Some(path.into());
        self
    }

    /// Starts empty even if a dump exists.
    pub fn clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Saves the dump on shutdown.
    pub fn save_on_shutdown(mut self, save: bool) -> Self {
        self.save_on_shutdown = save;
        self
    }

    /// Enables counting metrics.
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Sets the logging filter.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Rejects settings that can not produce a working storage.
    pub fn validate(&self) -> ScResult<()> {
        if self.max_segments == 0 {
            return Err(ScError::InvalidParams("max_segments must be positive"));
        }
        if self.segment_capacity == 0 {
            return Err(ScError::InvalidParams("segment_capacity must be positive"));
        }
        if self.monitor_shards == 0 {
            return Err(ScError::InvalidParams("monitor_shards must be positive"));
        }
        if self.save_on_shutdown && self.repo_path.is_none() {
            return Err(ScError::InvalidParams("save_on_shutdown requires repo_path"));
        }
        Ok(())
    }

    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Renders as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes a TOML file, creating parent directories.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Failures reading or writing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not valid TOML for [`MemoryConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Config could not be rendered.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// File could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Parent directory could not be created.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Default location of the inspector configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sc-memory").join("config.toml"))
}
