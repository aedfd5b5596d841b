//! Per-shard configuration.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default WAL pre-allocation: 64 MiB.
pub const DEFAULT_WAL_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// Default ring size: 2^17 slots.
pub const DEFAULT_RING_BUFFER_SIZE: usize = 1 << 17;

fn default_http_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_wal_size() -> usize {
    DEFAULT_WAL_SIZE_BYTES
}

fn default_ring_size() -> usize {
    DEFAULT_RING_BUFFER_SIZE
}

/// Configuration for one shard, loaded from a TOML file.
///
/// The option set is closed: unknown keys fail the parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardConfig {
    /// Identifier used in responses and metric labels.
    pub shard_id: String,

    /// The closed set of symbols this shard accepts.
    pub shard_symbols: Vec<String>,

    /// Listener for order submission.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Listener for metrics exposition.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Address of the external event stream. When absent, outbound
    /// publication is disabled and only the WAL records events.
    #[serde(default)]
    pub broker_bootstrap: Option<String>,

    /// Path of the shard's WAL file.
    pub wal_path: PathBuf,

    /// Pre-allocated WAL size in bytes.
    #[serde(default = "default_wal_size")]
    pub wal_size_bytes: usize,

    /// Ring buffer slot count; must be a power of two.
    #[serde(default = "default_ring_size")]
    pub ring_buffer_size: usize,
}

impl ShardConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, fails to parse,
    /// or carries invalid values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: ShardConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value-level constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty symbol set, a non-power-of-two
    /// ring size, or a zero WAL size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.ring_buffer_size == 0 || !self.ring_buffer_size.is_power_of_two() {
            return Err(ConfigError::InvalidRingSize(self.ring_buffer_size));
        }
        if self.wal_size_bytes == 0 {
            return Err(ConfigError::InvalidWalSize(self.wal_size_bytes));
        }
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error message.
        message: String,
    },

    /// The configuration file is not valid TOML for the expected shape.
    Parse {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying parse error message.
        message: String,
    },

    /// The symbol set is empty.
    NoSymbols,

    /// The ring size is zero or not a power of two.
    InvalidRingSize(usize),

    /// The WAL size is zero.
    InvalidWalSize(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "cannot read config {}: {message}", path.display())
            }
            ConfigError::Parse { path, message } => {
                write!(f, "cannot parse config {}: {message}", path.display())
            }
            ConfigError::NoSymbols => write!(f, "shard_symbols must not be empty"),
            ConfigError::InvalidRingSize(size) => {
                write!(f, "ring_buffer_size must be a power of two, got {size}")
            }
            ConfigError::InvalidWalSize(size) => {
                write!(f, "wal_size_bytes must be positive, got {size}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
