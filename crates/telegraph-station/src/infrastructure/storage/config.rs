//! TOML configuration for a telegraph station.
//!
//! Read from the platform config directory unless a path is given:
//! - Windows:  `%APPDATA%\Telegraph\config.toml`
//! - Linux:    `~/.config/telegraph/config.toml`
//! - macOS:    `~/Library/Application Support/Telegraph/config.toml`
//!
//! Example:
//!
//! ```toml
//! [station]
//! peer_address = "192.168.1.20"
//! role = "auto"
//! bell = true
//!
//! [network]
//! port = 10000
//!
//! [timing]
//! unit_ms = 150
//! granularity = "word"
//! split_letters = true
//! ```
//!
//! Every field has a `#[serde(default = "...")]`, and every section may be
//! left out, so an empty file is a valid configuration.  Command-line flags
//! override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telegraph_core::protocol::DEFAULT_PORT;
use telegraph_core::domain::timing::MAX_TIME_UNIT;
use telegraph_core::{DecodeGranularity, RolePreference, TimingConfig};
use thiserror::Error;
use tracing::warn;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level station configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StationConfig {
    #[serde(default)]
    pub station: StationSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub timing: TimingSection,
}

/// Who we are and who we talk to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationSection {
    /// Our own address.  Discovered from the default route when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    /// The other station's address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_address: Option<String>,
    /// `"listener"`, `"dialer"` or `"auto"`.
    #[serde(default)]
    pub role: RolePreference,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Ring the terminal bell on every remote press.
    #[serde(default)]
    pub bell: bool,
}

/// Transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// TCP port both stations use.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between dial attempts while the peer is not listening.
    #[serde(default = "default_dial_backoff_secs")]
    pub dial_backoff_secs: u64,
}

/// Decoder timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    /// Length of one dot in milliseconds.
    #[serde(default = "default_unit_ms")]
    pub unit_ms: u64,
    /// How often the decoder checks for silence, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// `"word"` or `"letter"`.
    #[serde(default)]
    pub granularity: DecodeGranularity,
    /// Separate letter codes inside a word where a letter gap was keyed.
    #[serde(default)]
    pub split_letters: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_dial_backoff_secs() -> u64 {
    5
}
fn default_unit_ms() -> u64 {
    200
}
fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for StationSection {
    fn default() -> Self {
        Self {
            local_address: None,
            peer_address: None,
            role: RolePreference::Unspecified,
            log_level: default_log_level(),
            bell: false,
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dial_backoff_secs: default_dial_backoff_secs(),
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            unit_ms: default_unit_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            granularity: DecodeGranularity::default(),
            split_letters: false,
        }
    }
}

impl NetworkSection {
    pub fn dial_backoff(&self) -> Duration {
        Duration::from_secs(self.dial_backoff_secs)
    }
}

impl TimingSection {
    /// Converts to the core timing type.
    ///
    /// Zero values fall back to defaults; a unit longer than
    /// [`MAX_TIME_UNIT`] is clamped to it.
    pub fn to_timing(&self) -> TimingConfig {
        let defaults = TimingConfig::default();
        let mut unit = nonzero_ms(self.unit_ms).unwrap_or(defaults.unit);
        if unit > MAX_TIME_UNIT {
            warn!("unit_ms {} is too long; using {:?}", self.unit_ms, MAX_TIME_UNIT);
            unit = MAX_TIME_UNIT;
        }
        TimingConfig {
            unit,
            poll_interval: nonzero_ms(self.poll_interval_ms).unwrap_or(defaults.poll_interval),
            granularity: self.granularity,
            split_letters: self.split_letters,
        }
    }
}

fn nonzero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<StationConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<StationConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StationConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to the default location.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &StationConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &StationConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Telegraph"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("telegraph"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Telegraph")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
