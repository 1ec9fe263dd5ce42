// Daemon configuration: `~/.folio/config.toml`.
//
// Every table is optional; missing keys take their defaults. Command-line
// flags are applied on top by the binary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root directory for folio state: `~/.folio/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".folio"))
}

/// Path to the config file: `~/.folio/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Default database location: `~/.folio/folio.db`.
pub fn default_db_path() -> PathBuf {
    global_dir().unwrap_or_else(|| PathBuf::from(".folio")).join("folio.db")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    pub store: StoreConfig,
    pub parser: ParserConfig,
    pub log: LogConfig,
    pub access: AccessConfig,
}

impl DaemonConfig {
    /// Load from `~/.folio/config.toml`. A missing file yields defaults; a
    /// file that exists but does not parse is an error.
    pub fn load() -> Result<Self, ConfigError> {
        match global_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

// ── Tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file. Defaults to `~/.folio/folio.db`.
    pub path: Option<PathBuf>,
    /// How long a writer waits for another writer's transaction.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: None, busy_timeout_ms: 5_000 }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_db_path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Chars of payload head and tail quoted in parse failures.
    pub preview_chars: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { preview_chars: folio_common::patch::parse::DEFAULT_PREVIEW_CHARS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Actors that may read but never mutate.
    pub read_only_actors: BTreeSet<String>,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(std::io::Error),
    #[error("config parse error: {0}")]
    Parse(toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(toml::ser::Error),
}
