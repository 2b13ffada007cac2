//! Runtime configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags, the TOML config file, built-in defaults. The config file is
//! optional. A missing file at the default location is fine, but a path the
//! user named explicitly must exist.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;

use crate::theme::ThemeMode;

const APP_DIR: &str = "piper-rooms";
const DEFAULT_USER_ID: &str = "@me:localhost";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_LATENCY_MS: u64 = 150;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid user id '{0}': expected @name:server")]
    InvalidUserId(String),
}

/// The config file as written on disk. Every key is optional.
///
/// ```toml
/// user_id = "@alice:example.org"
/// log_filter = "piper_rooms=debug"
/// log_file = "/tmp/piper-rooms.log"
/// latency_ms = 300
/// theme = "light"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub user_id: Option<String>,
    pub log_filter: Option<String>,
    pub log_file: Option<PathBuf>,
    pub latency_ms: Option<u64>,
    pub theme: Option<ThemeMode>,
}

impl FileConfig {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the file at `path`. With `required == false` a missing file
    /// yields the empty config.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Default)]
pub struct Overrides {
    pub user_id: Option<String>,
    pub log_file: Option<PathBuf>,
    pub latency_ms: Option<u64>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub user_id: String,
    /// The part of `user_id` after the first `:`.
    pub server_name: String,
    pub log_filter: String,
    pub log_file: PathBuf,
    /// Simulated round-trip time of the local homeserver.
    pub latency: Duration,
    pub theme: ThemeMode,
}

impl Config {
    /// Load the config file (the default location unless `path` is given)
    /// and apply `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => FileConfig::load(path, true)?,
            None => match default_config_path() {
                Some(path) => FileConfig::load(&path, false)?,
                None => FileConfig::default(),
            },
        };
        Self::resolve(file, overrides)
    }

    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let user_id = overrides
            .user_id
            .or(file.user_id)
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let server_name = server_name(&user_id)?.to_string();
        Ok(Self {
            user_id,
            server_name,
            log_filter: file
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_file: overrides
                .log_file
                .or(file.log_file)
                .unwrap_or_else(default_log_path),
            latency: Duration::from_millis(
                overrides
                    .latency_ms
                    .or(file.latency_ms)
                    .unwrap_or(DEFAULT_LATENCY_MS),
            ),
            theme: file.theme.unwrap_or(ThemeMode::Dark),
        })
    }
}

/// Split `@name:server` and return `server`.
pub fn server_name(user_id: &str) -> Result<&str, ConfigError> {
    let invalid = || ConfigError::InvalidUserId(user_id.to_string());
    let rest = user_id.strip_prefix('@').ok_or_else(invalid)?;
    // `split_once` splits at the first `:`; servers may carry a port
    // (`example.org:8448`), so everything after it belongs to the server.
    let (name, server) = rest.split_once(':').ok_or_else(invalid)?;
    if name.is_empty() || server.is_empty() {
        return Err(invalid());
    }
    Ok(server)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(format!("{APP_DIR}.log"))
}

// ── Tests ────────────────────────────────────────────────────────────────────
