//! Database configuration loading from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, InitError};

/// File name of the database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "callrecorder.db";

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseConfig,
}

/// Where the database lives and how its connection is set up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding `callrecorder.db`. When unset, the platform data
    /// directory joined with [`app_dir`](Self::app_dir) is used.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Per-application subdirectory of the platform data directory.
    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    /// How long a statement waits on a lock held by another connection to
    /// the same file, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_app_dir() -> String {
    "callrecorder".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            app_dir: default_app_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Configuration that keeps the database in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Resolves the directory holding the database file.
    ///
    /// Uses `dirs::data_dir()` when no explicit directory is configured:
    /// - Linux: `~/.local/share/callrecorder`
    /// - macOS: `~/Library/Application Support/callrecorder`
    /// - Windows: `%APPDATA%\callrecorder`
    ///
    /// # Errors
    ///
    /// Returns `InitError::NoDataDir` if the platform reports no data directory.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, InitError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|base| base.join(&self.app_dir))
                .ok_or(InitError::NoDataDir),
        }
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// The file holds a `[database]` table with any of `data_dir`, `app_dir` and
/// `busy_timeout_ms`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<DatabaseConfig, ConfigError> {
    let file = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str::<ConfigFile>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %p.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => ConfigFile::default(),
    };

    Ok(file.database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let file: ConfigFile = toml::from_str("[database]\nbusy_timeout_ms = 250\n")
            .expect("config should parse");
        assert_eq!(file.database.busy_timeout_ms, 250);
        assert_eq!(file.database.app_dir, "callrecorder");
        assert_eq!(file.database.data_dir, None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let config =
            load_config(Some(&dir.path().join("absent.toml"))).expect("missing file is not an error");
        assert_eq!(config, DatabaseConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database\n").expect("should write config");

        let err = load_config(Some(&path)).expect_err("malformed toml should fail");
        assert!(matches!(err, ConfigError::Parse(_)), "unexpected error: {err:?}");
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = DatabaseConfig::in_dir("/tmp/recorder");
        assert_eq!(
            config.resolve_data_dir().expect("explicit dir resolves"),
            PathBuf::from("/tmp/recorder")
        );
    }
}
