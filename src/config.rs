//! Configuration for the tickit-webdav client
//!
//! Only process-level knobs live here. Application settings (theme,
//! WebDAV credentials, auto-sync) are stored in the database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "TICKIT_WEBDAV_CONFIG";

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for this crate's logs when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tickit-webdav").join("tickit.sqlite"))
        .unwrap_or_else(|| PathBuf::from("tickit.sqlite"))
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Default config path
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(env_path));
        }

        let local = PathBuf::from("tickit-webdav.toml");
        if local.exists() {
            return Ok(local);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("tickit-webdav");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from default path, or defaults when there is no file
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let with_comments = format!(
            "# tickit-webdav configuration\n\
             # WebDAV credentials are set with: tickit-webdav webdav --help\n\n\
             {}",
            content
        );

        std::fs::write(path, with_comments).context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/tasks.sqlite"),
            },
            log: LogConfig {
                level: "debug".to_string(),
            },
        };

        cfg.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# tickit-webdav configuration"));
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: Config = toml::from_str("[database]\npath = \"todo.sqlite\"\n").unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("todo.sqlite"));
        assert_eq!(cfg.log.level, "warn");

        let empty: Config = toml::from_str("").unwrap();
        assert_eq!(empty, Config::default());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database\n").unwrap();

        assert!(Config::load_from(&path).is_err());
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
