//! Configuration loading for MuseGuard
//!
//! Resolution priority for every value: environment variable, then TOML
//! config file, then compiled default. The TOML file is optional; a missing
//! file yields the defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// HTTP bind address
    pub bind_address: String,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Maximum accepted submission size in megabytes
    pub max_file_size_mb: u64,
    /// Per-analysis timeout in seconds
    pub analysis_timeout_seconds: u64,
    /// Retention window for terminal background tasks, in hours
    pub task_retention_hours: i64,
    /// Interval between feedback-adaptation passes, in seconds
    pub adaptation_interval_seconds: u64,
    /// Interval between task-table cleanup passes, in seconds
    pub cleanup_interval_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5740".to_string(),
            database_path: default_database_path(),
            max_file_size_mb: 100,
            analysis_timeout_seconds: 300,
            task_retention_hours: 24,
            adaptation_interval_seconds: 3600,
            cleanup_interval_seconds: 21600,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default location with env overrides
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an explicit TOML path (None = defaults only),
    /// then apply environment variable overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid config file {}: {}", p.display(), e)))?
            }
            _ => Self::default(),
        };

        if let Ok(addr) = std::env::var("MUSEGUARD_BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Ok(db) = std::env::var("MUSEGUARD_DATABASE_PATH") {
            config.database_path = PathBuf::from(db);
        }
        if let Ok(v) = std::env::var("MUSEGUARD_MAX_FILE_SIZE_MB") {
            config.max_file_size_mb = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid MUSEGUARD_MAX_FILE_SIZE_MB: {}", v)))?;
        }
        if let Ok(v) = std::env::var("MUSEGUARD_ANALYSIS_TIMEOUT_SECONDS") {
            config.analysis_timeout_seconds = v.parse().map_err(|_| {
                Error::Config(format!("Invalid MUSEGUARD_ANALYSIS_TIMEOUT_SECONDS: {}", v))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(Error::Config("max_file_size_mb must be positive".to_string()));
        }
        if self.analysis_timeout_seconds == 0 {
            return Err(Error::Config(
                "analysis_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.task_retention_hours <= 0 {
            return Err(Error::Config("task_retention_hours must be positive".to_string()));
        }
        Ok(())
    }

    /// Maximum accepted submission size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Default config file location: `MUSEGUARD_CONFIG` env var, then
/// `~/.config/museguard/config.toml`
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MUSEGUARD_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("museguard").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("museguard")
        .join("museguard.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        std::env::remove_var("MUSEGUARD_BIND_ADDRESS");
        std::env::remove_var("MUSEGUARD_DATABASE_PATH");
        std::env::remove_var("MUSEGUARD_MAX_FILE_SIZE_MB");
        std::env::remove_var("MUSEGUARD_ANALYSIS_TIMEOUT_SECONDS");
    }

    #[test]
    #[serial]
    fn test_defaults_when_no_file() {
        clear_env();
        let config = EngineConfig::load_from(None).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:5740");
        assert_eq!(config.max_file_size_mb, 100);
        assert_eq!(config.analysis_timeout_seconds, 300);
        assert_eq!(config.task_retention_hours, 24);
    }

    #[test]
    #[serial]
    fn test_toml_file_overrides_defaults() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            bind_address = "0.0.0.0:9000"
            max_file_size_mb = 25
            "#
        )
        .unwrap();
        file.flush().unwrap();

        let config = EngineConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.max_file_size_mb, 25);
        // Unspecified values keep defaults
        assert_eq!(config.analysis_timeout_seconds, 300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"bind_address = "0.0.0.0:9000""#).unwrap();
        file.flush().unwrap();

        std::env::set_var("MUSEGUARD_BIND_ADDRESS", "127.0.0.1:7777");
        let config = EngineConfig::load_from(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.bind_address, "127.0.0.1:7777");
    }

    #[test]
    #[serial]
    fn test_rejects_zero_file_size() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_file_size_mb = 0").unwrap();
        file.flush().unwrap();

        assert!(EngineConfig::load_from(Some(file.path())).is_err());
    }

    #[test]
    #[serial]
    fn test_max_file_size_bytes() {
        clear_env();
        let config = EngineConfig::load_from(None).unwrap();
        assert_eq!(config.max_file_size_bytes(), 100 * 1024 * 1024);
    }
}
