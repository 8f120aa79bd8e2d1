use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads for async dispatch (0 = one per CPU)
    pub threads: usize,

    /// Prefix for worker thread names
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            thread_name: "dispatch-worker".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,

    /// Log directory; the platform config directory when unset
    pub directory: Option<PathBuf>,

    /// Rolling file name prefix
    pub file_prefix: String,

    /// Also log to stdout
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "catalog-dispatch.log".to_string(),
            console: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub workers: WorkerConfig,

    pub logging: LoggingConfig,

    /// Delay between executor drains in the host loop
    pub tick_interval_ms: u64,

    /// Host loop gives up after this many ticks
    pub max_ticks: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: WorkerConfig::default(),
            logging: LoggingConfig::default(),
            tick_interval_ms: 16, // ~60 ticks per second
            max_ticks: 600,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from `path`.
    /// Creates a default config file if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// `<config dir>/CatalogDispatch/config.json`, or `./config/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("CatalogDispatch"))
            .unwrap_or_else(|| PathBuf::from("config"))
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "workers.thread_name must not be empty".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::Invalid("max_ticks must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("catalog-dispatch-{}-{}", tag, std::process::id()))
            .join("config.json")
    }

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.workers.threads, 0);
        assert_eq!(config.tick_interval_ms, 16);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{ "workers": { "threads": 3 } }"#).unwrap();
        assert_eq!(config.workers.threads, 3);
        assert_eq!(config.workers.thread_name, "dispatch-worker");
        assert_eq!(config.max_ticks, 600);
    }

    #[test]
    fn test_load_creates_default_file() {
        let path = temp_path("create");
        let _ = fs::remove_file(&path);

        let config = DispatchConfig::load_from(&path).unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert!(path.exists());

        let reloaded = DispatchConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let path = temp_path("invalid");
        let mut config = DispatchConfig::default();
        config.tick_interval_ms = 0;
        config.save_to(&path).unwrap();

        match DispatchConfig::load_from(&path) {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("tick_interval_ms")),
            other => panic!("Expected invalid config, got {:?}", other),
        }

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
