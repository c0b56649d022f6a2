//! Configuration loading for the dashboard.
//!
//! All fields are required. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "TABDECK_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// LMDB environment directory.
    pub data_dir: PathBuf,
    pub map_size_mb: usize,
    /// Key prefix in the medium.
    pub namespace: String,
    pub watch_interval_ms: u64,
    pub quote_cache_ttl_ms: u64,
    pub image_cache_ttl_ms: u64,
    pub quotes_dir: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"tabdeck=info"`.
    pub log_filter: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TABDECK_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl DashboardConfig {
    /// Load from `--config <path>` or `TABDECK_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(invalid("data_dir", "must not be empty"));
        }
        if self.quotes_dir.as_os_str().is_empty() {
            return Err(invalid("quotes_dir", "must not be empty"));
        }
        if self.map_size_mb == 0 {
            return Err(invalid("map_size_mb", "must be > 0"));
        }
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.namespace.contains(':') {
            return Err(invalid("namespace", "must not contain ':'"));
        }
        if self.watch_interval_ms == 0 {
            return Err(invalid("watch_interval_ms", "must be > 0"));
        }
        if self.quote_cache_ttl_ms == 0 {
            return Err(invalid("quote_cache_ttl_ms", "must be > 0"));
        }
        if self.image_cache_ttl_ms == 0 {
            return Err(invalid("image_cache_ttl_ms", "must be > 0"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(invalid("log_filter", "must not be empty"));
        }
        Ok(())
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn quote_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.quote_cache_ttl_ms)
    }

    pub fn image_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.image_cache_ttl_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        data_dir = "/var/lib/tabdeck"
        map_size_mb = 16
        namespace = "ps"
        watch_interval_ms = 500
        quote_cache_ttl_ms = 21600000
        image_cache_ttl_ms = 1800000
        quotes_dir = "/usr/share/tabdeck/quotes"
        log_filter = "tabdeck=info"
    "#;

    #[test]
    fn test_parses_valid_config() {
        let config = DashboardConfig::from_toml(VALID).unwrap();
        config.validate().unwrap();
        assert_eq!(config.namespace, "ps");
        assert_eq!(config.quote_cache_ttl(), Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.watch_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let contents = format!("{VALID}\ntheme = \"dark\"\n");
        assert!(matches!(DashboardConfig::from_toml(&contents), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let contents = VALID.replace("map_size_mb = 16", "");
        assert!(matches!(DashboardConfig::from_toml(&contents), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = DashboardConfig::from_toml(VALID).unwrap();
        config.watch_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "watch_interval_ms",
                ..
            })
        ));

        let mut config = DashboardConfig::from_toml(VALID).unwrap();
        config.namespace = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "namespace", .. })
        ));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabdeck.toml");
        std::fs::write(&path, VALID).unwrap();

        assert_eq!(DashboardConfig::from_path(&path).unwrap().map_size_mb, 16);
        assert!(matches!(
            DashboardConfig::from_path(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
