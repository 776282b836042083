//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::application::errors::ConfigError;
use crate::application::services::rules::DEFAULT_ADMIN_LEVEL;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    /// Invites from these users are approved automatically
    pub superusers: Vec<String>,
    /// Level group admins need for plugin switches
    #[serde(default = "default_admin_level")]
    pub admin_level: i64,
}

fn default_admin_level() -> i64 {
    DEFAULT_ADMIN_LEVEL
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestConfig {
    pub dedup_window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl RequestConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "zxpm".to_string(),
                superusers: Vec::new(),
                admin_level: DEFAULT_ADMIN_LEVEL,
            },
            database: DatabaseConfig {
                path: PathBuf::from("data/zxui/db/zhenxun.db"),
            },
            request: RequestConfig {
                dedup_window_secs: 5 * 60,
                sweep_interval_secs: 5 * 60,
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()));
        }
        if self.request.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request.sweep-interval-secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Environment overrides: `ZXUI_DB_PATH`, `ZXUI_SUPERUSERS` (comma separated).
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("ZXUI_DB_PATH") {
            if !path.is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }

        if let Ok(users) = std::env::var("ZXUI_SUPERUSERS") {
            self.bot.superusers = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("dedup-window-secs: 300"));
        assert!(yaml.contains("admin-level: 5"));
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.request.dedup_window(), Duration::from_secs(300));
        assert_eq!(config.database.path, PathBuf::from("data/zxui/db/zhenxun.db"));
    }

    #[test]
    fn test_parse_kebab_case() {
        let config = Config::from_yaml(
            "bot:\n  name: test\n  superusers: ['1', '2']\n\
             database:\n  path: /tmp/x.db\n\
             request:\n  dedup-window-secs: 60\n  sweep-interval-secs: 30\n",
        )
        .unwrap();
        assert_eq!(config.bot.superusers, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(config.bot.admin_level, 5);
        assert_eq!(config.request.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let mut config = Config::default();
        config.request.sweep_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        assert!(matches!(
            Config::from_yaml("bot:\n  name: x\n  superusers: []\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
