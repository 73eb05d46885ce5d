use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Client configuration, stored as TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub pager: PagerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Separators understood by the backend when building query parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySettings {
    /// Joins composite model names into one OR-matched key
    #[serde(default = "default_join")]
    pub join: String,
    /// Separates `field=value` pairs in multi-value parameters
    #[serde(default = "default_pair_separator")]
    pub pair_separator: String,
    #[serde(default = "default_assign")]
    pub assign: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagerSettings {
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default = "default_max_disp_pages")]
    pub max_disp_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingSettings {
    /// Components with debug logging switched on (e.g. "store", "factory")
    #[serde(default)]
    pub debug: Vec<String>,
}

fn default_base_url() -> String {
    "http://localhost:4000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "canvass-common/0.1".to_string()
}

fn default_join() -> String {
    "|".to_string()
}

fn default_pair_separator() -> String {
    ",".to_string()
}

fn default_assign() -> String {
    "=".to_string()
}

fn default_per_page() -> usize {
    10
}

fn default_max_disp_pages() -> usize {
    5
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            join: default_join(),
            pair_separator: default_pair_separator(),
            assign: default_assign(),
        }
    }
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            max_disp_pages: default_max_disp_pages(),
        }
    }
}

impl LoggingSettings {
    pub fn is_enabled(&self, component: &str) -> bool {
        self.debug.iter().any(|c| c == component || c == "*")
    }
}

impl ClientConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("canvass")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".canvass")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            info!("Config file doesn't exist, using default config");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content).context("Invalid config TOML")?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            }
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))?;

        info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Overlay values from the process environment (and `.env`, if present)
    pub fn apply_env_overrides(&mut self) {
        dotenvy::dotenv().ok();

        if let Ok(base_url) = std::env::var("CANVASS_API_BASE_URL") {
            debug!("Using API base URL from environment: {}", base_url);
            self.api.base_url = base_url;
        }
        if let Ok(join) = std::env::var("CANVASS_QUERY_JOIN") {
            self.query.join = join;
        }
        if let Ok(components) = std::env::var("CANVASS_DEBUG") {
            self.logging.debug = components
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.query.join, "|");
        assert_eq!(config.pager.per_page, 10);
        assert_eq!(config.pager.max_disp_pages, 5);
        assert!(config.logging.debug.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [api]
            base_url = "https://canvass.example.org/api"

            [pager]
            per_page = 25

            [logging]
            debug = ["store", "factory"]
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://canvass.example.org/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.pager.per_page, 25);
        assert_eq!(config.pager.max_disp_pages, 5);
        assert_eq!(config.query.pair_separator, ",");
        assert!(config.logging.is_enabled("store"));
        assert!(!config.logging.is_enabled("pager"));
    }

    #[test]
    fn test_wildcard_logging() {
        let logging = LoggingSettings { debug: vec!["*".to_string()] };
        assert!(logging.is_enabled("anything"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ClientConfig::from_toml("[api\nbase_url = 1").is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("canvass-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = ClientConfig::default();
        config.query.join = "~".to_string();
        config.save_to(&path).unwrap();

        let reloaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);

        fs::remove_dir_all(&dir).ok();
    }
}
