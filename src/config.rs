use crate::bootstrap::ScreenGeometry;
use crate::store::DeleteMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "accountdeck";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
            timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub delete_mode: DeleteMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite url; when unset the file backend is used
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub server: String,
    pub number: u32,
    pub geometry: ScreenGeometry,
    pub socket_dir: PathBuf,
    pub readiness_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            server: "Xvfb".to_string(),
            number: 99,
            geometry: ScreenGeometry::default(),
            socket_dir: PathBuf::from("/tmp/.X11-unix"),
            readiness_timeout_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

impl DisplayConfig {
    /// Value exported as `DISPLAY`
    pub fn display_name(&self) -> String {
        format!(":{}", self.number)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(format!("X{}", self.number))
    }
}

impl AppConfig {
    /// Load from `path`, or the default location, then apply env overrides.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match std::env::var_os("ACCOUNTDECK_CONFIG") {
                Some(p) => PathBuf::from(p),
                None => Self::config_dir().join("config.toml"),
            },
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            tracing::debug!("Loaded config from {:?}", path);
            config
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            AppConfig::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("ACCOUNTDECK_API_URL") {
            self.api.base_url = url;
        }
        if let Some(token) = var("ACCOUNTDECK_API_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(url) = var("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.storage.database_url = Some(url);
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn log_dir() -> PathBuf {
        Self::config_dir().join("logs")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }
}
