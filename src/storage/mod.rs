//! Local persistence for account snapshots, settings and stats.
//!
//! Uses the SQLite key/value database when a database url is configured and
//! plain JSON files in the data directory otherwise. Database failures fall
//! back to the files.

pub mod database;

pub use database::Database;

use crate::config::AppConfig;
use crate::models::{Account, Stats};
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;

const ACCOUNTS_KEY: &str = "accounts";
const SETTINGS_KEY: &str = "settings";
const STATS_KEY: &str = "stats";

/// Where a value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Database,
    Files,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Database => write!(f, "database"),
            Backend::Files => write!(f, "files"),
        }
    }
}

pub struct Storage {
    db: Option<Database>,
    data_dir: PathBuf,
    accounts_override: Option<String>,
}

impl Storage {
    /// Open the backends named by `config`. `ACCOUNTS_CONFIG` takes priority
    /// over anything stored when loading accounts.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        // Connect the database; a bad url or unreachable file means files only
        let db = match config.storage.database_url.as_deref() {
            Some(url) => match Database::connect(url).await {
                Ok(db) => Some(db),
                Err(e) => {
                    tracing::error!("[STORAGE] Database connection failed, using files: {}", e);
                    None
                }
            },
            None => None,
        };

        // ACCOUNTS_CONFIG beats anything stored
        Ok(Self::new(db, config.data_dir())
            .with_accounts_override(std::env::var("ACCOUNTS_CONFIG").ok()))
    }

    pub fn new(db: Option<Database>, data_dir: PathBuf) -> Self {
        Self {
            db,
            data_dir,
            accounts_override: None,
        }
    }

    pub fn with_accounts_override(mut self, json: Option<String>) -> Self {
        self.accounts_override = json.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn is_database_enabled(&self) -> bool {
        self.db.is_some()
    }

    pub async fn load_accounts(&self) -> Result<Vec<Account>> {
        if let Some(json) = &self.accounts_override {
            match serde_json::from_str::<Vec<Account>>(json) {
                Ok(accounts) => {
                    tracing::info!("[STORAGE] Loaded {} accounts from ACCOUNTS_CONFIG", accounts.len());
                    return Ok(accounts);
                }
                Err(e) => {
                    tracing::error!("[STORAGE] Failed to parse ACCOUNTS_CONFIG: {}", e);
                }
            }
        }

        if let Some(db) = &self.db {
            match db.get(ACCOUNTS_KEY).await {
                Ok(Some(value)) => match serde_json::from_value::<Vec<Account>>(value) {
                    Ok(accounts) => {
                        tracing::info!("[STORAGE] Loaded {} accounts from database", accounts.len());
                        return Ok(accounts);
                    }
                    Err(e) => {
                        tracing::error!("[STORAGE] Invalid accounts in database, using files: {}", e);
                    }
                },
                Ok(None) => {
                    tracing::info!("[STORAGE] No accounts in database");
                    return Ok(Vec::new());
                }
                Err(e) => {
                    tracing::error!("[STORAGE] Database read failed, using files: {}", e);
                }
            }
        }

        Ok(self.read_file(ACCOUNTS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_accounts(&self, accounts: &[Account]) -> Result<Backend> {
        let backend = self.set(ACCOUNTS_KEY, &serde_json::to_value(accounts)?).await?;
        tracing::info!("[STORAGE] Saved {} accounts to {}", accounts.len(), backend);
        Ok(backend)
    }

    pub async fn load_settings(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        Ok(self.get(SETTINGS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_settings(
        &self,
        settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Backend> {
        let backend = self.set(SETTINGS_KEY, &serde_json::to_value(settings)?).await?;
        tracing::info!("[STORAGE] Settings saved to {}", backend);
        Ok(backend)
    }

    pub async fn load_stats(&self) -> Result<Stats> {
        Ok(self.get(STATS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_stats(&self, stats: &Stats) -> Result<Backend> {
        self.set(STATS_KEY, &serde_json::to_value(stats)?).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if let Some(db) = &self.db {
            match db.get(key).await {
                Ok(None) => return Ok(None),
                Ok(Some(value)) => match serde_json::from_value(value) {
                    Ok(value) => return Ok(Some(value)),
                    Err(e) => tracing::error!("[STORAGE] Invalid {} in database, using files: {}", key, e),
                },
                Err(e) => tracing::error!("[STORAGE] Failed to read {} from database: {}", key, e),
            }
        }
        self.read_file(key).await
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<Backend> {
        if let Some(db) = &self.db {
            match db.set(key, value).await {
                Ok(()) => return Ok(Backend::Database),
                Err(e) => tracing::error!("[STORAGE] Failed to write {} to database: {}", key, e),
            }
        }
        self.write_file(key, value).await?;
        Ok(Backend::Files)
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    async fn read_file<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.file_path(key);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write_file(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.file_path(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(value)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
