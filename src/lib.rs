pub mod api;
pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod storage;
pub mod store;

use anyhow::Result;
use api::HttpAccountApi;
use config::AppConfig;
use std::sync::Arc;
use storage::Storage;
use store::AccountStore;

/// Session state shared by the command handlers
pub struct AppState<A = HttpAccountApi> {
    pub store: Arc<AccountStore<A>>,
    pub storage: Arc<Storage>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let api = HttpAccountApi::new(&config.api)?;
        let store = AccountStore::new(api).with_delete_mode(config.store.delete_mode);
        let storage = Storage::open(config).await?;

        tracing::debug!(
            "Account API at {} (delete mode: {:?}, database: {})",
            config.api.base_url,
            store.delete_mode(),
            storage.is_database_enabled()
        );

        Ok(Self {
            store: Arc::new(store),
            storage: Arc::new(storage),
        })
    }
}
