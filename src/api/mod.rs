pub mod error;
pub mod http;
#[cfg(test)]
pub mod mock;

pub use error::ApiError;
pub use http::HttpAccountApi;

use crate::models::{Account, AccountConfigItem};
use async_trait::async_trait;

/// Remote account service consumed by the store.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Fetch every account, bare list and envelope bodies both accepted
    async fn list(&self) -> Result<Vec<Account>, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    async fn disable(&self, id: &str) -> Result<(), ApiError>;

    /// Enable an account; the server also lifts its cooldown
    async fn enable(&self, id: &str) -> Result<(), ApiError>;

    async fn bulk_enable(&self, ids: &[String]) -> Result<(), ApiError>;

    async fn bulk_disable(&self, ids: &[String]) -> Result<(), ApiError>;

    /// Replace the full account configuration
    async fn update_config(&self, items: &[AccountConfigItem]) -> Result<(), ApiError>;
}
