use crate::{
    api::AccountApi,
    models::{Account, AccountConfigItem, Stats},
    store::BulkDeleteReport,
    AppState,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Pull the server's list into the store
async fn sync<A: AccountApi>(state: &AppState<A>) -> Result<()> {
    state
        .store
        .load_accounts()
        .await
        .context("Failed to load accounts")
}

/// Persist what the store now holds and count the operation
async fn snapshot<A: AccountApi>(state: &AppState<A>, operation: &str) -> Result<Vec<Account>> {
    let accounts = state.store.accounts().await;

    if let Err(e) = state.storage.save_accounts(&accounts).await {
        tracing::warn!("Failed to snapshot accounts: {}", e);
    }

    let mut stats = state.storage.load_stats().await.unwrap_or_default();
    stats.record(operation);
    stats.record_sync(accounts.len());
    if let Err(e) = state.storage.save_stats(&stats).await {
        tracing::warn!("Failed to save stats: {}", e);
    }

    Ok(accounts)
}

pub async fn get_accounts<A: AccountApi>(state: &AppState<A>) -> Result<Vec<Account>> {
    sync(state).await?;
    snapshot(state, "list").await
}

pub async fn delete_account<A: AccountApi>(state: &AppState<A>, account_id: &str) -> Result<Vec<Account>> {
    sync(state).await?;
    let result = state.store.delete_account(account_id).await;
    // an optimistic delete already changed the list even when the call failed
    let accounts = snapshot(state, "delete").await?;
    result.with_context(|| format!("Failed to delete account {}", account_id))?;
    Ok(accounts)
}

pub async fn enable_account<A: AccountApi>(state: &AppState<A>, account_id: &str) -> Result<Vec<Account>> {
    sync(state).await?;
    state
        .store
        .enable_account(account_id)
        .await
        .with_context(|| format!("Failed to enable account {}", account_id))?;
    snapshot(state, "enable").await
}

pub async fn disable_account<A: AccountApi>(state: &AppState<A>, account_id: &str) -> Result<Vec<Account>> {
    sync(state).await?;
    state
        .store
        .disable_account(account_id)
        .await
        .with_context(|| format!("Failed to disable account {}", account_id))?;
    snapshot(state, "disable").await
}

pub async fn bulk_enable<A: AccountApi>(state: &AppState<A>, account_ids: &[String]) -> Result<Vec<Account>> {
    sync(state).await?;
    state
        .store
        .bulk_enable(account_ids)
        .await
        .context("Failed to enable accounts")?;
    snapshot(state, "bulk_enable").await
}

pub async fn bulk_disable<A: AccountApi>(state: &AppState<A>, account_ids: &[String]) -> Result<Vec<Account>> {
    sync(state).await?;
    state
        .store
        .bulk_disable(account_ids)
        .await
        .context("Failed to disable accounts")?;
    snapshot(state, "bulk_disable").await
}

pub async fn bulk_delete<A: AccountApi>(
    state: &AppState<A>,
    account_ids: &[String],
) -> Result<(BulkDeleteReport, Vec<Account>)> {
    sync(state).await?;
    let report = state.store.bulk_delete(account_ids).await;
    let accounts = snapshot(state, "bulk_delete").await?;
    Ok((report, accounts))
}

/// Items file: a JSON array, or an object with an `accounts` array
pub fn read_config_items(path: &Path) -> Result<Vec<AccountConfigItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("accounts") {
            Some(serde_json::Value::Array(items)) => items,
            _ => anyhow::bail!("{} has no \"accounts\" array", path.display()),
        },
        _ => anyhow::bail!("{} must hold a JSON array", path.display()),
    };

    Ok(items.into_iter().map(AccountConfigItem).collect())
}

pub async fn update_config<A: AccountApi>(state: &AppState<A>, path: &Path) -> Result<Vec<Account>> {
    let items = read_config_items(path)?;
    state
        .store
        .update_config(&items)
        .await
        .context("Failed to update account configuration")?;
    snapshot(state, "update_config").await
}

/// Last snapshot, without touching the network
pub async fn get_cached_accounts<A: AccountApi>(state: &AppState<A>) -> Result<Vec<Account>> {
    state.storage.load_accounts().await
}

pub async fn get_stats<A: AccountApi>(state: &AppState<A>) -> Result<Stats> {
    state.storage.load_stats().await
}

pub async fn get_settings<A: AccountApi>(
    state: &AppState<A>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    state.storage.load_settings().await
}

/// Values that parse as JSON are stored as such, anything else as a string
pub async fn set_setting<A: AccountApi>(state: &AppState<A>, key: &str, value: &str) -> Result<()> {
    let mut settings = state.storage.load_settings().await?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    settings.insert(key.to_string(), value);
    state.storage.save_settings(&settings).await?;
    Ok(())
}
