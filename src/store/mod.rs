use crate::api::{AccountApi, ApiError};
use crate::models::{Account, AccountConfigItem};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// When deletes touch the local list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Remove locally before the API call. A failed call leaves the list
    /// diverged from the server until the next load.
    #[default]
    Optimistic,
    /// Remove locally only after the API confirmed the delete
    Confirmed,
}

/// Outcome of `bulk_delete`. The operation itself never fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkDeleteReport {
    pub requested: usize,
    pub failed: Vec<String>,
}

impl BulkDeleteReport {
    pub fn succeeded(&self) -> usize {
        self.requested - self.failed.len()
    }
}

/// Clears the loading flag on every exit path of a load
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Local view of the server's account list.
///
/// Owned by the application session and shared behind an `Arc`; the list is
/// only mutated through the operations below.
pub struct AccountStore<A> {
    api: A,
    accounts: RwLock<Vec<Account>>,
    loading: AtomicUsize,
    delete_mode: DeleteMode,
}

impl<A: AccountApi> AccountStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            accounts: RwLock::new(Vec::new()),
            loading: AtomicUsize::new(0),
            delete_mode: DeleteMode::default(),
        }
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    pub async fn account(&self, id: &str) -> Option<Account> {
        self.accounts.read().await.iter().find(|a| a.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Replace the local list with the server's
    pub async fn load_accounts(&self) -> Result<(), ApiError> {
        let _guard = LoadingGuard::enter(&self.loading);

        let mut accounts = self.api.list().await?;

        // one record per id, the first one wins
        let received = accounts.len();
        let mut seen = HashSet::with_capacity(received);
        accounts.retain(|a| seen.insert(a.id.clone()));
        if accounts.len() < received {
            tracing::warn!(
                "Server listed {} duplicate account ids, kept the first of each",
                received - accounts.len()
            );
        }

        tracing::info!("Loaded {} accounts", accounts.len());
        *self.accounts.write().await = accounts;

        Ok(())
    }

    pub async fn delete_account(&self, id: &str) -> Result<(), ApiError> {
        match self.delete_mode {
            DeleteMode::Optimistic => {
                self.remove_local(&[id]).await;
                if let Err(e) = self.api.delete(id).await {
                    tracing::warn!(
                        "Delete of account {} failed after local removal, list diverged: {}",
                        id,
                        e
                    );
                    return Err(e);
                }
            }
            DeleteMode::Confirmed => {
                self.api.delete(id).await?;
                self.remove_local(&[id]).await;
            }
        }

        tracing::info!("Deleted account {}", id);
        Ok(())
    }

    pub async fn disable_account(&self, id: &str) -> Result<(), ApiError> {
        self.api.disable(id).await?;
        self.update_local(&[id], Account::mark_disabled).await;
        tracing::info!("Disabled account {}", id);
        Ok(())
    }

    pub async fn enable_account(&self, id: &str) -> Result<(), ApiError> {
        self.api.enable(id).await?;
        self.update_local(&[id], Account::mark_enabled).await;
        tracing::info!("Enabled account {}", id);
        Ok(())
    }

    pub async fn bulk_enable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.api.bulk_enable(ids).await?;
        let updated = self.update_local(ids, Account::mark_enabled).await;
        tracing::info!("Bulk enabled {} accounts ({} held locally)", ids.len(), updated);
        Ok(())
    }

    pub async fn bulk_disable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.api.bulk_disable(ids).await?;
        let updated = self.update_local(ids, Account::mark_disabled).await;
        tracing::info!("Bulk disabled {} accounts ({} held locally)", ids.len(), updated);
        Ok(())
    }

    /// Delete every id with one concurrent API call each and wait for all of
    /// them to settle. Individual failures are logged and reported, not raised.
    pub async fn bulk_delete(&self, ids: &[String]) -> BulkDeleteReport {
        if self.delete_mode == DeleteMode::Optimistic {
            self.remove_local(ids).await;
        }

        let results = join_all(ids.iter().map(|id| self.api.delete(id))).await;

        let mut report = BulkDeleteReport {
            requested: ids.len(),
            failed: Vec::new(),
        };
        let mut deleted = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => deleted.push(id.as_str()),
                Err(e) => {
                    tracing::warn!("Bulk delete of account {} failed: {}", id, e);
                    report.failed.push(id.clone());
                }
            }
        }

        if self.delete_mode == DeleteMode::Confirmed {
            self.remove_local(&deleted).await;
        }

        tracing::info!(
            "Bulk deleted {}/{} accounts",
            report.succeeded(),
            report.requested
        );
        report
    }

    /// Push a full configuration, then reload from the server
    pub async fn update_config(&self, items: &[AccountConfigItem]) -> Result<(), ApiError> {
        self.api.update_config(items).await?;
        tracing::info!("Account configuration updated ({} items)", items.len());
        self.load_accounts().await
    }

    async fn remove_local<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|a| !ids.iter().any(|id| id.as_ref() == a.id));
        before - accounts.len()
    }

    async fn update_local<S: AsRef<str>>(&self, ids: &[S], apply: fn(&mut Account)) -> usize {
        let mut accounts = self.accounts.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(account) = accounts.iter_mut().find(|a| a.id == id.as_ref()) {
                apply(account);
                updated += 1;
            }
        }
        updated
    }
}
