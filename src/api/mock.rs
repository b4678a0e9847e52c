//! In-memory `AccountApi` used by the store tests.

use super::{AccountApi, ApiError};
use crate::models::{Account, AccountConfigItem};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Delete(String),
    Disable(String),
    Enable(String),
    BulkEnable(Vec<String>),
    BulkDisable(Vec<String>),
    UpdateConfig(usize),
}

#[derive(Clone, Default)]
pub struct MockAccountApi {
    accounts: Arc<Mutex<Vec<Account>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_all: Arc<Mutex<bool>>,
    delete_gate: Option<Arc<Semaphore>>,
}

impl MockAccountApi {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let api = Self::default();
        *api.accounts.lock().unwrap() = accounts;
        api
    }

    /// Deletes block until `gate` hands out a permit
    pub fn with_delete_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.delete_gate = Some(gate);
        self
    }

    /// Calls naming `id` fail with 500
    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_everything(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, ids: &[&str]) -> Result<(), ApiError> {
        let failing = self.failing.lock().unwrap();
        if *self.fail_all.lock().unwrap() || ids.iter().any(|id| failing.contains(*id)) {
            return Err(ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for MockAccountApi {
    async fn list(&self) -> Result<Vec<Account>, ApiError> {
        self.record(Call::List);
        tokio::task::yield_now().await;
        self.check(&[])?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.record(Call::Delete(id.to_string()));
        if let Some(gate) = &self.delete_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.check(&[id])?;
        self.accounts.lock().unwrap().retain(|a| a.id != id);
        Ok(())
    }

    async fn disable(&self, id: &str) -> Result<(), ApiError> {
        self.record(Call::Disable(id.to_string()));
        self.check(&[id])
    }

    async fn enable(&self, id: &str) -> Result<(), ApiError> {
        self.record(Call::Enable(id.to_string()));
        self.check(&[id])
    }

    async fn bulk_enable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.record(Call::BulkEnable(ids.to_vec()));
        self.check(&ids.iter().map(String::as_str).collect::<Vec<_>>())
    }

    async fn bulk_disable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.record(Call::BulkDisable(ids.to_vec()));
        self.check(&ids.iter().map(String::as_str).collect::<Vec<_>>())
    }

    async fn update_config(&self, items: &[AccountConfigItem]) -> Result<(), ApiError> {
        self.record(Call::UpdateConfig(items.len()));
        self.check(&[])?;
        let accounts = items
            .iter()
            .filter_map(|item| serde_json::from_value::<Account>(item.0.clone()).ok())
            .collect();
        self.set_accounts(accounts);
        Ok(())
    }
}
