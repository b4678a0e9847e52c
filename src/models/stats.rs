use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-operation counters kept between CLI runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub operations: BTreeMap<String, u64>,
    pub last_sync_at: Option<i64>,
    pub last_account_count: Option<usize>,
}

impl Stats {
    pub fn record(&mut self, operation: &str) {
        *self.operations.entry(operation.to_string()).or_insert(0) += 1;
    }

    pub fn record_sync(&mut self, account_count: usize) {
        self.last_sync_at = Some(chrono::Utc::now().timestamp());
        self.last_account_count = Some(account_count);
    }

    pub fn count(&self, operation: &str) -> u64 {
        self.operations.get(operation).copied().unwrap_or(0)
    }
}
