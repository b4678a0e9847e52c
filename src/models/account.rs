use serde::{Deserialize, Deserializer, Serialize};

/// Account record as served by the account API.
///
/// Only the fields the store mutates are typed; everything else the server
/// sends is kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cooldown_seconds: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cooldown_reason: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disabled: false,
            cooldown_seconds: 0.0,
            cooldown_reason: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_seconds > 0.0
    }

    /// Enabling an account also clears any cooldown the server imposed.
    pub fn mark_enabled(&mut self) {
        self.disabled = false;
        self.cooldown_seconds = 0.0;
        self.cooldown_reason.clear();
    }

    pub fn mark_disabled(&mut self) {
        self.disabled = true;
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of a bulk configuration update. Its shape belongs to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountConfigItem(pub serde_json::Value);

/// `list()` answers either with a bare array or with `{ "accounts": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountListResponse {
    Bare(Vec<Account>),
    Envelope {
        #[serde(default)]
        accounts: Option<Vec<Account>>,
    },
}

impl AccountListResponse {
    pub fn into_accounts(self) -> Vec<Account> {
        match self {
            AccountListResponse::Bare(accounts) => accounts,
            AccountListResponse::Envelope { accounts } => accounts.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_list() {
        let body = r#"[{"id":"a","disabled":true},{"id":"b"}]"#;
        let accounts = serde_json::from_str::<AccountListResponse>(body)
            .unwrap()
            .into_accounts();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[0].disabled);
        assert!(!accounts[1].disabled);
        assert_eq!(accounts[1].cooldown_reason, "");
    }

    #[test]
    fn test_parse_envelope() {
        let body = r#"{"accounts":[{"id":"1","disabled":false,"cooldown_seconds":30,"cooldown_reason":"rate_limit"}],"total":1}"#;
        let accounts = serde_json::from_str::<AccountListResponse>(body)
            .unwrap()
            .into_accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].cooldown_seconds, 30.0);
        assert!(accounts[0].is_cooling_down());
    }

    #[test]
    fn test_envelope_without_accounts_is_empty() {
        let accounts = serde_json::from_str::<AccountListResponse>(r#"{"ok":true}"#)
            .unwrap()
            .into_accounts();
        assert!(accounts.is_empty());

        let accounts = serde_json::from_str::<AccountListResponse>(r#"{"accounts":null}"#)
            .unwrap()
            .into_accounts();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_null_fields_default() {
        let account: Account = serde_json::from_str(
            r#"{"id":"x","disabled":null,"cooldown_seconds":null,"cooldown_reason":null}"#,
        )
        .unwrap();
        assert!(!account.disabled);
        assert_eq!(account.cooldown_seconds, 0.0);
        assert!(account.cooldown_reason.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let account: Account =
            serde_json::from_str(r#"{"id":"x","email":"a@b.c","quota":{"used":3}}"#).unwrap();
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["email"], "a@b.c");
        assert_eq!(value["quota"]["used"], 3);
    }

    #[test]
    fn test_mark_enabled_clears_cooldown() {
        let mut account = Account::new("x");
        account.disabled = true;
        account.cooldown_seconds = 12.5;
        account.cooldown_reason = "rate_limit".to_string();

        account.mark_enabled();
        assert!(!account.disabled);
        assert_eq!(account.cooldown_seconds, 0.0);
        assert_eq!(account.cooldown_reason, "");
    }
}
