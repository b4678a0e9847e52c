use super::{AccountApi, ApiError};
use crate::config::ApiConfig;
use crate::models::{Account, AccountConfigItem, AccountListResponse};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct IdsPayload<'a> {
    ids: &'a [String],
}

#[derive(Serialize)]
struct ConfigPayload<'a> {
    accounts: &'a [AccountConfigItem],
}

/// reqwest-backed client for the account API
#[derive(Clone)]
pub struct HttpAccountApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpAccountApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Url(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url(config.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// `{base}/api/accounts/<segments...>`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "accounts"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("API: {} {} | request_id={}", method, url.path(), request_id);

        let mut builder = self
            .client
            .request(method, url)
            .header("x-request-id", request_id);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("Account API request failed: {}", e);
            ApiError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Account API returned {}: {}", status, body);
            return Err(ApiError::Status { status, body });
        }

        Ok(response)
    }

    async fn post_id(&self, id: &str, action: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[id, action])?;
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    /// Bulk actions post to the collection itself, one segment below the
    /// id-carrying routes, so no account id can reach them
    async fn post_ids(&self, action: &str, ids: &[String]) -> Result<(), ApiError> {
        let url = self.endpoint(&[action])?;
        let builder = self.request(Method::POST, url).json(&IdsPayload { ids });
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountApi for HttpAccountApi {
    async fn list(&self) -> Result<Vec<Account>, ApiError> {
        let url = self.endpoint(&[])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let body = response.bytes().await?;
        let accounts = serde_json::from_slice::<AccountListResponse>(&body)?.into_accounts();
        tracing::debug!("API: listed {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[id])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn disable(&self, id: &str) -> Result<(), ApiError> {
        self.post_id(id, "disable").await
    }

    async fn enable(&self, id: &str) -> Result<(), ApiError> {
        self.post_id(id, "enable").await
    }

    async fn bulk_enable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.post_ids("enable", ids).await
    }

    async fn bulk_disable(&self, ids: &[String]) -> Result<(), ApiError> {
        self.post_ids("disable", ids).await
    }

    async fn update_config(&self, items: &[AccountConfigItem]) -> Result<(), ApiError> {
        let url = self.endpoint(&[])?;
        let builder = self
            .request(Method::PUT, url)
            .json(&ConfigPayload { accounts: items });
        self.send(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{delete, get, post},
        Json, Router,
    };
    use std::sync::{Arc, Mutex};
    use tower_http::trace::TraceLayer;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<String>>>,
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        auth: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl Recorded {
        fn push(&self, call: String, headers: &HeaderMap) {
            self.calls.lock().unwrap().push(call);
            self.auth.lock().unwrap().push(
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string()),
            );
        }
    }

    async fn list_handler(State(rec): State<Recorded>, headers: HeaderMap) -> Json<serde_json::Value> {
        assert!(headers.contains_key("x-request-id"));
        rec.push("list".to_string(), &headers);
        Json(serde_json::json!({
            "accounts": [
                { "id": "1", "disabled": false, "cooldown_seconds": 30, "cooldown_reason": "rate_limit" },
                { "id": "2", "disabled": true }
            ]
        }))
    }

    async fn delete_handler(
        State(rec): State<Recorded>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> StatusCode {
        rec.push(format!("delete {}", id), &headers);
        if id == "missing" {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::NO_CONTENT
        }
    }

    async fn action_handler(
        State(rec): State<Recorded>,
        Path((id, action)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> StatusCode {
        rec.push(format!("{} {}", action, id), &headers);
        StatusCode::OK
    }

    async fn bulk_handler(
        State(rec): State<Recorded>,
        Path(action): Path<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        rec.push(format!("bulk {}", action), &headers);
        rec.bodies.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn config_handler(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        rec.push("config".to_string(), &headers);
        rec.bodies.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn spawn_server(rec: Recorded) -> String {
        let app = Router::new()
            .route("/api/accounts", get(list_handler).put(config_handler))
            .route("/api/accounts/:id", delete(delete_handler).post(bulk_handler))
            .route("/api/accounts/:id/:action", post(action_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(rec);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String, token: Option<&str>) -> HttpAccountApi {
        HttpAccountApi::new(&ApiConfig {
            base_url,
            token: token.map(|t| t.to_string()),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_accepts_envelope() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, None);

        let accounts = api.list().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].cooldown_reason, "rate_limit");
        assert!(accounts[1].disabled);
        assert_eq!(rec.auth.lock().unwrap()[0], None);
    }

    #[tokio::test]
    async fn test_single_account_routes() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, Some("secret"));

        api.disable("a").await.unwrap();
        api.enable("a").await.unwrap();
        api.delete("a").await.unwrap();

        let calls = rec.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["disable a", "enable a", "delete a"]);
        assert!(rec
            .auth
            .lock()
            .unwrap()
            .iter()
            .all(|a| a.as_deref() == Some("Bearer secret")));
    }

    #[tokio::test]
    async fn test_id_is_encoded_as_one_segment() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, None);

        api.disable("a/b c").await.unwrap();
        assert_eq!(rec.calls.lock().unwrap()[0], "disable a/b c");
    }

    #[tokio::test]
    async fn test_bulk_and_config_bodies() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, None);

        let ids = vec!["1".to_string(), "2".to_string()];
        api.bulk_enable(&ids).await.unwrap();
        api.bulk_disable(&ids).await.unwrap();
        api.update_config(&[AccountConfigItem(serde_json::json!({ "id": "1", "weight": 2 }))])
            .await
            .unwrap();

        let calls = rec.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["bulk enable", "bulk disable", "config"]);

        let bodies = rec.bodies.lock().unwrap().clone();
        assert_eq!(bodies[0], serde_json::json!({ "ids": ["1", "2"] }));
        assert_eq!(bodies[2]["accounts"][0]["weight"], 2);
    }

    #[tokio::test]
    async fn test_reserved_looking_ids_hit_single_routes() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, None);

        api.disable("batch").await.unwrap();
        api.enable("config").await.unwrap();
        api.delete("enable").await.unwrap();

        let calls = rec.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["disable batch", "enable config", "delete enable"]);
        assert!(rec.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let rec = Recorded::default();
        let api = client(spawn_server(rec.clone()).await, None);

        let err = api.delete("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { .. }));
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpAccountApi::new(&ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[test]
    fn test_base_url_with_prefix() {
        let api = client("http://localhost:9000/proxy/".to_string(), None);
        let url = api.endpoint(&["x", "enable"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/proxy/api/accounts/x/enable");
    }
}
