//! The UCP commerce client.
//!
//! Every merchant-facing call goes through one request primitive so
//! header application is uniform and the inspector never misses an
//! exchange. Calls are relayed through the proxy endpoint rather than
//! hitting the merchant directly.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Error, Result, anyhow};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::{Buyer, LineItem, LogEntry, MerchantInfo, Payment};

const UCP_AGENT_PROFILE: &str = "profile=\"https://ucp-chat-client/profile\"";

/// Shared client holding the merchant base URL and the append-only
/// request log. Construct once and share via `Arc` between the chat
/// logic and the inspector.
pub struct UcpClient {
    proxy_api_url: String,
    base_url: RwLock<String>,
    logs: RwLock<Vec<LogEntry>>,
    updates: broadcast::Sender<Vec<LogEntry>>,
}

impl UcpClient {
    /// `proxy_api_url` is the address of the proxy relay server,
    /// e.g. `http://127.0.0.1:2424`.
    pub fn new(proxy_api_url: &str) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            proxy_api_url: proxy_api_url.trim_end_matches('/').to_string(),
            base_url: RwLock::new(String::new()),
            logs: RwLock::new(Vec::new()),
            updates,
        }
    }

    /// Set the merchant base URL, stripping one trailing separator.
    pub fn set_base_url(&self, url: &str) {
        let normalized = url.strip_suffix('/').unwrap_or(url).to_string();
        *self.base_url.write().expect("base url lock poisoned") = normalized;
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().expect("base url lock poisoned").clone()
    }

    /// Snapshot of the request log, newest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().expect("log lock poisoned").clone()
    }

    /// Subscribe to log updates. Each append publishes a full
    /// snapshot of the log.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<LogEntry>> {
        self.updates.subscribe()
    }

    fn append_log(&self, entry: LogEntry) {
        let snapshot = {
            let mut logs = self.logs.write().expect("log lock poisoned");
            logs.insert(0, entry);
            logs.clone()
        };
        // Notify after mutation so observers always see the entry
        // they were told about. Send fails when nobody subscribed.
        let _ = self.updates.send(snapshot);
    }

    fn ucp_headers(method: &str, path: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        let is_ucp_endpoint =
            path.starts_with("/checkout-sessions") || path.starts_with("/orders");
        if method != "GET" || is_ucp_endpoint {
            if method != "GET" {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
            headers.insert("UCP-Agent".to_string(), UCP_AGENT_PROFILE.to_string());
            headers.insert(
                "Idempotency-Key".to_string(),
                Uuid::new_v4().to_string(),
            );
            headers.insert("Request-Id".to_string(), Uuid::new_v4().to_string());
            headers.insert(
                "Request-Signature".to_string(),
                "mock-signature".to_string(),
            );
        }

        headers
    }

    /// The shared request primitive. Relays `method path` through the
    /// proxy and records exactly one log entry whether the call
    /// succeeds or fails.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value, Error> {
        let base_url = self.base_url();
        let headers = Self::ucp_headers(method, path);

        let mut entry = LogEntry::new(method, &format!("{}{}", base_url, path));
        entry.request_headers = Some(headers.clone());
        entry.request_body = body.clone();

        let proxy_url = format!("{}/api/ucp/proxy", self.proxy_api_url);
        let result = reqwest::Client::new()
            .post(&proxy_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "method": method,
                "path": path,
                "body": body,
                "headers": headers,
                "baseUrl": base_url,
            }))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("UCP proxy request error: {}", err);
                // Transport failure: record a synthetic status so the
                // inspector still shows the attempt.
                entry.status = Some(500);
                entry.response_body = Some(json!({"error": err.to_string()}));
                self.append_log(entry);
                return Err(err.into());
            }
        };

        let status = response.status();
        let proxy_response = match response.json::<Value>().await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("UCP proxy response error: {}", err);
                entry.status = Some(status.as_u16());
                entry.response_body = Some(json!({"error": err.to_string()}));
                self.append_log(entry);
                return Err(err.into());
            }
        };

        let data = proxy_response
            .get("data")
            .cloned()
            .unwrap_or(proxy_response);

        entry.status = Some(status.as_u16());
        entry.response_body = Some(data.clone());
        self.append_log(entry);

        if !status.is_success() {
            let message = data["error"]["message"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));
            return Err(anyhow!(message));
        }

        Ok(data)
    }

    pub async fn get_merchant_info(&self) -> Result<MerchantInfo, Error> {
        let data = self.request("GET", "/.well-known/ucp", None).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_catalog(&self, filters: &HashMap<String, String>) -> Result<Value, Error> {
        let mut path = String::from("/catalog");
        if !filters.is_empty() {
            let query = filters
                .iter()
                .map(|(k, v)| {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                })
                .collect::<Vec<_>>()
                .join("&");
            path = format!("{}?{}", path, query);
        }
        self.request("GET", &path, None).await
    }

    pub async fn create_checkout(
        &self,
        currency: &str,
        line_items: &[LineItem],
        buyer: &Buyer,
    ) -> Result<Value, Error> {
        self.request(
            "POST",
            "/checkout-sessions",
            Some(json!({
                "currency": currency,
                "line_items": line_items,
                "buyer": buyer,
            })),
        )
        .await
    }

    pub async fn get_checkout(&self, id: &str) -> Result<Value, Error> {
        self.request("GET", &format!("/checkout-sessions/{}", id), None)
            .await
    }

    pub async fn update_checkout(&self, id: &str, updates: &Value) -> Result<Value, Error> {
        self.request(
            "PUT",
            &format!("/checkout-sessions/{}", id),
            Some(updates.clone()),
        )
        .await
    }

    pub async fn complete_checkout(&self, id: &str, payment: &Payment) -> Result<Value, Error> {
        self.request(
            "POST",
            &format!("/checkout-sessions/{}/complete", id),
            Some(json!({"payment": payment})),
        )
        .await
    }

    pub async fn cancel_checkout(&self, id: &str) -> Result<Value, Error> {
        self.request("POST", &format!("/checkout-sessions/{}/cancel", id), None)
            .await
    }

    pub async fn get_order(&self, id: &str) -> Result<Value, Error> {
        self.request("GET", &format!("/orders/{}", id), None).await
    }
}
