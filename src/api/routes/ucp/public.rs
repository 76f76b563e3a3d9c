//! Public types for the UCP proxy API
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ucp::LogEntry;

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Option<HashMap<String, String>>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProxyDebug {
    #[serde(rename = "sentHeaders", skip_serializing_if = "Option::is_none")]
    pub sent_headers: Option<HashMap<String, String>>,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProxyResponse {
    pub data: Value,
    pub debug: ProxyDebug,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
}
