//! Data model for the Universal Commerce Protocol (UCP) client.
//!
//! Request bodies are explicit serde schemas rather than freeform
//! JSON. Structures that round-trip through the merchant (fulfillment
//! methods, groups, destinations) carry a flattened map of extra
//! fields so unknown server-side data survives a read-modify-write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single request/response exchange recorded by the client.
/// Entries are immutable once appended to the log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            url: url.to_string(),
            request_headers: None,
            request_body: None,
            response_body: None,
            status: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Merchant {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// The merchant metadata served at `/.well-known/ucp`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MerchantInfo {
    #[serde(default)]
    pub merchant: Merchant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItem {
    pub item: ItemRef,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Buyer {
    pub full_name: String,
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Destination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FulfillmentGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FulfillmentMethod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_destination_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<FulfillmentGroup>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default)]
    pub methods: Vec<FulfillmentMethod>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub id: String,
    pub handler_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub credential: Credential,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payment details forwarded verbatim to checkout completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub selected_instrument_id: String,
    pub instruments: Vec<PaymentInstrument>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
