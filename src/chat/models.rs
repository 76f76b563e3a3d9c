//! User-facing transcript models. Separate from the model-facing
//! transcript in `ai::chat`: this is what gets rendered, not what
//! gets sent to the LLM.

use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

/// How a transcript entry should be displayed. Rendering is purely a
/// function of this tag and the payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RenderKind {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "product-list")]
    ProductList,
    #[serde(rename = "checkout-summary")]
    CheckoutSummary,
}

/// An entry in the visible transcript. Append-only; never mutated
/// after insertion.
#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub render: RenderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    pub fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            render: RenderKind::Plain,
            payload: None,
        }
    }

    pub fn product_list(payload: Value) -> Self {
        Self {
            role: Role::System,
            content: String::from("Fetched products"),
            render: RenderKind::ProductList,
            payload: Some(payload),
        }
    }

    pub fn checkout_summary(payload: Value) -> Self {
        Self {
            role: Role::System,
            content: String::from("Checkout session updated"),
            render: RenderKind::CheckoutSummary,
            payload: Some(payload),
        }
    }
}
