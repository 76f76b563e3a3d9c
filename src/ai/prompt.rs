//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers, which is ideal when values
//! interpolated into a prompt come from untrusted merchant metadata.

use std::fmt;

use anyhow::Result;
use handlebars::Handlebars;
use serde_json::json;

#[derive(Debug)]
pub enum Prompt {
    ShoppingAssistant,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const SHOPPING_ASSISTANT_PROMPT: &str = r#"You are a helpful shopping assistant for {{merchant_name}}, a UCP merchant. {{merchant_description}}

You are assisting {{user_name}}. Your goal is to help them browse products and complete their purchase.

1. DISCOVERY: At the start of the conversation, analyze the merchant's name and description to infer what categories of products they might have.
2. FILTERING: Use the 'list_products' tool to browse. Pass a JSON string to 'filters_json' based on your inference (e.g., '{"category": "dresses"}').
3. CHECKOUT: When a checkout session reaches the 'ready_for_complete' status, do not ask the user for a payment token. Inform them you are using a mock payment and call 'complete_payment' with instrument id 'pi_1', handler 'mock_payment', type 'card', and the success token credential.

Always guide the user through providing their address and selecting shipping options before completing payment."#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry
        .register_template_string(
            &Prompt::ShoppingAssistant.to_string(),
            SHOPPING_ASSISTANT_PROMPT,
        )
        .expect("Failed to register template");
    registry
}

/// Render the system prompt for a chat session with a connected
/// merchant.
pub fn shopping_assistant_prompt(
    user_name: &str,
    merchant_name: &str,
    merchant_description: &str,
) -> Result<String> {
    let registry = templates();
    let rendered = registry.render(
        &Prompt::ShoppingAssistant.to_string(),
        &json!({
            "user_name": user_name,
            "merchant_name": merchant_name,
            "merchant_description": merchant_description,
        }),
    )?;
    Ok(rendered)
}
