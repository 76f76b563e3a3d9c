//! The onboarding/chat state machine: collect the user's name,
//! collect and verify the merchant URL, then hand every input to the
//! tool-calling chat loop.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;

use super::models::{Message, Role};
use crate::ai::chat::{Chat, ChatBuilder, RichToolResult};
use crate::ai::prompt::shopping_assistant_prompt;
use crate::ai::tools::ucp_tools;
use crate::core::AppConfig;
use crate::openai;
use crate::ucp::UcpClient;

#[derive(Clone, Debug, PartialEq)]
pub enum OnboardingStep {
    CollectingName,
    CollectingMerchant,
    Active,
}

/// Drives the conversation. Strictly forward: no step is ever
/// revisited, and the merchant step only advances once a metadata
/// fetch against the entered URL succeeds.
pub struct ChatController {
    step: OnboardingStep,
    user_name: String,
    merchant_name: String,
    transcript: Vec<Message>,
    ucp: Arc<UcpClient>,
    config: AppConfig,
    chat: Option<Chat>,
    events: Option<mpsc::UnboundedReceiver<RichToolResult>>,
}

/// Turn free-form merchant input into a URL. Local hosts get plain
/// http since they won't have certificates.
pub fn normalize_merchant_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        format!("http://{}", trimmed)
    } else {
        format!("https://{}", trimmed)
    }
}

impl ChatController {
    pub fn new(ucp: Arc<UcpClient>, config: AppConfig) -> Self {
        let greeting = Message::plain(
            Role::Assistant,
            "Hello! Welcome to the UCP Client. Before we begin, could you please tell me \
             your name?",
        );
        Self {
            step: OnboardingStep::CollectingName,
            user_name: String::new(),
            merchant_name: String::from("Merchant"),
            transcript: vec![greeting],
            ucp,
            config,
            chat: None,
            events: None,
        }
    }

    pub fn step(&self) -> &OnboardingStep {
        &self.step
    }

    pub fn merchant_name(&self) -> &str {
        &self.merchant_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Handle one user input. Appends whatever transcript entries the
    /// turn produced; in-chat errors become visible system lines
    /// rather than hard failures.
    pub async fn handle_input(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        match self.step {
            OnboardingStep::CollectingName => self.handle_name(input),
            OnboardingStep::CollectingMerchant => self.handle_merchant(input).await,
            OnboardingStep::Active => self.handle_chat(input).await?,
        }

        Ok(())
    }

    fn handle_name(&mut self, input: &str) {
        self.user_name = input.to_string();
        self.transcript.push(Message::plain(Role::User, input));
        self.transcript.push(Message::plain(
            Role::Assistant,
            &format!(
                "Nice to meet you, {}! Now, please provide the UCP profile URL of the \
                 merchant you'd like to connect to (e.g., shop.example.com).",
                input
            ),
        ));
        self.step = OnboardingStep::CollectingMerchant;
    }

    async fn handle_merchant(&mut self, input: &str) {
        self.transcript.push(Message::plain(Role::User, input));

        let url = normalize_merchant_url(input);
        self.ucp.set_base_url(&url);

        match self.ucp.get_merchant_info().await {
            Ok(info) => {
                let name = info
                    .merchant
                    .name
                    .unwrap_or_else(|| String::from("the Merchant"));
                let description = info.merchant.description.unwrap_or_default();

                if let Err(err) = self.start_session(&name, &description) {
                    tracing::error!("Failed to start chat session: {}", err);
                    self.transcript.push(Message::plain(
                        Role::Assistant,
                        "Something went wrong setting up the conversation. Please try again.",
                    ));
                    return;
                }

                self.merchant_name = name.clone();
                self.transcript.push(Message::plain(
                    Role::Assistant,
                    &format!(
                        "Connected to {}! {} How can I help you today, {}?",
                        name, description, self.user_name
                    ),
                ));
                self.step = OnboardingStep::Active;
            }
            Err(err) => {
                tracing::debug!("Merchant connection failed: {}", err);
                self.transcript.push(Message::plain(
                    Role::Assistant,
                    "I couldn't connect to that merchant. Please make sure the URL is \
                     correct and supports UCP.",
                ));
            }
        }
    }

    // The chat session is created exactly once, on the transition
    // into active chat, and never reset within a run.
    fn start_session(&mut self, merchant_name: &str, merchant_description: &str) -> Result<()> {
        let prompt =
            shopping_assistant_prompt(&self.user_name, merchant_name, merchant_description)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let chat = ChatBuilder::new(
            &self.config.openai_api_hostname,
            &self.config.openai_api_key,
            &self.config.openai_model,
        )
        .transcript(vec![openai::Message::new(openai::Role::System, &prompt)])
        .tools(ucp_tools(&self.ucp))
        .events(tx)
        .build();

        self.chat = Some(chat);
        self.events = Some(rx);
        Ok(())
    }

    async fn handle_chat(&mut self, input: &str) -> Result<()> {
        self.transcript.push(Message::plain(Role::User, input));

        let Some(chat) = self.chat.as_mut() else {
            bail!("Chat session was not initialized");
        };

        let result = chat
            .next_msg(openai::Message::new(openai::Role::User, input))
            .await;

        // Rich tool results come first so a product list or checkout
        // summary renders above the reply that refers to it
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                let msg = match event.tool.as_str() {
                    "list_products" => Message::product_list(event.payload),
                    "create_checkout" => Message::checkout_summary(event.payload),
                    _ => continue,
                };
                self.transcript.push(msg);
            }
        }

        match result {
            Ok(messages) => {
                if let Some(reply) = messages.last().and_then(|m| m.content.clone()) {
                    self.transcript.push(Message::plain(Role::Assistant, &reply));
                }
            }
            Err(err) => {
                self.transcript.push(Message::plain(
                    Role::System,
                    &format!("Error: {}", err),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config(llm_hostname: &str) -> AppConfig {
        AppConfig {
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: "2424".to_string(),
            openai_api_hostname: llm_hostname.to_string(),
            openai_api_key: "test-key".to_string(),
            openai_model: "gpt-4".to_string(),
        }
    }

    #[test]
    fn test_normalize_merchant_url() {
        assert_eq!(
            normalize_merchant_url("localhost:4000"),
            "http://localhost:4000"
        );
        assert_eq!(
            normalize_merchant_url("127.0.0.1:3000"),
            "http://127.0.0.1:3000"
        );
        assert_eq!(
            normalize_merchant_url("shop.example.com"),
            "https://shop.example.com"
        );
        assert_eq!(
            normalize_merchant_url("https://shop.example.com"),
            "https://shop.example.com"
        );
        assert_eq!(
            normalize_merchant_url("http://shop.example.com"),
            "http://shop.example.com"
        );
        assert_eq!(
            normalize_merchant_url("  shop.example.com  "),
            "https://shop.example.com"
        );
    }

    #[tokio::test]
    async fn test_name_step_advances_unconditionally() {
        let ucp = Arc::new(UcpClient::new("http://127.0.0.1:2424"));
        let mut controller = ChatController::new(ucp, test_config("http://127.0.0.1:1"));

        assert_eq!(controller.step(), &OnboardingStep::CollectingName);
        controller.handle_input("Ada").await.unwrap();

        assert_eq!(controller.step(), &OnboardingStep::CollectingMerchant);
        assert_eq!(controller.user_name(), "Ada");
        let transcript = controller.transcript();
        assert!(transcript.last().unwrap().content.contains("Nice to meet you, Ada!"));
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let ucp = Arc::new(UcpClient::new("http://127.0.0.1:2424"));
        let mut controller = ChatController::new(ucp, test_config("http://127.0.0.1:1"));

        controller.handle_input("   ").await.unwrap();

        assert_eq!(controller.step(), &OnboardingStep::CollectingName);
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_merchant_step_stays_on_connection_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/ucp/proxy")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(json!({"error": "connect ECONNREFUSED"}).to_string())
            .create();

        let ucp = Arc::new(UcpClient::new(&server.url()));
        let mut controller = ChatController::new(ucp, test_config("http://127.0.0.1:1"));

        controller.handle_input("Ada").await.unwrap();
        controller.handle_input("shop.example.com").await.unwrap();

        // Still collecting; the user can retry
        assert_eq!(controller.step(), &OnboardingStep::CollectingMerchant);
        assert!(
            controller
                .transcript()
                .last()
                .unwrap()
                .content
                .contains("couldn't connect")
        );
    }

    #[tokio::test]
    async fn test_merchant_step_advances_on_successful_connection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/ucp/proxy")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": {
                        "merchant": {
                            "name": "Wedding Shop",
                            "description": "Dresses and suits."
                        }
                    }
                })
                .to_string(),
            )
            .create();

        let ucp = Arc::new(UcpClient::new(&server.url()));
        let mut controller = ChatController::new(ucp, test_config("http://127.0.0.1:1"));

        controller.handle_input("Ada").await.unwrap();
        controller.handle_input("shop.example.com").await.unwrap();

        assert_eq!(controller.step(), &OnboardingStep::Active);
        assert_eq!(controller.merchant_name(), "Wedding Shop");
        let last = controller.transcript().last().unwrap();
        assert!(last.content.contains("Connected to Wedding Shop!"));
        assert!(last.content.contains("How can I help you today, Ada?"));
    }

    #[tokio::test]
    async fn test_active_step_forwards_to_the_chat_loop() {
        let mut proxy = mockito::Server::new_async().await;
        let _merchant_mock = proxy
            .mock("POST", "/api/ucp/proxy")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": {"merchant": {"name": "Wedding Shop", "description": ""}}})
                    .to_string(),
            )
            .create();

        let mut llm = mockito::Server::new_async().await;
        let _llm_mock = llm
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "chatcmpl-1",
                    "object": "chat.completion",
                    "created": 1694268190,
                    "model": "gpt-4",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "What's the occasion?"},
                        "finish_reason": "stop"
                    }]
                })
                .to_string(),
            )
            .create();

        let ucp = Arc::new(UcpClient::new(&proxy.url()));
        let mut controller = ChatController::new(ucp, test_config(&llm.url()));

        controller.handle_input("Ada").await.unwrap();
        controller.handle_input("shop.example.com").await.unwrap();
        controller.handle_input("I need a dress").await.unwrap();

        let last = controller.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "What's the occasion?");
    }

    #[tokio::test]
    async fn test_chat_errors_become_visible_system_lines() {
        let mut proxy = mockito::Server::new_async().await;
        let _merchant_mock = proxy
            .mock("POST", "/api/ucp/proxy")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": {"merchant": {"name": "Wedding Shop", "description": ""}}})
                    .to_string(),
            )
            .create();

        // No LLM server listening at all
        let ucp = Arc::new(UcpClient::new(&proxy.url()));
        let mut controller = ChatController::new(ucp, test_config("http://127.0.0.1:1"));

        controller.handle_input("Ada").await.unwrap();
        controller.handle_input("shop.example.com").await.unwrap();
        controller.handle_input("I need a dress").await.unwrap();

        let last = controller.transcript().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.starts_with("Error:"));
    }
}
