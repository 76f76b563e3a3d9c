use anyhow::{Error, Result, anyhow, bail};
use futures_util::future::try_join_all;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::models::{RichToolResult, Transcript};
use crate::openai::{BoxedToolCall, FunctionCall, FunctionCallFn, Message, Role, completion};

// Tools whose raw results get surfaced to the user for rich
// rendering in addition to being fed back to the model.
const RICH_RESULT_TOOLS: [&str; 2] = ["list_products", "create_checkout"];

/// The tool-calling orchestrator: wraps an OpenAI compatible chat
/// completion session with the fixed set of commerce tools and runs
/// the call/result loop until the model produces a plain reply.
///
/// A handler failure never aborts the batch it belongs to; the error
/// is returned to the model in-band as the tool's result so it can
/// react in-conversation. The same goes for tool names the model
/// invents: they answer with an error result rather than being
/// dropped, which would stall the one-result-per-call contract.
///
/// Use `Chat::builder()` via `ChatBuilder` to construct a `Chat`.
pub struct Chat {
    api_hostname: String,
    api_key: String,
    model: String,
    tools: Option<Vec<BoxedToolCall>>,
    transcript: Transcript,
    events: Option<mpsc::UnboundedSender<RichToolResult>>,
}

impl Chat {
    async fn handle_tool_call(
        tools: &Vec<BoxedToolCall>,
        events: &Option<mpsc::UnboundedSender<RichToolResult>>,
        tool_call: &Value,
    ) -> Result<Vec<Message>, Error> {
        let tool_call_id = &tool_call["id"]
            .as_str()
            .ok_or(anyhow!("Tool call missing ID: {}", tool_call))?;
        let tool_call_function = &tool_call["function"];
        let tool_call_args = tool_call_function["arguments"]
            .as_str()
            .ok_or(anyhow!("Tool call missing arguments: {}", tool_call))?;
        let tool_call_name = tool_call_function["name"]
            .as_str()
            .ok_or(anyhow!("Tool call missing name: {}", tool_call))?;

        tracing::debug!(
            "\nTool call: {}\nargs: {}",
            &tool_call_name,
            &tool_call_args
        );

        let handler = tools
            .iter()
            .find(|i| *i.function_name() == *tool_call_name);

        let tool_call_result = match handler {
            Some(tool) => match tool.call(tool_call_args).await {
                Ok(result) => {
                    if let Some(tx) = events
                        && RICH_RESULT_TOOLS.contains(&tool_call_name)
                    {
                        let payload = serde_json::from_str(&result)
                            .unwrap_or(Value::String(result.clone()));
                        // The receiver hanging up doesn't affect the
                        // conversation itself
                        let _ = tx.send(RichToolResult {
                            tool: tool_call_name.to_string(),
                            payload,
                        });
                    }
                    result
                }
                Err(err) => {
                    tracing::error!("Tool call {} failed: {}", tool_call_name, err);
                    json!({"error": err.to_string()}).to_string()
                }
            },
            None => {
                tracing::warn!("Received tool call that doesn't exist: {}", tool_call_name);
                json!({"error": format!("Unknown tool: {}", tool_call_name)}).to_string()
            }
        };

        let tool_call_request = vec![FunctionCall {
            function: FunctionCallFn {
                arguments: tool_call_args.to_string(),
                name: tool_call_name.to_string(),
            },
            id: tool_call_id.to_string(),
            r#type: String::from("function"),
        }];
        let results = vec![
            Message::new_tool_call_request(tool_call_request),
            Message::new_tool_call_response(&tool_call_result, tool_call_id),
        ];

        Ok(results)
    }

    async fn handle_tool_calls(
        tools: &Vec<BoxedToolCall>,
        events: &Option<mpsc::UnboundedSender<RichToolResult>>,
        tool_calls: &[Value],
    ) -> Result<Vec<Message>, Error> {
        // Run the batch concurrently and return results in call
        // order. Nothing requires tool calls within a batch to run
        // strictly sequentially, only that all results come back
        // together before the next model turn.
        let futures = tool_calls
            .iter()
            .map(|call| Self::handle_tool_call(tools, events, call));
        let results = try_join_all(futures).await?.into_iter().flatten().collect();
        Ok(results)
    }

    /// Runs the next turn in chat by passing the transcript to the
    /// LLM for the next response. Can return multiple messages when
    /// there are tool calls.
    pub async fn next_msg(&mut self, msg: Message) -> Result<Vec<Message>, Error> {
        self.transcript.push(msg);

        let messages = Self::chat(
            &self.tools,
            &self.events,
            &self.transcript,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await?;

        for m in messages.iter() {
            self.transcript.push(m.clone());
        }

        Ok(messages)
    }

    async fn chat(
        tools: &Option<Vec<BoxedToolCall>>,
        events: &Option<mpsc::UnboundedSender<RichToolResult>>,
        transcript: &Transcript,
        api_hostname: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Vec<Message>, Error> {
        let history = transcript.messages();
        let mut updated_history = history.to_owned();
        let mut messages = Vec::new();

        let mut resp = completion(&history, tools, api_hostname, api_key, model).await?;

        // Tool calls need to be handled for the chat to proceed
        while let Some(tool_calls) = resp["choices"][0]["message"]["tool_calls"].as_array() {
            if tool_calls.is_empty() {
                break;
            }

            let Some(tools_ref) = tools.as_ref() else {
                bail!("Received tool call but no tools were specified");
            };

            let tool_call_msgs = Self::handle_tool_calls(tools_ref, events, tool_calls).await?;
            for m in tool_call_msgs.into_iter() {
                messages.push(m.clone());
                updated_history.push(m);
            }

            // Provide the results of the tool calls back to the chat
            resp = completion(&updated_history, tools, api_hostname, api_key, model).await?;
        }

        if let Some(msg) = resp["choices"][0]["message"]["content"].as_str() {
            messages.push(Message::new(Role::Assistant, msg));
        } else {
            bail!("No message received. Resp:\n\n {}", resp);
        }

        Ok(messages)
    }
}

#[derive(Default)]
pub struct ChatBuilder {
    api_hostname: String,
    api_key: String,
    model: String,
    tools: Option<Vec<BoxedToolCall>>,
    transcript: Transcript,
    events: Option<mpsc::UnboundedSender<RichToolResult>>,
}

impl ChatBuilder {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            transcript: Transcript::new(),
            tools: None,
            events: None,
        }
    }

    pub fn build(self) -> Chat {
        Chat {
            api_hostname: self.api_hostname,
            api_key: self.api_key,
            model: self.model,
            tools: self.tools,
            transcript: self.transcript,
            events: self.events,
        }
    }

    pub fn transcript(mut self, messages: Vec<Message>) -> Self {
        self.transcript = Transcript::new_with_messages(messages);
        self
    }

    pub fn tools(mut self, tools: Vec<BoxedToolCall>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Surface rich tool results (product listings, checkout
    /// summaries) on the given channel as they happen.
    pub fn events(mut self, transmitter: mpsc::UnboundedSender<RichToolResult>) -> Self {
        self.events = Some(transmitter);
        self
    }
}
