//! Core models for managing a stateful chat with the LLM.
use serde_json::Value;

use crate::openai::Message;

/// The accumulating model-facing conversation. Created once when the
/// session goes active and never reset within a run.
#[derive(Default)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.0.clone()
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}

/// A tool result worth showing the user directly (product listings
/// and checkout summaries) in addition to feeding it to the model.
#[derive(Clone, Debug)]
pub struct RichToolResult {
    pub tool: String,
    pub payload: Value,
}
