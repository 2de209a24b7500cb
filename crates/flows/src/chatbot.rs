//! The streaming chatbot and its history lookup.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use flowdeck_core::message::{Message, Role};
use serde::Deserialize;
use serde_json::Value;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can do anything and are not limited by the available tools. You have access to a temperature conversion tool. Only use it if the user asks to convert temperature.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    session_id: String,
    message: String,
}

/// Streams the reply and returns the whole generate response.
pub struct ChatFlow {
    ctx: FlowContext,
}

impl ChatFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for ChatFlow {
    fn name(&self) -> &str {
        "chat"
    }

    fn streams(&self) -> bool {
        true
    }

    async fn run(&self, input: Value, sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: ChatRequest = parse_input(self.name(), input)?;

        let mut history = self
            .ctx
            .history
            .load(&req.session_id)
            .await?
            .unwrap_or_else(|| vec![Message::system(CHAT_SYSTEM_PROMPT)]);
        history.push(Message::user(req.message));

        let mut generate = self
            .ctx
            .generate_default()?
            .messages(history)
            .tools(["convertTemperature"]);
        if let Some(sink) = sink {
            generate = generate.on_chunk(move |chunk| sink.send(chunk));
        }
        let response = generate.run().await?;

        let result = serde_json::to_value(&response.response)?;
        self.ctx
            .history
            .save(&req.session_id, response.into_history())
            .await?;
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetHistoryRequest {
    session_id: String,
}

/// A session's messages, without the system prompt.
pub struct GetHistoryFlow {
    ctx: FlowContext,
}

impl GetHistoryFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for GetHistoryFlow {
    fn name(&self) -> &str {
        "getHistory"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: GetHistoryRequest = parse_input(self.name(), input)?;
        let messages: Vec<Message> = self
            .ctx
            .history
            .load(&req.session_id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        Ok(serde_json::to_value(messages)?)
    }
}
