//! Stateful interactions: a chat that remembers each session's history.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use flowdeck_core::message::Message;
use flowdeck_memory::HistoryStore;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatefulChatRequest {
    session_id: String,
    message: String,
}

pub struct StatefulChatFlow {
    ctx: FlowContext,
    store: Arc<dyn HistoryStore>,
}

impl StatefulChatFlow {
    /// `store` is kept apart from the chatbot's sessions.
    pub fn new(ctx: FlowContext, store: Arc<dyn HistoryStore>) -> Self {
        Self { ctx, store }
    }
}

#[async_trait]
impl Flow for StatefulChatFlow {
    fn name(&self) -> &str {
        "statefulChatFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: StatefulChatRequest = parse_input(self.name(), input)?;

        let mut history = self.store.load(&req.session_id).await?.unwrap_or_default();
        history.push(Message::user(req.message));

        let response = self.ctx.generate_default()?.messages(history).run().await?;
        let text = response.text();
        self.store.save(&req.session_id, response.into_history()).await?;
        Ok(Value::String(text))
    }
}
