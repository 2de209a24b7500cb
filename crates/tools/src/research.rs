//! Tools for the research agent: a canned web search and an interrupt that
//! hands a clarifying question back to the caller.

use async_trait::async_trait;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};

use crate::required_str;

pub struct SearchWebTool;

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "searchWeb"
    }

    fn description(&self) -> &str {
        "Search the web for information on a given topic."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let query = required_str(self.name(), &input, "query")?;
        Ok(json!(format!("You found search results for: {query}")))
    }
}

/// Never produces output: always interrupts with `{question}`.
pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "askUser"
    }

    fn description(&self) -> &str {
        "Ask the user a clarifying question."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "question": { "type": "string" } },
            "required": ["question"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let question = required_str(self.name(), &input, "question")?;
        Err(ctx.interrupt(self.name(), json!({ "question": question })))
    }
}
