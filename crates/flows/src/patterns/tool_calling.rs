//! Tool calling: the model decides when to look up the weather.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use serde::Deserialize;
use serde_json::Value;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

#[derive(Debug, Deserialize)]
struct ToolCallingRequest {
    prompt: String,
}

pub struct ToolCallingFlow {
    ctx: FlowContext,
}

impl ToolCallingFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for ToolCallingFlow {
    fn name(&self) -> &str {
        "toolCallingFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: ToolCallingRequest = parse_input(self.name(), input)?;
        let response = self
            .ctx
            .generate_default()?
            .prompt(req.prompt)
            .tools(["getWeather"])
            .run()
            .await?;
        Ok(Value::String(response.text()))
    }
}
