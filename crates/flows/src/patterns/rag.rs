//! Agentic RAG: the model queries the menu index through a tool.
//!
//! `indexMenu` embeds the fixed menu into the local vector index;
//! `agenticRagFlow` answers questions about it with `menuRagTool`.

use async_trait::async_trait;
use flowdeck_core::document::Document;
use flowdeck_core::error::Error;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

const MENU_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that can answer questions about the food available on the menu at the Grub Pub.
Use the provided tool to answer questions.
If you don't know, do not make up an answer.
Do not add or change items on the menu.";

/// The Grub Pub menu.
pub const MENU_ITEMS: [&str; 10] = [
    "Classic Burger: A juicy beef patty with lettuce, tomato, and our special sauce.",
    "Vegetarian Burger: A delicious plant-based patty with avocado and sprouts.",
    "Fries: Crispy golden fries, lightly salted.",
    "Milkshake: A thick and creamy milkshake, available in vanilla, chocolate, and strawberry.",
    "Salad: A fresh garden salad with your choice of dressing.",
    "Chicken Sandwich: Grilled chicken breast with honey mustard on a brioche bun.",
    "Fish and Chips: Beer-battered cod with a side of tartar sauce.",
    "Onion Rings: Thick-cut onion rings, fried to perfection.",
    "Ice Cream Sundae: Two scoops of vanilla ice cream with chocolate sauce and a cherry on top.",
    "Apple Pie: A classic apple pie with a flaky crust, served warm.",
];

#[derive(Debug, Deserialize)]
struct AgenticRagRequest {
    question: String,
}

pub struct AgenticRagFlow {
    ctx: FlowContext,
}

impl AgenticRagFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for AgenticRagFlow {
    fn name(&self) -> &str {
        "agenticRagFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: AgenticRagRequest = parse_input(self.name(), input)?;
        let response = self
            .ctx
            .generate_default()?
            .system(MENU_SYSTEM_PROMPT)
            .prompt(req.question)
            .tools(["menuRagTool"])
            .run()
            .await?;
        Ok(Value::String(response.text()))
    }
}

pub struct IndexMenuFlow {
    ctx: FlowContext,
}

impl IndexMenuFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for IndexMenuFlow {
    fn name(&self) -> &str {
        "indexMenu"
    }

    async fn run(&self, _input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let docs = MENU_ITEMS.iter().map(|item| Document::from_text(*item)).collect();
        let added = self.ctx.menu_index.index(docs).await?;
        info!(added, "Menu indexed");
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_context, text_response, tool_request_response};
    use flowdeck_core::message::{Part, Role};
    use std::sync::Arc;

    #[tokio::test]
    async fn answers_from_indexed_menu() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_request_response(&[("menuRagTool", json!({"query": "apple pie"}))]),
            text_response("Yes, we serve a warm apple pie."),
        ]));
        let ctx = test_context(provider.clone());

        let indexed = IndexMenuFlow::new(ctx.clone()).run(json!({}), None).await.unwrap();
        assert_eq!(indexed, json!({}));

        let out = AgenticRagFlow::new(ctx)
            .run(json!({"question": "Do you have pie?"}), None)
            .await
            .unwrap();
        assert_eq!(out, json!("Yes, we serve a warm apple pie."));

        let requests = provider.requests();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert!(requests[0].messages[0].text().contains("Grub Pub"));

        let Part::ToolResponse(resp) = &requests[1].messages[3].content[0] else {
            panic!("expected tool response");
        };
        let text = resp.output.as_str().unwrap();
        assert!(text.starts_with("Apple Pie:"));
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn reindexing_is_idempotent() {
        let ctx = test_context(Arc::new(ScriptedProvider::new(vec![])));
        let flow = IndexMenuFlow::new(ctx.clone());
        flow.run(json!({}), None).await.unwrap();
        flow.run(json!(null), None).await.unwrap();
        assert_eq!(ctx.menu_index.index(vec![Document::from_text(MENU_ITEMS[0])]).await.unwrap(), 0);
    }
}
