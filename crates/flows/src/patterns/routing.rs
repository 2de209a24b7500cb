//! Conditional routing: classify the request, then pick a handler.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};
use crate::structured::StructuredOutput;

#[derive(Debug, Deserialize)]
struct RouterRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct Intent {
    intent: String,
}

impl StructuredOutput for Intent {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string", "enum": ["question", "creative"]}
            },
            "required": ["intent"]
        })
    }
}

pub struct RouterFlow {
    ctx: FlowContext,
}

impl RouterFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for RouterFlow {
    fn name(&self) -> &str {
        "routerFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: RouterRequest = parse_input(self.name(), input)?;

        let (intent, _) = self
            .ctx
            .generate_default()?
            .prompt(format!(
                "Classify the user's query as either a 'question' or a 'creative' request. Query: {}",
                req.query
            ))
            .generate_data::<Intent>()
            .await?;
        debug!(intent = %intent.intent, "Routed query");

        let prompt = match intent.intent.as_str() {
            "question" => format!("Answer the following question: {}", req.query),
            "creative" => format!("Write a short poem about: {}", req.query),
            _ => {
                return Ok(json!(
                    "Sorry, I couldn't determine how to handle your request."
                ));
            }
        };

        let answer = self.ctx.generate_default()?.prompt(prompt).run().await?;
        Ok(Value::String(answer.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_context, text_response};
    use std::sync::Arc;

    #[tokio::test]
    async fn question_is_answered() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(r#"{"intent": "question"}"#),
            text_response("Paris."),
        ]));
        let flow = RouterFlow::new(test_context(provider.clone()));
        let out = flow
            .run(json!({"query": "What is the capital of France?"}), None)
            .await
            .unwrap();
        assert_eq!(out, json!("Paris."));
        assert!(provider.requests()[1].messages[0]
            .text()
            .starts_with("Answer the following question:"));
    }

    #[tokio::test]
    async fn creative_gets_a_poem() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(r#"{"intent": "creative"}"#),
            text_response("Roses are red"),
        ]));
        let flow = RouterFlow::new(test_context(provider.clone()));
        flow.run(json!({"query": "the sea"}), None).await.unwrap();
        assert_eq!(
            provider.requests()[1].messages[0].text(),
            "Write a short poem about: the sea"
        );
    }

    #[tokio::test]
    async fn unknown_intent_apologizes() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            r#"{"intent": "smalltalk"}"#,
        )]));
        let flow = RouterFlow::new(test_context(provider.clone()));
        let out = flow.run(json!({"query": "hey"}), None).await.unwrap();
        assert_eq!(
            out,
            json!("Sorry, I couldn't determine how to handle your request.")
        );
        assert_eq!(provider.requests().len(), 1);
    }
}
