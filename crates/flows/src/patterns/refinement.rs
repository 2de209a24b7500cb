//! Iterative refinement: an evaluator critiques, an optimizer revises.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};
use crate::structured::StructuredOutput;

#[derive(Debug, Deserialize)]
struct IterativeRefinementRequest {
    topic: String,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    critique: String,
    satisfied: bool,
}

impl StructuredOutput for Evaluation {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "critique": {"type": "string"},
                "satisfied": {"type": "boolean"}
            },
            "required": ["critique", "satisfied"]
        })
    }
}

pub struct IterativeRefinementFlow {
    ctx: FlowContext,
}

impl IterativeRefinementFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for IterativeRefinementFlow {
    fn name(&self) -> &str {
        "iterativeRefinementFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: IterativeRefinementRequest = parse_input(self.name(), input)?;

        let mut content = self
            .ctx
            .generate_default()?
            .prompt(format!(
                "Write a short, single-paragraph blog post about: {}.",
                req.topic
            ))
            .run()
            .await?
            .text();

        for round in 1..=self.ctx.settings.refinement_rounds {
            let (evaluation, _) = self
                .ctx
                .generate_default()?
                .prompt(format!(
                    "Critique the following blog post. Is it clear, concise, and engaging? Provide specific feedback for improvement. Post: \"{content}\""
                ))
                .generate_data::<Evaluation>()
                .await?;

            if evaluation.satisfied {
                debug!(round, "Evaluator satisfied");
                break;
            }

            content = self
                .ctx
                .generate_default()?
                .prompt(format!(
                    "Revise the following blog post based on the feedback provided.\nPost: \"{content}\"\nFeedback: \"{}\"",
                    evaluation.critique
                ))
                .run()
                .await?
                .text();
        }

        Ok(Value::String(content))
    }
}
