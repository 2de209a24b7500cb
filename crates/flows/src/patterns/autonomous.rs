//! Autonomous operation: a research agent that can pause to ask the user.
//!
//! `askUser` interrupts the generation. There is no live user behind this
//! flow, so each question is answered with a canned reply and the agent
//! resumes from its history until it produces a final answer.

use async_trait::async_trait;
use flowdeck_core::error::{Error, FlowError};
use flowdeck_core::provider::FinishReason;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

const RESEARCH_SYSTEM_PROMPT: &str = "You are a helpful research assistant. Your goal is to provide a comprehensive answer to the user's task.";
const RESEARCH_TOOLS: [&str; 2] = ["searchWeb", "askUser"];

#[derive(Debug, Deserialize)]
struct ResearchAgentRequest {
    task: String,
}

pub struct ResearchAgentFlow {
    ctx: FlowContext,
}

impl ResearchAgentFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for ResearchAgentFlow {
    fn name(&self) -> &str {
        "researchAgent"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: ResearchAgentRequest = parse_input(self.name(), input)?;
        let max_turns = self.ctx.settings.max_turns;

        let mut response = self
            .ctx
            .generate(&self.ctx.models.pro)?
            .system(RESEARCH_SYSTEM_PROMPT)
            .prompt(format!(
                "Your task is: {}. Use the available tools to accomplish this.",
                req.task
            ))
            .tools(RESEARCH_TOOLS)
            .max_turns(max_turns)
            .run()
            .await?;

        let mut resumes = 0;
        while response.finish_reason() == FinishReason::Interrupted {
            let answers: Vec<_> = response
                .interrupts()
                .iter()
                .filter(|i| i.request.name == "askUser")
                .map(|i| {
                    let question = i.request.input["question"].as_str().unwrap_or_default();
                    info!(question, "Answering clarifying question");
                    i.respond(format!("The user answered: \"Sample answer for '{question}'\""))
                })
                .collect();

            if answers.is_empty() {
                warn!("Interrupted by a tool that cannot be answered; stopping");
                break;
            }
            if resumes >= max_turns {
                return Err(FlowError::MaxTurnsExceeded(max_turns).into());
            }
            resumes += 1;

            response = self
                .ctx
                .generate(&self.ctx.models.pro)?
                .messages(response.into_history())
                .tools(RESEARCH_TOOLS)
                .tool_responses(answers)
                .max_turns(max_turns)
                .run()
                .await?;
        }

        Ok(Value::String(response.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_context, text_response, tool_request_response};
    use flowdeck_core::message::{Part, Role};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn answers_questions_and_resumes() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_request_response(&[("searchWeb", json!({"query": "solar panels"}))]),
            tool_request_response(&[("askUser", json!({"question": "Residential or commercial?"}))]),
            text_response("Here is a comprehensive answer."),
        ]));
        let flow = ResearchAgentFlow::new(test_context(provider.clone()));

        let out = flow.run(json!({"task": "compare solar panels"}), None).await.unwrap();
        assert_eq!(out, json!("Here is a comprehensive answer."));

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].model, "gemini-2.5-pro");
        assert_eq!(
            requests[0].messages[1].text(),
            "Your task is: compare solar panels. Use the available tools to accomplish this."
        );

        let last = requests[2].messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        let Part::ToolResponse(resp) = &last.content[0] else {
            panic!("expected tool response");
        };
        assert_eq!(
            resp.output,
            json!("The user answered: \"Sample answer for 'Residential or commercial?'\"")
        );
    }

    #[tokio::test]
    async fn endless_questions_hit_the_limit() {
        let provider = Arc::new(ScriptedProvider::with_handler(|_| {
            tool_request_response(&[("askUser", json!({"question": "Again?"}))])
        }));
        let flow = ResearchAgentFlow::new(test_context(provider));
        let err = flow.run(json!({"task": "x"}), None).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::MaxTurnsExceeded(5))));
    }
}
