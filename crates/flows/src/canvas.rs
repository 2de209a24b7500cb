//! The canvas coding agent.
//!
//! The agent edits a single artifact (`main.<ext>`) through file tools and
//! tells the UI to refresh its preview. Tool traffic stays server side: the
//! returned conversation holds only messages without tool parts.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use flowdeck_core::message::{Message, Role};
use flowdeck_tools::CANVAS_AGENT_TOOLS;
use serde::Serialize;
use serde_json::Value;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

const CANVAS_SYSTEM_PROMPT: &str = r#"You are a world-class software engineer agent. Your goal is to accomplish the user's task by iteratively breaking it down into clear steps and working through them methodically.

You are working on a 'canvas' application, which allows you to create and modify a single artifact, such as a simple HTML+JS+CSS application or a game.
If the user asks for image, generate an SVG. Be creative and try to use HTML/JS/SVG and any other browser compatible tech.

**Core Principles:**

1.  **Analyze and Plan:** Before writing any code, take a moment to analyze the user's request. If the request is ambiguous, ask clarifying questions. Otherwise, formulate a clear plan to achieve the goal.
2.  **Iterative Development:** Work in small, incremental steps. After each step, verify your work before moving on to the next.
3.  **Tool Proficiency:** You have access to a set of tools. Use them wisely. Always wait for the result of a tool use before proceeding.

**File Naming Convention:**

The single file you are working on **must always** be named `main.<extension>`, where the extension is appropriate for the content (e.g., `main.html`).
Avoid mentioning file names unless explicitly asked. The UI will handle that.

For example, if the user asks you to build an "app", it must be a single HTML file with CSS and JS inline. It MUST BE a single file.

**Tool Workflow:**

*   **`read_file`**: Before making any changes, always use this tool to examine the current content of the file. This will help you understand the existing code and plan your changes.
*   **`write_to_file`**: Use this tool **only** for the initial creation of the `main.<extension>` file. This is for starting from a blank slate.
*   **`find_and_replace`**: For **all** subsequent edits, you must use `find_and_replace`. This tool allows you to make targeted changes, which is more efficient and less error-prone.

**Your primary workflow should be:**

1.  Thoroughly understand the user's request.
2.  Use `read_file` to inspect the current state of the artifact.
3.  If the file doesn't exist, use `write_to_file` to create the first version, ensuring it is named `main.<extension>`.
4.  For all other changes, use `find_and_replace` to modify the artifact.
5.  After every successful file modification, call the `open_file_preview` tool to reload the preview on the client. This is crucial for the user to see your changes.
6.  Continuously refine the artifact based on user feedback, following this workflow for each iteration.

Be humble and collaborative. If the user says "hi", greet them and offer some creative ideas for the canvas.
"#;

#[derive(Debug, Serialize)]
struct AgentRequest {
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct AgentResponse {
    message: Option<Message>,
    request: AgentRequest,
}

pub struct CanvasAgentFlow {
    ctx: FlowContext,
}

impl CanvasAgentFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for CanvasAgentFlow {
    fn name(&self) -> &str {
        "agent"
    }

    fn streams(&self) -> bool {
        true
    }

    async fn run(&self, input: Value, sink: Option<FlowSink>) -> Result<Value, Error> {
        let mut messages: Vec<Message> = parse_input(self.name(), input)?;
        if messages.first().map(|m| m.role) != Some(Role::System) {
            messages.insert(0, Message::system(CANVAS_SYSTEM_PROMPT));
        }

        let mut generate = self
            .ctx
            .generate_default()?
            .messages(messages)
            .tools(CANVAS_AGENT_TOOLS)
            .max_turns(self.ctx.settings.canvas_max_turns);
        if let Some(sink) = sink {
            generate = generate.on_chunk(move |chunk| sink.send(chunk));
        }
        let response = generate.run().await?;

        let processed: Vec<Message> = response
            .into_history()
            .into_iter()
            .filter(|m| !m.has_tool_parts())
            .collect();
        Ok(serde_json::to_value(AgentResponse {
            message: processed.last().cloned(),
            request: AgentRequest {
                messages: processed,
            },
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_context, text_response, tool_request_response};
    use flowdeck_tools::ArtifactManager;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn writes_artifact_and_hides_tool_traffic() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_request_response(&[(
                "write_to_file",
                json!({"path": "main.html", "content": "<h1>Hi</h1>"}),
            )]),
            tool_request_response(&[("open_file_preview", json!({"path": "main.html"}))]),
            text_response("Your page is ready."),
        ]));
        let ctx = test_context(provider.clone());
        let (sink, mut chunks) = FlowSink::channel();

        let out = CanvasAgentFlow::new(ctx.clone())
            .run(
                json!([{"role": "user", "content": [{"text": "make a hello page"}]}]),
                Some(sink),
            )
            .await
            .unwrap();

        assert_eq!(ctx.artifacts.read_file("main.html").await.unwrap(), "<h1>Hi</h1>");
        assert_eq!(out["message"]["content"][0]["text"], "Your page is ready.");
        let messages = out["request"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");

        let first = &provider.requests()[0];
        assert!(first.messages[0].text().starts_with("You are a world-class software engineer agent."));
        assert_eq!(first.tools.len(), 4);

        let mut streamed = 0;
        while chunks.try_recv().is_ok() {
            streamed += 1;
        }
        assert_eq!(streamed, 3);
    }

    #[tokio::test]
    async fn keeps_existing_system_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("ok")]));
        let ctx = test_context(provider.clone());
        CanvasAgentFlow::new(ctx)
            .run(
                json!([
                    {"role": "system", "content": [{"text": "custom"}]},
                    {"role": "user", "content": [{"text": "hi"}]}
                ]),
                None,
            )
            .await
            .unwrap();
        let messages = &provider.requests()[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "custom");
    }

    #[tokio::test]
    async fn rejects_non_message_input() {
        let ctx = test_context(Arc::new(ScriptedProvider::new(vec![])));
        let err = CanvasAgentFlow::new(ctx)
            .run(json!({"prompt": "x"}), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), "INVALID_ARGUMENT");
    }
}
