//! The generation loop.
//!
//! A [`Generate`] call follows a **request → act → observe** cycle:
//!
//! 1. Assemble messages (system prompt, prior history, the new prompt)
//! 2. Send them to the model, streaming chunks to a sink if one is set
//! 3. **If the model requests tools**: run them, append the responses, loop
//! 4. **If a tool interrupts**: stop and hand the pending requests back
//! 5. **Otherwise**: return the final message and the full history
//!
//! An interrupted call is resumed by passing the returned history back as
//! messages together with the answers to the interrupts.

use chrono::Utc;
use flowdeck_core::error::{Error, FlowError, ProviderError, ToolError};
use flowdeck_core::event::{DomainEvent, EventBus};
use flowdeck_core::message::{Media, Message, Part, Role, ToolRequest, ToolResponse};
use flowdeck_core::provider::{
    FinishReason, GenerateRequest, GenerateResponse, GenerationConfig, Provider, StreamChunk,
    StreamEvent,
};
use flowdeck_core::tool::{ToolContext, ToolRegistry};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::structured::{StructuredOutput, parse_output};

/// Metadata key under which an interrupted model message keeps the tool
/// responses that did complete, so a resumed call need not re-run them.
const PENDING_RESPONSES_KEY: &str = "pendingToolResponses";

/// Callback receiving each streamed chunk.
pub type ChunkHandler = Box<dyn FnMut(StreamChunk) + Send + Sync>;

/// A tool request that paused generation.
#[derive(Debug, Clone)]
pub struct Interrupt {
    pub request: ToolRequest,
    /// What the tool handed back when it interrupted (e.g. the question).
    pub metadata: Value,
}

impl Interrupt {
    /// Answer this interrupt with `output`.
    pub fn respond(&self, output: impl Into<Value>) -> ToolResponse {
        ToolResponse {
            ref_id: self.request.ref_id.clone(),
            name: self.request.name.clone(),
            output: output.into(),
        }
    }
}

/// Builder for one generation call.
pub struct Generate {
    provider: Arc<dyn Provider>,
    model: String,
    system: Option<String>,
    prompt: Vec<Part>,
    messages: Vec<Message>,
    tool_names: Vec<String>,
    tools: Arc<ToolRegistry>,
    max_turns: u32,
    output_schema: Option<Value>,
    config: GenerationConfig,
    on_chunk: Option<ChunkHandler>,
    tool_responses: Vec<ToolResponse>,
    events: Option<Arc<EventBus>>,
}

impl Generate {
    pub const DEFAULT_MAX_TURNS: u32 = 5;

    /// Start a call against `model` on `provider`.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system: None,
            prompt: Vec::new(),
            messages: Vec::new(),
            tool_names: Vec::new(),
            tools: Arc::new(ToolRegistry::new()),
            max_turns: Self::DEFAULT_MAX_TURNS,
            output_schema: None,
            config: GenerationConfig::default(),
            on_chunk: None,
            tool_responses: Vec::new(),
            events: None,
        }
    }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(text.into());
        self
    }

    /// Text prompt, sent as the last user message.
    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = vec![Part::text(text)];
        self
    }

    /// Multi-part prompt (text and media).
    pub fn prompt_parts(mut self, parts: Vec<Part>) -> Self {
        self.prompt = parts;
        self
    }

    /// Prior conversation to continue from.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Registry the tool names are resolved in.
    pub fn registry(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = turns;
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Stream the response, handing each chunk to `handler`.
    pub fn on_chunk(mut self, handler: impl FnMut(StreamChunk) + Send + Sync + 'static) -> Self {
        self.on_chunk = Some(Box::new(handler));
        self
    }

    /// Answers to the interrupts of a previous call.
    pub fn tool_responses(mut self, responses: Vec<ToolResponse>) -> Self {
        self.tool_responses = responses;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Generate and parse the answer as `T`.
    pub async fn generate_data<T: StructuredOutput>(self) -> Result<(T, GenerateOutput), Error> {
        let output = self.output_schema(T::schema()).run().await?;
        let data = output.output::<T>()?;
        Ok((data, output))
    }

    /// Run the loop to completion or until a tool interrupts.
    pub async fn run(mut self) -> Result<GenerateOutput, Error> {
        let definitions = {
            let names: Vec<&str> = self.tool_names.iter().map(String::as_str).collect();
            self.tools.definitions_for(&names)?
        };

        let mut history = self.initial_messages()?;
        let mut turn: u32 = 0;

        loop {
            let mut request = GenerateRequest::new(self.model.clone(), history.clone());
            request.config = self.config.clone();
            request.tools = definitions.clone();
            request.output_schema = self.output_schema.clone();

            debug!(model = %self.model, turn, messages = history.len(), "Generate turn");
            let response = self.call_model(request, turn).await?;
            self.publish(DomainEvent::ModelCalled {
                model: response.model.clone(),
                turn,
                tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
                timestamp: Utc::now(),
            });

            let requests: Vec<ToolRequest> =
                response.message.tool_requests().into_iter().cloned().collect();
            if requests.is_empty() {
                history.push(response.message.clone());
                info!(model = %self.model, turns = turn, "Generation complete");
                return Ok(GenerateOutput::new(response, history, Vec::new()));
            }

            if turn >= self.max_turns {
                warn!(model = %self.model, max_turns = self.max_turns, "Max tool turns exceeded");
                return Err(FlowError::MaxTurnsExceeded(self.max_turns).into());
            }
            turn += 1;

            let (responses, interrupts) = self.execute_tools(&requests).await;
            if !interrupts.is_empty() {
                info!(count = interrupts.len(), "Generation interrupted by tool");
                let mut message = response.message.clone();
                message
                    .metadata
                    .insert(PENDING_RESPONSES_KEY.into(), serde_json::to_value(&responses)?);
                history.push(message.clone());
                let response = GenerateResponse {
                    message,
                    finish_reason: FinishReason::Interrupted,
                    ..response
                };
                return Ok(GenerateOutput::new(response, history, interrupts));
            }

            history.push(response.message);
            history.push(Message::tool_responses(responses));
        }
    }

    /// System prompt, prior messages, resumed tool answers, then the prompt.
    fn initial_messages(&mut self) -> Result<Vec<Message>, Error> {
        let mut history = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system {
            history.push(Message::system(system.clone()));
        }
        history.append(&mut self.messages);

        if !self.tool_responses.is_empty() {
            let resumed = resume_responses(&mut history, std::mem::take(&mut self.tool_responses))?;
            history.push(Message::tool_responses(resumed));
        }

        if !self.prompt.is_empty() {
            history.push(Message::new(Role::User, std::mem::take(&mut self.prompt)));
        }
        Ok(history)
    }

    async fn call_model(
        &mut self,
        request: GenerateRequest,
        turn: u32,
    ) -> Result<GenerateResponse, Error> {
        let Some(handler) = self.on_chunk.as_mut() else {
            return Ok(self.provider.generate(request).await?);
        };

        let mut rx = self.provider.generate_stream(request).await?;
        while let Some(event) = rx.recv().await {
            match event? {
                StreamEvent::Chunk(mut chunk) => {
                    chunk.index = turn;
                    handler(chunk);
                }
                StreamEvent::Done(response) => return Ok(response),
            }
        }
        Err(ProviderError::StreamInterrupted("stream ended without a final response".into()).into())
    }

    async fn execute_tools(&self, requests: &[ToolRequest]) -> (Vec<ToolResponse>, Vec<Interrupt>) {
        let runs = requests.iter().map(|req| async move {
            let ctx = ToolContext {
                ref_id: req.ref_id.clone(),
            };
            let start = Instant::now();
            let result = self.tools.execute(&req.name, &ctx, req.input.clone()).await;
            (req, result, start.elapsed().as_millis() as u64)
        });

        let mut responses = Vec::new();
        let mut interrupts = Vec::new();
        for (req, result, duration_ms) in futures::future::join_all(runs).await {
            self.publish(DomainEvent::ToolExecuted {
                tool_name: req.name.clone(),
                success: result.is_ok(),
                duration_ms,
                timestamp: Utc::now(),
            });

            let output = match result {
                Ok(output) => output,
                Err(ToolError::Interrupted { metadata, .. }) => {
                    interrupts.push(Interrupt {
                        request: req.clone(),
                        metadata,
                    });
                    continue;
                }
                Err(e) => {
                    warn!(tool = %req.name, error = %e, "Tool execution failed");
                    json!({ "error": e.to_string() })
                }
            };
            responses.push(ToolResponse {
                ref_id: req.ref_id.clone(),
                name: req.name.clone(),
                output,
            });
        }
        (responses, interrupts)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Pair every tool request of the interrupted model message with an answer,
/// taken from `answers` first and from the responses kept at interrupt time.
fn resume_responses(
    history: &mut [Message],
    answers: Vec<ToolResponse>,
) -> Result<Vec<ToolResponse>, Error> {
    let Some(last) = history.last_mut().filter(|m| m.role == Role::Model) else {
        return Err(FlowError::InvalidInput(
            "tool responses given but the last message is not a model message".into(),
        )
        .into());
    };

    let pending: Vec<ToolResponse> = match last.metadata.remove(PENDING_RESPONSES_KEY) {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };

    let matches = |req: &ToolRequest, resp: &ToolResponse| {
        resp.name == req.name && (resp.ref_id.is_none() || resp.ref_id == req.ref_id)
    };

    last.tool_requests()
        .into_iter()
        .map(|req| {
            answers
                .iter()
                .chain(pending.iter())
                .find(|resp| matches(req, resp))
                .map(|resp| ToolResponse {
                    ref_id: req.ref_id.clone(),
                    ..resp.clone()
                })
                .ok_or_else(|| {
                    Error::from(FlowError::InvalidInput(format!(
                        "no response for tool request '{}'",
                        req.name
                    )))
                })
        })
        .collect()
}

/// The result of a [`Generate`] call.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub response: GenerateResponse,
    history: Vec<Message>,
    interrupts: Vec<Interrupt>,
}

impl GenerateOutput {
    fn new(response: GenerateResponse, history: Vec<Message>, interrupts: Vec<Interrupt>) -> Self {
        Self {
            response,
            history,
            interrupts,
        }
    }

    pub fn text(&self) -> String {
        self.response.message.text()
    }

    pub fn media(&self) -> Option<&Media> {
        self.response.message.media()
    }

    pub fn finish_reason(&self) -> FinishReason {
        self.response.finish_reason
    }

    /// Parse the response text as JSON into `T`.
    pub fn output<T: DeserializeOwned>(&self) -> Result<T, Error> {
        parse_output(&self.text())
    }

    pub fn interrupts(&self) -> &[Interrupt] {
        &self.interrupts
    }

    /// Every message of the exchange, including the final model message.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Message> {
        self.history
    }
}
