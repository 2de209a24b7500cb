//! Shared test helpers for flow tests.

use async_trait::async_trait;
use flowdeck_config::AppConfig;
use flowdeck_core::error::ProviderError;
use flowdeck_core::event::EventBus;
use flowdeck_core::message::{Message, Part, Role, ToolRequest};
use flowdeck_core::provider::{
    EmbedRequest, EmbedResponse, FinishReason, GenerateRequest, GenerateResponse, Provider, Usage,
};
use flowdeck_memory::{InMemoryHistory, LocalVectorStore};
use flowdeck_providers::ModelRouter;
use flowdeck_tools::{InMemoryArtifactManager, default_registry};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::flow::FlowContext;

type Handler = Box<dyn Fn(&GenerateRequest) -> GenerateResponse + Send + Sync>;

/// A mock provider that answers from a script and records every request.
///
/// Queued responses are returned in order; when a handler is set it answers
/// every call instead. Panics if the queue runs dry.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<GenerateResponse>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<GenerateResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler(
        handler: impl Fn(&GenerateRequest) -> GenerateResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "googleai"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return Ok(handler(&request));
        }
        let next = self.queue.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more responses (call #{})",
                self.requests.lock().unwrap().len()
            )
        }))
    }

    /// Embeds text as counts of a few menu keywords.
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, ProviderError> {
        const KEYWORDS: [&str; 5] = ["burger", "fries", "salad", "pie", "milkshake"];
        let embeddings = request
            .inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|k| lower.matches(k).count() as f32 + 0.01)
                    .collect()
            })
            .collect();
        Ok(EmbedResponse {
            embeddings,
            model: request.model,
        })
    }
}

fn response(message: Message) -> GenerateResponse {
    GenerateResponse {
        message,
        finish_reason: FinishReason::Stop,
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A plain text model response.
pub fn text_response(text: &str) -> GenerateResponse {
    response(Message::model(text))
}

/// A model response with one media part.
pub fn media_response(url: &str) -> GenerateResponse {
    response(Message::new(
        Role::Model,
        vec![Part::text("Here you go."), Part::media(url, None)],
    ))
}

/// A model response requesting the given tools, numbered like the provider does.
pub fn tool_request_response(calls: &[(&str, serde_json::Value)]) -> GenerateResponse {
    let parts = calls
        .iter()
        .enumerate()
        .map(|(i, (name, input))| {
            Part::ToolRequest(ToolRequest {
                ref_id: Some(i.to_string()),
                name: name.to_string(),
                input: input.clone(),
            })
        })
        .collect();
    GenerateResponse {
        finish_reason: FinishReason::Stop,
        ..response(Message::new(Role::Model, parts))
    }
}

/// A flow context whose every model is served by `provider`.
pub fn test_context(provider: Arc<ScriptedProvider>) -> FlowContext {
    let config = AppConfig::default();
    let mut router = ModelRouter::new("googleai");
    router.register("googleai", provider.clone());

    let store = Arc::new(LocalVectorStore::new("menuQA", provider, "embedder"));
    let artifacts = Arc::new(InMemoryArtifactManager::new());
    let tools = default_registry(store.clone(), config.flows.retriever_k, artifacts.clone());

    FlowContext {
        router,
        tools: Arc::new(tools),
        models: config.models.clone(),
        settings: config.flows.clone(),
        history: Arc::new(InMemoryHistory::new()),
        menu_index: store,
        artifacts,
        events: Arc::new(EventBus::default()),
    }
}
