//! Provider trait: the abstraction over hosted model backends.
//!
//! A Provider knows how to send a list of messages to a model and get a
//! response back, either as a complete message or as a stream of chunks.
//! It can also embed text for retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, Part, Role};

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// Output modalities a model may be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// Sampling and output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Empty means the model default (text only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<Modality>,

    /// Ground the answer with the provider's built-in web search.
    #[serde(default)]
    pub google_search: bool,
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model name without any provider prefix.
    pub model: String,

    pub messages: Vec<Message>,

    #[serde(default)]
    pub config: GenerationConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// When set, the model is asked to answer with JSON matching this schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            config: GenerationConfig::default(),
            tools: Vec::new(),
            output_schema: None,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
    Blocked,
    /// A tool paused generation waiting for outside input.
    Interrupted,
    Other,
    #[default]
    Unknown,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: Message,

    #[serde(default)]
    pub finish_reason: FinishReason,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// A single streamed delta of a model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Index of the message this chunk belongs to within one generate call.
    #[serde(default)]
    pub index: u32,
    pub role: Role,
    pub content: Vec<Part>,
}

impl StreamChunk {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Items produced by a streaming call: deltas, then exactly one final response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    Done(GenerateResponse),
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub inputs: Vec<String>,
}

/// An embedding response, one vector per input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
}

/// Receiver half returned by [`Provider::generate_stream`].
pub type StreamReceiver = tokio::sync::mpsc::Receiver<Result<StreamEvent, ProviderError>>;

/// The core Provider trait.
///
/// Flows call `generate()` or `generate_stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "googleai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;

    /// Send a request and get a stream of chunks followed by the final response.
    ///
    /// Default implementation calls `generate()` and emits the whole message as one chunk.
    async fn generate_stream(&self, request: GenerateRequest) -> Result<StreamReceiver, ProviderError> {
        let response = self.generate(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx
            .send(Ok(StreamEvent::Chunk(StreamChunk {
                index: 0,
                role: response.message.role,
                content: response.message.content.clone(),
            })))
            .await;
        let _ = tx.send(Ok(StreamEvent::Done(response))).await;
        Ok(rx)
    }

    /// Generate embeddings for the given texts.
    async fn embed(&self, _request: EmbedRequest) -> Result<EmbedResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.text()).unwrap_or_default();
            Ok(GenerateResponse {
                message: Message::model(last),
                finish_reason: FinishReason::Stop,
                usage: None,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_generate() {
        let mut rx = Echo
            .generate_stream(GenerateRequest::new("m", vec![Message::user("ping")]))
            .await
            .unwrap();

        match rx.recv().await.unwrap().unwrap() {
            StreamEvent::Chunk(chunk) => assert_eq!(chunk.text(), "ping"),
            other => panic!("expected chunk, got {other:?}"),
        }
        match rx.recv().await.unwrap().unwrap() {
            StreamEvent::Done(resp) => assert_eq!(resp.finish_reason, FinishReason::Stop),
            other => panic!("expected done, got {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn embeddings_unsupported_by_default() {
        let err = Echo
            .embed(EmbedRequest {
                model: "e".into(),
                inputs: vec!["x".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn modalities_serialize_uppercase() {
        let config = GenerationConfig {
            response_modalities: vec![Modality::Text, Modality::Image],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#"["TEXT","IMAGE"]"#));
    }
}
