//! Google Generative Language API provider.
//!
//! Talks to the public Gemini REST API:
//! - `models/{model}:generateContent` and `:streamGenerateContent?alt=sse`
//! - `models/{model}:batchEmbedContents`
//! - `models/{model}:predict` for Imagen text-to-image models
//!
//! Supports function calling, inline image input/output, Google Search
//! grounding and JSON-schema constrained output.

use async_trait::async_trait;
use futures::StreamExt;
use flowdeck_core::error::ProviderError;
use flowdeck_core::media::DataUri;
use flowdeck_core::message::{Message, Part, Role, ToolRequest};
use flowdeck_core::provider::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

/// Schema keywords the API rejects in `responseSchema` and function parameters.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$ref",
    "$defs",
    "definitions",
    "additionalProperties",
    "default",
    "examples",
];

/// A Gemini provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub const NAME: &'static str = "googleai";

    /// Create a provider for the given API base URL.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key; set GEMINI_API_KEY or api_key in config.toml".into(),
            )
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, bare_model(model), method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        check_status(response).await
    }

    /// Build the `generateContent` request body.
    fn build_body(request: &GenerateRequest) -> Value {
        let system: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
            .collect();

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(to_api_content)
            .collect();

        let mut body = json!({ "contents": contents });

        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }

        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": sanitize_schema(&t.input_schema),
                    })
                })
                .collect();
            tools.push(json!({ "functionDeclarations": declarations }));
        }
        if request.config.google_search {
            tools.push(json!({ "googleSearch": {} }));
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        let mut generation = serde_json::Map::new();
        if let Some(t) = request.config.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(max) = request.config.max_output_tokens {
            generation.insert("maxOutputTokens".into(), json!(max));
        }
        if !request.config.response_modalities.is_empty() {
            generation.insert(
                "responseModalities".into(),
                json!(request.config.response_modalities),
            );
        }
        if let Some(schema) = &request.output_schema {
            generation.insert("responseMimeType".into(), json!("application/json"));
            generation.insert("responseSchema".into(), sanitize_schema(schema));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        body
    }

    /// Imagen uses the `predict` endpoint with a plain prompt.
    async fn predict_image(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
            .unwrap_or_default();

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });

        debug!(model = %request.model, "Sending image predict request");
        let response = self.post(&self.url(&request.model, "predict"), &body).await?;
        let api: PredictResponse = response.json().await.map_err(parse_error)?;

        let content: Vec<Part> = api
            .predictions
            .into_iter()
            .map(|p| {
                let mime = p.mime_type.unwrap_or_else(|| "image/png".into());
                Part::media(
                    DataUri::from_base64(&mime, &p.bytes_base64_encoded),
                    Some(mime),
                )
            })
            .collect();

        let finish_reason = if content.is_empty() {
            FinishReason::Blocked
        } else {
            FinishReason::Stop
        };

        Ok(GenerateResponse {
            message: Message::new(Role::Model, content),
            finish_reason,
            usage: None,
            model: request.model,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        if is_imagen(&request.model) {
            return self.predict_image(request).await;
        }

        let body = Self::build_body(&request);
        debug!(
            provider = Self::NAME,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending generate request"
        );

        let response = self
            .post(&self.url(&request.model, "generateContent"), &body)
            .await?;
        let api: ApiResponse = response.json().await.map_err(parse_error)?;
        api.into_response(&request.model)
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<StreamReceiver, ProviderError> {
        if is_imagen(&request.model) {
            let response = self.predict_image(request).await?;
            let (tx, rx) = tokio::sync::mpsc::channel(2);
            let _ = tx.send(Ok(StreamEvent::Done(response))).await;
            return Ok(rx);
        }

        let body = Self::build_body(&request);
        let url = format!("{}?alt=sse", self.url(&request.model, "streamGenerateContent"));
        debug!(provider = Self::NAME, model = %request.model, "Sending streaming request");

        let response = self.post(&url, &body).await?;
        let model = request.model.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the SSE byte stream and forward parsed chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();
            let mut acc = StreamAccumulator::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in lines.push(&bytes) {
                    let api = match serde_json::from_str::<ApiResponse>(&data) {
                        Ok(api) => api,
                        Err(e) => {
                            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                            continue;
                        }
                    };

                    if let Some(chunk) = acc.absorb(api)
                        && tx.send(Ok(StreamEvent::Chunk(chunk))).await.is_err()
                    {
                        return; // receiver dropped
                    }
                }
            }

            let _ = tx.send(acc.finish(&model).map(StreamEvent::Done)).await;
        });

        Ok(rx)
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, ProviderError> {
        let model_path = format!("models/{}", bare_model(&request.model));
        let requests: Vec<Value> = request
            .inputs
            .iter()
            .map(|text| {
                json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        debug!(
            provider = Self::NAME,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self
            .post(
                &self.url(&request.model, "batchEmbedContents"),
                &json!({ "requests": requests }),
            )
            .await?;
        let api: EmbedApiResponse = response.json().await.map_err(parse_error)?;

        Ok(EmbedResponse {
            embeddings: api.embeddings.into_iter().map(|e| e.values).collect(),
            model: request.model,
        })
    }
}

/// Strip an optional `googleai/` (or any `provider/`) prefix.
fn bare_model(model: &str) -> &str {
    model.rsplit_once('/').map_or(model, |(_, name)| name)
}

fn is_imagen(model: &str) -> bool {
    bare_model(model).starts_with("imagen")
}

fn parse_error(e: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status_code: 200,
        message: format!("Failed to parse response: {e}"),
    }
}

/// Map non-success statuses to typed errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&error_body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or(error_body);

    warn!(status, message = %message, "Provider returned error");

    Err(match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(message),
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    })
}

/// Remove schema keywords the API does not accept, recursively.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

fn to_api_content(message: &Message) -> Value {
    let role = match message.role {
        Role::Model => "model",
        // Function responses travel in a user turn
        Role::User | Role::Tool | Role::System => "user",
    };
    let parts: Vec<Value> = message.content.iter().map(to_api_part).collect();
    json!({ "role": role, "parts": parts })
}

fn to_api_part(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::Media(media) => match DataUri::split(&media.url) {
            Some((mime, data)) => json!({
                "inlineData": { "mimeType": mime, "data": data }
            }),
            None => json!({
                "fileData": {
                    "mimeType": media.content_type.clone().unwrap_or_else(|| "image/png".into()),
                    "fileUri": media.url,
                }
            }),
        },
        Part::ToolRequest(req) => json!({
            "functionCall": { "name": req.name, "args": req.input }
        }),
        Part::ToolResponse(resp) => json!({
            "functionResponse": {
                "name": resp.name,
                "response": { "name": resp.name, "content": resp.output },
            }
        }),
    }
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some(
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
            | "IMAGE_SAFETY",
        ) => FinishReason::Blocked,
        Some("OTHER" | "LANGUAGE" | "MALFORMED_FUNCTION_CALL") => FinishReason::Other,
        _ => FinishReason::Unknown,
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ApiBlob>,
    #[serde(default)]
    function_call: Option<ApiFunctionCall>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl ApiResponse {
    fn usage(&self) -> Option<Usage> {
        self.usage_metadata.as_ref().map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
    }

    fn blocked(&self) -> Option<ProviderError> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .map(ProviderError::Blocked)
    }

    /// Convert the first candidate's parts, numbering tool requests from `next_ref`.
    fn take_parts(&mut self, next_ref: &mut usize) -> (Vec<Part>, Option<String>) {
        let Some(candidate) = self.candidates.first_mut() else {
            return (Vec::new(), None);
        };
        let parts = candidate
            .content
            .take()
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| from_api_part(p, next_ref))
            .collect();
        (parts, candidate.finish_reason.take())
    }

    fn into_response(mut self, model: &str) -> Result<GenerateResponse, ProviderError> {
        if self.candidates.is_empty() {
            return Err(self.blocked().unwrap_or(ProviderError::EmptyResponse));
        }
        let usage = self.usage();
        let mut next_ref = 0;
        let (content, finish) = self.take_parts(&mut next_ref);

        Ok(GenerateResponse {
            message: Message::new(Role::Model, content),
            finish_reason: map_finish_reason(finish.as_deref()),
            usage,
            model: self.model_version.unwrap_or_else(|| model.to_string()),
        })
    }
}

fn from_api_part(part: ApiPart, next_ref: &mut usize) -> Option<Part> {
    if let Some(call) = part.function_call {
        let ref_id = next_ref.to_string();
        *next_ref += 1;
        return Some(Part::ToolRequest(ToolRequest {
            ref_id: Some(ref_id),
            name: call.name,
            input: call.args,
        }));
    }
    if let Some(blob) = part.inline_data {
        return Some(Part::media(
            DataUri::from_base64(&blob.mime_type, &blob.data),
            Some(blob.mime_type),
        ));
    }
    part.text.filter(|t| !t.is_empty()).map(Part::Text)
}

#[derive(Debug, Deserialize)]
struct EmbedApiResponse {
    #[serde(default)]
    embeddings: Vec<EmbedValues>,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: String,
    #[serde(default)]
    mime_type: Option<String>,
}

// --- Streaming ---

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks is decoded whole.
#[derive(Debug, Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Append bytes and return every complete `data:` payload.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = match std::str::from_utf8(&raw[..line_end]) {
                Ok(line) => line.trim_end_matches('\r'),
                Err(e) => {
                    trace!(error = %e, "Skipping SSE line that is not UTF-8");
                    continue;
                }
            };

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                out.push(data.trim().to_string());
            }
        }
        out
    }
}

/// Builds the final response out of streamed partial responses.
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: Vec<Part>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    model_version: Option<String>,
    next_ref: usize,
    blocked: Option<ProviderError>,
}

impl StreamAccumulator {
    /// Fold one partial response in; returns the chunk to forward, if any.
    fn absorb(&mut self, mut api: ApiResponse) -> Option<StreamChunk> {
        if let Some(usage) = api.usage() {
            self.usage = Some(usage);
        }
        if api.model_version.is_some() {
            self.model_version = api.model_version.take();
        }
        if api.candidates.is_empty() {
            self.blocked = api.blocked();
            return None;
        }

        let (parts, finish) = api.take_parts(&mut self.next_ref);
        if finish.is_some() {
            self.finish_reason = finish;
        }
        if parts.is_empty() {
            return None;
        }

        for part in &parts {
            match (self.content.last_mut(), part) {
                (Some(Part::Text(prev)), Part::Text(next)) => prev.push_str(next),
                _ => self.content.push(part.clone()),
            }
        }

        Some(StreamChunk {
            index: 0,
            role: Role::Model,
            content: parts,
        })
    }

    fn finish(self, model: &str) -> Result<GenerateResponse, ProviderError> {
        if self.content.is_empty()
            && let Some(err) = self.blocked
        {
            return Err(err);
        }
        Ok(GenerateResponse {
            message: Message::new(Role::Model, self.content),
            finish_reason: map_finish_reason(self.finish_reason.as_deref()),
            usage: self.usage,
            model: self.model_version.unwrap_or_else(|| model.to_string()),
        })
    }
}
