//! "Explain like I'm five" storybooks.
//!
//! `cartoonify` turns a selfie into a cartoon character, `storify` researches
//! a question and streams a short illustrated lesson, and `illustrate`
//! draws one page starring the user.

use async_trait::async_trait;
use flowdeck_core::error::{Error, FlowError};
use flowdeck_core::media::DataUri;
use flowdeck_core::message::Part;
use flowdeck_core::provider::{GenerationConfig, Modality};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};
use crate::generate::GenerateOutput;
use crate::partial_json::repair_partial_json;
use crate::structured::StructuredOutput;

const LESSON_PROMPT: &str = r#"You are an app that helps people understand complex concepts in a simple and fun way. The user has a question that they want explained in an engaging way. Your task is:

1. Search Google to get an accurate and grounded picture of the topic at hand.
2. Generate a "lesson plan" that accurately and approachably explains the core concepts of the lesson.
3. Break the lesson down into no more than 10 key ideas. Make sure to include details that could be turned into nice illustrations.

User question: "#;

const STORYBOOK_PROMPT: &str = r#"You are an app that helps people understand complex concepts in a simple and fun way. The user has a question that they want explained in an engaging way. A lesson plan has already been generated and included below. Your task is to generate up to 10 pages of a simple "storybook lesson" that explains the subject. Each page should include 1-2 paragraphs and a detailed description of an illustration to accompany it.

Illustration descriptions will be generated using an image model starring the user as a cartoon character. Use 'USER' in the image description to incorporate them in. For example: "USER is riding a jeep through the African Serengeti, pointing at a galloping herd of wildebeests." ONLY use USER in image descriptions, not in titles or page text. ONLY include the user when the image might need a stand-in for a person, many pages will not require it. Try to include USER in the first page's illustration.

Your explanations should be approachable, fun, and easy to understand. Write in a simple and clear manner an adult would like to read using concepts that are simple and universal. You should cover all of the most important parts of the topic but you need to keep it short - no more than 10 pages.

=== LESSON ===

"#;

const CARTOONIFY_PROMPT: &str = "Transform the person in the following image into a full-body cartoon character in a neutral pose. The background should be white.";

const STATUS_RESEARCHING: &str = "Researching topic...";
const STATUS_RESEARCH_DONE: &str = "Research complete, generating lesson...";
const STATUS_GENERATING: &str = "Generating lesson storybook...";

/// Ask an image model for both text and image output.
pub(crate) fn text_and_image() -> GenerationConfig {
    GenerationConfig {
        response_modalities: vec![Modality::Text, Modality::Image],
        ..Default::default()
    }
}

/// A media part, typed from the URI when it is a `data:` URI.
pub(crate) fn media_part(url: &str) -> Part {
    let content_type = DataUri::split(url).map(|(mime, _)| mime.to_string());
    Part::media(url, content_type)
}

/// The first generated image, or `NoMedia`.
pub(crate) fn generated_image(output: &GenerateOutput, failure: &str) -> Result<String, Error> {
    output
        .media()
        .map(|m| m.url.clone())
        .ok_or_else(|| FlowError::NoMedia(failure.to_string()).into())
}

#[derive(Debug, Deserialize)]
struct CartoonifyRequest {
    /// Data URI of a photo of a person.
    image: String,
}

pub struct CartoonifyFlow {
    ctx: FlowContext,
}

impl CartoonifyFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for CartoonifyFlow {
    fn name(&self) -> &str {
        "cartoonify"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: CartoonifyRequest = parse_input(self.name(), input)?;
        let output = self
            .ctx
            .generate(&self.ctx.models.image)?
            .config(text_and_image())
            .prompt_parts(vec![Part::text(CARTOONIFY_PROMPT), media_part(&req.image)])
            .run()
            .await?;
        Ok(Value::String(generated_image(&output, "Image generation failed.")?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IllustrateRequest {
    user_image: String,
    illustration: String,
    question: String,
}

pub struct IllustrateFlow {
    ctx: FlowContext,
}

impl IllustrateFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for IllustrateFlow {
    fn name(&self) -> &str {
        "illustrate"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: IllustrateRequest = parse_input(self.name(), input)?;
        let instructions = format!(
            "You are illustrating a page in an educational storybook for a child. The story is about the question \"{}\". Generate the illustration described below in a friendly cartoon style. ONLY illustrate exactly what is described below. The illustration should be colorful with full-image backgrounds.\n\n{}",
            req.question, req.illustration
        );
        let output = self
            .ctx
            .generate(&self.ctx.models.image)?
            .config(text_and_image())
            .prompt_parts(vec![
                Part::text("[USER]:\n"),
                media_part(&req.user_image),
                Part::text(instructions),
            ])
            .run()
            .await?;
        Ok(Value::String(generated_image(&output, "Image generation failed.")?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-2 paragraphs explaining a key concept.
    #[serde(default)]
    pub text: String,
    /// Description of the image for this page.
    #[serde(default)]
    pub illustration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storybook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Page>>,
}

impl Storybook {
    fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }
}

impl StructuredOutput for Storybook {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "description": "do not fill this in"},
                "bookTitle": {"type": "string", "description": "a fun title for the lesson"},
                "pages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": {
                                "type": "string",
                                "description": "1-2 paragraphs of text explaining a key concept or idea about the subject"
                            },
                            "illustration": {
                                "type": "string",
                                "description": "a detailed description of the image that should accompany the text for this page of the lesson"
                            }
                        },
                        "required": ["text", "illustration"]
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct StorifyRequest {
    question: String,
}

/// Researches the question, then streams the storybook page by page.
pub struct StorifyFlow {
    ctx: FlowContext,
}

impl StorifyFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for StorifyFlow {
    fn name(&self) -> &str {
        "storify"
    }

    fn streams(&self) -> bool {
        true
    }

    async fn run(&self, input: Value, sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: StorifyRequest = parse_input(self.name(), input)?;
        let update = |book: Storybook| {
            if let Some(sink) = &sink {
                sink.send(book);
            }
        };

        update(Storybook::status(STATUS_RESEARCHING));
        let lesson = self
            .ctx
            .generate(&self.ctx.models.pro)?
            .config(GenerationConfig {
                temperature: Some(0.3),
                google_search: true,
                ..Default::default()
            })
            .prompt(format!("{LESSON_PROMPT}{}", req.question))
            .run()
            .await?
            .text();
        debug!(chars = lesson.len(), "Lesson researched");
        update(Storybook::status(STATUS_RESEARCH_DONE));

        let mut generate = self
            .ctx
            .generate_default()?
            .prompt(format!("{STORYBOOK_PROMPT}{lesson}"));
        if let Some(sink) = sink.clone() {
            let mut aggregated = String::new();
            generate = generate.on_chunk(move |chunk| {
                aggregated.push_str(&chunk.text());
                let Some(partial) = repair_partial_json(&aggregated) else {
                    return;
                };
                let mut book: Storybook = serde_json::from_value(partial).unwrap_or_default();
                book.status = Some(STATUS_GENERATING.to_string());
                sink.send(book);
            });
        }

        let (storybook, _) = generate.generate_data::<Storybook>().await?;
        Ok(serde_json::to_value(storybook)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, media_response, test_context, text_response};
    use flowdeck_core::provider::StreamChunk;
    use flowdeck_core::provider::{GenerateRequest, GenerateResponse, Provider, StreamEvent, StreamReceiver};
    use flowdeck_core::error::ProviderError;
    use flowdeck_core::message::{Message, Role};
    use std::sync::Arc;

    const SELFIE: &str = "data:image/jpeg;base64,/9j/4AAQ";

    #[tokio::test]
    async fn cartoonify_sends_photo_and_returns_image() {
        let provider = Arc::new(ScriptedProvider::new(vec![media_response(
            "data:image/png;base64,CARTOON",
        )]));
        let out = CartoonifyFlow::new(test_context(provider.clone()))
            .run(json!({"image": SELFIE}), None)
            .await
            .unwrap();
        assert_eq!(out, json!("data:image/png;base64,CARTOON"));

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gemini-2.5-flash-image-preview");
        assert_eq!(request.config.response_modalities, vec![Modality::Text, Modality::Image]);
        let media = request.messages[0].media().unwrap();
        assert_eq!(media.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn illustrate_without_image_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("no picture")]));
        let err = IllustrateFlow::new(test_context(provider.clone()))
            .run(
                json!({"userImage": SELFIE, "illustration": "USER on the moon", "question": "Why is the moon grey?"}),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::NoMedia(_))));

        let parts = &provider.requests()[0].messages[0].content;
        assert_eq!(parts.len(), 3);
        assert!(parts[2].as_text().unwrap().contains("\"Why is the moon grey?\""));
    }

    /// Streams a canned storybook in small pieces.
    struct StorybookStreamer {
        inner: ScriptedProvider,
    }

    #[async_trait]
    impl Provider for StorybookStreamer {
        fn name(&self) -> &str {
            "googleai"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            self.inner.generate(request).await
        }

        async fn generate_stream(&self, request: GenerateRequest) -> Result<StreamReceiver, ProviderError> {
            let full = self.inner.generate(request).await?;
            let text = full.message.text();
            let (tx, rx) = tokio::sync::mpsc::channel(16);
            let pieces: Vec<String> = text
                .as_bytes()
                .chunks(20)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect();
            for piece in pieces {
                let _ = tx
                    .send(Ok(StreamEvent::Chunk(StreamChunk {
                        index: 0,
                        role: Role::Model,
                        content: vec![Part::text(piece)],
                    })))
                    .await;
            }
            let _ = tx.send(Ok(StreamEvent::Done(full))).await;
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn storify_streams_partial_books() {
        let book = r#"{"bookTitle": "Why the Sky is Blue", "pages": [{"text": "Sunlight is made of colors.", "illustration": "USER holding a prism"}]}"#;
        let scripted = ScriptedProvider::new(vec![
            text_response("Lesson: Rayleigh scattering."),
            GenerateResponse {
                message: Message::model(book),
                ..text_response("")
            },
        ]);
        let provider = Arc::new(StorybookStreamer { inner: scripted });
        let mut ctx = test_context(Arc::new(ScriptedProvider::new(vec![])));
        ctx.router.register("googleai", provider.clone());

        let (sink, mut chunks) = FlowSink::channel();
        let out = StorifyFlow::new(ctx)
            .run(json!({"question": "Why is the sky blue?"}), Some(sink))
            .await
            .unwrap();

        let expected: Storybook = serde_json::from_str(book).unwrap();
        assert_eq!(serde_json::from_value::<Storybook>(out).unwrap(), expected);

        let mut received = Vec::new();
        while let Ok(chunk) = chunks.try_recv() {
            received.push(serde_json::from_value::<Storybook>(chunk).unwrap());
        }
        assert_eq!(received[0].status.as_deref(), Some(STATUS_RESEARCHING));
        assert_eq!(received[1].status.as_deref(), Some(STATUS_RESEARCH_DONE));
        let streamed = &received[2..];
        assert!(streamed.len() > 2);
        assert!(streamed.iter().all(|b| b.status.as_deref() == Some(STATUS_GENERATING)));
        assert_eq!(streamed.last().unwrap().pages, expected.pages);

        let requests = provider.inner.requests();
        assert_eq!(requests[0].model, "gemini-2.5-pro");
        assert!(requests[0].config.google_search);
        assert_eq!(requests[0].config.temperature, Some(0.3));
        assert!(requests[1].output_schema.is_some());
        assert!(requests[1].messages[0].text().ends_with("Lesson: Rayleigh scattering."));
    }
}
