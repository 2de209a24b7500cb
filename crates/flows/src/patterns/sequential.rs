//! Sequential processing: the output of one generate call feeds the next.

use async_trait::async_trait;
use flowdeck_core::error::{Error, FlowError};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};
use crate::structured::StructuredOutput;

#[derive(Debug, Deserialize)]
struct StoryWriterRequest {
    topic: String,
}

#[derive(Debug, Deserialize)]
struct StoryIdea {
    idea: String,
}

impl StructuredOutput for StoryIdea {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "idea": {"type": "string", "description": "A short, compelling story concept"}
            },
            "required": ["idea"]
        })
    }
}

/// Comes up with a story idea, then writes its opening paragraph.
pub struct StoryWriterFlow {
    ctx: FlowContext,
}

impl StoryWriterFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for StoryWriterFlow {
    fn name(&self) -> &str {
        "storyWriterFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: StoryWriterRequest = parse_input(self.name(), input)?;

        let (idea, _) = self
            .ctx
            .generate_default()?
            .prompt(format!("Generate a unique story idea about a {}.", req.topic))
            .generate_data::<StoryIdea>()
            .await?;

        let story = self
            .ctx
            .generate_default()?
            .prompt(format!(
                "Write the opening paragraph for a story based on this idea: {}",
                idea.idea
            ))
            .run()
            .await?;
        Ok(Value::String(story.text()))
    }
}

#[derive(Debug, Deserialize)]
struct ImageGeneratorRequest {
    concept: String,
}

/// Has a text model write an image prompt, then renders it with Imagen.
pub struct ImageGeneratorFlow {
    ctx: FlowContext,
}

impl ImageGeneratorFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for ImageGeneratorFlow {
    fn name(&self) -> &str {
        "imageGeneratorFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: ImageGeneratorRequest = parse_input(self.name(), input)?;

        let image_prompt = self
            .ctx
            .generate_default()?
            .prompt(format!(
                "Create a detailed, artistic prompt for an image generation model. The concept is: \"{}\".",
                req.concept
            ))
            .run()
            .await?
            .text();

        let image = self
            .ctx
            .generate(&self.ctx.models.imagen)?
            .prompt(image_prompt)
            .run()
            .await?;

        match image.media() {
            Some(media) => Ok(Value::String(media.url.clone())),
            None => Err(FlowError::NoMedia("did not generate an image".into()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, media_response, test_context, text_response};
    use std::sync::Arc;

    #[tokio::test]
    async fn story_uses_generated_idea() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(r#"{"idea": "A dragon who is afraid of fire"}"#),
            text_response("Ember had always hated sparks."),
        ]));
        let flow = StoryWriterFlow::new(test_context(provider.clone()));

        let out = flow.run(json!({"topic": "dragon"}), None).await.unwrap();
        assert_eq!(out, json!("Ember had always hated sparks."));

        let requests = provider.requests();
        assert_eq!(
            requests[0].messages[0].text(),
            "Generate a unique story idea about a dragon."
        );
        assert!(requests[0].output_schema.is_some());
        assert!(requests[1].messages[0].text().ends_with("A dragon who is afraid of fire"));
    }

    #[tokio::test]
    async fn image_flow_returns_media_url() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("An oil painting of a lighthouse"),
            media_response("data:image/png;base64,AAAA"),
        ]));
        let flow = ImageGeneratorFlow::new(test_context(provider.clone()));

        let out = flow.run(json!({"concept": "lighthouse"}), None).await.unwrap();
        assert_eq!(out, json!("data:image/png;base64,AAAA"));
        assert_eq!(provider.requests()[1].model, "imagen-3.0-generate-002");
    }

    #[tokio::test]
    async fn image_flow_without_media_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("prompt"),
            text_response("I can't draw"),
        ]));
        let flow = ImageGeneratorFlow::new(test_context(provider));
        let err = flow.run(json!({"concept": "x"}), None).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::NoMedia(_))));
    }

    #[tokio::test]
    async fn missing_topic_is_invalid_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let flow = StoryWriterFlow::new(test_context(provider));
        let err = flow.run(json!({"subject": "x"}), None).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::InvalidInput(_))));
    }
}
