//! Apply an emoji's expression to a selfie.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use flowdeck_core::media::DataUri;
use flowdeck_core::message::Part;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eli5::{generated_image, media_part, text_and_image};
use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationMode {
    /// Keep the person's face, change only the expression.
    Realistic,
    /// Anything goes.
    #[default]
    Silly,
}

impl TransformationMode {
    fn prompt(self, emoji: &str) -> String {
        match self {
            TransformationMode::Silly => format!(
                "Transform the user's face in a silly, fun, and exaggerated way based on this emoji: {emoji}. Be very literal. For example, if the emoji is a piece of broccoli, you could replace the person's head with broccoli. If it's a crying face, make tears stream like a waterfall. Go overboard and be creative!"
            ),
            TransformationMode::Realistic => format!(
                "Subtly modify the user's facial expression to match the emotion of this emoji: {emoji}. It is very important to keep the original person's face and features mostly intact, but change their expression (mouth, eyes, eyebrows) to look like the emoji. The result should look like a real photo of the person making that face. If the emoji has additional objects on the face, add a realistic version of those objects. For example the emoji of a cowboy with hat face should add a realistic cowboy hat to the person's head."
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyEmojiExpressionRequest {
    selfie_data_uri: String,
    emoji: String,
    #[serde(default)]
    transformation_mode: TransformationMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyEmojiExpressionResponse {
    modified_image_data_uri: String,
}

pub struct ApplyEmojiExpressionFlow {
    ctx: FlowContext,
}

impl ApplyEmojiExpressionFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for ApplyEmojiExpressionFlow {
    fn name(&self) -> &str {
        "applyEmojiExpressionFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: ApplyEmojiExpressionRequest = parse_input(self.name(), input)?;
        DataUri::parse(&req.selfie_data_uri)?;

        let output = self
            .ctx
            .generate(&self.ctx.models.image)?
            .config(text_and_image())
            .prompt_parts(vec![
                media_part(&req.selfie_data_uri),
                Part::text(req.transformation_mode.prompt(&req.emoji)),
            ])
            .run()
            .await?;

        let modified_image_data_uri =
            generated_image(&output, "No media returned from the image generation model.")?;
        Ok(serde_json::to_value(ApplyEmojiExpressionResponse {
            modified_image_data_uri,
        })?)
    }
}
