//! Parallel execution: independent generate calls run concurrently.

use async_trait::async_trait;
use flowdeck_core::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flow::{Flow, FlowContext, FlowSink, parse_input};

#[derive(Debug, Deserialize)]
struct MarketingCopyRequest {
    product: String,
}

#[derive(Debug, Serialize)]
struct MarketingCopy {
    name: String,
    tagline: String,
}

pub struct MarketingCopyFlow {
    ctx: FlowContext,
}

impl MarketingCopyFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }

    async fn ask(&self, prompt: String) -> Result<String, Error> {
        Ok(self.ctx.generate_default()?.prompt(prompt).run().await?.text())
    }
}

#[async_trait]
impl Flow for MarketingCopyFlow {
    fn name(&self) -> &str {
        "marketingCopyFlow"
    }

    async fn run(&self, input: Value, _sink: Option<FlowSink>) -> Result<Value, Error> {
        let req: MarketingCopyRequest = parse_input(self.name(), input)?;

        let (name, tagline) = tokio::join!(
            self.ask(format!(
                "Generate a creative name for a new product: {}.",
                req.product
            )),
            self.ask(format!(
                "Generate a catchy tagline for a new product: {}.",
                req.product
            )),
        );

        match (name, tagline) {
            (Ok(name), Ok(tagline)) => Ok(serde_json::to_value(MarketingCopy { name, tagline })?),
            (name, tagline) => {
                let errors: Vec<String> = [name.err(), tagline.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| e.to_string())
                    .collect();
                Err(Error::Internal(format!(
                    "failed to generate marketing copy: [{}]",
                    errors.join("; ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, test_context, text_response};
    use flowdeck_core::error::ProviderError;
    use flowdeck_core::provider::{GenerateRequest, GenerateResponse, Provider};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn name_and_tagline_from_separate_calls() {
        let provider = Arc::new(ScriptedProvider::with_handler(|req| {
            let prompt = req.messages[0].text();
            if prompt.contains("creative name") {
                text_response("Brewtopia")
            } else {
                text_response("Wake up to wonder.")
            }
        }));
        let flow = MarketingCopyFlow::new(test_context(provider.clone()));

        let out = flow.run(json!({"product": "smart kettle"}), None).await.unwrap();
        assert_eq!(out, json!({"name": "Brewtopia", "tagline": "Wake up to wonder."}));
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn any_failure_fails_the_flow() {
        let ctx = test_context(Arc::new(ScriptedProvider::new(vec![])));
        let mut router = ctx.router.clone();
        router.register("googleai", Arc::new(FailingProvider));
        let flow = MarketingCopyFlow::new(FlowContext { router, ..ctx });

        let err = flow.run(json!({"product": "kettle"}), None).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to generate marketing copy"));
        assert_eq!(msg.matches("quota").count(), 2);
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "googleai"
        }
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            Err(ProviderError::ApiError {
                status_code: 500,
                message: "quota".into(),
            })
        }
    }
}
