//! Menu retrieval tool for the agentic RAG demo.

use async_trait::async_trait;
use flowdeck_core::document::Retriever;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::required_str;

pub struct MenuRagTool {
    retriever: Arc<dyn Retriever>,
    k: usize,
}

impl MenuRagTool {
    pub fn new(retriever: Arc<dyn Retriever>, k: usize) -> Self {
        Self { retriever, k }
    }
}

#[async_trait]
impl Tool for MenuRagTool {
    fn name(&self) -> &str {
        "menuRagTool"
    }

    fn description(&self) -> &str {
        "Use to retrieve information from the Grub Pub menu."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let query = required_str(self.name(), &input, "query")?;
        let docs = self
            .retriever
            .retrieve(query, self.k)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        tracing::debug!(query, hits = docs.len(), "Menu retrieval");
        let text: String = docs.iter().map(|d| format!("{}\n", d.text())).collect();
        Ok(json!(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::document::Document;
    use flowdeck_core::error::StoreError;

    struct FixedRetriever;

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Document>, StoreError> {
            Ok(["Fries: Crispy golden fries, lightly salted.", "Onion Rings: Thick-cut."]
                .iter()
                .take(k)
                .map(|t| Document::from_text(*t))
                .collect())
        }
    }

    #[tokio::test]
    async fn joins_documents_with_newlines() {
        let tool = MenuRagTool::new(Arc::new(FixedRetriever), 3);
        let out = tool
            .execute(&ToolContext::default(), json!({"query": "sides"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Fries: Crispy golden fries, lightly salted.\nOnion Rings: Thick-cut.\n"
        );
    }

    #[tokio::test]
    async fn honours_k() {
        let tool = MenuRagTool::new(Arc::new(FixedRetriever), 1);
        let out = tool
            .execute(&ToolContext::default(), json!({"query": "sides"}))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap().lines().count(), 1);
    }
}
