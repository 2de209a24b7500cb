//! Documents and the retrieval traits behind RAG flows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::Part;

/// A unit of indexed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Set by the indexer when the document is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub content: Vec<Part>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            content: vec![Part::text(text)],
            metadata: serde_json::Map::new(),
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Finds the documents most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `k` documents, most relevant first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>, StoreError>;
}

/// Adds documents to an index.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn index(&self, documents: Vec<Document>) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_text() {
        let doc = Document::from_text("Fries: Crispy golden fries, lightly salted.");
        assert!(doc.text().starts_with("Fries"));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["content"][0]["text"], doc.text());
    }
}
