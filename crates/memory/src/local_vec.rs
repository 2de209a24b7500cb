//! Local vector store: embeds documents through a provider and keeps the
//! vectors in memory, optionally persisted as one JSON file per index.
//!
//! Documents are keyed by the SHA-256 of their text, so indexing the same
//! content twice is a no-op. The persistence file is `__db_<index>.json`
//! holding a `{id: {doc, embedding}}` map.

use async_trait::async_trait;
use flowdeck_core::document::{Document, Indexer, Retriever};
use flowdeck_core::error::StoreError;
use flowdeck_core::provider::{EmbedRequest, Provider};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::vector::{VectorEntry, rank_by_similarity};

/// An embedding-backed document index.
pub struct LocalVectorStore {
    index_name: String,
    embedder: Arc<dyn Provider>,
    embed_model: String,
    entries: RwLock<BTreeMap<String, VectorEntry>>,
    persist_path: Option<PathBuf>,
}

impl LocalVectorStore {
    /// Create an empty, memory-only store.
    pub fn new(
        index_name: impl Into<String>,
        embedder: Arc<dyn Provider>,
        embed_model: impl Into<String>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            embedder,
            embed_model: embed_model.into(),
            entries: RwLock::new(BTreeMap::new()),
            persist_path: None,
        }
    }

    /// Persist the index under `dir`, loading whatever is already there.
    pub fn with_persist_dir(mut self, dir: &Path) -> Self {
        let path = dir.join(format!("__db_{}.json", self.index_name));
        let entries = Self::load_from_disk(&path);
        info!(path = %path.display(), count = entries.len(), "Vector index loaded");
        self.entries = RwLock::new(entries);
        self.persist_path = Some(path);
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stable id for a document's content.
    pub fn document_id(doc: &Document) -> String {
        let digest = Sha256::digest(doc.text().as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, VectorEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(), // Not created yet
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring corrupted vector index");
            BTreeMap::new()
        })
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let content = {
            let entries = self.entries.read().await;
            serde_json::to_string(&*entries)
                .map_err(|e| StoreError::Storage(format!("Failed to serialize index: {e}")))?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create index directory: {e}"))
            })?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write index file: {e}")))
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, StoreError> {
        let expected = inputs.len();
        let response = self
            .embedder
            .embed(EmbedRequest {
                model: self.embed_model.clone(),
                inputs,
            })
            .await
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(StoreError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl Indexer for LocalVectorStore {
    async fn index(&self, documents: Vec<Document>) -> Result<usize, StoreError> {
        let mut pending: Vec<(String, Document)> = Vec::new();
        {
            let entries = self.entries.read().await;
            for doc in documents {
                let id = Self::document_id(&doc);
                if !entries.contains_key(&id) && !pending.iter().any(|(p, _)| *p == id) {
                    pending.push((id, doc));
                }
            }
        }

        if pending.is_empty() {
            debug!(index = %self.index_name, "Nothing new to index");
            return Ok(0);
        }

        let embeddings = self
            .embed(pending.iter().map(|(_, d)| d.text()).collect())
            .await?;

        let added = pending.len();
        {
            let mut entries = self.entries.write().await;
            for ((id, mut doc), embedding) in pending.into_iter().zip(embeddings) {
                doc.id = Some(id.clone());
                entries.insert(id, VectorEntry { doc, embedding });
            }
        }
        self.flush().await?;

        info!(index = %self.index_name, added, "Indexed documents");
        Ok(added)
    }
}

#[async_trait]
impl Retriever for LocalVectorStore {
    fn name(&self) -> &str {
        &self.index_name
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>, StoreError> {
        if self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embed(vec![query.to_string()])
            .await?
            .pop()
            .unwrap_or_default();

        let entries = self.entries.read().await;
        let ranked = rank_by_similarity(entries.values(), &query_embedding, k);
        debug!(
            index = %self.index_name,
            query,
            hits = ranked.len(),
            top_score = ranked.first().map(|(s, _)| *s),
            "Retrieved documents"
        );
        Ok(ranked.into_iter().map(|(_, doc)| doc).collect())
    }
}
