//! Flow trait, flow registry and the shared context flows are built from.

use async_trait::async_trait;
use chrono::Utc;
use flowdeck_config::{AppConfig, FlowsConfig, ModelsConfig};
use flowdeck_core::document::{Indexer, Retriever};
use flowdeck_core::error::{Error, FlowError};
use flowdeck_core::event::{DomainEvent, EventBus};
use flowdeck_core::tool::ToolRegistry;
use flowdeck_memory::{HistoryStore, InMemoryHistory, LocalVectorStore};
use flowdeck_providers::{ModelRouter, build_from_config};
use flowdeck_tools::{ArtifactManager, artifact_manager_from_config, default_registry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::generate::Generate;

/// Receives streamed chunks from a running flow.
#[derive(Debug, Clone)]
pub struct FlowSink {
    tx: mpsc::UnboundedSender<Value>,
}

impl FlowSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send one chunk. Dropped silently once the client has gone away.
    pub fn send(&self, chunk: impl Serialize) {
        match serde_json::to_value(chunk) {
            Ok(value) => {
                let _ = self.tx.send(value);
            }
            Err(e) => warn!(error = %e, "Dropping unserializable stream chunk"),
        }
    }
}

/// A named, runnable flow.
#[async_trait]
pub trait Flow: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the flow sends chunks while it runs.
    fn streams(&self) -> bool {
        false
    }

    async fn run(&self, input: Value, sink: Option<FlowSink>) -> Result<Value, Error>;
}

/// Deserialize a flow's input.
pub fn parse_input<T: DeserializeOwned>(flow: &str, input: Value) -> Result<T, Error> {
    serde_json::from_value(input)
        .map_err(|e| FlowError::InvalidInput(format!("{flow}: {e}")).into())
}

/// Shared dependencies every flow is built from.
#[derive(Clone)]
pub struct FlowContext {
    pub router: ModelRouter,
    pub tools: Arc<ToolRegistry>,
    pub models: ModelsConfig,
    pub settings: FlowsConfig,
    /// Chat session history.
    pub history: Arc<dyn HistoryStore>,
    pub menu_index: Arc<dyn Indexer>,
    pub artifacts: Arc<dyn ArtifactManager>,
    pub events: Arc<EventBus>,
}

impl FlowContext {
    /// Wire providers, stores and tools from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = build_from_config(config)?;

        let (embedder, embed_model) = router.resolve(&config.models.embedder)?;
        let mut store = LocalVectorStore::new(&config.rag.index_name, embedder, embed_model);
        if let Some(dir) = &config.rag.persist_dir {
            store = store.with_persist_dir(dir);
        }
        let store = Arc::new(store);

        let artifacts = artifact_manager_from_config(&config.canvas);
        let retriever: Arc<dyn Retriever> = store.clone();
        let tools = default_registry(retriever, config.flows.retriever_k, artifacts.clone());

        Ok(Self {
            router,
            tools: Arc::new(tools),
            models: config.models.clone(),
            settings: config.flows.clone(),
            history: Arc::new(InMemoryHistory::new()),
            menu_index: store,
            artifacts,
            events: Arc::new(EventBus::default()),
        })
    }

    /// Start a generate call on `model_ref` with this context's tools.
    pub fn generate(&self, model_ref: &str) -> Result<Generate, Error> {
        let (provider, model) = self.router.resolve(model_ref)?;
        Ok(Generate::new(provider, model)
            .registry(self.tools.clone())
            .max_turns(self.settings.max_turns)
            .events(self.events.clone()))
    }

    /// Generate on the default model.
    pub fn generate_default(&self) -> Result<Generate, Error> {
        self.generate(&self.models.default)
    }
}

/// Name and streaming mode of a registered flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowInfo {
    pub name: String,
    pub streams: bool,
}

/// All flows, by name.
#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<dyn Flow>>,
    events: Arc<EventBus>,
}

impl FlowRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            flows: HashMap::new(),
            events,
        }
    }

    /// Register a flow. Replaces any existing flow with the same name.
    pub fn register(&mut self, flow: Arc<dyn Flow>) {
        self.flows.insert(flow.name().to_string(), flow);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Flow>> {
        self.flows.get(name).cloned()
    }

    /// Registered flows, sorted by name.
    pub fn list(&self) -> Vec<FlowInfo> {
        let mut flows: Vec<FlowInfo> = self
            .flows
            .values()
            .map(|f| FlowInfo {
                name: f.name().to_string(),
                streams: f.streams(),
            })
            .collect();
        flows.sort_by(|a, b| a.name.cmp(&b.name));
        flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Run a flow by name.
    pub async fn run(&self, name: &str, input: Value, sink: Option<FlowSink>) -> Result<Value, Error> {
        let flow = self
            .get(name)
            .ok_or_else(|| FlowError::NotFound(name.to_string()))?;

        info!(flow = name, streaming = sink.is_some(), "Running flow");
        self.events.publish(DomainEvent::FlowStarted {
            flow: name.to_string(),
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let result = flow.run(input, sink).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            warn!(flow = name, error = %e, "Flow failed");
            self.events.publish(DomainEvent::ErrorOccurred {
                context: format!("flow:{name}"),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
        self.events.publish(DomainEvent::FlowCompleted {
            flow: name.to_string(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });
        info!(flow = name, duration_ms, success = result.is_ok(), "Flow finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Flow for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn run(&self, input: Value, sink: Option<FlowSink>) -> Result<Value, Error> {
            if let Some(sink) = sink {
                sink.send(json!("chunk"));
            }
            Ok(input)
        }
    }

    #[tokio::test]
    async fn runs_registered_flow_and_publishes_events() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let mut registry = FlowRegistry::new(events);
        registry.register(Arc::new(Echo));

        let (sink, mut chunks) = FlowSink::channel();
        let out = registry.run("echo", json!({"x": 1}), Some(sink)).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
        assert_eq!(chunks.recv().await.unwrap(), json!("chunk"));

        assert!(matches!(*rx.recv().await.unwrap(), DomainEvent::FlowStarted { .. }));
        assert!(matches!(
            *rx.recv().await.unwrap(),
            DomainEvent::FlowCompleted { success: true, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_flow_is_not_found() {
        let registry = FlowRegistry::default();
        let err = registry.run("missing", json!({}), None).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::NotFound(_))));
        assert_eq!(err.status(), "NOT_FOUND");
    }

    #[test]
    fn parse_input_maps_to_invalid_input() {
        #[derive(Debug, serde::Deserialize)]
        struct Req {
            #[allow(dead_code)]
            topic: String,
        }
        let err = parse_input::<Req>("storyWriterFlow", json!({})).unwrap_err();
        assert_eq!(err.status(), "INVALID_ARGUMENT");
    }
}
