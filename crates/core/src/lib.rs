//! # Flowdeck Core
//!
//! Domain types, traits, and error definitions shared by every Flowdeck crate.
//! This crate has no HTTP or model-vendor dependencies; it defines the model
//! that providers, tools, stores and flows implement against.
//!
//! Every seam is a trait here (`Provider`, `Tool`, `Retriever`, `Indexer`),
//! so flows can be tested against scripted providers and in-memory stores.

pub mod document;
pub mod error;
pub mod event;
pub mod media;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use document::{Document, Indexer, Retriever};
pub use error::{Error, FlowError, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use media::DataUri;
pub use message::{Media, Message, Part, Role, ToolRequest, ToolResponse};
pub use provider::{
    EmbedRequest, EmbedResponse, FinishReason, GenerateRequest, GenerateResponse,
    GenerationConfig, Modality, Provider, StreamChunk, StreamEvent, StreamReceiver,
    ToolDefinition, Usage,
};
pub use tool::{Tool, ToolContext, ToolRegistry};
