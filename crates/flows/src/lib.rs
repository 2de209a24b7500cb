//! Flowdeck flows: generate calls composed into small agentic demos.
//!
//! Every flow takes a JSON input and returns a JSON output; streaming flows
//! additionally push chunks to a [`FlowSink`] while they run.
//!
//! The building blocks are:
//!
//! - [`Generate`]: one model call with an optional tool loop
//! - [`StructuredOutput`]: schema-typed answers
//! - [`repair_partial_json`]: readable progress from streamed JSON
//! - [`FlowRegistry`]: name → flow lookup used by the gateway and CLI

pub mod canvas;
pub mod chatbot;
pub mod eli5;
pub mod emoji;
pub mod flow;
pub mod generate;
pub mod partial_json;
pub mod patterns;
pub mod structured;

#[cfg(test)]
pub(crate) mod test_helpers;

use flowdeck_memory::InMemoryHistory;
use std::sync::Arc;

pub use flow::{Flow, FlowContext, FlowInfo, FlowRegistry, FlowSink, parse_input};
pub use generate::{Generate, GenerateOutput, Interrupt};
pub use partial_json::repair_partial_json;
pub use structured::{StructuredOutput, parse_output};

/// Register every flow over one shared context.
pub fn default_flows(ctx: &FlowContext) -> FlowRegistry {
    use patterns::*;

    let mut registry = FlowRegistry::new(ctx.events.clone());
    let flows: Vec<Arc<dyn Flow>> = vec![
        Arc::new(StoryWriterFlow::new(ctx.clone())),
        Arc::new(ImageGeneratorFlow::new(ctx.clone())),
        Arc::new(RouterFlow::new(ctx.clone())),
        Arc::new(MarketingCopyFlow::new(ctx.clone())),
        Arc::new(ToolCallingFlow::new(ctx.clone())),
        Arc::new(AgenticRagFlow::new(ctx.clone())),
        Arc::new(IndexMenuFlow::new(ctx.clone())),
        Arc::new(IterativeRefinementFlow::new(ctx.clone())),
        Arc::new(ResearchAgentFlow::new(ctx.clone())),
        Arc::new(StatefulChatFlow::new(ctx.clone(), Arc::new(InMemoryHistory::new()))),
        Arc::new(chatbot::ChatFlow::new(ctx.clone())),
        Arc::new(chatbot::GetHistoryFlow::new(ctx.clone())),
        Arc::new(canvas::CanvasAgentFlow::new(ctx.clone())),
        Arc::new(eli5::CartoonifyFlow::new(ctx.clone())),
        Arc::new(eli5::IllustrateFlow::new(ctx.clone())),
        Arc::new(eli5::StorifyFlow::new(ctx.clone())),
        Arc::new(emoji::ApplyEmojiExpressionFlow::new(ctx.clone())),
    ];
    for flow in flows {
        registry.register(flow);
    }
    registry
}
