//! Agentic pattern flows.
//!
//! Each module demonstrates one way of composing generate calls:
//!
//! 1. **Sequential**: one call's output is the next call's input
//! 2. **Routing**: classify first, then dispatch to a specialised prompt
//! 3. **Parallel**: independent calls run concurrently and are joined
//! 4. **Tool calling**: the model decides when to call a tool
//! 5. **Agentic RAG**: retrieval exposed to the model as a tool
//! 6. **Iterative refinement**: evaluator/optimizer loop
//! 7. **Autonomous**: multi-turn agent that can interrupt for user input
//! 8. **Stateful**: conversation history persisted per session

pub mod autonomous;
pub mod parallel;
pub mod rag;
pub mod refinement;
pub mod routing;
pub mod sequential;
pub mod stateful;
pub mod tool_calling;

pub use autonomous::ResearchAgentFlow;
pub use parallel::MarketingCopyFlow;
pub use rag::{AgenticRagFlow, IndexMenuFlow, MENU_ITEMS};
pub use refinement::IterativeRefinementFlow;
pub use routing::RouterFlow;
pub use sequential::{ImageGeneratorFlow, StoryWriterFlow};
pub use stateful::StatefulChatFlow;
pub use tool_calling::ToolCallingFlow;
