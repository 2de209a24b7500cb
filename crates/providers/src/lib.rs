//! Model provider implementations for Flowdeck.
//!
//! All providers implement the `flowdeck_core::Provider` trait.
//! The router selects the correct provider from a model reference.

pub mod gemini;
pub mod router;

pub use gemini::GeminiProvider;
pub use router::{ModelRouter, build_from_config};
