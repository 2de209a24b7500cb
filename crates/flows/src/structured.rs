//! Structured output: schemas for typed model answers and lenient parsing.

use flowdeck_core::error::{Error, FlowError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::partial_json::repair_partial_json;

/// A type the model can be asked to produce as JSON.
pub trait StructuredOutput: DeserializeOwned {
    /// JSON Schema sent with the request.
    fn schema() -> Value;
}

/// Parse model text as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_output<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    let body = strip_code_fence(text);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => repair_partial_json(body)
            .ok_or_else(|| FlowError::OutputParse(format!("response is not JSON: {e}")))?,
    };
    serde_json::from_value(value).map_err(|e| FlowError::OutputParse(e.to_string()).into())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
