//! Weather tool: canned answer for the tool-calling demo.

use async_trait::async_trait;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};

use crate::required_str;

pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn description(&self) -> &str {
        "Get the current weather in a given location."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city or place to get the weather for"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let location = required_str(self.name(), &input, "location")?;
        Ok(json!(format!("The weather in {location} is 75°F and sunny.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_canned_weather() {
        let out = GetWeatherTool
            .execute(&ToolContext::default(), json!({"location": "Tokyo"}))
            .await
            .unwrap();
        assert_eq!(out, "The weather in Tokyo is 75°F and sunny.");
    }

    #[tokio::test]
    async fn missing_location_is_invalid() {
        let err = GetWeatherTool
            .execute(&ToolContext::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
