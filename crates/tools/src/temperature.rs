//! Temperature conversion between Celsius and Fahrenheit.

use async_trait::async_trait;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::{Tool, ToolContext};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy)]
enum Unit {
    Celsius,
    Fahrenheit,
}

impl Unit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "celsius" | "c" => Some(Unit::Celsius),
            "fahrenheit" | "f" => Some(Unit::Fahrenheit),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ConversionInput {
    temperature: f64,
    from: String,
    to: String,
}

/// Convert `value` between the named units.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, String> {
    let (Some(from), Some(to)) = (Unit::parse(from), Unit::parse(to)) else {
        return Err("invalid temperature conversion units".into());
    };
    Ok(match (from, to) {
        (Unit::Celsius, Unit::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
        (Unit::Fahrenheit, Unit::Celsius) => (value - 32.0) * 5.0 / 9.0,
        // Same unit
        _ => value,
    })
}

pub struct ConvertTemperatureTool;

#[async_trait]
impl Tool for ConvertTemperatureTool {
    fn name(&self) -> &str {
        "convertTemperature"
    }

    fn description(&self) -> &str {
        "Converts temperature from one unit to another."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "temperature": { "type": "number" },
                "from": {
                    "type": "string",
                    "description": "Unit to convert from (celsius or fahrenheit)"
                },
                "to": {
                    "type": "string",
                    "description": "Unit to convert to (celsius or fahrenheit)"
                }
            },
            "required": ["temperature", "from", "to"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let input: ConversionInput = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        convert(input.temperature, &input.from, &input.to)
            .map(|v| json!(v))
            .map_err(|reason| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason,
            })
    }
}
