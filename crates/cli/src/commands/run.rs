//! `flowdeck run`: Run one flow and print its result.

use flowdeck_flows::{FlowContext, FlowSink, default_flows};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Parse `--input`: JSON when it parses, otherwise the raw text as a string.
pub fn parse_input(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}

pub async fn run(
    config_path: Option<&Path>,
    flow: &str,
    input: Option<&str>,
    stream: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let ctx = FlowContext::from_config(&config)?;
    let flows = default_flows(&ctx);
    let input = parse_input(input);
    debug!(flow, stream, "Running flow from the command line");

    let result = if stream {
        let (sink, mut rx) = FlowSink::channel();
        let printer = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                println!("{chunk}");
            }
        });
        let result = flows.run(flow, input, Some(sink)).await;
        printer.await?;
        result?
    } else {
        flows.run(flow, input, None).await?
    };

    match result {
        Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
