//! `flowdeck flows`: List registered flows.

use flowdeck_flows::{FlowContext, default_flows};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let ctx = FlowContext::from_config(&config)?;
    for flow in default_flows(&ctx).list() {
        if flow.streams {
            println!("{}  (streaming)", flow.name);
        } else {
            println!("{}", flow.name);
        }
    }
    Ok(())
}
