//! `flowdeck serve`: Start the HTTP server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port: Option<u16>,
    host: Option<String>,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(host) = host {
        config.gateway.host = host;
    }

    println!("flowdeck gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.models.default);
    if !config.has_api_key() {
        println!("   Warning:   no API key set (GEMINI_API_KEY or GOOGLE_API_KEY)");
    }

    flowdeck_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
