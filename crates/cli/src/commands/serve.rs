//! `paperdesk serve`: Start the relay.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    static_dir: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.relay.port = port;
    }
    if let Some(dir) = static_dir {
        config.relay.static_dir = dir;
    }

    println!("PaperDesk relay");
    println!("   Listening:  {}:{}", config.relay.host, config.relay.port);
    println!("   Static UI:  {}", config.relay.static_dir);
    println!(
        "   API key:    {}",
        if config.has_api_key() { "configured" } else { "MISSING" }
    );

    paperdesk_gateway::start(config).await?;

    Ok(())
}
