//! `paperdesk doctor`: Diagnose system health.

use std::path::Path;

use paperdesk_assistant::narration;
use paperdesk_config::{API_KEY_ENV, AppConfig};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("PaperDesk Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let path = super::config_path(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — defaults in use (run `paperdesk onboard`)", path.display());
    }

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and re-run.");
            return Ok(());
        }
    };

    // Credential / endpoint
    match (&config.client.relay_url, config.has_api_key()) {
        (Some(url), _) => println!("  ✅ Chat uses relay at {url}"),
        (None, true) => println!("  ✅ {API_KEY_ENV} configured; chat talks to {}", config.upstream.base_url),
        (None, false) => {
            println!("  ❌ No {API_KEY_ENV} and no relay URL — chat cannot reach a model");
            issues += 1;
        }
    }
    if !config.has_api_key() {
        println!("  ⚠️  `paperdesk serve` will answer 500 until {API_KEY_ENV} is set");
    }

    // Speech output
    let engine = narration::engine_from_config(&config.narration);
    if engine.is_available() {
        println!("  ✅ Narration via `{}`", engine.name());
    } else {
        println!("  ⚠️  Narration unavailable (replies are printed only)");
    }

    // Static UI
    if Path::new(&config.relay.static_dir).is_dir() {
        println!("  ✅ Static UI directory: {}", config.relay.static_dir);
    } else {
        println!("  ⚠️  Static UI directory missing: {} (API only)", config.relay.static_dir);
    }

    match (config.history.max_turns, config.history.max_tokens) {
        (None, None) => println!("  ✅ History: every exchange is sent with each question"),
        (turns, tokens) => println!(
            "  ✅ History bounded: max_turns={}, max_tokens={}",
            turns.map_or("-".to_string(), |t| t.to_string()),
            tokens.map_or("-".to_string(), |t| t.to_string()),
        ),
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
