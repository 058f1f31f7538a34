//! `paperdesk onboard`: First-time setup.

use std::path::Path;

use paperdesk_config::{API_KEY_ENV, AppConfig};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("PaperDesk — First-Time Setup");
    println!("============================\n");

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if path.exists() {
        println!("\n⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Put {API_KEY_ENV}=sk-ant-... in a .env file (never in config.toml you share)");
    println!("   2. Run `paperdesk doctor` to check the setup");
    println!("   3. Run `paperdesk chat paper.pdf`, or `paperdesk serve` for the browser UI\n");

    Ok(())
}
