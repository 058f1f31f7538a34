pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod serve;

use std::path::{Path, PathBuf};

use paperdesk_config::AppConfig;

/// The config file in use: `--config` if given, else the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    let config = AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
