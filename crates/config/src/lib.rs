//! Configuration loading, validation, and management for PaperDesk.
//!
//! Loads configuration from `~/.paperdesk/config.toml` with environment
//! variable overrides (a `.env` file in the working directory is honoured).
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the upstream credential.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// The root configuration structure.
///
/// Maps directly to `~/.paperdesk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream API key. Usually supplied through `ANTHROPIC_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Upstream endpoint settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Model and per-operation token budgets
    #[serde(default)]
    pub models: ModelConfig,

    /// Relay server settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// How the assistant reaches the model (direct or through a relay)
    #[serde(default)]
    pub client: ClientConfig,

    /// Prompt persona
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Conversation history bound for follow-up requests
    #[serde(default)]
    pub history: HistoryConfig,

    /// Text-to-speech settings
    #[serde(default)]
    pub narration: NarrationConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("upstream", &self.upstream)
            .field("models", &self.models)
            .field("relay", &self.relay)
            .field("client", &self.client)
            .field("prompt", &self.prompt)
            .field("history", &self.history)
            .field("narration", &self.narration)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,

    /// Per-request timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_anthropic_version() -> String {
    "2023-06-01".into()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            anthropic_version: default_anthropic_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_extraction_max_tokens")]
    pub extraction_max_tokens: u32,

    #[serde(default = "default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,

    #[serde(default = "default_follow_up_max_tokens")]
    pub follow_up_max_tokens: u32,

    /// Applied by the relay when a request omits `max_tokens`.
    #[serde(default = "default_relay_max_tokens")]
    pub relay_max_tokens: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_extraction_max_tokens() -> u32 {
    4000
}
fn default_analysis_max_tokens() -> u32 {
    3000
}
fn default_follow_up_max_tokens() -> u32 {
    2000
}
fn default_relay_max_tokens() -> u32 {
    4000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            extraction_max_tokens: default_extraction_max_tokens(),
            analysis_max_tokens: default_analysis_max_tokens(),
            follow_up_max_tokens: default_follow_up_max_tokens(),
            relay_max_tokens: default_relay_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the built web UI. Skipped when it does not exist.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Maximum request body size in megabytes (PDFs travel base64-encoded).
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Loopback only; set `PAPERDESK_HOST=0.0.0.0` to accept remote clients.
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3001
}
fn default_static_dir() -> String {
    "build".into()
}
fn default_body_limit_mb() -> usize {
    50
}

/// Upper bound for `relay.body_limit_mb`.
pub const MAX_BODY_LIMIT_MB: usize = 1024;

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            body_limit_mb: default_body_limit_mb(),
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a PaperDesk relay. When set, no local API key is needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Who the model speaks as, e.g. "recommender system researcher"
    #[serde(default = "default_role")]
    pub role: String,

    /// The research field analyses are related to
    #[serde(default = "default_field")]
    pub field: String,

    /// What "current trends" refers to in the rubric
    #[serde(default = "default_trend_topic")]
    pub trend_topic: String,
}

fn default_role() -> String {
    "recommender system researcher".into()
}
fn default_field() -> String {
    "recommender systems".into()
}
fn default_trend_topic() -> String {
    "recommendation algorithms".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            field: default_field(),
            trend_topic: default_trend_topic(),
        }
    }
}

/// Bound on how much history each follow-up request carries.
///
/// Both limits unset (the default) means every prior turn is sent verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Keep at most this many of the newest question/answer pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,

    /// Keep the newest pairs whose estimated size fits this many tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTS command. Unset means auto-detect (`say`, `spd-say`, `espeak-ng`, `espeak`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments; `{text}`, `{wpm}`, `{pitch}` and `{volume}` are
    /// substituted. `--` and the text are appended when no argument
    /// mentions `{text}`.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_rate")]
    pub rate: f32,

    #[serde(default = "default_pitch")]
    pub pitch: f32,

    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Words per minute at rate 1.0
    #[serde(default = "default_base_wpm")]
    pub base_wpm: u32,
}

fn default_true() -> bool {
    true
}
fn default_rate() -> f32 {
    0.9
}
fn default_pitch() -> f32 {
    1.0
}
fn default_volume() -> f32 {
    1.0
}
fn default_base_wpm() -> u32 {
    175
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            args: vec![],
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            base_wpm: default_base_wpm(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.paperdesk/config.toml).
    ///
    /// A `.env` file in the working directory is read first. Environment
    /// variables override file values:
    /// - `ANTHROPIC_API_KEY`
    /// - `PORT` (relay port)
    /// - `PAPERDESK_HOST` (relay bind address)
    /// - `PAPERDESK_MODEL`
    /// - `PAPERDESK_RELAY_URL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply `.env` and environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        load_dotenv()?;
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(port) = non_empty("PORT") {
            self.relay.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(host) = non_empty("PAPERDESK_HOST") {
            self.relay.host = host.trim().to_string();
        }
        if let Some(model) = non_empty("PAPERDESK_MODEL") {
            self.models.default_model = model;
        }
        if let Some(url) = non_empty("PAPERDESK_RELAY_URL") {
            self.client.relay_url = Some(url);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".paperdesk")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("extraction_max_tokens", self.models.extraction_max_tokens),
            ("analysis_max_tokens", self.models.analysis_max_tokens),
            ("follow_up_max_tokens", self.models.follow_up_max_tokens),
            ("relay_max_tokens", self.models.relay_max_tokens),
        ];
        if let Some((name, _)) = budgets.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!(
                "models.{name} must be > 0"
            )));
        }

        if self.history.max_turns == Some(0) {
            return Err(ConfigError::ValidationError(
                "history.max_turns must be > 0 (omit it for unbounded history)".into(),
            ));
        }

        let n = &self.narration;
        if !(n.rate > 0.0 && n.rate <= 10.0) {
            return Err(ConfigError::ValidationError(
                "narration.rate must be in (0, 10]".into(),
            ));
        }
        if !(0.0..=2.0).contains(&n.pitch) {
            return Err(ConfigError::ValidationError(
                "narration.pitch must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&n.volume) {
            return Err(ConfigError::ValidationError(
                "narration.volume must be between 0.0 and 1.0".into(),
            ));
        }

        if self.relay.body_limit_mb == 0 || self.relay.body_limit_mb > MAX_BODY_LIMIT_MB {
            return Err(ConfigError::ValidationError(format!(
                "relay.body_limit_mb must be between 1 and {MAX_BODY_LIMIT_MB}"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            upstream: UpstreamConfig::default(),
            models: ModelConfig::default(),
            relay: RelayConfig::default(),
            client: ClientConfig::default(),
            prompt: PromptConfig::default(),
            history: HistoryConfig::default(),
            narration: NarrationConfig::default(),
        }
    }
}

/// Read `.env` from the working directory if there is one.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loaded .env");
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::ValidationError(format!("invalid .env file: {e}"))),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.default_model, "claude-sonnet-4-20250514");
        assert_eq!(config.models.extraction_max_tokens, 4000);
        assert_eq!(config.models.analysis_max_tokens, 3000);
        assert_eq!(config.models.follow_up_max_tokens, 2000);
        assert_eq!(config.relay.port, 3001);
        assert!(config.history.max_turns.is_none());
        assert!((config.narration.rate - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.models.default_model, config.models.default_model);
        assert_eq!(parsed.relay.port, config.relay.port);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.relay.static_dir, "build");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[history]
max_turns = 8

[prompt]
field = "information retrieval"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.history.max_turns, Some(8));
        assert_eq!(config.prompt.field, "information retrieval");
        assert_eq!(config.prompt.role, "recommender system researcher");
        assert_eq!(config.models.analysis_max_tokens, 3000);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "relay = 12").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_narration_rejected() {
        let mut config = AppConfig::default();
        config.narration.volume = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.narration.rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn body_limit_is_bounded() {
        let mut config = AppConfig::default();
        config.relay.body_limit_mb = MAX_BODY_LIMIT_MB;
        assert!(config.validate().is_ok());

        config.relay.body_limit_mb = usize::MAX;
        assert!(config.validate().is_err());

        config.relay.body_limit_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn relay_binds_loopback_unless_host_overridden() {
        let mut config = AppConfig::default();
        assert_eq!(config.relay.host, "127.0.0.1");

        config
            .apply_env(env_of(&[("PAPERDESK_HOST", " 0.0.0.0 ")]))
            .unwrap();
        assert_eq!(config.relay.host, "0.0.0.0");
    }

    #[test]
    fn zero_history_bound_rejected() {
        let mut config = AppConfig::default();
        config.history.max_turns = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env_of(&[
                (API_KEY_ENV, "sk-ant-test"),
                ("PORT", "8080"),
                ("PAPERDESK_MODEL", "claude-opus-4-20250514"),
                ("PAPERDESK_RELAY_URL", "http://localhost:3001"),
            ]))
            .unwrap();
        assert!(config.has_api_key());
        assert_eq!(config.relay.port, 8080);
        assert_eq!(config.models.default_model, "claude-opus-4-20250514");
        assert_eq!(config.client.relay_url.as_deref(), Some("http://localhost:3001"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env_of(&[(API_KEY_ENV, "  ")])).unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn bad_port_env_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env_of(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-ant-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-sonnet-4-20250514"));
        assert!(toml_str.contains("3001"));
    }
}
