//! Speech engines.
//!
//! An engine speaks one utterance to completion. Dropping the future
//! returned by [`SpeechEngine::speak`] stops the audio; the narration
//! controller relies on that for preemption.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use paperdesk_config::NarrationConfig;
use paperdesk_core::error::{Error, Result};
use tracing::debug;

/// One piece of text to speak, with voice parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speaking rate multiplier (1.0 = engine default).
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether speech can be produced at all on this host.
    fn is_available(&self) -> bool;

    /// Speak `utterance`, resolving when the audio has finished.
    async fn speak(&self, utterance: &Utterance) -> Result<()>;
}

/// Commands probed on `PATH`, in order, when none is configured.
const KNOWN_COMMANDS: &[&str] = &["say", "spd-say", "espeak-ng", "espeak"];

/// Speaks by running a platform TTS command, one process per utterance.
///
/// Arguments may contain these placeholders:
///
/// | Placeholder | Value |
/// |-------------|-------|
/// | `{text}` | the utterance |
/// | `{wpm}` | words per minute (`base_wpm * rate`) |
/// | `{pitch}` | 0-99, 50 at pitch 1.0 (espeak `-p` scale) |
/// | `{volume}` | 0-100, 100 at volume 1.0 (espeak `-a` scale) |
///
/// When no argument mentions `{text}`, `--` and the text are appended.
#[derive(Debug, Clone)]
pub struct CommandSpeechEngine {
    program: String,
    args: Vec<String>,
    base_wpm: u32,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, base_wpm: u32) -> Self {
        Self {
            program: program.into(),
            args,
            base_wpm,
        }
    }

    /// The first known TTS command found on `PATH`.
    pub fn detect(base_wpm: u32) -> Option<Self> {
        KNOWN_COMMANDS
            .iter()
            .find(|cmd| find_on_path(cmd).is_some())
            .map(|cmd| Self::new(*cmd, default_args(cmd), base_wpm))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn words_per_minute(&self, rate: f32) -> u32 {
        ((self.base_wpm as f32) * rate).round().max(1.0) as u32
    }

    pub(crate) fn render_args(&self, utterance: &Utterance) -> Vec<String> {
        let wpm = self.words_per_minute(utterance.rate).to_string();
        let pitch = pitch_level(utterance.pitch).to_string();
        let volume = volume_level(utterance.volume).to_string();
        let mut has_text = false;
        let mut rendered: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                has_text |= arg.contains("{text}");
                arg.replace("{wpm}", &wpm)
                    .replace("{pitch}", &pitch)
                    .replace("{volume}", &volume)
                    .replace("{text}", &utterance.text)
            })
            .collect();
        if !has_text {
            rendered.push("--".into());
            rendered.push(utterance.text.clone());
        }
        rendered
    }
}

/// Pitch multiplier (0.0..=2.0) on espeak's 0-99 scale.
fn pitch_level(pitch: f32) -> u32 {
    (pitch.clamp(0.0, 2.0) * 50.0).round().min(99.0) as u32
}

/// Volume (0.0..=1.0) on espeak's amplitude scale, where 100 is normal.
fn volume_level(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Arguments that make each known command block until speech ends.
///
/// The text always follows `--` so a reply starting with `-` is not parsed
/// as options. `say` takes no pitch or volume arguments and `spd-say` uses
/// its own scales, so only espeak applies `pitch` and `volume`.
fn default_args(program: &str) -> Vec<String> {
    let args: &[&str] = match program {
        "say" => &["-r", "{wpm}", "--", "{text}"],
        "spd-say" => &["--wait", "--", "{text}"],
        "espeak" | "espeak-ng" => &[
            "-s", "{wpm}", "-p", "{pitch}", "-a", "{volume}", "--", "{text}",
        ],
        _ => &["--", "{text}"],
    };
    args.iter().map(|a| a.to_string()).collect()
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        find_on_path(&self.program).is_some()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let args = self.render_args(utterance);
        debug!(program = %self.program, chars = utterance.text.len(), "Starting speech command");

        let status = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Internal(format!("{} exited with {status}", self.program)))
        }
    }
}

/// Engine for hosts without speech output.
#[derive(Debug, Clone)]
pub struct UnavailableSpeechEngine {
    reason: String,
}

impl UnavailableSpeechEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl SpeechEngine for UnavailableSpeechEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn speak(&self, _utterance: &Utterance) -> Result<()> {
        Err(Error::CapabilityUnavailable(self.reason.clone()))
    }
}

/// Pick the engine described by the `[narration]` section.
pub fn engine_from_config(config: &NarrationConfig) -> std::sync::Arc<dyn SpeechEngine> {
    use std::sync::Arc;

    if !config.enabled {
        return Arc::new(UnavailableSpeechEngine::new("narration is disabled in the configuration"));
    }
    if let Some(command) = &config.command {
        let args = if config.args.is_empty() {
            default_args(command)
        } else {
            config.args.clone()
        };
        return Arc::new(CommandSpeechEngine::new(command, args, config.base_wpm));
    }
    match CommandSpeechEngine::detect(config.base_wpm) {
        Some(engine) => Arc::new(engine),
        None => Arc::new(UnavailableSpeechEngine::new(format!(
            "no speech command found on PATH (tried {})",
            KNOWN_COMMANDS.join(", ")
        ))),
    }
}
