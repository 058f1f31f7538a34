//! Narration: at most one utterance at a time, last call wins.
//!
//! ```text
//!          speak(t)               speak(t')  (previous one aborted)
//!   Idle ───────────▶ Speaking ─────────────▶ Speaking
//!    ▲                   │
//!    └───────────────────┘  completion, engine error, or stop()
//! ```
//!
//! Every `speak`/`stop` bumps a generation counter. A finishing utterance
//! only returns the state to `Idle` when its generation is still current,
//! so a late completion never clobbers a newer utterance.

pub mod engine;

pub use engine::{
    CommandSpeechEngine, SpeechEngine, UnavailableSpeechEngine, Utterance, engine_from_config,
};

use std::sync::{Arc, Mutex};

use chrono::Utc;
use paperdesk_config::NarrationConfig;
use paperdesk_core::error::{Error, Result};
use paperdesk_core::event::{DomainEvent, EventBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationState {
    Idle,
    Speaking,
}

/// Voice parameters applied to every utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for Voice {
    fn default() -> Self {
        Self::from(&NarrationConfig::default())
    }
}

impl From<&NarrationConfig> for Voice {
    fn from(config: &NarrationConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

struct Inner {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<NarrationState>,
    events: Arc<EventBus>,
}

impl Shared {
    fn set_state(&self, state: NarrationState, generation: u64) {
        let previous = self.state.send_replace(state);
        if previous != state || state == NarrationState::Speaking {
            self.events.publish(DomainEvent::NarrationChanged {
                speaking: state == NarrationState::Speaking,
                generation,
                timestamp: Utc::now(),
            });
        }
    }

    /// Called by the utterance task when the engine returns.
    fn finish(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "Ignoring stale narration completion");
            return;
        }
        inner.task = None;
        self.set_state(NarrationState::Idle, generation);
    }
}

pub struct NarrationController {
    engine: Arc<dyn SpeechEngine>,
    voice: Voice,
    shared: Arc<Shared>,
}

impl NarrationController {
    pub fn new(engine: Arc<dyn SpeechEngine>, voice: Voice, events: Arc<EventBus>) -> Self {
        let (state, _) = watch::channel(NarrationState::Idle);
        Self {
            engine,
            voice,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    generation: 0,
                    task: None,
                }),
                state,
                events,
            }),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    pub fn state(&self) -> NarrationState {
        *self.shared.state.borrow()
    }

    pub fn is_speaking(&self) -> bool {
        self.state() == NarrationState::Speaking
    }

    pub fn generation(&self) -> u64 {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .generation
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<NarrationState> {
        self.shared.state.subscribe()
    }

    /// Start speaking `text`, cancelling whatever is being spoken.
    ///
    /// Must be called from within a Tokio runtime. Returns the generation
    /// of the new utterance.
    pub fn speak(&self, text: &str) -> Result<u64> {
        if !self.engine.is_available() {
            return Err(Error::CapabilityUnavailable(format!(
                "speech engine '{}' is not available",
                self.engine.name()
            )));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("nothing to narrate".into()));
        }

        let utterance = Utterance {
            text: text.to_string(),
            rate: self.voice.rate,
            pitch: self.voice.pitch,
            volume: self.voice.volume,
        };

        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.generation += 1;
        let generation = inner.generation;
        self.shared.set_state(NarrationState::Speaking, generation);

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        inner.task = Some(tokio::spawn(async move {
            if let Err(e) = engine.speak(&utterance).await {
                warn!(generation, error = %e, "Narration failed");
            }
            shared.finish(generation);
        }));

        debug!(generation, chars = text.len(), engine = self.engine.name(), "Narration started");
        Ok(generation)
    }

    /// Cancel the current utterance, if any. Returns whether one was playing.
    pub fn stop(&self) -> bool {
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        let task = inner.task.take();
        inner.generation += 1;
        let was_speaking = self.state() == NarrationState::Speaking;
        if let Some(task) = task {
            task.abort();
        }
        if was_speaking {
            self.shared.set_state(NarrationState::Idle, inner.generation);
        }
        was_speaking
    }

    /// Resolve once nothing is being spoken.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|s| *s == NarrationState::Idle).await;
    }
}

impl Drop for NarrationController {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}
