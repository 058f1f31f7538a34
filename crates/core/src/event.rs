//! Domain event system: decoupled observation of the assistant.
//!
//! Events are published when the session or narration changes.
//! Observers (the CLI status line, logs, tests) subscribe without the
//! assistant knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A paper was extracted and attached to the session
    PaperLoaded {
        session_id: String,
        title: String,
        text_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The initial analysis was stored
    AnalysisCompleted {
        session_id: String,
        analysis_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// A question/answer pair was appended
    TurnRecorded {
        session_id: String,
        question_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The session was discarded and recreated
    SessionReset {
        epoch: u64,
        timestamp: DateTime<Utc>,
    },

    /// Narration started (`speaking == true`) or returned to idle
    NarrationChanged {
        speaking: bool,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A user action failed; the session was left untouched
    ActionFailed {
        action: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
