//! The assistant controller: single owner of session, busy flags and
//! narration.
//!
//! Front ends send an [`Action`] and get back an [`Outcome`]: the reply
//! text, if any, plus a list of [`Effect`]s to apply. [`Assistant::perform`]
//! does both steps and turns failures into notices, which is what an
//! interactive front end usually wants.
//!
//! Network calls run without holding any lock. Their results are committed
//! against the epoch read before the call, so a reset that happens while a
//! request is in flight wins and the late result is dropped.

use std::sync::Arc;

use chrono::Utc;
use paperdesk_config::{AppConfig, ModelConfig};
use paperdesk_core::document::PdfUpload;
use paperdesk_core::error::{Error, Result, UpstreamError};
use paperdesk_core::event::{DomainEvent, EventBus};
use paperdesk_core::message::MessagesResponse;
use paperdesk_core::ModelClient;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::busy::{BusyFlags, BusyKind};
use crate::context::{ContextAssembler, HistoryBudget, PromptProfile};
use crate::extractor::TextExtractor;
use crate::narration::{NarrationController, NarrationState, SpeechEngine, Voice};
use crate::store::{SessionStore, Snapshot};

/// Something the user asked for.
#[derive(Debug, Clone)]
pub enum Action {
    /// A document picked for upload. Only `application/pdf` is accepted.
    Upload {
        file_name: String,
        media_type: String,
        bytes: Vec<u8>,
    },
    Analyze,
    Ask(String),
    ToggleSpeech,
    Reset,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Upload { .. } => "upload",
            Action::Analyze => "analyze",
            Action::Ask(_) => "ask",
            Action::ToggleSpeech => "toggle_speech",
            Action::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Side effects requested by an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Speak(String),
    StopNarration,
    Notify(Notice),
}

#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub reply: Option<String>,
    pub effects: Vec<Effect>,
}

/// What [`Assistant::perform`] reports after applying an outcome.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub reply: Option<String>,
    pub notices: Vec<Notice>,
}

impl Report {
    pub fn failed(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}

/// Read-only view for status lines.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub has_paper: bool,
    pub paper_title: String,
    pub has_analysis: bool,
    pub question_count: usize,
    pub summary: String,
    pub is_processing: bool,
    pub is_analyzing: bool,
    pub speaking: bool,
    pub epoch: u64,
}

pub struct Assistant {
    client: Arc<dyn ModelClient>,
    extractor: TextExtractor,
    assembler: ContextAssembler,
    store: SessionStore,
    narration: NarrationController,
    busy: BusyFlags,
    events: Arc<EventBus>,
    models: ModelConfig,
}

impl Assistant {
    pub fn new(client: Arc<dyn ModelClient>, engine: Arc<dyn SpeechEngine>, config: &AppConfig) -> Self {
        let events = Arc::new(EventBus::default());
        let models = config.models.clone();
        Self {
            extractor: TextExtractor::new(
                Arc::clone(&client),
                models.default_model.clone(),
                models.extraction_max_tokens,
            ),
            assembler: ContextAssembler::new(
                PromptProfile::from(&config.prompt),
                HistoryBudget::from(&config.history),
            ),
            store: SessionStore::new(),
            narration: NarrationController::new(engine, Voice::from(&config.narration), Arc::clone(&events)),
            busy: BusyFlags::default(),
            client,
            events,
            models,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn narration(&self) -> &NarrationController {
        &self.narration
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn status(&self) -> Status {
        let snap = self.store.snapshot();
        let s = &snap.session;
        Status {
            has_paper: s.has_paper(),
            paper_title: s.paper_title().to_string(),
            has_analysis: s.initial_analysis().is_some(),
            question_count: s.question_count(),
            summary: s.summary().to_string(),
            is_processing: self.busy.is_processing(),
            is_analyzing: self.busy.is_analyzing(),
            speaking: self.narration.state() == NarrationState::Speaking,
            epoch: snap.epoch,
        }
    }

    /// Run `action` and return what should happen next. Nothing is applied.
    pub async fn dispatch(&self, action: Action) -> Result<Outcome> {
        debug!(action = action.name(), "Dispatching action");
        match action {
            Action::Upload {
                file_name,
                media_type,
                bytes,
            } => self.upload(PdfUpload::new(file_name, &media_type, bytes)?).await,
            Action::Analyze => self.analyze().await,
            Action::Ask(question) => self.ask(&question).await,
            Action::ToggleSpeech => self.toggle_speech(),
            Action::Reset => Ok(self.reset()),
        }
    }

    /// Apply effects. Returns the notices to show, including narration
    /// failures.
    pub fn apply(&self, effects: Vec<Effect>) -> Vec<Notice> {
        let mut notices = Vec::new();
        for effect in effects {
            match effect {
                Effect::Speak(text) => {
                    if let Err(e) = self.narration.speak(&text) {
                        notices.push(Notice::error(e.to_string()));
                    }
                }
                Effect::StopNarration => {
                    self.narration.stop();
                }
                Effect::Notify(notice) => notices.push(notice),
            }
        }
        notices
    }

    /// Dispatch, apply, and convert any failure into an error notice.
    pub async fn perform(&self, action: Action) -> Report {
        let name = action.name();
        match self.dispatch(action).await {
            Ok(outcome) => Report {
                reply: outcome.reply,
                notices: self.apply(outcome.effects),
            },
            Err(e) => {
                warn!(action = name, error = %e, "Action failed");
                self.events.publish(DomainEvent::ActionFailed {
                    action: name.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Report {
                    reply: None,
                    notices: vec![Notice::error(failure_message(name, &e))],
                }
            }
        }
    }

    async fn upload(&self, upload: PdfUpload) -> Result<Outcome> {
        let _busy = self.busy.acquire(BusyKind::Processing)?;
        let snap = self.store.snapshot();
        if snap.session.has_paper() {
            return Err(Error::InvalidState(
                "a paper is already loaded; reset before uploading another".into(),
            ));
        }

        let text = self.extractor.extract(&upload).await?;
        let title = upload.title();
        let session_id = self.store.commit(snap.epoch, |s| {
            s.load_paper(title.clone(), text.clone())?;
            Ok(s.id().to_string())
        })?;

        info!(session = %session_id, title = %title, chars = text.len(), "Paper loaded");
        self.events.publish(DomainEvent::PaperLoaded {
            session_id,
            title: title.clone(),
            text_chars: text.len(),
            timestamp: Utc::now(),
        });

        Ok(Outcome {
            reply: None,
            effects: vec![Effect::Notify(Notice::info(format!(
                "Loaded \"{title}\" ({} characters of text)",
                text.len()
            )))],
        })
    }

    async fn analyze(&self) -> Result<Outcome> {
        let _busy = self.busy.acquire(BusyKind::Analyzing)?;
        let snap = self.store.snapshot();
        if !snap.session.has_paper() {
            return Err(Error::InvalidState("upload a paper before analyzing".into()));
        }
        if snap.session.initial_analysis().is_some() {
            return Err(Error::InvalidState(
                "this paper has already been analyzed; reset to start over".into(),
            ));
        }

        let prompt = self.assembler.build_initial_analysis(snap.session.paper_text())?;
        debug!(tokens = prompt.metadata.total_tokens, "Requesting initial analysis");
        let request = prompt.into_request(&self.models.default_model, self.models.analysis_max_tokens);
        let analysis = reply_text(self.client.complete(request).await?)?;

        let session_id = self.store.commit(snap.epoch, |s| {
            s.set_initial_analysis(analysis.clone())?;
            Ok(s.id().to_string())
        })?;

        info!(session = %session_id, chars = analysis.len(), "Initial analysis stored");
        self.events.publish(DomainEvent::AnalysisCompleted {
            session_id,
            analysis_chars: analysis.len(),
            timestamp: Utc::now(),
        });

        Ok(self.answered(analysis))
    }

    async fn ask(&self, question: &str) -> Result<Outcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".into()));
        }

        let _busy = self.busy.acquire(BusyKind::Analyzing)?;
        let snap = self.store.snapshot();
        let prompt = self.assembler.build_follow_up(question, &snap.session)?;
        if let Some(drop) = &prompt.metadata.drop {
            debug!(
                dropped = drop.exchanges_dropped,
                tokens = drop.tokens_dropped,
                "History trimmed to budget"
            );
        }

        let request = prompt.into_request(&self.models.default_model, self.models.follow_up_max_tokens);
        let answer = reply_text(self.client.complete(request).await?)?;

        let (session_id, question_count) = self.store.commit(snap.epoch, |s| {
            s.record_turn(question, &answer)?;
            Ok((s.id().to_string(), s.question_count()))
        })?;

        info!(session = %session_id, question_count, "Follow-up answered");
        self.events.publish(DomainEvent::TurnRecorded {
            session_id,
            question_count,
            timestamp: Utc::now(),
        });

        Ok(self.answered(answer))
    }

    fn toggle_speech(&self) -> Result<Outcome> {
        if self.narration.is_speaking() {
            return Ok(Outcome {
                reply: None,
                effects: vec![Effect::StopNarration],
            });
        }

        let snap = self.store.snapshot();
        let effect = match snap.session.latest_reply() {
            Some(text) => Effect::Speak(text.to_string()),
            None => Effect::Notify(Notice::info("Nothing to narrate yet; analyze the paper first")),
        };
        Ok(Outcome {
            reply: None,
            effects: vec![effect],
        })
    }

    fn reset(&self) -> Outcome {
        let epoch = self.store.reset();
        info!(epoch, "Session reset");
        self.events.publish(DomainEvent::SessionReset {
            epoch,
            timestamp: Utc::now(),
        });
        Outcome {
            reply: None,
            effects: vec![
                Effect::StopNarration,
                Effect::Notify(Notice::info("Session reset")),
            ],
        }
    }

    /// Reply outcome; narrated automatically when speech is available.
    fn answered(&self, text: String) -> Outcome {
        let effects = if self.narration.is_available() {
            vec![Effect::Speak(text.clone())]
        } else {
            Vec::new()
        };
        Outcome {
            reply: Some(text),
            effects,
        }
    }
}

fn reply_text(response: MessagesResponse) -> Result<String> {
    match response.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(Error::Upstream(UpstreamError::Malformed(
            "response contained no text content".into(),
        ))),
    }
}

fn failure_message(action: &str, error: &Error) -> String {
    match (action, error) {
        (_, Error::InvalidInput(_) | Error::InvalidState(_) | Error::Busy(_) | Error::Superseded) => {
            error.to_string()
        }
        ("upload", _) => format!("Error processing PDF. Please try again. ({error})"),
        ("analyze", _) => format!("Error generating analysis. Please try again. ({error})"),
        ("ask", _) => format!("Error processing question. Please try again. ({error})"),
        _ => error.to_string(),
    }
}
