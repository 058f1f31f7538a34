//! # PaperDesk Assistant
//!
//! Everything between a front end and the model endpoint:
//!
//! ```text
//! Action ──▶ Assistant ──▶ ContextAssembler ──▶ ModelClient
//!               │   ▲                               │
//!               │   └──── commit(epoch) ◀───────────┘
//!               ▼
//!         Effects: Speak / StopNarration / Notify
//! ```
//!
//! - [`store::SessionStore`] owns the session and the reset epoch
//! - [`context::ContextAssembler`] builds the analysis and follow-up prompts
//! - [`extractor::TextExtractor`] turns an uploaded PDF into text
//! - [`narration::NarrationController`] speaks replies, last call wins
//! - [`controller::Assistant`] ties them together behind `dispatch`

pub mod busy;
pub mod context;
pub mod controller;
pub mod extractor;
pub mod narration;
pub mod store;

pub use context::{AssembledPrompt, AssemblyMetadata, ContextAssembler, HistoryBudget, PromptProfile};
pub use controller::{Action, Assistant, Effect, Notice, NoticeLevel, Outcome, Report, Status};
pub use extractor::TextExtractor;
pub use narration::{NarrationController, NarrationState, SpeechEngine, Voice};
pub use store::{SessionStore, Snapshot};
