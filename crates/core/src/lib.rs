//! # PaperDesk Core
//!
//! Domain types, traits, and error definitions for the PaperDesk
//! research-paper assistant. This crate has **no framework dependencies**:
//! it defines the domain model that every other crate builds against.
//!
//! - [`session`] holds the single stateful entity, the paper discussion session
//! - [`message`] holds the wire types exchanged with the model endpoint
//! - [`provider`] defines the [`ModelClient`] seam (direct upstream or relay)
//! - [`document`] validates uploaded documents before any processing starts
//! - [`event`] is a broadcast bus for observers (CLI, logs, tests)

pub mod document;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use document::PdfUpload;
pub use error::{Error, ExtractionError, Result, UpstreamError};
pub use event::{DomainEvent, EventBus};
pub use message::{ApiMessage, ContentBlock, MessagesRequest, MessagesResponse, Role};
pub use provider::ModelClient;
pub use session::{Session, Turn, TurnRole};
