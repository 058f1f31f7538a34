//! Wire types for the model endpoint.
//!
//! A request is a list of messages whose content is either plain text or a
//! list of typed blocks (`text`, `document`). A response carries a list of
//! content blocks; PaperDesk only ever reads the text ones.

use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ApiMessage {
    /// A user message with plain text content.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message made of typed content blocks.
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Document { source: DocumentSource },
}

impl ContentBlock {
    /// A base64-encoded document block.
    pub fn base64_document(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Document {
            source: DocumentSource {
                kind: "base64".into(),
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

/// A fully formed request for the messages endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ApiMessage>,
}

impl MessagesRequest {
    /// A single-turn request carrying one plain-text user message.
    pub fn single_prompt(model: impl Into<String>, max_tokens: u32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: vec![ApiMessage::user_text(prompt)],
        }
    }
}

/// A response from the messages endpoint.
///
/// Parsing is lenient: only `content` is required, so a relay that passes
/// through a trimmed body still parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub content: Vec<ResponseBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Text of the first content block that carries text.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| b.text.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}
