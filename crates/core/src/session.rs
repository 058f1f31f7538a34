//! The paper discussion session.
//!
//! A session is created empty, receives the extracted paper text once,
//! the initial analysis once, and then an append-only log of
//! question/answer turns. It is discarded and recreated on reset and is
//! never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Which side of an exchange a turn records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Question,
    Answer,
}

/// One question or one answer in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A question/answer pair borrowed from the history.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub question: &'a Turn,
    pub answer: &'a Turn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: String,
    paper_title: String,
    paper_text: String,
    initial_analysis: Option<String>,
    turns: Vec<Turn>,
    summary: String,
    created_at: DateTime<Utc>,
}

impl Session {
    /// An empty session, as on load or after reset.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            paper_title: String::new(),
            paper_text: String::new(),
            initial_analysis: None,
            turns: Vec::new(),
            summary: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn paper_title(&self) -> &str {
        &self.paper_title
    }

    pub fn paper_text(&self) -> &str {
        &self.paper_text
    }

    pub fn initial_analysis(&self) -> Option<&str> {
        self.initial_analysis.as_deref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn has_paper(&self) -> bool {
        !self.paper_text.is_empty()
    }

    /// Number of questions asked so far.
    pub fn question_count(&self) -> usize {
        self.turns.len() / 2
    }

    /// History as question/answer pairs, oldest first.
    pub fn exchanges(&self) -> impl Iterator<Item = Exchange<'_>> {
        self.turns.chunks_exact(2).map(|pair| Exchange {
            question: &pair[0],
            answer: &pair[1],
        })
    }

    /// The text a "replay" should narrate: the latest answer, else the analysis.
    pub fn latest_reply(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Answer)
            .map(|t| t.text.as_str())
            .or(self.initial_analysis.as_deref())
    }

    /// Attach the extracted paper. Allowed once per session.
    pub fn load_paper(&mut self, title: impl Into<String>, text: impl Into<String>) -> Result<()> {
        if self.has_paper() {
            return Err(Error::InvalidState(
                "a paper is already loaded; reset the session first".into(),
            ));
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("extracted paper text is empty".into()));
        }
        self.paper_title = title.into();
        self.paper_text = text;
        self.summary = summarize(&self.paper_title, &self.turns);
        Ok(())
    }

    /// Store the initial analysis. Allowed once, and only after a paper is loaded.
    pub fn set_initial_analysis(&mut self, analysis: impl Into<String>) -> Result<()> {
        if !self.has_paper() {
            return Err(Error::InvalidState(
                "no paper text yet; upload a paper first".into(),
            ));
        }
        if self.initial_analysis.is_some() {
            return Err(Error::InvalidState(
                "the initial analysis already exists for this session".into(),
            ));
        }
        self.initial_analysis = Some(analysis.into());
        Ok(())
    }

    /// Append a question then its answer, and recompute the summary.
    ///
    /// This is the only mutator of the history.
    pub fn record_turn(&mut self, question: &str, answer: &str) -> Result<()> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".into()));
        }
        if answer.trim().is_empty() {
            return Err(Error::InvalidInput("answer is empty".into()));
        }

        self.turns.push(Turn {
            role: TurnRole::Question,
            text: question.to_string(),
            timestamp: Utc::now(),
        });
        self.turns.push(Turn {
            role: TurnRole::Answer,
            text: answer.to_string(),
            timestamp: Utc::now(),
        });
        self.summary = summarize(&self.paper_title, &self.turns);
        Ok(())
    }

    /// Markdown rendering of everything discussed so far.
    pub fn transcript(&self) -> String {
        let mut out = format!("# {}\n", self.paper_title);
        if let Some(analysis) = &self.initial_analysis {
            out.push_str("\n## Initial Analysis\n\n");
            out.push_str(analysis.trim_end());
            out.push('\n');
        }
        for (i, ex) in self.exchanges().enumerate() {
            out.push_str(&format!(
                "\n## Q{}: {}\n\n_{}_\n\n{}\n",
                i + 1,
                ex.question.text,
                ex.answer.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                ex.answer.text.trim_end()
            ));
        }
        out
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary line derived from the history and the title.
pub fn summarize(paper_title: &str, turns: &[Turn]) -> String {
    let questions = turns.len() / 2;
    if questions == 0 {
        return String::new();
    }
    format!("Discussion includes {questions} questions about {paper_title}")
}
