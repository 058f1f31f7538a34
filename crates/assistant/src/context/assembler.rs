//! Prompt assembly for the two model calls a session makes.
//!
//! 1. **Initial analysis**: the full paper text wrapped in a fixed
//!    seven-point rubric.
//! 2. **Follow-up**: persona, paper title, initial analysis, the
//!    conversation history and the current question, in that order.
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs: identical session state and
//! question always produce identical text. No random or time-dependent
//! logic is used.
//!
//! # History budget
//!
//! By default every prior exchange is included verbatim. When a
//! [`HistoryBudget`] bound is set, whole exchanges are dropped oldest
//! first, an omission note heads the history section, and the drop is
//! reported in [`AssemblyMetadata`].

use paperdesk_config::{HistoryConfig, PromptConfig};
use paperdesk_core::error::{Error, Result};
use paperdesk_core::message::MessagesRequest;
use paperdesk_core::session::{Exchange, Session};
use serde::{Deserialize, Serialize};

use crate::context::token;

// ── Types ─────────────────────────────────────────────────────────────────

/// Who the model is asked to be, and the field it is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptProfile {
    pub role: String,
    pub field: String,
    pub trend_topic: String,
}

impl Default for PromptProfile {
    fn default() -> Self {
        Self::from(&PromptConfig::default())
    }
}

impl From<&PromptConfig> for PromptProfile {
    fn from(config: &PromptConfig) -> Self {
        Self {
            role: config.role.clone(),
            field: config.field.clone(),
            trend_topic: config.trend_topic.clone(),
        }
    }
}

/// Bound on the history section. `None` everywhere means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryBudget {
    /// Maximum question/answer pairs to include.
    pub max_turns: Option<usize>,
    /// Maximum estimated tokens for the included pairs.
    pub max_tokens: Option<usize>,
}

impl HistoryBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_bounded(&self) -> bool {
        self.max_turns.is_some() || self.max_tokens.is_some()
    }
}

impl From<&HistoryConfig> for HistoryBudget {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            max_tokens: config.max_tokens,
        }
    }
}

/// Prompt text ready to send, plus how it was put together.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub metadata: AssemblyMetadata,
}

impl AssembledPrompt {
    /// Wrap the prompt as a single user message.
    pub fn into_request(self, model: impl Into<String>, max_tokens: u32) -> MessagesRequest {
        MessagesRequest::single_prompt(model, max_tokens, self.text)
    }
}

/// Metadata about a single assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Estimated tokens of the whole prompt.
    pub total_tokens: usize,
    /// Exchanges available in the session.
    pub exchanges_total: usize,
    /// Exchanges rendered into the prompt.
    pub exchanges_included: usize,
    /// Set when the history budget forced a drop.
    pub drop: Option<DropInfo>,
}

/// What the history budget removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropInfo {
    pub exchanges_dropped: usize,
    pub tokens_dropped: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Builds request text from session state. Holds no session state itself.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    profile: PromptProfile,
    budget: HistoryBudget,
}

impl ContextAssembler {
    pub fn new(profile: PromptProfile, budget: HistoryBudget) -> Self {
        Self { profile, budget }
    }

    pub fn profile(&self) -> &PromptProfile {
        &self.profile
    }

    pub fn budget(&self) -> HistoryBudget {
        self.budget
    }

    /// The rubric prompt asking for a comprehensive analysis of the paper.
    pub fn build_initial_analysis(&self, paper_text: &str) -> Result<AssembledPrompt> {
        if paper_text.trim().is_empty() {
            return Err(Error::InvalidState(
                "no paper text to analyze; upload a paper first".into(),
            ));
        }

        let p = &self.profile;
        let text = format!(
            "As a {role}, please provide a comprehensive analysis of this research paper. Focus on:\n\
             \n\
             1. Main research question and objectives\n\
             2. Methodology and approach\n\
             3. Key findings and contributions\n\
             4. Relevance to {field} field\n\
             5. Strengths and limitations\n\
             6. Potential applications and future work\n\
             7. How this relates to current trends in {trend}\n\
             \n\
             Paper content:\n\
             {paper_text}\n\
             \n\
             Provide a detailed, technical analysis suitable for a researcher in this field.",
            role = p.role,
            field = p.field,
            trend = p.trend_topic,
        );

        let metadata = AssemblyMetadata {
            total_tokens: token::estimate_tokens(&text),
            ..Default::default()
        };
        Ok(AssembledPrompt { text, metadata })
    }

    /// The follow-up prompt for `question`, carrying the session's history.
    pub fn build_follow_up(&self, question: &str, session: &Session) -> Result<AssembledPrompt> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".into()));
        }
        if !session.has_paper() {
            return Err(Error::InvalidState(
                "no paper loaded; upload a paper before asking questions".into(),
            ));
        }

        let exchanges: Vec<Exchange<'_>> = session.exchanges().collect();
        let (kept, drop) = self.select_history(&exchanges);

        let mut history: Vec<String> = Vec::with_capacity(kept.len() * 2 + 1);
        if let Some(drop) = &drop {
            history.push(format!(
                "[{} earlier exchange(s) omitted from this history]",
                drop.exchanges_dropped
            ));
        }
        for ex in kept {
            history.push(format!("Previous Question: {}", ex.question.text));
            history.push(format!("Previous Answer: {}", ex.answer.text));
        }

        let p = &self.profile;
        let text = format!(
            "You are a {role} AI assistant. You have access to the complete conversation history and context about this research paper.\n\
             \n\
             PAPER CONTEXT:\n\
             Paper Title: {title}\n\
             \n\
             INITIAL ANALYSIS:\n\
             {analysis}\n\
             \n\
             COMPLETE CONVERSATION HISTORY:\n\
             {history}\n\
             \n\
             CURRENT QUESTION: {question}\n\
             \n\
             Instructions:\n\
             - Reference previous discussions and analysis when relevant\n\
             - Build upon previous answers and maintain conversation continuity\n\
             - Provide detailed, technical responses appropriate for a {field} researcher\n\
             - If the question relates to something discussed earlier, acknowledge and expand on previous points\n\
             - Consider how this question fits into the broader context of our discussion about this paper\n\
             \n\
             Please provide a comprehensive answer that takes into account all the context and previous discussion.",
            role = p.role,
            title = session.paper_title(),
            analysis = session.initial_analysis().unwrap_or_default(),
            history = history.join("\n\n"),
            field = p.field,
        );

        let metadata = AssemblyMetadata {
            total_tokens: token::estimate_tokens(&text),
            exchanges_total: exchanges.len(),
            exchanges_included: kept.len(),
            drop,
        };
        Ok(AssembledPrompt { text, metadata })
    }

    /// Newest-first fill of the history window, returned oldest first.
    fn select_history<'s, 'a>(
        &self,
        exchanges: &'s [Exchange<'a>],
    ) -> (&'s [Exchange<'a>], Option<DropInfo>) {
        if !self.budget.is_bounded() {
            return (exchanges, None);
        }

        let max_turns = self.budget.max_turns.unwrap_or(usize::MAX);
        let max_tokens = self.budget.max_tokens.unwrap_or(usize::MAX);

        let mut used = 0usize;
        let mut included = 0usize;
        for ex in exchanges.iter().rev() {
            let cost = token::estimate_exchange_tokens(ex);
            if included >= max_turns || used.saturating_add(cost) > max_tokens {
                break;
            }
            used += cost;
            included += 1;
        }

        let start = exchanges.len() - included;
        if start == 0 {
            return (exchanges, None);
        }

        let tokens_dropped = exchanges[..start]
            .iter()
            .map(token::estimate_exchange_tokens)
            .sum();
        (
            &exchanges[start..],
            Some(DropInfo {
                exchanges_dropped: start,
                tokens_dropped,
            }),
        )
    }
}
