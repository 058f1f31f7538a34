//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Good enough
//! to bound the history section; the model endpoint does the real count.

use paperdesk_core::session::Exchange;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for one rendered question/answer pair.
///
/// Counts the `Previous Question: ` / `Previous Answer: ` labels and the
/// blank-line separators as they appear in the prompt.
pub fn estimate_exchange_tokens(exchange: &Exchange<'_>) -> usize {
    const LABEL_OVERHEAD: usize = "Previous Question: ".len() + "Previous Answer: ".len() + 4;
    estimate_tokens(&exchange.question.text)
        + estimate_tokens(&exchange.answer.text)
        + LABEL_OVERHEAD.div_ceil(4)
}
