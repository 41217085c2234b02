//! Checks applied to any text before it is written back to `community_prompts`.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::transforms::NO_CHANGE_SENTINEL;

/// Generated text may grow at most this many times the input length.
pub const MAX_GROWTH_FACTOR: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("text is empty")]
    Empty,

    #[error("text contains the NO_CHANGE sentinel")]
    Sentinel,

    #[error("text contains an unexpanded ${0} backreference")]
    Backref(char),

    #[error("text grew from {input} to {output} characters")]
    TooLong { input: usize, output: usize },

    #[error("text starts with a model preamble")]
    Preamble,
}

fn backref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([1-9])[A-Za-z]|^\s*\$([1-9])\s*$").expect("valid regex"))
}

fn sentinel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bNO_CHANGE\b").expect("valid regex"))
}

/// Checks every outgoing field must pass.
pub fn check(text: &str) -> Result<(), Violation> {
    if text.trim().is_empty() {
        return Err(Violation::Empty);
    }
    if text.trim() == NO_CHANGE_SENTINEL || sentinel_regex().is_match(text) {
        return Err(Violation::Sentinel);
    }
    if let Some(caps) = backref_regex().captures(text) {
        let digit = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or('?');
        return Err(Violation::Backref(digit));
    }
    Ok(())
}

/// Extra checks for model output, given the text it was asked to rewrite.
pub fn check_generated(input: &str, output: &str) -> Result<(), Violation> {
    check(output)?;

    let (input_len, output_len) = (input.chars().count(), output.chars().count());
    if output_len > input_len.max(1) * MAX_GROWTH_FACTOR {
        return Err(Violation::TooLong {
            input: input_len,
            output: output_len,
        });
    }

    let lowered = output.trim_start().to_lowercase();
    if ["here is", "here's", "sure,", "rewritten:"]
        .iter()
        .any(|p| lowered.starts_with(p))
    {
        return Err(Violation::Preamble);
    }
    Ok(())
}
