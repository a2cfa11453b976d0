//! Outbound response review
//!
//! The only hard failure is an empty response. Everything else is
//! advisory: overconfident language and very long answers become
//! warnings, and the disclaimer block is appended when the input
//! guardrail flagged investment topics.

use crate::error::{CoachError, Result};
use tracing::debug;

/// Fixed disclaimer appended when required. Appending it is the output
/// guardrail's only mutation.
pub const DISCLAIMER: &str = "This is general information, not professional financial advice. \
     Consider consulting a licensed financial advisor for decisions specific to your situation.";

/// Overconfident phrasing flagged (never blocked) in responses.
const OVERCONFIDENCE_PATTERNS: &[&str] = &[
    "guaranteed return",
    "guaranteed",
    "zero risk",
    "risk-free",
    "100% safe",
    "can't lose",
    "cannot lose",
    "get rich",
];

/// Phrases that count as already-present disclaimer language.
const DISCLAIMER_MARKERS: &[&str] = &[
    "not financial advice",
    "not professional financial advice",
    "licensed financial advisor",
    "informational purposes only",
];

#[derive(Debug, Clone)]
pub struct ReviewedOutput {
    pub text: String,
    pub warnings: Vec<String>,
}

pub struct OutputGuardrail {
    long_response_chars: usize,
}

impl OutputGuardrail {
    pub fn new(long_response_chars: usize) -> Self {
        Self {
            long_response_chars,
        }
    }

    /// Review model output before it leaves the pipeline.
    pub fn review(&self, text: &str, requires_disclaimer: bool) -> Result<ReviewedOutput> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CoachError::OutputValidation(
                "model returned an empty response".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        let lowered = trimmed.to_lowercase();
        for pattern in OVERCONFIDENCE_PATTERNS {
            if lowered.contains(pattern) {
                warnings.push(format!("overconfident_language: {}", pattern));
            }
        }

        if trimmed.chars().count() > self.long_response_chars {
            warnings.push("long_response".to_string());
        }

        let mut reviewed = trimmed.to_string();
        if requires_disclaimer && !DISCLAIMER_MARKERS.iter().any(|m| lowered.contains(m)) {
            debug!("Appending investment disclaimer");
            reviewed.push_str("\n\n");
            reviewed.push_str(DISCLAIMER);
        }

        Ok(ReviewedOutput {
            text: reviewed,
            warnings,
        })
    }
}
