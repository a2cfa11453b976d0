//! Inbound request validation
//!
//! Schema checks run first and cheapest; the content-safety scan only ever
//! sees messages that already passed them. The sole sanitization applied
//! is trimming the message.

use crate::error::{CoachError, Result};
use crate::models::QueryRequest;
use std::sync::Arc;
use tracing::{debug, warn};

/// Advisory warning carried through to the output guardrail when the
/// message touches investment topics.
pub const DISCLAIMER_WARNING: &str = "investment_disclaimer_required";

/// Blocked-intent patterns, grouped by the stable reason reported when one
/// matches. Matching is on the lowered message.
const BLOCKED_PATTERNS: &[(&str, &[&str])] = &[
    (
        "potential_fraud",
        &["launder", "fake invoice", "forge", "stolen card", "identity theft"],
    ),
    (
        "account_intrusion",
        &[
            "hack into",
            "break into an account",
            "bypass verification",
            "someone else's account",
            "crack the password",
        ],
    ),
    (
        "market_manipulation",
        &["pump and dump", "insider trading", "manipulate the market", "spoofing orders"],
    ),
    (
        "unrealistic_returns_scheme",
        &["ponzi", "pyramid scheme", "double my money overnight", "guaranteed 100%"],
    ),
];

/// Investment vocabulary that triggers the advisory disclaimer flag.
const INVESTMENT_TERMS: &[&str] = &[
    "invest", "stock", "etf", "bond", "crypto", "portfolio", "mutual fund",
    "index fund", "401k", "ira", "brokerage", "shares",
];

/// Content-safety seam. The default implementation is pattern matching;
/// tests substitute spies to observe exactly when scanning happens.
pub trait SafetyScanner: Send + Sync {
    /// Returns the block reason when the message trips a policy.
    fn scan(&self, message: &str) -> Option<String>;
}

/// Default scanner over the static pattern table.
pub struct PatternSafetyScanner;

impl SafetyScanner for PatternSafetyScanner {
    fn scan(&self, message: &str) -> Option<String> {
        let lowered = message.to_lowercase();
        for (reason, patterns) in BLOCKED_PATTERNS {
            if patterns.iter().any(|p| lowered.contains(p)) {
                return Some((*reason).to_string());
            }
        }
        None
    }
}

/// A request that cleared the input guardrail. The embedded request is the
/// sanitized copy the rest of the pipeline works from.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub request: QueryRequest,
    pub warnings: Vec<String>,
    pub requires_disclaimer: bool,
}

pub struct InputGuardrail {
    max_message_chars: usize,
    scanner: Arc<dyn SafetyScanner>,
}

impl InputGuardrail {
    pub fn new(max_message_chars: usize) -> Self {
        Self::with_scanner(max_message_chars, Arc::new(PatternSafetyScanner))
    }

    pub fn with_scanner(max_message_chars: usize, scanner: Arc<dyn SafetyScanner>) -> Self {
        Self {
            max_message_chars,
            scanner,
        }
    }

    /// Validate and sanitize one request. Schema violations and policy
    /// blocks both surface as `Validation`; the first schema violation
    /// found is the one reported.
    pub fn validate(&self, request: &QueryRequest) -> Result<ValidatedInput> {
        let trimmed = request.message.trim();

        if trimmed.is_empty() {
            return Err(CoachError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > self.max_message_chars {
            return Err(CoachError::Validation(format!(
                "message exceeds the {}-character limit",
                self.max_message_chars
            )));
        }

        // Content safety only runs on schema-valid input.
        if let Some(reason) = self.scanner.scan(trimmed) {
            warn!(reason = %reason, "Message blocked by content policy");
            return Err(CoachError::Validation(format!(
                "message blocked by content policy: {}",
                reason
            )));
        }

        let mut warnings = Vec::new();
        let lowered = trimmed.to_lowercase();
        let requires_disclaimer = INVESTMENT_TERMS.iter().any(|t| lowered.contains(t));
        if requires_disclaimer {
            debug!("Investment vocabulary detected; disclaimer required");
            warnings.push(DISCLAIMER_WARNING.to_string());
        }

        let mut sanitized = request.clone();
        sanitized.message = trimmed.to_string();

        Ok(ValidatedInput {
            request: sanitized,
            warnings,
            requires_disclaimer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalType, ModelSelector, Region};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(message: &str) -> QueryRequest {
        QueryRequest {
            message: message.to_string(),
            user_id: Some("u1".to_string()),
            goal_type: GoalType::House,
            region: Region::Us,
            deep_research_requested: false,
            model_selector: ModelSelector::default(),
            conversation_history: vec![],
        }
    }

    struct SpyScanner {
        calls: AtomicUsize,
    }

    impl SafetyScanner for SpyScanner {
        fn scan(&self, _message: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[test]
    fn test_empty_message_rejected() {
        let guardrail = InputGuardrail::new(2000);
        let result = guardrail.validate(&request("   "));
        match result {
            Err(CoachError::Validation(msg)) => assert!(msg.contains("empty")),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_oversized_message_rejected() {
        let guardrail = InputGuardrail::new(2000);
        let result = guardrail.validate(&request(&"x".repeat(2001)));
        match result {
            Err(CoachError::Validation(msg)) => assert!(msg.contains("2000")),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_schema_failure_skips_safety_scan() {
        let spy = Arc::new(SpyScanner {
            calls: AtomicUsize::new(0),
        });
        let guardrail = InputGuardrail::with_scanner(2000, spy.clone());

        assert!(guardrail.validate(&request("")).is_err());
        assert!(guardrail.validate(&request(&"x".repeat(5000))).is_err());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);

        assert!(guardrail.validate(&request("how do I budget?")).is_ok());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocked_content_uses_stable_reason() {
        let guardrail = InputGuardrail::new(2000);
        let result = guardrail.validate(&request(
            "What's the best way to launder money through a savings account?",
        ));
        match result {
            Err(CoachError::Validation(msg)) => assert!(msg.contains("potential_fraud")),
            other => panic!("expected policy block, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_investment_topics_flag_disclaimer() {
        let guardrail = InputGuardrail::new(2000);
        let validated = guardrail
            .validate(&request("Should I put my savings into an index fund?"))
            .unwrap();
        assert!(validated.requires_disclaimer);
        assert!(validated
            .warnings
            .contains(&DISCLAIMER_WARNING.to_string()));
    }

    #[test]
    fn test_message_is_trimmed_but_otherwise_untouched() {
        let guardrail = InputGuardrail::new(2000);
        let validated = guardrail
            .validate(&request("  How do I build an emergency fund?  "))
            .unwrap();
        assert_eq!(validated.request.message, "How do I build an emergency fund?");
        assert!(!validated.requires_disclaimer);
        assert!(validated.warnings.is_empty());
    }
}
