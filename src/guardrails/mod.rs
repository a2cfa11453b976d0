//! Input and output guardrails
//!
//! Deterministic policy checks on both sides of the model call. Input
//! validation runs schema checks before content safety; output review
//! blocks only empty responses and otherwise warns and annotates.

pub mod input;
pub mod output;

pub use input::{InputGuardrail, PatternSafetyScanner, SafetyScanner, ValidatedInput};
pub use output::{OutputGuardrail, ReviewedOutput};
