//! Finance Coach Orchestrator
//!
//! The AI query pipeline behind a goal-tracking personal finance product:
//! - Validates and content-screens every inbound message
//! - Rate-limits per user over a fixed window
//! - Routes to a research, calculator, or coaching strategy
//! - Answers through a bounded tool-calling loop against swappable
//!   model providers, with deterministic financial math as the tools
//! - Reviews every outbound response for overconfidence and disclaimers
//! - Records a full per-request trace with a heuristic quality score
//!
//! PIPELINE:
//! VALIDATE → RATE LIMIT → ROUTE → ENRICH → TOOL LOOP → REVIEW → SCORE

pub mod agent;
pub mod api;
pub mod calculators;
pub mod config;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod guardrails;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod router;
pub mod tools;
pub mod trace;

pub use error::{CoachError, Result};

// Re-export common types
pub use models::*;
pub use agent::{CoachOrchestrator, QueryFailure};
