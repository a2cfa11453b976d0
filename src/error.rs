//! Error types for the coaching query pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CoachError>;

#[derive(Error, Debug)]
pub enum CoachError {

    // =============================
    // Pipeline Errors
    // =============================

    /// The request failed schema or content-safety validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller exhausted their request window.
    #[error("Rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// A context/search/research enrichment call failed. Always recovered
    /// near the call site and downgraded to a warning.
    #[error("Enrichment failure: {0}")]
    Enrichment(String),

    /// A tool invocation failed inside the tool-calling loop.
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The model provider returned an error or an unusable payload.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The model produced output the output guardrail rejected.
    #[error("Output validation error: {0}")]
    OutputValidation(String),

    /// The trace store was asked to update a trace it does not hold.
    #[error("Trace error: {0}")]
    Trace(String),

    /// Service configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoachError {
    /// Stable machine-readable code used in trace error events and API
    /// responses. Internal detail never travels with the code.
    pub fn code(&self) -> &'static str {
        match self {
            CoachError::Validation(_) => "validation_error",
            CoachError::RateLimited { .. } => "rate_limit_error",
            CoachError::Enrichment(_) => "enrichment_failure",
            CoachError::ToolExecution(_) => "tool_execution_error",
            CoachError::Provider(_) => "provider_error",
            CoachError::OutputValidation(_) => "output_validation_error",
            CoachError::Trace(_) => "trace_error",
            CoachError::Config(_) => "config_error",
            CoachError::Serialization(_) => "serialization_error",
            CoachError::Http(_) => "http_error",
            CoachError::Io(_) => "io_error",
        }
    }
}
