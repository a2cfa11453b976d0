//! Pipeline configuration
//!
//! Plain struct with sensible defaults; the binaries overlay environment
//! variables on top via `from_env`.

use crate::error::{CoachError, Result};
use std::env;
use std::time::Duration;

/// Tunables for one orchestrator instance. Constructed once at service
/// start and shared read-only.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Requests allowed per user per window.
    pub rate_limit_max_requests: u32,
    /// Fixed rate-limit window length.
    pub rate_limit_window: Duration,
    /// Hard cap on provider round-trips inside the tool-calling loop.
    pub max_tool_iterations: u32,
    /// Upper bound on each enrichment call (context fetch, search, research).
    pub enrichment_timeout: Duration,
    /// Maximum accepted message length, in characters.
    pub max_message_chars: usize,
    /// Response length above which the output guardrail adds an advisory
    /// warning.
    pub long_response_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: 20,
            rate_limit_window: Duration::from_millis(60_000),
            max_tool_iterations: 6,
            enrichment_timeout: Duration::from_secs(8),
            max_message_chars: 2000,
            long_response_chars: 4000,
        }
    }
}

impl OrchestratorConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset. Malformed values are configuration errors, not
    /// silent fallbacks.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            rate_limit_max_requests: parse_env_or(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            rate_limit_window: Duration::from_millis(parse_env_or(
                "RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window.as_millis() as u64,
            )?),
            max_tool_iterations: parse_env_or(
                "MAX_TOOL_ITERATIONS",
                defaults.max_tool_iterations,
            )?,
            enrichment_timeout: Duration::from_millis(parse_env_or(
                "ENRICHMENT_TIMEOUT_MS",
                defaults.enrichment_timeout.as_millis() as u64,
            )?),
            max_message_chars: parse_env_or("MAX_MESSAGE_CHARS", defaults.max_message_chars)?,
            long_response_chars: parse_env_or(
                "LONG_RESPONSE_CHARS",
                defaults.long_response_chars,
            )?,
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| CoachError::Config(format!("{} is not a valid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.rate_limit_max_requests, 20);
        assert_eq!(config.rate_limit_window, Duration::from_millis(60_000));
        assert_eq!(config.max_tool_iterations, 6);
        assert_eq!(config.max_message_chars, 2000);
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        // None of these variables are set in the test environment.
        let config = OrchestratorConfig::from_env().unwrap();
        assert_eq!(config.rate_limit_max_requests, 20);
        assert_eq!(config.enrichment_timeout, Duration::from_secs(8));
    }
}
