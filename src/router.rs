//! Agent Router
//!
//! Decides which specialist handles a query:
//! - Research: the caller explicitly asked for deep research
//! - Calculator: numeric planning questions (e.g., "how much should I save?")
//! - Coach: everything else, the conversational default

use crate::models::{AgentKind, QueryRequest};
use tracing::debug;

/// A hit anywhere in the lowered message routes to the calculator agent.
const CALCULATION_KEYWORDS: &[&str] = &[
    // Direct requests
    "calculate", "compute",
    // Quantity questions
    "how much", "how long",
    // Payment planning
    "payment", "interest", "save",
    // Timelines
    "months", "years",
    // Debt
    "debt payoff", "loan",
];

/// Agent router
pub struct AgentRouter;

impl AgentRouter {
    /// Pick the agent for this request. First match wins: the explicit
    /// research flag outranks keywords, keywords outrank the default.
    pub fn route(request: &QueryRequest) -> AgentKind {
        if request.deep_research_requested {
            debug!("Routing to research agent (deep research requested)");
            return AgentKind::Research;
        }

        let message = request.message.to_lowercase();
        if CALCULATION_KEYWORDS.iter().any(|kw| message.contains(kw)) {
            debug!("Routing to calculator agent (calculation keywords)");
            return AgentKind::Calculator;
        }

        debug!("Routing to coach agent (default)");
        AgentKind::Coach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalType, ModelSelector, Region};

    fn request(message: &str, deep_research: bool) -> QueryRequest {
        QueryRequest {
            message: message.to_string(),
            user_id: None,
            goal_type: GoalType::Other,
            region: Region::Us,
            deep_research_requested: deep_research,
            model_selector: ModelSelector::default(),
            conversation_history: vec![],
        }
    }

    #[test]
    fn test_research_flag_wins_over_keywords() {
        let req = request("calculate how much I need to save", true);
        assert_eq!(AgentRouter::route(&req), AgentKind::Research);
    }

    #[test]
    fn test_calculation_questions() {
        let cases = vec![
            "How much should I save each month for a house?",
            "Calculate my debt payoff timeline",
            "What would the payment be on a $250k loan?",
            "how long until I can retire?",
            "If I save $200/month, where am I in 5 years?",
        ];

        for c in cases {
            assert_eq!(
                AgentRouter::route(&request(c, false)),
                AgentKind::Calculator,
                "expected calculator for: {}",
                c
            );
        }
    }

    #[test]
    fn test_coach_is_the_default() {
        let cases = vec![
            "Should I feel bad about my spending?",
            "What is an emergency fund?",
            "I want to get better with money",
        ];

        for c in cases {
            assert_eq!(
                AgentRouter::route(&request(c, false)),
                AgentKind::Coach,
                "expected coach for: {}",
                c
            );
        }
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let req = request("CALCULATE MY LOAN PAYMENT", false);
        assert_eq!(AgentRouter::route(&req), AgentKind::Calculator);
    }
}
