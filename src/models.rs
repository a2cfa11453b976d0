//! Core data models for the coaching query pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use std::fmt;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    House,
    Car,
    Travel,
    EmergencyFund,
    DebtFree,
    Retirement,
    Investment,
    Other,
}

impl Default for GoalType {
    fn default() -> Self {
        GoalType::Other
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Us,
    Ca,
    Uk,
    Au,
    Eu,
}

impl Default for Region {
    fn default() -> Self {
        Region::Us
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Which specialist handles the query. Decided once per request by the
/// router and recorded in the trace and response metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Research,
    Calculator,
    Coach,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Openai,
}

//
// ================= Query Request =================
//

/// One turn of prior conversation supplied by the caller, oldest first.
/// The pipeline reads but never reorders or rewrites history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Provider + model choice for this request. Model `None` means the
/// adapter's default model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelector {
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        ModelSelector {
            provider: ProviderKind::Gemini,
            model: None,
        }
    }
}

/// The inbound coaching query. After the input guardrail accepts it, the
/// sanitized copy is immutable for the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub goal_type: GoalType,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub deep_research_requested: bool,
    #[serde(default)]
    pub model_selector: ModelSelector,
    #[serde(default)]
    pub conversation_history: Vec<HistoryTurn>,
}

//
// ================= Financial Context =================
//

/// Read-only snapshot of the user's finances fetched from the context
/// store. Enrichment only; the pipeline never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialContext {
    pub total_debt: f64,
    pub monthly_bills: f64,
    pub net_worth: f64,
    pub has_active_goal: bool,
}

//
// ================= Research =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub topic: String,
    pub summary: String,
    pub key_points: Vec<String>,
    /// Concrete next steps, distinct from the findings themselves.
    pub recommendations: Vec<String>,
    /// Where the findings came from, for the caller to surface.
    pub sources: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

//
// ================= Evaluation =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDimension {
    pub name: String,
    pub score: u8,
    pub detail: String,
}

/// Observational quality score attached to the trace and the response.
/// Never gates delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Overall score, clamped to 0..=100.
    pub score: u8,
    pub dimensions: Vec<EvaluationDimension>,
}

//
// ================= Query Response =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub agent_used: AgentKind,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub trace_id: Uuid,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<ResearchReport>,
    pub metadata: ResponseMetadata,
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GoalType::House => "house",
            GoalType::Car => "car",
            GoalType::Travel => "travel",
            GoalType::EmergencyFund => "emergency fund",
            GoalType::DebtFree => "debt freedom",
            GoalType::Retirement => "retirement",
            GoalType::Investment => "investment",
            GoalType::Other => "general savings",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Us => "US",
            Region::Ca => "CA",
            Region::Uk => "UK",
            Region::Au => "AU",
            Region::Eu => "EU",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::Research => "research",
            AgentKind::Calculator => "calculator",
            AgentKind::Coach => "coach",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Openai => "openai",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"message": "How do I start saving?"}"#).unwrap();
        assert_eq!(req.message, "How do I start saving?");
        assert_eq!(req.user_id, None);
        assert_eq!(req.goal_type, GoalType::Other);
        assert_eq!(req.region, Region::Us);
        assert!(!req.deep_research_requested);
        assert_eq!(req.model_selector.provider, ProviderKind::Gemini);
        assert!(req.conversation_history.is_empty());
    }

    #[test]
    fn test_enum_wire_casing() {
        let req: QueryRequest = serde_json::from_str(
            r#"{
                "message": "test",
                "goal_type": "emergency_fund",
                "region": "UK",
                "model_selector": {"provider": "openai", "model": "gpt-4o-mini"}
            }"#,
        )
        .unwrap();
        assert_eq!(req.goal_type, GoalType::EmergencyFund);
        assert_eq!(req.region, Region::Uk);
        assert_eq!(req.model_selector.provider, ProviderKind::Openai);
        assert_eq!(req.model_selector.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let result = serde_json::from_str::<QueryRequest>(
            r#"{"message": "test", "region": "MARS"}"#,
        );
        assert!(result.is_err());
    }
}
