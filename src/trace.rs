//! Trace recording and response evaluation
//!
//! Every request gets one trace; every pipeline stage appends events as
//! they happen, so a trace cut short by a caller timeout still shows
//! everything up to the cut. Users appear only as sha256 pseudonyms,
//! never as raw ids.

use crate::error::{CoachError, Result};
use crate::models::{AgentKind, Evaluation, EvaluationDimension};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    ValidationPassed,
    ValidationFailed,
    RateLimitPassed,
    RateLimitExceeded,
    AgentRouted,
    ContextFetched,
    EnrichmentCompleted,
    EnrichmentFailed,
    ProviderCalled,
    ToolCalled,
    ToolCompleted,
    LoopFallback,
    OutputReviewed,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub kind: TraceEventKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// One request's recorded journey through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Pseudonymous user reference; raw ids never enter the store.
    pub user_ref: Option<String>,
    pub agent_used: Option<AgentKind>,
    pub events: Vec<TraceEvent>,
    pub warnings: Vec<String>,
    pub final_response: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Shared trace storage. Writes go through one lock; events keep their
/// append order. Clones share the same underlying map.
#[derive(Clone)]
pub struct TraceStore {
    traces: Arc<RwLock<HashMap<Uuid, Trace>>>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self {
            traces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a trace for one request.
    pub async fn start_trace(&self, user_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let trace = Trace {
            id,
            started_at: Utc::now(),
            user_ref: user_id.map(pseudonymize_user),
            agent_used: None,
            events: Vec::new(),
            warnings: Vec::new(),
            final_response: None,
            evaluation: None,
            ended_at: None,
        };
        self.traces.write().await.insert(id, trace);
        id
    }

    pub async fn add_event(
        &self,
        trace_id: Uuid,
        kind: TraceEventKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut traces = self.traces.write().await;
        let trace = traces
            .get_mut(&trace_id)
            .ok_or_else(|| CoachError::Trace(format!("unknown trace {}", trace_id)))?;
        trace.events.push(TraceEvent {
            kind,
            payload,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Record a warning once; repeats are dropped.
    pub async fn add_warning(&self, trace_id: Uuid, warning: &str) -> Result<()> {
        let mut traces = self.traces.write().await;
        let trace = traces
            .get_mut(&trace_id)
            .ok_or_else(|| CoachError::Trace(format!("unknown trace {}", trace_id)))?;
        if !trace.warnings.iter().any(|w| w == warning) {
            trace.warnings.push(warning.to_string());
        }
        Ok(())
    }

    pub async fn set_agent(&self, trace_id: Uuid, agent: AgentKind) -> Result<()> {
        let mut traces = self.traces.write().await;
        let trace = traces
            .get_mut(&trace_id)
            .ok_or_else(|| CoachError::Trace(format!("unknown trace {}", trace_id)))?;
        trace.agent_used = Some(agent);
        Ok(())
    }

    /// Close a trace after a successful run. `ended_at` is written exactly
    /// once; a trace that is already closed stays as it was.
    pub async fn end_trace(
        &self,
        trace_id: Uuid,
        final_response: Option<&str>,
        evaluation: Option<Evaluation>,
    ) -> Result<()> {
        let mut traces = self.traces.write().await;
        let trace = traces
            .get_mut(&trace_id)
            .ok_or_else(|| CoachError::Trace(format!("unknown trace {}", trace_id)))?;
        if trace.ended_at.is_none() {
            trace.final_response = final_response.map(|s| s.to_string());
            trace.evaluation = evaluation;
            trace.events.push(TraceEvent {
                kind: TraceEventKind::Completed,
                payload: serde_json::json!({}),
                timestamp: Utc::now(),
            });
            trace.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Close a trace after a failure: appends the error event with its
    /// stable code, then ends the trace under the same exactly-once guard.
    pub async fn record_error(&self, trace_id: Uuid, code: &str, message: &str) -> Result<()> {
        let mut traces = self.traces.write().await;
        let trace = traces
            .get_mut(&trace_id)
            .ok_or_else(|| CoachError::Trace(format!("unknown trace {}", trace_id)))?;
        if trace.ended_at.is_none() {
            trace.events.push(TraceEvent {
                kind: TraceEventKind::Error,
                payload: serde_json::json!({ "code": code, "message": message }),
                timestamp: Utc::now(),
            });
            trace.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    pub async fn get(&self, trace_id: Uuid) -> Result<Option<Trace>> {
        let traces = self.traces.read().await;
        Ok(traces.get(&trace_id).cloned())
    }

    /// All trace ids for a user, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Uuid>> {
        let user_ref = pseudonymize_user(user_id);
        let traces = self.traces.read().await;

        let mut items: Vec<_> = traces
            .values()
            .filter(|trace| trace.user_ref.as_deref() == Some(user_ref.as_str()))
            .map(|trace| (trace.id, trace.started_at))
            .collect();
        items.sort_by_key(|(_, started_at)| *started_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    pub async fn count(&self) -> usize {
        self.traces.read().await.len()
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable pseudonym for a user id: truncated hex of its sha256.
pub fn pseudonymize_user(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex::encode(digest)[..16].to_string()
}

//
// ================= Evaluation =================
//

/// Heuristic quality score for a finished response. Observational only;
/// the pipeline delivers the response regardless of the number.
pub fn evaluate_response(
    message: &str,
    agent: AgentKind,
    response: &str,
    warnings: &[String],
) -> Evaluation {
    let mut dimensions = Vec::with_capacity(3);

    let length = response.chars().count();
    let completeness = if length < 40 {
        30
    } else if length < 150 {
        70
    } else {
        100
    };
    dimensions.push(EvaluationDimension {
        name: "completeness".to_string(),
        score: completeness,
        detail: format!("{} characters", length),
    });

    let caution = 100u8.saturating_sub((warnings.len() as u8).saturating_mul(20));
    dimensions.push(EvaluationDimension {
        name: "caution".to_string(),
        score: caution,
        detail: format!("{} warnings recorded", warnings.len()),
    });

    let (intent_score, intent_detail) = match agent {
        AgentKind::Calculator => {
            if response.chars().any(|c| c.is_ascii_digit()) {
                (100, "numeric answer present".to_string())
            } else {
                (40, "calculation requested but no numbers given".to_string())
            }
        }
        AgentKind::Research => {
            if length >= 200 {
                (100, "substantive research summary".to_string())
            } else {
                (60, "research summary is thin".to_string())
            }
        }
        AgentKind::Coach => {
            let addressed = message
                .to_lowercase()
                .split_whitespace()
                .filter(|w| w.len() > 4)
                .any(|w| response.to_lowercase().contains(w));
            if addressed {
                (100, "response engages the question".to_string())
            } else {
                (70, "response may be generic".to_string())
            }
        }
    };
    dimensions.push(EvaluationDimension {
        name: "intent".to_string(),
        score: intent_score,
        detail: intent_detail,
    });

    let total: u32 = dimensions.iter().map(|d| d.score as u32).sum();
    let score = (total / dimensions.len() as u32).min(100) as u8;

    Evaluation { score, dimensions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_trace_lifecycle_preserves_event_order() {
        let store = TraceStore::new();
        let id = store.start_trace(Some("user-1")).await;

        store
            .add_event(id, TraceEventKind::ValidationPassed, json!({}))
            .await
            .unwrap();
        store
            .add_event(id, TraceEventKind::RateLimitPassed, json!({"remaining": 19}))
            .await
            .unwrap();
        store
            .add_event(id, TraceEventKind::AgentRouted, json!({"agent": "coach"}))
            .await
            .unwrap();
        store.end_trace(id, Some("answer"), None).await.unwrap();

        let trace = store.get(id).await.unwrap().unwrap();
        assert!(trace.ended_at.is_some());
        assert_eq!(trace.final_response.as_deref(), Some("answer"));

        let kinds: Vec<_> = trace.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TraceEventKind::ValidationPassed,
                TraceEventKind::RateLimitPassed,
                TraceEventKind::AgentRouted,
                TraceEventKind::Completed,
            ]
        );
        for pair in trace.events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_ended_at_is_written_exactly_once() {
        let store = TraceStore::new();
        let id = store.start_trace(None).await;

        store.end_trace(id, Some("first"), None).await.unwrap();
        let first = store.get(id).await.unwrap().unwrap();

        store.end_trace(id, Some("second"), None).await.unwrap();
        store.record_error(id, "provider_error", "late").await.unwrap();
        let second = store.get(id).await.unwrap().unwrap();

        assert_eq!(first.ended_at, second.ended_at);
        assert_eq!(second.final_response.as_deref(), Some("first"));
        assert_eq!(second.events.len(), first.events.len());
    }

    #[tokio::test]
    async fn test_record_error_closes_with_stable_code() {
        let store = TraceStore::new();
        let id = store.start_trace(Some("user-1")).await;

        store
            .record_error(id, "rate_limit_error", "window exhausted")
            .await
            .unwrap();

        let trace = store.get(id).await.unwrap().unwrap();
        assert!(trace.ended_at.is_some());
        let last = trace.events.last().unwrap();
        assert_eq!(last.kind, TraceEventKind::Error);
        assert_eq!(last.payload["code"], json!("rate_limit_error"));
    }

    #[tokio::test]
    async fn test_unknown_trace_id_is_an_error() {
        let store = TraceStore::new();
        let result = store
            .add_event(Uuid::new_v4(), TraceEventKind::Completed, json!({}))
            .await;
        assert!(matches!(result, Err(CoachError::Trace(_))));
    }

    #[tokio::test]
    async fn test_warnings_are_deduplicated() {
        let store = TraceStore::new();
        let id = store.start_trace(None).await;

        store.add_warning(id, "long_response").await.unwrap();
        store.add_warning(id, "long_response").await.unwrap();
        store.add_warning(id, "enrichment_degraded").await.unwrap();

        let trace = store.get(id).await.unwrap().unwrap();
        assert_eq!(trace.warnings, vec!["long_response", "enrichment_degraded"]);
    }

    #[tokio::test]
    async fn test_user_ids_are_pseudonymized() {
        let store = TraceStore::new();
        let id = store.start_trace(Some("alice@example.com")).await;

        let trace = store.get(id).await.unwrap().unwrap();
        let user_ref = trace.user_ref.unwrap();
        assert_eq!(user_ref.len(), 16);
        assert!(!user_ref.contains("alice"));

        let listed = store.list_for_user("alice@example.com").await.unwrap();
        assert_eq!(listed, vec![id]);
        assert!(store.list_for_user("bob").await.unwrap().is_empty());
    }

    #[test]
    fn test_evaluation_scores_stay_in_bounds() {
        let eval = evaluate_response(
            "how much should I save?",
            AgentKind::Calculator,
            "",
            &vec!["w1".to_string(); 10],
        );
        assert!(eval.score <= 100);
        assert_eq!(eval.dimensions.len(), 3);
        for dim in &eval.dimensions {
            assert!(dim.score <= 100);
        }
    }

    #[test]
    fn test_evaluation_rewards_numeric_calculator_answers() {
        let with_numbers = evaluate_response(
            "calculate my payment",
            AgentKind::Calculator,
            "You would need to set aside $294.09 every month to stay on track.",
            &[],
        );
        let without_numbers = evaluate_response(
            "calculate my payment",
            AgentKind::Calculator,
            "It depends on several factors worth discussing in more detail.",
            &[],
        );
        assert!(with_numbers.score > without_numbers.score);
    }
}
