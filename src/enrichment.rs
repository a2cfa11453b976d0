//! Knowledge search and deep research
//!
//! Both services are best-effort prompt enrichment behind traits. The
//! orchestrator always calls them through the bounded helpers so one slow
//! upstream can never stall a query past the configured timeout.

use crate::error::{CoachError, Result};
use crate::models::{GoalType, Region, ResearchReport};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;

/// Tuning for a knowledge lookup. The defaults suit prompt enrichment:
/// a handful of snippets, no relevance floor.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Most snippets the search may return.
    pub limit: usize,
    /// Snippets scoring below this are dropped.
    pub min_similarity: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_similarity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSnippet {
    pub title: String,
    pub snippet: String,
    /// Relevance in 0.0..=1.0, higher is closer to the query.
    pub score: f64,
}

/// Lightweight topical lookups that season the coach prompt.
#[async_trait::async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        region: Region,
        options: &SearchOptions,
    ) -> Result<Vec<SearchSnippet>>;
}

/// Long-form topic research; only runs when the caller asks for it.
#[async_trait::async_trait]
pub trait DeepResearch: Send + Sync {
    async fn run(
        &self,
        topic: &str,
        goal_type: GoalType,
        region: Region,
    ) -> Result<ResearchReport>;
}

/// Run a search with a hard upper bound on wall time.
pub async fn bounded_search(
    service: &dyn KnowledgeSearch,
    query: &str,
    region: Region,
    options: &SearchOptions,
    limit: Duration,
) -> Result<Vec<SearchSnippet>> {
    match timeout(limit, service.search(query, region, options)).await {
        Ok(result) => result,
        Err(_) => Err(CoachError::Enrichment(format!(
            "knowledge search timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Run deep research with a hard upper bound on wall time.
pub async fn bounded_research(
    service: &dyn DeepResearch,
    topic: &str,
    goal_type: GoalType,
    region: Region,
    limit: Duration,
) -> Result<ResearchReport> {
    match timeout(limit, service.run(topic, goal_type, region)).await {
        Ok(result) => result,
        Err(_) => Err(CoachError::Enrichment(format!(
            "deep research timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Canned search results for development and tests.
pub struct StaticKnowledgeSearch;

#[async_trait::async_trait]
impl KnowledgeSearch for StaticKnowledgeSearch {
    async fn search(
        &self,
        query: &str,
        region: Region,
        options: &SearchOptions,
    ) -> Result<Vec<SearchSnippet>> {
        let lowered = query.to_lowercase();
        let mut snippets = Vec::new();

        if lowered.contains("emergency") {
            snippets.push(SearchSnippet {
                title: "Emergency fund sizing".to_string(),
                snippet: "Common guidance is three to six months of essential expenses \
                          held in an accessible account."
                    .to_string(),
                score: 0.9,
            });
        }
        if lowered.contains("budget") || lowered.contains("spending") {
            snippets.push(SearchSnippet {
                title: "Budget frameworks".to_string(),
                snippet: "The 50/30/20 split (needs/wants/savings) is a widely used \
                          starting point for a first budget."
                    .to_string(),
                score: 0.85,
            });
        }
        if snippets.is_empty() {
            snippets.push(SearchSnippet {
                title: format!("Personal finance basics ({})", region),
                snippet: "Prioritize high-interest debt, keep an emergency cushion, \
                          and automate savings toward named goals."
                    .to_string(),
                score: 0.4,
            });
        }

        snippets.retain(|s| s.score >= options.min_similarity);
        snippets.truncate(options.limit);
        Ok(snippets)
    }
}

/// Deterministic research reports for development and tests.
pub struct StubDeepResearch;

#[async_trait::async_trait]
impl DeepResearch for StubDeepResearch {
    async fn run(
        &self,
        topic: &str,
        goal_type: GoalType,
        region: Region,
    ) -> Result<ResearchReport> {
        Ok(ResearchReport {
            topic: topic.to_string(),
            summary: format!(
                "Overview of {} with {} market context: key considerations, common \
                 pitfalls, and typical cost ranges.",
                topic, region
            ),
            key_points: vec![
                "Compare at least three options before committing".to_string(),
                "Fees and interest compound; small percentages matter over years".to_string(),
                format!("Rules differ by region; figures below assume {}", region),
            ],
            recommendations: vec![
                format!("Attach a monthly amount to the {} goal and automate it", goal_type),
                "Revisit the plan monthly; adjust the deposit, not the deadline".to_string(),
            ],
            sources: vec!["Built-in coaching knowledge base".to_string()],
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowSearch;

    #[async_trait::async_trait]
    impl KnowledgeSearch for SlowSearch {
        async fn search(
            &self,
            _query: &str,
            _region: Region,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchSnippet>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_static_search_always_returns_something() {
        let service = StaticKnowledgeSearch;
        let snippets = service
            .search(
                "how do I start an emergency fund?",
                Region::Us,
                &SearchOptions::default(),
            )
            .await
            .unwrap();
        assert!(!snippets.is_empty());
        assert!(snippets[0].title.to_lowercase().contains("emergency"));
    }

    #[tokio::test]
    async fn test_search_options_bound_and_filter_results() {
        let service = StaticKnowledgeSearch;
        let query = "emergency fund and budget tips";

        let capped = service
            .search(
                query,
                Region::Us,
                &SearchOptions {
                    limit: 1,
                    min_similarity: 0.0,
                },
            )
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);

        let filtered = service
            .search(
                query,
                Region::Us,
                &SearchOptions {
                    limit: 5,
                    min_similarity: 0.95,
                },
            )
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_search_times_out() {
        let result = bounded_search(
            &SlowSearch,
            "anything",
            Region::Us,
            &SearchOptions::default(),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(CoachError::Enrichment(_))));
    }

    #[tokio::test]
    async fn test_stub_research_covers_the_report_shape() {
        let report = StubDeepResearch
            .run("buying a first home", GoalType::House, Region::Uk)
            .await
            .unwrap();
        assert!(report.summary.contains("buying a first home"));
        assert!(report.summary.contains("UK"));
        assert_eq!(report.key_points.len(), 3);
        assert!(!report.recommendations.is_empty());
        assert!(!report.sources.is_empty());
        assert!(report.recommendations[0].contains("house"));
    }
}
