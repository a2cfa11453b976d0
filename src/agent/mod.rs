//! Coaching pipeline orchestrator
//!
//! Single entry point for every query regardless of transport. The stage
//! order is fixed: trace open, input guardrail, rate limit, route, context
//! fetch, the routed strategy through the tool loop, output review,
//! evaluation, trace close. Failures close the trace with a stable error
//! code so operators can see exactly where a request died.

pub mod tool_loop;

use crate::config::OrchestratorConfig;
use crate::context::FinancialContextStore;
use crate::enrichment::{
    bounded_research, bounded_search, DeepResearch, KnowledgeSearch, SearchOptions, SearchSnippet,
};
use crate::error::{CoachError, Result};
use crate::guardrails::{InputGuardrail, OutputGuardrail, ValidatedInput};
use crate::models::{
    AgentKind, ChatRole, FinancialContext, QueryRequest, QueryResponse, ResearchReport,
    ResponseMetadata,
};
use crate::providers::{ConversationTurn, ProviderRegistry};
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::router::AgentRouter;
use crate::tools::ToolRegistry;
use crate::trace::{evaluate_response, TraceEventKind, TraceStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tool_loop::ToolLoop;

const COACH_PROMPT: &str = "You are a supportive personal finance coach. Give practical, \
    plain-language guidance grounded in the user's situation, and suggest one concrete \
    next step the user can take this week. Never promise returns.";

const CALCULATOR_PROMPT: &str = "You are a financial calculation assistant. Produce every \
    figure with the calculation tools, never by estimating arithmetic yourself. State the \
    results plainly and name the inputs you used.";

const RESEARCH_PROMPT: &str = "You are a financial research assistant. Turn the research \
    findings you are given into clear, actionable takeaways for the user, and use the \
    calculation tools when numbers would help.";

/// A failed query, paired with the trace that recorded the failure so the
/// caller can still point at the event log.
#[derive(Debug)]
pub struct QueryFailure {
    pub trace_id: Uuid,
    pub error: CoachError,
}

/// The orchestrator. Every collaborator is injected, so the whole pipeline
/// runs against stubs in tests; nothing in here reaches for globals.
pub struct CoachOrchestrator {
    config: OrchestratorConfig,
    input_guardrail: InputGuardrail,
    output_guardrail: OutputGuardrail,
    rate_limiter: RateLimiter,
    tool_loop: ToolLoop,
    tools: ToolRegistry,
    providers: ProviderRegistry,
    traces: TraceStore,
    contexts: Arc<dyn FinancialContextStore>,
    knowledge: Arc<dyn KnowledgeSearch>,
    research: Arc<dyn DeepResearch>,
}

impl CoachOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        providers: ProviderRegistry,
        tools: ToolRegistry,
        contexts: Arc<dyn FinancialContextStore>,
        knowledge: Arc<dyn KnowledgeSearch>,
        research: Arc<dyn DeepResearch>,
    ) -> Self {
        let input_guardrail = InputGuardrail::new(config.max_message_chars);
        let output_guardrail = OutputGuardrail::new(config.long_response_chars);
        let rate_limiter = RateLimiter::from_config(&config);
        let tool_loop = ToolLoop::new(config.max_tool_iterations);

        Self {
            input_guardrail,
            output_guardrail,
            rate_limiter,
            tool_loop,
            tools,
            providers,
            traces: TraceStore::new(),
            contexts,
            knowledge,
            research,
            config,
        }
    }

    /// Trace storage, shared with whatever transport hosts the orchestrator.
    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }

    /// Run one query through the full pipeline. On failure the returned
    /// envelope carries the trace id; the trace is already closed with the
    /// error by the time the caller sees it.
    pub async fn handle_query(
        &self,
        request: QueryRequest,
    ) -> std::result::Result<QueryResponse, QueryFailure> {
        let started = Instant::now();
        let trace_id = self.traces.start_trace(request.user_id.as_deref()).await;
        info!(%trace_id, "Handling coach query");

        match self.run_pipeline(trace_id, request, started).await {
            Ok(response) => Ok(response),
            Err(error) => {
                warn!(%trace_id, code = error.code(), "Query failed: {}", error);
                if let Err(trace_error) = self
                    .traces
                    .record_error(trace_id, error.code(), &error.to_string())
                    .await
                {
                    warn!(%trace_id, "Could not close trace: {}", trace_error);
                }
                Err(QueryFailure { trace_id, error })
            }
        }
    }

    async fn run_pipeline(
        &self,
        trace_id: Uuid,
        request: QueryRequest,
        started: Instant,
    ) -> Result<QueryResponse> {
        // Input guardrail: schema checks run before any content scanning.
        let validated = match self.input_guardrail.validate(&request) {
            Ok(validated) => validated,
            Err(e) => {
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::ValidationFailed,
                        json!({ "reason": e.to_string() }),
                    )
                    .await?;
                return Err(e);
            }
        };
        self.traces
            .add_event(
                trace_id,
                TraceEventKind::ValidationPassed,
                json!({ "warnings": validated.warnings }),
            )
            .await?;
        for warning in &validated.warnings {
            self.traces.add_warning(trace_id, warning).await?;
        }

        // Rate limit. Denials carry the wait hint straight to the caller.
        match self
            .rate_limiter
            .check(validated.request.user_id.as_deref())
            .await
        {
            RateLimitDecision::Allowed { remaining } => {
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::RateLimitPassed,
                        json!({ "remaining": remaining }),
                    )
                    .await?;
            }
            RateLimitDecision::Denied { retry_after } => {
                let retry_after_ms = retry_after.as_millis() as u64;
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::RateLimitExceeded,
                        json!({ "retry_after_ms": retry_after_ms }),
                    )
                    .await?;
                return Err(CoachError::RateLimited { retry_after_ms });
            }
        }

        // Route.
        let agent = AgentRouter::route(&validated.request);
        self.traces.set_agent(trace_id, agent).await?;
        self.traces
            .add_event(
                trace_id,
                TraceEventKind::AgentRouted,
                json!({ "agent": agent.to_string() }),
            )
            .await?;

        // Financial context and optional enrichment. Both degrade to
        // nothing when they fail; neither can sink the request.
        let context = self.fetch_context(trace_id, &validated).await?;
        let (research, snippets) = self.enrich(trace_id, agent, &validated.request).await?;

        // Every agent funnels through the same tool loop. Coaching is a
        // plain conversation; only the tool-backed agents get the
        // calculator registry.
        let no_tools = ToolRegistry::new();
        let tools = match agent {
            AgentKind::Coach => &no_tools,
            AgentKind::Calculator | AgentKind::Research => &self.tools,
        };
        let system_prompt = build_system_prompt(
            agent,
            &validated.request,
            context.as_ref(),
            &snippets,
            research.as_ref(),
        );
        let turns = conversation_turns(&validated.request);
        let provider = self
            .providers
            .get(validated.request.model_selector.provider)?;
        let outcome = self
            .tool_loop
            .run(
                provider.as_ref(),
                tools,
                &self.traces,
                trace_id,
                &system_prompt,
                turns,
                validated.request.model_selector.model.as_deref(),
            )
            .await?;

        // Output guardrail reviews everything that leaves, fallback text
        // included.
        let reviewed = self
            .output_guardrail
            .review(&outcome.text, validated.requires_disclaimer)?;
        for warning in &reviewed.warnings {
            self.traces.add_warning(trace_id, warning).await?;
        }
        self.traces
            .add_event(
                trace_id,
                TraceEventKind::OutputReviewed,
                json!({ "warnings": reviewed.warnings, "fell_back": outcome.fell_back }),
            )
            .await?;

        // Metadata warnings mirror the trace exactly.
        let warnings = match self.traces.get(trace_id).await? {
            Some(trace) => trace.warnings,
            None => Vec::new(),
        };

        let evaluation =
            evaluate_response(&validated.request.message, agent, &reviewed.text, &warnings);
        self.traces
            .end_trace(trace_id, Some(&reviewed.text), Some(evaluation.clone()))
            .await?;

        let metadata = ResponseMetadata {
            agent_used: agent,
            duration_ms: started.elapsed().as_millis() as u64,
            warnings,
            trace_id,
            evaluation: Some(evaluation),
        };
        info!(
            %trace_id,
            agent = %agent,
            iterations = outcome.iterations,
            duration_ms = metadata.duration_ms,
            "Query complete"
        );

        Ok(QueryResponse {
            response: reviewed.text,
            research,
            metadata,
        })
    }

    /// Fetch the user's financial picture, bounded by the enrichment
    /// timeout. Anonymous requests skip the lookup; failures degrade to no
    /// context with a warning.
    async fn fetch_context(
        &self,
        trace_id: Uuid,
        validated: &ValidatedInput,
    ) -> Result<Option<FinancialContext>> {
        let Some(user_id) = validated.request.user_id.as_deref() else {
            debug!(%trace_id, "Anonymous query, skipping context fetch");
            return Ok(None);
        };

        match timeout(self.config.enrichment_timeout, self.contexts.fetch(user_id)).await {
            Ok(Ok(context)) => {
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::ContextFetched,
                        json!({ "found": context.is_some() }),
                    )
                    .await?;
                Ok(context)
            }
            Ok(Err(e)) => {
                warn!(%trace_id, "Context fetch failed: {}", e);
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::EnrichmentFailed,
                        json!({ "kind": "context", "reason": e.to_string() }),
                    )
                    .await?;
                self.traces
                    .add_warning(trace_id, "context_unavailable")
                    .await?;
                Ok(None)
            }
            Err(_) => {
                warn!(%trace_id, "Context fetch timed out");
                self.traces
                    .add_event(
                        trace_id,
                        TraceEventKind::EnrichmentFailed,
                        json!({ "kind": "context", "reason": "timed out" }),
                    )
                    .await?;
                self.traces
                    .add_warning(trace_id, "context_unavailable")
                    .await?;
                Ok(None)
            }
        }
    }

    /// Agent-specific enrichment: deep research for the research agent,
    /// knowledge snippets for the coach, nothing for the calculator.
    async fn enrich(
        &self,
        trace_id: Uuid,
        agent: AgentKind,
        request: &QueryRequest,
    ) -> Result<(Option<ResearchReport>, Vec<SearchSnippet>)> {
        match agent {
            AgentKind::Research => {
                match bounded_research(
                    self.research.as_ref(),
                    &request.message,
                    request.goal_type,
                    request.region,
                    self.config.enrichment_timeout,
                )
                .await
                {
                    Ok(report) => {
                        self.traces
                            .add_event(
                                trace_id,
                                TraceEventKind::EnrichmentCompleted,
                                json!({
                                    "kind": "deep_research",
                                    "key_points": report.key_points.len(),
                                }),
                            )
                            .await?;
                        Ok((Some(report), Vec::new()))
                    }
                    Err(e) => {
                        warn!(%trace_id, "Deep research failed: {}", e);
                        self.traces
                            .add_event(
                                trace_id,
                                TraceEventKind::EnrichmentFailed,
                                json!({ "kind": "deep_research", "reason": e.to_string() }),
                            )
                            .await?;
                        self.traces
                            .add_warning(trace_id, "research_unavailable")
                            .await?;
                        Ok((None, Vec::new()))
                    }
                }
            }
            AgentKind::Coach => {
                match bounded_search(
                    self.knowledge.as_ref(),
                    &request.message,
                    request.region,
                    &SearchOptions::default(),
                    self.config.enrichment_timeout,
                )
                .await
                {
                    Ok(snippets) => {
                        self.traces
                            .add_event(
                                trace_id,
                                TraceEventKind::EnrichmentCompleted,
                                json!({ "kind": "knowledge_search", "snippets": snippets.len() }),
                            )
                            .await?;
                        Ok((None, snippets))
                    }
                    Err(e) => {
                        warn!(%trace_id, "Knowledge search failed: {}", e);
                        self.traces
                            .add_event(
                                trace_id,
                                TraceEventKind::EnrichmentFailed,
                                json!({ "kind": "knowledge_search", "reason": e.to_string() }),
                            )
                            .await?;
                        self.traces
                            .add_warning(trace_id, "knowledge_unavailable")
                            .await?;
                        Ok((None, Vec::new()))
                    }
                }
            }
            AgentKind::Calculator => Ok((None, Vec::new())),
        }
    }
}

//
// ================= Prompt assembly =================
//

fn build_system_prompt(
    agent: AgentKind,
    request: &QueryRequest,
    context: Option<&FinancialContext>,
    snippets: &[SearchSnippet],
    research: Option<&ResearchReport>,
) -> String {
    let mut prompt = String::from(match agent {
        AgentKind::Coach => COACH_PROMPT,
        AgentKind::Calculator => CALCULATOR_PROMPT,
        AgentKind::Research => RESEARCH_PROMPT,
    });

    prompt.push_str(&format!(
        "\n\nThe user's goal focus is {} and their region is {}.",
        request.goal_type, request.region
    ));

    if let Some(ctx) = context {
        prompt.push_str(&format!(
            "\n\nTheir financial picture: total debt ${:.2}, monthly bills ${:.2}, \
             net worth ${:.2}, active goal: {}.",
            ctx.total_debt,
            ctx.monthly_bills,
            ctx.net_worth,
            if ctx.has_active_goal { "yes" } else { "no" }
        ));
    }

    if !snippets.is_empty() {
        prompt.push_str("\n\nBackground notes:");
        for snippet in snippets {
            prompt.push_str(&format!("\n- {}: {}", snippet.title, snippet.snippet));
        }
    }

    if let Some(report) = research {
        prompt.push_str(&format!(
            "\n\nResearch findings on \"{}\": {}",
            report.topic, report.summary
        ));
        for point in &report.key_points {
            prompt.push_str(&format!("\n- {}", point));
        }
        if !report.recommendations.is_empty() {
            prompt.push_str("\nRecommended actions:");
            for rec in &report.recommendations {
                prompt.push_str(&format!("\n- {}", rec));
            }
        }
    }

    prompt
}

/// Prior turns plus the new message, in provider-neutral form.
fn conversation_turns(request: &QueryRequest) -> Vec<ConversationTurn> {
    let mut turns: Vec<ConversationTurn> = request
        .conversation_history
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => ConversationTurn::User {
                text: turn.text.clone(),
            },
            ChatRole::Assistant => ConversationTurn::Assistant {
                text: turn.text.clone(),
            },
        })
        .collect();
    turns.push(ConversationTurn::User {
        text: request.message.clone(),
    });
    turns
}
