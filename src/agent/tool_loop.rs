//! Bounded tool-calling loop
//!
//! Replays the running conversation to the provider until it produces
//! text, executing any tools it requests in between. The iteration cap is
//! a hard guarantee: a model that asks for tools forever gets cut off and
//! the caller receives the fallback text instead of a hung request.

use crate::error::Result;
use crate::providers::{ConversationTurn, ModelProvider, ProviderTurn};
use crate::tools::ToolRegistry;
use crate::trace::{TraceEventKind, TraceStore};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delivered when the iteration budget runs out before a final answer.
pub const FALLBACK_RESPONSE: &str = "No response generated.";

/// One executed tool call, kept for response metadata.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub text: String,
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    /// True when the text is the fallback, not a model answer.
    pub fell_back: bool,
}

pub struct ToolLoop {
    max_iterations: u32,
}

impl ToolLoop {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// Drive the protocol to completion. Provider transport failures abort
    /// the loop; tool failures stay inside it as error payloads the model
    /// can react to.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        provider: &dyn ModelProvider,
        registry: &ToolRegistry,
        trace: &TraceStore,
        trace_id: Uuid,
        system_prompt: &str,
        mut turns: Vec<ConversationTurn>,
        model: Option<&str>,
    ) -> Result<LoopOutcome> {
        let specs = registry.specs();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

        for iteration in 1..=self.max_iterations {
            trace
                .add_event(
                    trace_id,
                    TraceEventKind::ProviderCalled,
                    json!({ "iteration": iteration, "turns": turns.len() }),
                )
                .await?;

            match provider.complete(system_prompt, &turns, &specs, model).await? {
                ProviderTurn::Final(text) => {
                    debug!(iteration, "Provider produced a final answer");
                    return Ok(LoopOutcome {
                        text,
                        iterations: iteration,
                        tool_calls,
                        fell_back: false,
                    });
                }
                ProviderTurn::ToolRequests(requests) => {
                    info!(
                        iteration,
                        count = requests.len(),
                        "Provider requested tool calls"
                    );
                    turns.push(ConversationTurn::AssistantToolCalls {
                        requests: requests.clone(),
                    });

                    for request in requests {
                        trace
                            .add_event(
                                trace_id,
                                TraceEventKind::ToolCalled,
                                json!({
                                    "tool": request.name,
                                    "call_id": request.call_id,
                                    "arguments": request.arguments,
                                }),
                            )
                            .await?;

                        let result = match registry.get(&request.name) {
                            Some(tool) => match tool.execute(&request.arguments).await {
                                Ok(value) => value,
                                Err(e) => {
                                    warn!(tool = %request.name, "Tool execution failed: {}", e);
                                    json!({ "error": e.to_string() })
                                }
                            },
                            None => {
                                warn!(tool = %request.name, "Unknown tool requested");
                                json!({ "error": format!("Unknown tool: {}", request.name) })
                            }
                        };

                        trace
                            .add_event(
                                trace_id,
                                TraceEventKind::ToolCompleted,
                                json!({ "tool": request.name, "result": result }),
                            )
                            .await?;

                        tool_calls.push(ToolCallRecord {
                            name: request.name.clone(),
                            arguments: request.arguments.clone(),
                            result: result.clone(),
                        });
                        turns.push(ConversationTurn::ToolResult {
                            call_id: request.call_id,
                            name: request.name,
                            result,
                        });
                    }
                }
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Tool loop exhausted its iteration budget"
        );
        trace
            .add_event(
                trace_id,
                TraceEventKind::LoopFallback,
                json!({ "iterations": self.max_iterations }),
            )
            .await?;
        trace.add_warning(trace_id, "tool_loop_exhausted").await?;

        Ok(LoopOutcome {
            text: FALLBACK_RESPONSE.to_string(),
            iterations: self.max_iterations,
            tool_calls,
            fell_back: true,
        })
    }
}
