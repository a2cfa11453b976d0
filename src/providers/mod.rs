//! Model provider adapters
//!
//! One capability interface for every language model backend. Adapters own
//! their wire formats entirely; the tool loop only ever sees
//! [`ConversationTurn`]s going in and a [`ProviderTurn`] coming back.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use crate::error::{CoachError, Result};
use crate::models::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One tool invocation requested by the model. `call_id` ties the result
/// back to the request on backends that track it; adapters synthesize one
/// when the wire format has none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Declaration of a callable tool, schema included, in provider-neutral
/// form. Adapters translate it into their own envelope.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// The running conversation the loop replays to the provider on every
/// iteration. Tool traffic is appended as synthetic turns and never
/// persisted anywhere else.
#[derive(Debug, Clone)]
pub enum ConversationTurn {
    User { text: String },
    Assistant { text: String },
    AssistantToolCalls { requests: Vec<ToolRequest> },
    ToolResult {
        call_id: String,
        name: String,
        result: serde_json::Value,
    },
}

/// What the provider did with the conversation: answered, or asked for
/// tools.
#[derive(Debug, Clone)]
pub enum ProviderTurn {
    Final(String),
    ToolRequests(Vec<ToolRequest>),
}

/// Capability interface every backend implements.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// One model round-trip over the full conversation. `model` overrides
    /// the adapter's default model name when set.
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ConversationTurn],
        tools: &[ToolSpec],
        model: Option<&str>,
    ) -> Result<ProviderTurn>;
}

/// Adapter lookup by provider kind.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ModelProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| CoachError::Provider(format!("no adapter registered for {}", kind)))
    }

    pub fn list(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in adapter, keyed off environment API keys.
pub fn create_default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(GeminiProvider::from_env()));
    registry.register(Arc::new(OpenAiProvider::from_env()));
    registry
}

/// Mock provider for development & testing.
/// Keeps the pipeline functional without a model API key: asks for one
/// savings projection, then answers with whatever the tool returned.
pub struct MockProvider;

#[async_trait::async_trait]
impl ModelProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        turns: &[ConversationTurn],
        _tools: &[ToolSpec],
        _model: Option<&str>,
    ) -> Result<ProviderTurn> {
        let last_result = turns.iter().rev().find_map(|turn| match turn {
            ConversationTurn::ToolResult { result, .. } => Some(result.clone()),
            _ => None,
        });

        match last_result {
            Some(result) => Ok(ProviderTurn::Final(format!(
                "Here is the projection you asked about: {}. Staying consistent with \
                 the monthly deposit is what moves the number most.",
                result
            ))),
            None => Ok(ProviderTurn::ToolRequests(vec![ToolRequest {
                call_id: "mock-1".to_string(),
                name: "future_value".to_string(),
                arguments: serde_json::json!({
                    "current_savings": 5000.0,
                    "monthly_deposit": 400.0,
                    "annual_rate": 0.05,
                    "years": 3.0
                }),
            }])),
        }
    }
}
