//! OpenAI-compatible adapter
//!
//! Chat-completions wire format with `tool_calls`, which several hosted
//! backends speak. The base URL is overridable so compatible gateways can
//! stand in for the real endpoint. Tool-call arguments arrive as a
//! JSON-encoded string; the adapter decodes them before they reach the
//! loop.

use crate::error::{CoachError, Result};
use crate::models::ProviderKind;
use crate::providers::{ConversationTurn, ModelProvider, ProviderTurn, ToolRequest, ToolSpec};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env::var("OPENAI_API_KEY").unwrap_or_default(),
            env::var("OPENAI_BASE_URL").ok(),
        )
    }
}

#[async_trait::async_trait]
impl ModelProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ConversationTurn],
        tools: &[ToolSpec],
        model: Option<&str>,
    ) -> Result<ProviderTurn> {
        if self.api_key.is_empty() {
            return Err(CoachError::Provider(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = build_request(model.unwrap_or(DEFAULT_MODEL), system_prompt, turns, tools);

        info!(model = request.model, turns = turns.len(), "Calling OpenAI-compatible API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI API request failed: {}", e);
                CoachError::Provider(format!("OpenAI API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "OpenAI API error response: {}", error_text);
            return Err(CoachError::Provider(format!(
                "OpenAI API returned {}",
                status
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            CoachError::Provider(format!("OpenAI parse error: {}", e))
        })?;

        parse_response(completion)
    }
}

fn build_request(
    model: &str,
    system_prompt: &str,
    turns: &[ConversationTurn],
    tools: &[ToolSpec],
) -> ChatCompletionRequest {
    let mut messages = vec![ChatMessage {
        role: "system".to_string(),
        content: Some(system_prompt.to_string()),
        tool_calls: None,
        tool_call_id: None,
    }];

    for turn in turns {
        messages.push(match turn {
            ConversationTurn::User { text } => ChatMessage {
                role: "user".to_string(),
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            ConversationTurn::Assistant { text } => ChatMessage {
                role: "assistant".to_string(),
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            ConversationTurn::AssistantToolCalls { requests } => ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(
                    requests
                        .iter()
                        .map(|req| WireToolCall {
                            id: req.call_id.clone(),
                            call_type: "function".to_string(),
                            function: WireFunctionCall {
                                name: req.name.clone(),
                                arguments: req.arguments.to_string(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            },
            ConversationTurn::ToolResult {
                call_id, result, ..
            } => ChatMessage {
                role: "tool".to_string(),
                content: Some(result.to_string()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        });
    }

    let wire_tools = if tools.is_empty() {
        None
    } else {
        Some(
            tools
                .iter()
                .map(|spec| WireTool {
                    tool_type: "function".to_string(),
                    function: WireFunction {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.parameters.clone(),
                    },
                })
                .collect(),
        )
    };

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        tools: wire_tools,
        temperature: 0.3,
    }
}

fn parse_response(completion: ChatCompletionResponse) -> Result<ProviderTurn> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CoachError::Provider("No choices in OpenAI response".to_string()))?;

    if let Some(calls) = choice.message.tool_calls {
        if !calls.is_empty() {
            let requests = calls
                .into_iter()
                .map(|call| ToolRequest {
                    call_id: call.id,
                    name: call.function.name,
                    // Malformed argument strings stay in-protocol: the tool
                    // sees them and reports back to the model.
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(Value::Null),
                })
                .collect();
            return Ok(ProviderTurn::ToolRequests(requests));
        }
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(ProviderTurn::Final(text)),
        _ => Err(CoachError::Provider(
            "OpenAI returned neither content nor tool calls".to_string(),
        )),
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let turns = vec![
            ConversationTurn::User {
                text: "Calculate my loan payment".to_string(),
            },
            ConversationTurn::AssistantToolCalls {
                requests: vec![ToolRequest {
                    call_id: "call_1".to_string(),
                    name: "loan_payment".to_string(),
                    arguments: json!({"principal": 250000.0}),
                }],
            },
            ConversationTurn::ToolResult {
                call_id: "call_1".to_string(),
                name: "loan_payment".to_string(),
                result: json!({"monthly_payment": 1498.88}),
            },
        ];
        let tools = vec![ToolSpec {
            name: "loan_payment".to_string(),
            description: "Amortized loan payment".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let request = build_request("gpt-4o-mini", "You are a coach", &turns, &tools);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains(r#""role":"system""#));
        assert!(json.contains(r#""tool_call_id":"call_1""#));
        assert!(json.contains(r#""type":"function""#));
        assert!(json.contains("1498.88"));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "future_value",
                            "arguments": "{\"years\": 5}"
                        }
                    }]
                }
            }]
        });

        let completion: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        match parse_response(completion).unwrap() {
            ProviderTurn::ToolRequests(requests) => {
                assert_eq!(requests[0].call_id, "call_abc");
                assert_eq!(requests[0].arguments, json!({"years": 5}));
            }
            ProviderTurn::Final(_) => panic!("expected tool requests"),
        }
    }

    #[test]
    fn test_malformed_arguments_become_null() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "future_value", "arguments": "{oops"}
                    }]
                }
            }]
        });

        let completion: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        match parse_response(completion).unwrap() {
            ProviderTurn::ToolRequests(requests) => {
                assert_eq!(requests[0].arguments, Value::Null);
            }
            ProviderTurn::Final(_) => panic!("expected tool requests"),
        }
    }

    #[test]
    fn test_parse_text_response() {
        let raw = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Start with a budget."}
            }]
        });

        let completion: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        match parse_response(completion).unwrap() {
            ProviderTurn::Final(text) => assert_eq!(text, "Start with a budget."),
            ProviderTurn::ToolRequests(_) => panic!("expected final text"),
        }
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let completion: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            parse_response(completion),
            Err(CoachError::Provider(_))
        ));
    }
}
