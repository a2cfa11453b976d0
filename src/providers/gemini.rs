//! Gemini adapter
//!
//! Talks to the generateContent endpoint with function calling. Owns the
//! Gemini wire format end to end; a long-lived reqwest::Client keeps
//! connections pooled. Gemini has no call ids, so the adapter synthesizes
//! them from the function name and part index.

use crate::error::{CoachError, Result};
use crate::models::ProviderKind;
use crate::providers::{ConversationTurn, ModelProvider, ProviderTurn, ToolRequest, ToolSpec};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env::var("GEMINI_API_KEY").unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ModelProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let model = model.unwrap_or(DEFAULT_MODEL);
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let request = build_request(system_prompt, turns, tools);

        info!(model, turns = turns.len(), "Calling Gemini API");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            CoachError::Provider(format!("Gemini API error: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(CoachError::Provider(format!(
                "Gemini API returned {}",
                status
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            CoachError::Provider(format!("Gemini parse error: {}", e))
        })?;

        parse_response(gemini_response)
    }
}

fn build_request(
    system_prompt: &str,
    turns: &[ConversationTurn],
    tools: &[ToolSpec],
) -> GeminiRequest {
    let contents = turns
        .iter()
        .map(|turn| match turn {
            ConversationTurn::User { text } => Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(text.clone())],
            },
            ConversationTurn::Assistant { text } => Content {
                role: Some("model".to_string()),
                parts: vec![Part::text(text.clone())],
            },
            ConversationTurn::AssistantToolCalls { requests } => Content {
                role: Some("model".to_string()),
                parts: requests
                    .iter()
                    .map(|req| Part {
                        text: None,
                        function_call: Some(FunctionCall {
                            name: req.name.clone(),
                            args: req.arguments.clone(),
                        }),
                        function_response: None,
                    })
                    .collect(),
            },
            ConversationTurn::ToolResult { name, result, .. } => Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: None,
                    function_call: None,
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: json!({ "result": result }),
                    }),
                }],
            },
        })
        .collect();

    let gemini_tools = if tools.is_empty() {
        None
    } else {
        Some(vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|spec| FunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                })
                .collect(),
        }])
    };

    GeminiRequest {
        contents,
        tools: gemini_tools,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            max_output_tokens: 2048,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part::text(system_prompt.to_string())],
        },
    }
}

fn parse_response(response: GeminiResponse) -> Result<ProviderTurn> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CoachError::Provider("No response from Gemini API".to_string()))?;

    let parts = candidate
        .content
        .ok_or_else(|| CoachError::Provider("Empty candidate from Gemini".to_string()))?
        .parts;

    let requests: Vec<ToolRequest> = parts
        .iter()
        .enumerate()
        .filter_map(|(index, part)| {
            part.function_call.as_ref().map(|call| ToolRequest {
                call_id: format!("{}-{}", call.name, index),
                name: call.name.clone(),
                arguments: call.args.clone(),
            })
        })
        .collect();

    if !requests.is_empty() {
        return Ok(ProviderTurn::ToolRequests(requests));
    }

    let text: String = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(CoachError::Provider(
            "Gemini returned neither text nor function calls".to_string(),
        ));
    }

    Ok(ProviderTurn::Final(text))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_with_tools() {
        let turns = vec![ConversationTurn::User {
            text: "How much per month for a $20k goal?".to_string(),
        }];
        let tools = vec![ToolSpec {
            name: "monthly_payment".to_string(),
            description: "Required monthly deposit for a savings goal".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target_amount": {"type": "number"}
                }
            }),
        }];

        let request = build_request("You are a savings coach", &turns, &tools);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("How much per month"));
        assert!(json.contains("functionDeclarations"));
        assert!(json.contains("systemInstruction"));
        assert!(json.contains("monthly_payment"));
    }

    #[test]
    fn test_tool_result_turn_round_trips_as_function_response() {
        let turns = vec![ConversationTurn::ToolResult {
            call_id: "monthly_payment-0".to_string(),
            name: "monthly_payment".to_string(),
            result: json!({"monthly_payment": 294.09}),
        }];

        let request = build_request("system", &turns, &[]);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("functionResponse"));
        assert!(json.contains("294.09"));
    }

    #[test]
    fn test_parse_function_call_response() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "future_value",
                            "args": {"current_savings": 1000.0}
                        }
                    }]
                }
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        match parse_response(response).unwrap() {
            ProviderTurn::ToolRequests(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].name, "future_value");
                assert_eq!(requests[0].call_id, "future_value-0");
            }
            ProviderTurn::Final(_) => panic!("expected tool requests"),
        }
    }

    #[test]
    fn test_parse_text_response() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Save a little every month."}]
                }
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        match parse_response(response).unwrap() {
            ProviderTurn::Final(text) => assert_eq!(text, "Save a little every month."),
            ProviderTurn::ToolRequests(_) => panic!("expected final text"),
        }
    }

    #[test]
    fn test_empty_candidates_is_an_error() {
        let response: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            parse_response(response),
            Err(CoachError::Provider(_))
        ));
    }
}
