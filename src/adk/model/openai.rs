// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::{AutonomaisError, ModelError, Result};
use crate::adk::tool::Tool;
use crate::autonomais::config::ModelSettings;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "OpenAI";

/// OpenAI chat completions model
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    defaults: GenerationConfig,
}

impl OpenAIModel {
    /// Create a model from explicit settings.
    ///
    /// Fails with a configuration error when no API key is present.
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::ApiKeyMissing("OPENAI_API_KEY".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model_name: settings.model_name.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            defaults: GenerationConfig {
                temperature: Some(settings.temperature),
                top_p: Some(settings.top_p),
                max_output_tokens: None,
            },
        })
    }

    /// Create a model from `OPENAI_*` / `MODEL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(&ModelSettings::from_env()?)
    }

    /// Convert internal Content to OpenAI messages.
    ///
    /// A content carrying several tool responses expands to one `tool`
    /// message per response.
    fn content_to_openai_messages(content: &Content) -> Vec<Value> {
        let responses: Vec<Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionResponse { id, name, response } => Some(json!({
                    "role": "tool",
                    "tool_call_id": id.clone().unwrap_or_else(|| name.clone()),
                    "content": serde_json::to_string(response).unwrap_or_default()
                })),
                _ => None,
            })
            .collect();
        if !responses.is_empty() {
            return responses;
        }

        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        let mut tool_calls = Vec::new();
        let mut text_content = String::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text_content.push_str(t),
                Part::FunctionCall { id, name, args } => {
                    tool_calls.push(json!({
                        "id": id.clone().unwrap_or_else(|| name.clone()),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": serde_json::to_string(args).unwrap_or_default()
                        }
                    }));
                }
                Part::FunctionResponse { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            vec![json!({ "role": role, "content": text_content })]
        } else {
            vec![json!({
                "role": role,
                "content": if text_content.is_empty() { Value::Null } else { json!(text_content) },
                "tool_calls": tool_calls
            })]
        }
    }

    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    fn parse_openai_response(response: &Value) -> Result<Content> {
        let message = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let mut parts = Vec::new();
        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let name = tc["function"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: Value = serde_json::from_str(args_str).unwrap_or(json!({}));

                parts.push(Part::FunctionCall {
                    id: tc["id"].as_str().map(str::to_string),
                    name,
                    args,
                });
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages: Vec<Value> = history
            .iter()
            .flat_map(Self::content_to_openai_messages)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        let cfg = config.unwrap_or(&self.defaults);
        if let Some(temp) = cfg.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = cfg.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = cfg.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_openai_format(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited { retry_after_secs }.into());
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(AutonomaisError::adapter(
                PROVIDER,
                format!("{}: {}", status, text),
            ));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_openai_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> ModelSettings {
        ModelSettings {
            api_key: api_key.map(str::to_string),
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = OpenAIModel::new(&settings(None));
        assert!(matches!(result, Err(AutonomaisError::Config(_))));

        let result = OpenAIModel::new(&settings(Some("  ")));
        assert!(matches!(result, Err(AutonomaisError::Config(_))));
    }

    #[test]
    fn test_new_uses_settings() {
        let mut s = settings(Some("sk-test"));
        s.model_name = "gpt-4".to_string();
        s.base_url = "http://localhost:8080/v1/".to_string();

        let model = OpenAIModel::new(&s).unwrap();
        assert_eq!(model.model_name(), "gpt-4");
        assert_eq!(model.context_window(), 8192);
        assert_eq!(model.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_model_role_maps_to_assistant() {
        let msgs = OpenAIModel::content_to_openai_messages(&Content::model("I can help"));
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "assistant");
        assert_eq!(msgs[0]["content"], "I can help");
    }

    #[test]
    fn test_function_call_keeps_call_id() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                id: Some("call_42".to_string()),
                name: "search".to_string(),
                args: json!({"query": "rust"}),
            }],
        };

        let msgs = OpenAIModel::content_to_openai_messages(&content);
        assert_eq!(msgs[0]["role"], "assistant");
        assert!(msgs[0]["content"].is_null());
        assert_eq!(msgs[0]["tool_calls"][0]["id"], "call_42");
        assert_eq!(msgs[0]["tool_calls"][0]["function"]["name"], "search");
    }

    #[test]
    fn test_each_function_response_becomes_tool_message() {
        let content = Content {
            role: "user".to_string(),
            parts: vec![
                Part::FunctionResponse {
                    id: Some("call_1".to_string()),
                    name: "a".to_string(),
                    response: json!({"ok": true}),
                },
                Part::FunctionResponse {
                    id: Some("call_2".to_string()),
                    name: "b".to_string(),
                    response: json!("done"),
                },
            ],
        };

        let msgs = OpenAIModel::content_to_openai_messages(&content);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["role"], "tool");
        assert_eq!(msgs[0]["tool_call_id"], "call_1");
        assert_eq!(msgs[1]["tool_call_id"], "call_2");
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello, how can I help?" }
            }]
        });

        let content = OpenAIModel::parse_openai_response(&response).unwrap();
        assert_eq!(content.role, "model");
        assert_eq!(content.text(), Some("Hello, how can I help?".to_string()));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"city\": \"London\"}"
                        }
                    }]
                }
            }]
        });

        let content = OpenAIModel::parse_openai_response(&response).unwrap();
        match &content.parts[0] {
            Part::FunctionCall { id, name, args } => {
                assert_eq!(id.as_deref(), Some("call_123"));
                assert_eq!(name, "get_weather");
                assert_eq!(args["city"], "London");
            }
            _ => panic!("Expected FunctionCall part"),
        }
    }

    #[test]
    fn test_parse_response_without_choices_fails() {
        let result = OpenAIModel::parse_openai_response(&json!({"choices": []}));
        assert!(matches!(
            result,
            Err(AutonomaisError::Model(ModelError::InvalidResponse(_)))
        ));
    }
}
