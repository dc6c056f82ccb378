// SPDX-License-Identifier: MIT

//! LLM Agent - tool-augmented agent loop
//!
//! Sends the conversation to the model together with the tool declarations
//! and executes requested tool calls until the model answers with text.

use super::{with_cancel, Agent, AgentEvent, AgentOutput};
use crate::adk::error::{AutonomaisError, Result};
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_TURNS: usize = 10;

/// Agent loop with tool calling support
pub struct LLMAgent {
    pub name: String,
    pub model: Arc<dyn Model>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub config: Option<GenerationConfig>,
    pub max_turns: usize,
    tool_map: HashMap<String, usize>,
}

impl LLMAgent {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tool_map = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        Self {
            name: name.into(),
            model,
            tools,
            config: None,
            max_turns: DEFAULT_MAX_TURNS,
            tool_map,
        }
    }

    fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tool_map.get(name).map(|&i| &self.tools[i])
    }

    async fn call_tool(
        &self,
        name: &str,
        args: &serde_json::Value,
        cancel: &CancellationToken,
        trace: &mut Vec<AgentEvent>,
    ) -> Result<serde_json::Value> {
        log::info!("Agent {} tool call: {} {}", self.name, name, args);
        trace.push(AgentEvent::ToolCall {
            name: name.to_string(),
            args: args.clone(),
        });

        let result = match self.get_tool(name) {
            Some(tool) => {
                let execution =
                    async { Ok::<_, AutonomaisError>(tool.execute(args.clone()).await) };
                match with_cancel(cancel, execution).await? {
                    Ok(res) => res,
                    Err(e) => {
                        log::error!("Tool {} failed: {}", name, e);
                        trace.push(AgentEvent::Error(format!("Tool {} failed: {}", name, e)));
                        serde_json::json!({ "error": e.to_string() })
                    }
                }
            }
            None => {
                log::error!("Tool {} not found", name);
                trace.push(AgentEvent::Error(format!("Tool {} not found", name)));
                serde_json::json!({ "error": format!("Tool {} not found", name) })
            }
        };

        trace.push(AgentEvent::ToolResult {
            name: name.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }
}

#[async_trait]
impl Agent for LLMAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        messages: Vec<Content>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput> {
        let mut history = messages;
        let mut output = AgentOutput::default();

        for turn in 0..self.max_turns {
            log::info!("Agent {} turn {}/{}", self.name, turn + 1, self.max_turns);
            let response = with_cancel(
                cancel,
                self.model
                    .generate_content(&history, self.config.as_ref(), Some(self.tools.as_slice())),
            )
            .await?;

            let mut text_content = String::new();
            let mut function_calls = Vec::new();
            for part in &response.parts {
                match part {
                    Part::Text(text) => text_content.push_str(text),
                    Part::FunctionCall { id, name, args } => function_calls.push((id, name, args)),
                    Part::FunctionResponse { .. } => {}
                }
            }

            if function_calls.is_empty() {
                if text_content.is_empty() {
                    log::warn!(
                        "Agent {} received empty response with no function calls",
                        self.name
                    );
                } else {
                    output.messages.push(Content::model(text_content.clone()));
                    output.trace.push(AgentEvent::Answer(text_content));
                }
                return Ok(output);
            }

            if !text_content.is_empty() {
                output.trace.push(AgentEvent::Thought(text_content));
            }

            let mut function_responses = Vec::with_capacity(function_calls.len());
            for (id, name, args) in function_calls {
                let result = self.call_tool(name, args, cancel, &mut output.trace).await?;
                function_responses.push(Part::FunctionResponse {
                    id: id.clone(),
                    name: name.clone(),
                    response: result,
                });
            }

            let tool_message = Content {
                role: "user".to_string(),
                parts: function_responses,
            };
            history.push(response.clone());
            history.push(tool_message.clone());
            output.messages.push(response);
            output.messages.push(tool_message);
        }

        log::error!("Agent {} reached max turns without text response", self.name);
        Err(AutonomaisError::MaxIterations {
            kind: "turns".to_string(),
            limit: self.max_turns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static ECHO_SCHEMA: Lazy<Value> = Lazy::new(|| {
        json!({
            "type": "object",
            "properties": { "input": {"type": "string"} }
        })
    });

    struct ScriptedModel {
        responses: Vec<Content>,
        index: AtomicUsize,
        histories: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Content>) -> Self {
            Self {
                responses,
                index: AtomicUsize::new(0),
                histories: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn model_name(&self) -> &str {
            "mock-model"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content> {
            self.histories.lock().unwrap().push(history.to_vec());
            let idx = self.index.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .get(idx)
                .cloned()
                .unwrap_or_else(|| tool_call("echo")))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn schema(&self) -> &Value {
            &ECHO_SCHEMA
        }

        async fn execute(&self, input: Value) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> {
            Ok(json!({ "echo": input["input"] }))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn schema(&self) -> &Value {
            &ECHO_SCHEMA
        }

        async fn execute(&self, _input: Value) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> {
            Err("boom".into())
        }
    }

    fn tool_call(name: &str) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                id: Some(format!("call_{}", name)),
                name: name.to_string(),
                args: json!({"input": "ping"}),
            }],
        }
    }

    #[tokio::test]
    async fn test_text_response_returns_immediately() {
        let model = Arc::new(ScriptedModel::new(vec![Content::model("hello")]));
        let agent = LLMAgent::new("a", model, vec![Arc::new(EchoTool)]);

        let output = agent
            .invoke(vec![Content::user("hi")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.last_message().unwrap().text().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("echo"),
            Content::model("the tool said ping"),
        ]));
        let agent = LLMAgent::new("a", model.clone(), vec![Arc::new(EchoTool)]);

        let output = agent
            .invoke(vec![Content::user("hi")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            output.last_message().unwrap().text().unwrap(),
            "the tool said ping"
        );
        assert!(output.trace.contains(&AgentEvent::ToolResult {
            name: "echo".to_string(),
            result: json!({"echo": "ping"}),
        }));

        // Second model call sees the call and its response
        let histories = model.histories.lock().unwrap();
        let second = &histories[1];
        assert_eq!(second.len(), 3);
        match &second[2].parts[0] {
            Part::FunctionResponse { id, response, .. } => {
                assert_eq!(id.as_deref(), Some("call_echo"));
                assert_eq!(response["echo"], "ping");
            }
            other => panic!("Expected FunctionResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_errors_are_reported_to_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("broken"),
            tool_call("missing"),
            Content::model("recovered"),
        ]));
        let agent = LLMAgent::new("a", model.clone(), vec![Arc::new(FailingTool)]);

        let output = agent
            .invoke(vec![Content::user("hi")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.last_message().unwrap().text().unwrap(), "recovered");
        let errors = output
            .trace
            .iter()
            .filter(|e| matches!(e, AgentEvent::Error(_)))
            .count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_max_turns() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let mut agent = LLMAgent::new("a", model, vec![Arc::new(EchoTool)]);
        agent.max_turns = 3;

        let result = agent
            .invoke(vec![Content::user("hi")], &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(AutonomaisError::MaxIterations { limit: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_response_produces_no_message() {
        let empty = Content {
            role: "model".to_string(),
            parts: vec![],
        };
        let model = Arc::new(ScriptedModel::new(vec![empty]));
        let agent = LLMAgent::new("a", model, vec![]);

        let output = agent
            .invoke(vec![Content::user("hi")], &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.messages.is_empty());
    }
}
