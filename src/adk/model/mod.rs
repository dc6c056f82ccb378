// SPDX-License-Identifier: MIT

//! Model module - the generative model boundary
//!
//! This module provides the core Model trait and the message types shared
//! by every agent and workflow node. Provider implementations live in their
//! own submodules:
//! - [openai] - OpenAI's chat completions API

pub mod openai;

use crate::adk::error::Result;
use crate::adk::tokens;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A role-tagged message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message - text, function calls, function responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    /// Regular text
    Text(String),
    /// Function/tool call requested by the model
    FunctionCall {
        /// Provider-assigned call id, echoed back in the matching response
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        args: serde_json::Value,
    },
    /// Response from executing a function/tool
    FunctionResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        response: serde_json::Value,
    },
}

impl Content {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new("model", text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", text)
    }

    /// The message as plain text, or `None` when it carries anything but text.
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                _ => return None,
            }
        }
        Some(out)
    }

    /// Plain text when possible, otherwise the parts as JSON.
    pub fn to_display_text(&self) -> String {
        self.text()
            .unwrap_or_else(|| serde_json::to_string(&self.parts).unwrap_or_default())
    }
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Identifier used for tokenizer and context window lookups
    fn model_name(&self) -> &str;

    /// Maximum prompt size in tokens
    fn context_window(&self) -> usize {
        tokens::context_window(self.model_name())
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content>;
}
