// SPDX-License-Identifier: MIT

//! Prompt Agent - one instruction-following model call behind the token guard

use super::{with_cancel, Agent, AgentEvent, AgentOutput};
use crate::adk::error::Result;
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::adk::tokens::{self, GuardOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const FOLLOW_INSTRUCTIONS: &str = "Follow the instructions.";

/// Plain model call with a system instruction and no tools
pub struct PromptAgent {
    pub name: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: Option<GenerationConfig>,
}

impl PromptAgent {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>) -> Self {
        Self {
            name: name.into(),
            instruction: FOLLOW_INSTRUCTIONS.to_string(),
            model,
            config: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        messages: Vec<Content>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput> {
        let mut history = Vec::with_capacity(messages.len() + 1);
        history.push(Content::system(self.instruction.clone()));
        history.extend(messages);

        let prompt = tokens::render_prompt(&history);
        if let GuardOutcome::Abort(diagnostic) = tokens::guard(&prompt, self.model.as_ref()) {
            return Ok(AgentOutput {
                messages: vec![Content::model(diagnostic.clone())],
                trace: vec![AgentEvent::BudgetExceeded(diagnostic)],
            });
        }

        log::debug!("Agent {} prompt:\n{}", self.name, prompt);

        let response = with_cancel(
            cancel,
            self.model
                .generate_content(&history, self.config.as_ref(), None),
        )
        .await?;

        let mut output = AgentOutput::default();
        match response.text() {
            Some(text) if !text.is_empty() => {
                output.trace.push(AgentEvent::Answer(text));
                output.messages.push(response);
            }
            _ => log::warn!("Agent {} received an empty response", self.name),
        }
        Ok(output)
    }
}
