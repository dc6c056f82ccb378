// SPDX-License-Identifier: MIT

//! Agent module - callable units over a message history
//!
//! This module provides the core Agent trait and implementations:
//! - `PromptAgent` - single guarded instruction-following model call
//! - `LLMAgent` - tool-augmented agent loop

mod llm;
mod prompt;

pub use llm::LLMAgent;
pub use prompt::PromptAgent;

use crate::adk::error::{AutonomaisError, Result};
use crate::adk::model::Content;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Intermediate step recorded while an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    Thought(String),
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
    ToolResult {
        name: String,
        result: serde_json::Value,
    },
    Answer(String),
    Error(String),
    /// The prompt did not fit the model's context window
    BudgetExceeded(String),
}

/// Messages produced by an agent plus its trace
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub messages: Vec<Content>,
    pub trace: Vec<AgentEvent>,
}

impl AgentOutput {
    pub fn last_message(&self) -> Option<&Content> {
        self.messages.last()
    }

    /// Diagnostic text when the token budget guard aborted the call
    pub fn budget_exceeded(&self) -> Option<&str> {
        self.trace.iter().find_map(|event| match event {
            AgentEvent::BudgetExceeded(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent over a conversation.
    ///
    /// Every model and tool call races `cancel`.
    async fn invoke(&self, messages: Vec<Content>, cancel: &CancellationToken)
        -> Result<AgentOutput>;
}

/// Await `fut` unless `cancel` fires first
pub async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AutonomaisError::Cancelled),
        result = fut => result,
    }
}

/// Drive `fut` to completion, cancelling `cancel` if `interrupt` fires first.
///
/// The future still runs after the interrupt so it can observe the
/// cancellation and unwind on its own.
pub async fn run_interruptible<T, F, I>(cancel: &CancellationToken, interrupt: I, fut: F) -> T
where
    F: Future<Output = T>,
    I: Future,
{
    tokio::pin!(fut);
    tokio::select! {
        result = &mut fut => result,
        _ = interrupt => {
            log::info!("Interrupted; cancelling the current run");
            cancel.cancel();
            fut.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_with_cancel_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = with_cancel(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_cancel_abandons_pending_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<()> = with_cancel(&cancel, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AutonomaisError::Cancelled)));
    }

    #[tokio::test]
    async fn test_with_cancel_prefers_cancellation_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = with_cancel(&cancel, async { Ok(1) }).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupt_cancels_and_awaits_run() {
        let cancel = CancellationToken::new();
        let inner = cancel.clone();
        let run = async move {
            with_cancel(&inner, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await
        };

        let result = run_interruptible(&cancel, tokio::time::sleep(Duration::from_millis(10)), run).await;
        assert!(matches!(result, Err(AutonomaisError::Cancelled)));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_finished_run_ignores_pending_interrupt() {
        let cancel = CancellationToken::new();
        let value = run_interruptible(&cancel, std::future::pending::<()>(), async { 5 }).await;
        assert_eq!(value, 5);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_budget_exceeded_lookup() {
        let output = AgentOutput {
            messages: vec![Content::model("too big")],
            trace: vec![AgentEvent::BudgetExceeded("too big".to_string())],
        };
        assert_eq!(output.budget_exceeded(), Some("too big"));
        assert!(AgentOutput::default().budget_exceeded().is_none());
    }
}
