// SPDX-License-Identifier: MIT

//! Graph workflow executor

use super::compiler::{CompiledGraph, CompiledNode, Target, Transition};
use super::router;
use super::strategy::{self, NO_RESPONSE};
use crate::adk::error::{AutonomaisError, Result};
use crate::autonomais::config::DEFAULT_MAX_STEPS;
use crate::autonomais::workflow::checkpoint::{Checkpoint, Checkpointer};
use crate::autonomais::workflow::state::WorkflowState;
use tokio_util::sync::CancellationToken;

/// Reported when a run ends without any message
pub const INVALID_RESPONSE: &str = "Invalid response from AI.";

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Checkpoint key; runs without one are not checkpointed
    pub thread_id: Option<String>,
    pub cancel: CancellationToken,
    /// Upper bound on executed nodes
    pub max_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            cancel: CancellationToken::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl RunConfig {
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Walks a compiled graph one node at a time
pub struct Executor<'a> {
    graph: &'a CompiledGraph,
    checkpointer: Option<&'a dyn Checkpointer>,
}

impl<'a> Executor<'a> {
    pub fn new(graph: &'a CompiledGraph, checkpointer: Option<&'a dyn Checkpointer>) -> Self {
        Self {
            graph,
            checkpointer,
        }
    }

    /// Run from `start` until a transition reaches the end.
    ///
    /// The state after each node is checkpointed when the run has a thread id.
    pub async fn run(
        &self,
        mut state: WorkflowState,
        start: &str,
        config: &RunConfig,
    ) -> Result<WorkflowState> {
        let mut current = start.to_string();
        let mut step = 0;

        loop {
            if step >= config.max_steps {
                log::warn!("Run stopped after {} steps at node {}", step, current);
                return Err(AutonomaisError::MaxIterations {
                    kind: "steps".to_string(),
                    limit: config.max_steps,
                });
            }
            if config.cancel.is_cancelled() {
                return Err(AutonomaisError::Cancelled);
            }

            let node = self.graph.node(&current).ok_or_else(|| {
                AutonomaisError::routing(current.as_str(), "Node is not part of the graph")
            })?;
            log::info!("Step {}: executing node {} ({:?})", step + 1, node.node.name, node.kind);

            let result = strategy::execute(
                node.kind,
                &node.node,
                &state,
                self.graph.model(),
                &config.cancel,
            )
            .await?;
            state.apply(result.update);
            step += 1;

            let next = match result.halted {
                Some(diagnostic) => {
                    log::warn!("Node {} halted the run: {}", node.node.name, diagnostic);
                    None
                }
                None => next_node(node, &state)?,
            };

            if let (Some(store), Some(thread_id)) = (self.checkpointer, &config.thread_id) {
                store
                    .save(thread_id, &Checkpoint::new(state.clone(), next.clone(), step))
                    .await?;
            }

            match next {
                Some(name) => current = name,
                None => {
                    log::info!("Run finished after {} steps", step);
                    return Ok(state);
                }
            }
        }
    }
}

fn next_node(node: &CompiledNode, state: &WorkflowState) -> Result<Option<String>> {
    match &node.transition {
        Transition::Goto(name) => Ok(Some(name.clone())),
        Transition::End => Ok(None),
        Transition::Decide(table) => {
            let message = state
                .last_message()
                .ok_or_else(|| AutonomaisError::routing(node.node.name.as_str(), "No messages to route on"))?;
            Ok(match router::resolve_message(&node.node.name, message, table)? {
                Target::Node(name) => Some(name),
                Target::End => None,
            })
        }
    }
}

/// Text of the last message of a finished run
pub fn final_text(state: &WorkflowState) -> String {
    match state.last_message() {
        None => INVALID_RESPONSE.to_string(),
        Some(message) => match message.text() {
            Some(text) if text.is_empty() => NO_RESPONSE.to_string(),
            Some(text) => text,
            None => message.to_display_text(),
        },
    }
}
