// SPDX-License-Identifier: MIT

//! Compiled workflow entry point

use super::checkpoint::Checkpointer;
use super::graph::compiler::{self, CompiledGraph};
use super::graph::executor::{self, Executor, RunConfig};
use super::node::{self, GraphNode};
use super::state::WorkflowState;
use crate::adk::agent::{Agent, AgentEvent, AgentOutput};
use crate::adk::error::{AutonomaisError, Result};
use crate::adk::model::{Content, Model};
use crate::autonomais::config::DEFAULT_MAX_STEPS;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A validated, compiled workflow that can be invoked repeatedly
pub struct GraphRunner {
    graph: CompiledGraph,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    max_steps: usize,
}

impl GraphRunner {
    /// Validate and compile `nodes`.
    ///
    /// All configuration errors surface here; nothing is executed.
    pub fn make(
        model: Arc<dyn Model>,
        nodes: Vec<GraphNode>,
        checkpointer: Option<Arc<dyn Checkpointer>>,
    ) -> Result<Self> {
        node::validate(&nodes)?;
        let graph = compiler::compile(model, nodes)?;
        log::info!(
            "Compiled workflow with {} nodes, entry '{}'",
            graph.len(),
            graph.entry()
        );
        Ok(Self {
            graph,
            checkpointer,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }

    /// Step limit used by [`GraphRunner::invoke`]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Run the workflow over `messages` and return the final text
    pub async fn invoke(&self, messages: Vec<Content>) -> Result<String> {
        self.invoke_with(messages, self.default_config()).await
    }

    /// Run with explicit options.
    ///
    /// With a thread id and a checkpointer, the thread's previous
    /// conversation and shared state are loaded and `messages` appended.
    pub async fn invoke_with(&self, messages: Vec<Content>, config: RunConfig) -> Result<String> {
        let state = self.run(messages, &config).await?;
        Ok(executor::final_text(&state))
    }

    /// Like [`GraphRunner::invoke_with`] but returns the whole final state
    pub async fn run(&self, messages: Vec<Content>, config: &RunConfig) -> Result<WorkflowState> {
        let mut state = match self.previous_state(config).await? {
            Some(previous) => {
                log::info!(
                    "Continuing thread with {} prior messages",
                    previous.messages.len()
                );
                previous
            }
            None => WorkflowState::default(),
        };
        state.messages.extend(messages);

        self.executor()
            .run(state, self.graph.entry(), config)
            .await
    }

    /// Continue an interrupted run from its last checkpoint
    pub async fn resume(&self, thread_id: &str, config: RunConfig) -> Result<String> {
        let store = self.checkpointer.as_ref().ok_or_else(|| {
            AutonomaisError::Checkpoint("Resuming requires a checkpointer".to_string())
        })?;
        let checkpoint = store.load(thread_id).await?.ok_or_else(|| {
            AutonomaisError::Checkpoint(format!("No checkpoint for thread {}", thread_id))
        })?;

        let Some(next) = checkpoint.next else {
            log::info!("Thread {} already finished", thread_id);
            return Ok(executor::final_text(&checkpoint.state));
        };

        log::info!("Resuming thread {} at node {}", thread_id, next);
        let config = RunConfig {
            thread_id: Some(thread_id.to_string()),
            ..config
        };
        let state = self
            .executor()
            .run(checkpoint.state, &next, &config)
            .await?;
        Ok(executor::final_text(&state))
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.graph, self.checkpointer.as_deref())
    }

    fn default_config(&self) -> RunConfig {
        RunConfig::default().with_max_steps(self.max_steps)
    }

    async fn previous_state(&self, config: &RunConfig) -> Result<Option<WorkflowState>> {
        match (&self.checkpointer, &config.thread_id) {
            (Some(store), Some(thread_id)) => {
                Ok(store.load(thread_id).await?.map(|checkpoint| checkpoint.state))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Agent for GraphRunner {
    fn name(&self) -> &str {
        self.graph.entry()
    }

    async fn invoke(
        &self,
        messages: Vec<Content>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput> {
        let seen = messages.len();
        let config = self.default_config().with_cancel(cancel.clone());
        let state = self.run(messages, &config).await?;

        Ok(AgentOutput {
            trace: vec![AgentEvent::Answer(executor::final_text(&state))],
            messages: state.messages.into_iter().skip(seen).collect(),
        })
    }
}
