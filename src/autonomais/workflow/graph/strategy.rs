// SPDX-License-Identifier: MIT

//! Per-node execution strategies
//!
//! Each strategy reads the current state and returns the update it
//! produces; the engine decides whether and when to apply it.

use super::router::SELECTED_PREFIX;
use crate::adk::agent::{Agent, AgentOutput, LLMAgent, PromptAgent};
use crate::adk::error::Result;
use crate::adk::model::{Content, Model};
use crate::autonomais::workflow::node::{GraphNode, NodeKind, END};
use crate::autonomais::workflow::state::{StateUpdate, WorkflowState};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Substituted when the model produces nothing
pub const NO_RESPONSE: &str = "No response from AI.";

const SELECTION_INSTRUCTION: &str =
    "You are to select the next best node from a list of possible nodes.";

/// Result of executing one node
#[derive(Debug, Clone, Default)]
pub struct NodeResult {
    pub update: StateUpdate,
    /// Token budget diagnostic; the run stops after this node when set
    pub halted: Option<String>,
}

/// Dispatch on the node's kind
pub async fn execute(
    kind: NodeKind,
    node: &GraphNode,
    state: &WorkflowState,
    model: &Arc<dyn Model>,
    cancel: &CancellationToken,
) -> Result<NodeResult> {
    match kind {
        NodeKind::Agent => call_agent(node, state, model, cancel).await,
        NodeKind::Router => call_router(node, state, model, cancel).await,
        NodeKind::Combined => call_combined(node, state, model, cancel).await,
    }
}

/// Run the node's instructions against the conversation so far
pub async fn call_agent(
    node: &GraphNode,
    state: &WorkflowState,
    model: &Arc<dyn Model>,
    cancel: &CancellationToken,
) -> Result<NodeResult> {
    log::info!("Calling agent: {}", node.name);

    let mut messages = state.messages.clone();
    messages.push(Content::user(node.instructions.clone()));

    let run_name = format!("Agent - {}", node.name);
    let output = if node.tools.is_empty() {
        PromptAgent::new(run_name, model.clone())
            .invoke(messages, cancel)
            .await?
    } else {
        LLMAgent::new(run_name, model.clone(), node.tools.clone())
            .invoke(messages, cancel)
            .await?
    };

    let halted = output.budget_exceeded().map(str::to_string);
    let message = produced_message(&output);
    log::info!("{}: {}", node.name, message.to_display_text());

    let mut update = StateUpdate::message(&node.name, message);
    if !node.state.is_empty() && halted.is_none() {
        let reply = update.messages[0].to_display_text();
        update.shared = update_shared_state(node, &reply, model, cancel).await?;
    }

    Ok(NodeResult { update, halted })
}

/// Select the next node from the node's links
pub async fn call_router(
    node: &GraphNode,
    state: &WorkflowState,
    model: &Arc<dyn Model>,
    cancel: &CancellationToken,
) -> Result<NodeResult> {
    log::info!("Calling conditional: {}", node.name);

    let candidates = node.candidates();
    let selection = match candidates.as_slice() {
        [] => Some(END.to_string()),
        [only] => Some(only.clone()),
        _ => None,
    };
    if let Some(choice) = selection {
        log::info!("{}: selecting '{}' without a model call", node.name, choice);
        let message = Content::model(format!("{}{}", SELECTED_PREFIX, choice));
        return Ok(NodeResult {
            update: StateUpdate::message(&node.name, message),
            halted: None,
        });
    }

    let prompt = selection_prompt(node, state, &candidates)?;
    let output = PromptAgent::new(format!("Conditional - {}", node.name), model.clone())
        .with_instruction(SELECTION_INSTRUCTION)
        .invoke(vec![Content::user(prompt)], cancel)
        .await?;

    let halted = output.budget_exceeded().map(str::to_string);
    let message = match (&halted, output.last_message().and_then(Content::text)) {
        (Some(diagnostic), _) => Content::model(diagnostic.clone()),
        (None, Some(text)) if !text.is_empty() => {
            Content::model(format!("{}{}", SELECTED_PREFIX, text.trim()))
        }
        _ => Content::model(NO_RESPONSE),
    };
    log::info!("{}: {}", node.name, message.to_display_text());

    Ok(NodeResult {
        update: StateUpdate::message(&node.name, message),
        halted,
    })
}

/// Run the agent, then route on the state that includes its answer
pub async fn call_combined(
    node: &GraphNode,
    state: &WorkflowState,
    model: &Arc<dyn Model>,
    cancel: &CancellationToken,
) -> Result<NodeResult> {
    let agent = call_agent(node, state, model, cancel).await?;
    if agent.halted.is_some() {
        return Ok(agent);
    }

    let after_agent = state.with_update(&agent.update);
    let router = call_router(node, &after_agent, model, cancel).await?;

    Ok(NodeResult {
        update: agent.update.merge(router.update),
        halted: router.halted,
    })
}

fn produced_message(output: &AgentOutput) -> Content {
    // a tool loop that stops without an answer leaves a tool message last
    match output.last_message().and_then(Content::text) {
        Some(text) if !text.is_empty() => Content::model(text),
        _ => Content::model(NO_RESPONSE),
    }
}

fn selection_prompt(node: &GraphNode, state: &WorkflowState, candidates: &[String]) -> Result<String> {
    let conversation = serde_json::to_string(&state.messages)?;
    Ok(format!(
        "This is the conversation so far: \"\"\"{}\"\"\".\n\
         Your instructions are: \"\"\"{}\"\"\".\n\
         Following the instructions, reply with one (and only one) of the following nodes: {}.",
        conversation,
        node.instructions,
        candidates.join(", ")
    ))
}

/// Ask the model for new values of the node's declared state keys
async fn update_shared_state(
    node: &GraphNode,
    reply: &str,
    model: &Arc<dyn Model>,
    cancel: &CancellationToken,
) -> Result<BTreeMap<String, String>> {
    let scope = serde_json::to_string(&node.state)?;
    let prompt = format!(
        "Based on the message from an AI agent to a human, update the following state variables:\n\
         Message: \"\"\"{}\"\"\"\n\
         State variables to update: ```{}```\n\n\
         Respond with a JSON object containing the updated state variables.",
        reply, scope
    );

    let output = PromptAgent::new(format!("State Update - {}", node.name), model.clone())
        .invoke(vec![Content::user(prompt)], cancel)
        .await?;
    if output.budget_exceeded().is_some() {
        return Ok(BTreeMap::new());
    }

    let text = output
        .last_message()
        .map(Content::to_display_text)
        .unwrap_or_default();
    Ok(parse_state_update(&text, &node.state).unwrap_or_else(|| {
        log::warn!("Error parsing state update for {}: {}", node.name, text);
        BTreeMap::new()
    }))
}

/// Extract declared keys from a JSON object reply.
///
/// Tolerates Markdown code fences, surrounding quotes and JSON5 syntax
/// (unquoted keys, single quotes, trailing commas).
pub fn parse_state_update(text: &str, keys: &[String]) -> Option<BTreeMap<String, String>> {
    let cleaned = strip_json_wrapping(text);
    let value: Value = match json5::from_str(cleaned) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("State update is not JSON5: {}", e);
            return None;
        }
    };
    let object = value.as_object()?;

    Some(
        keys.iter()
            .filter_map(|key| {
                object.get(key).map(|v| {
                    let s = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), s)
                })
            })
            .collect(),
    )
}

fn strip_json_wrapping(text: &str) -> &str {
    let mut s = text.trim();

    // keep only the last fenced block
    if let Some(close) = s.rfind("```") {
        let before = &s[..close];
        if let Some(open) = before.rfind("```") {
            s = &before[open..];
        }
    }

    s = s.trim_matches('`').trim_matches('"').trim();
    s.strip_prefix("json").map(str::trim).unwrap_or(s)
}
