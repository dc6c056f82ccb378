// SPDX-License-Identifier: MIT

//! Runtime state threaded through a workflow run
//!
//! Node strategies never mutate the state they are given. They return a
//! [`StateUpdate`] which the engine folds in with fixed reducers:
//! - `messages` - append
//! - `last_node` - overwrite
//! - `shared` - shallow right-biased merge

use crate::adk::model::Content;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Conversation history, append-only during a run
    pub messages: Vec<Content>,
    /// Most recently executed node
    pub last_node: Option<String>,
    /// Values written by nodes that declare state keys
    #[serde(default)]
    pub shared: BTreeMap<String, String>,
}

/// What a node contributes to the state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Content>,
    pub last_node: Option<String>,
    pub shared: BTreeMap<String, String>,
}

impl WorkflowState {
    pub fn new(messages: Vec<Content>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Fold an update into the state
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if update.last_node.is_some() {
            self.last_node = update.last_node;
        }
        self.shared.extend(update.shared);
    }

    /// The state as it looks after `update`, leaving `self` untouched
    pub fn with_update(&self, update: &StateUpdate) -> Self {
        let mut next = self.clone();
        next.apply(update.clone());
        next
    }

    pub fn last_message(&self) -> Option<&Content> {
        self.messages.last()
    }
}

impl StateUpdate {
    /// An update appending a single message on behalf of `node`
    pub fn message(node: &str, message: Content) -> Self {
        Self {
            messages: vec![message],
            last_node: Some(node.to_string()),
            shared: BTreeMap::new(),
        }
    }

    /// Chain two updates produced by the same run step
    pub fn merge(mut self, other: StateUpdate) -> Self {
        self.messages.extend(other.messages);
        if other.last_node.is_some() {
            self.last_node = other.last_node;
        }
        self.shared.extend(other.shared);
        self
    }
}
