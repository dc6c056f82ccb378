// SPDX-License-Identifier: MIT

//! Routing resolution
//!
//! Maps free-text model output to a successor with a fixed precedence:
//! 1. the whole text is a key of the decision table
//! 2. the first key (insertion order) contained in the text, ignoring case
//! 3. otherwise the run ends

use super::compiler::{DecisionTable, Target};
use crate::adk::error::{AutonomaisError, Result};
use crate::adk::model::Content;

/// Marker prepended to every routing message
pub const SELECTED_PREFIX: &str = "Selected: ";

/// Resolve routing text against a decision table
pub fn resolve(text: &str, table: &DecisionTable) -> Target {
    if let Some(target) = table.get(text) {
        return target.clone();
    }

    let lowered = text.to_lowercase();
    table
        .iter()
        .find(|(key, _)| lowered.contains(&key.to_lowercase()))
        .map(|(_, target)| target.clone())
        .unwrap_or(Target::End)
}

/// Resolve the last message of routing node `node`.
///
/// Fails when the message is not plain text.
pub fn resolve_message(node: &str, message: &Content, table: &DecisionTable) -> Result<Target> {
    let text = message
        .text()
        .ok_or_else(|| AutonomaisError::routing(node, "Last message content is not a string."))?;
    let target = resolve(&text, table);
    log::info!("Node {} routed to {:?} from '{}'", node, target, text);
    Ok(target)
}
