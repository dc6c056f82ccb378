// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Nodes are compiled into a transition table once, then walked one node at
//! a time; routing nodes pick their successor from their last message.

pub mod compiler;
pub mod executor;
pub mod router;
mod strategy;

pub use compiler::{compile, CompiledGraph, CompiledNode, DecisionTable, Target, Transition};
pub use executor::{final_text, Executor, RunConfig, INVALID_RESPONSE};
pub use strategy::{parse_state_update, NodeResult, NO_RESPONSE};
