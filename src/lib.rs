// SPDX-License-Identifier: MIT

//! Declarative graph workflows for multi-step LLM agents.
//!
//! - [`adk`] - the agent development kit: models, tools, agents, token budget
//! - [`autonomais`] - workflow nodes, graph compilation and execution

pub mod adk;
pub mod autonomais;
