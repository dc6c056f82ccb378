// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing
//!
//! A workflow file is a mapping from node name to node definition; the
//! first entry is the entry node.
//!
//! ```yaml
//! triage:
//!   instructions: Decide who should handle the request
//!   links: [researcher, writer]
//!   exit: true
//! researcher:
//!   instructions: Research the topic
//!   tools: [search]
//!   links: [writer]
//! writer:
//!   instructions: Write the answer
//!   state: [topic]
//!   links: []
//! ```

use super::node::GraphNode;
use super::registry::ToolRegistry;
use crate::adk::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// One node as written in YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeSpec {
    instructions: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    links: Option<Vec<String>>,
    #[serde(default)]
    state: Vec<String>,
    #[serde(default)]
    exit: bool,
}

/// Loads workflow definitions, resolving tool names through a registry
pub struct WorkflowLoader {
    registry: ToolRegistry,
}

impl WorkflowLoader {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Load a workflow from a YAML file
    pub async fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<Vec<GraphNode>> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        log::info!("Loading workflow from {}", path.as_ref().display());
        Self::parse_yaml(&content, &self.registry).await
    }

    /// Parse a workflow from a YAML string
    pub async fn parse_yaml(content: &str, registry: &ToolRegistry) -> Result<Vec<GraphNode>> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(content)?;
        if mapping.is_empty() {
            return Err(ConfigError::EmptyWorkflow.into());
        }

        let mut specs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "Node names must be strings, got {:?}",
                        other
                    ))
                    .into())
                }
            };
            let spec: NodeSpec = serde_yaml::from_value(value)?;
            specs.push((name, spec));
        }

        let known: HashSet<&str> = specs.iter().map(|(name, _)| name.as_str()).collect();
        for (name, spec) in &specs {
            if let Some(link) = spec
                .links
                .iter()
                .flatten()
                .find(|link| !known.contains(link.as_str()))
            {
                return Err(ConfigError::UnknownLink {
                    node: name.clone(),
                    link: link.clone(),
                }
                .into());
            }
        }

        let mut nodes = Vec::with_capacity(specs.len());
        for (name, spec) in specs {
            let instructions = spec
                .instructions
                .ok_or_else(|| ConfigError::MissingInstructions { node: name.clone() })?;

            let mut tools = Vec::with_capacity(spec.tools.len());
            for tool_name in &spec.tools {
                match registry.get(tool_name).await {
                    Some(tool) => tools.push(tool),
                    None => {
                        return Err(ConfigError::UnknownTool {
                            node: name,
                            tool: tool_name.clone(),
                            available: registry.names().await,
                        }
                        .into())
                    }
                }
            }

            nodes.push(GraphNode {
                name,
                instructions,
                tools,
                links: spec.links,
                state: spec.state,
                exit: spec.exit,
            });
        }

        log::debug!("Parsed {} workflow nodes", nodes.len());
        Ok(nodes)
    }
}
