// SPDX-License-Identifier: MIT

//! Workflow nodes and their validation

use crate::adk::error::{ConfigError, Result};
use crate::adk::tool::Tool;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Reserved name of the terminal state
pub const END: &str = "END";

/// A single workflow step
#[derive(Clone)]
pub struct GraphNode {
    /// Unique node name, used as the graph vertex key
    pub name: String,
    /// Directive given to the model when this node runs
    pub instructions: String,
    /// Tools available to this node; empty means no tool augmentation
    pub tools: Vec<Arc<dyn Tool>>,
    /// Outbound links.
    ///
    /// `None` falls through to the next declared node (or ends the run after
    /// the last node). `Some(vec![])` makes the node terminal.
    pub links: Option<Vec<String>>,
    /// Shared state keys this node updates after it runs
    pub state: Vec<String>,
    /// Offer [`END`] as an extra routing choice (nodes with two or more links)
    pub exit: bool,
}

/// How a node executes, derived from its declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Run the instructions
    Agent,
    /// Pick the next node
    Router,
    /// Run the instructions with tools, then pick the next node
    Combined,
}

impl GraphNode {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: vec![],
            links: None,
            state: vec![],
            exit: false,
        }
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links = Some(links.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_state<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn exit(mut self) -> Self {
        self.exit = true;
        self
    }

    pub fn kind(&self) -> NodeKind {
        match &self.links {
            Some(links) if !links.is_empty() => {
                if self.tools.is_empty() {
                    NodeKind::Router
                } else {
                    NodeKind::Combined
                }
            }
            _ => NodeKind::Agent,
        }
    }

    pub fn links(&self) -> &[String] {
        self.links.as_deref().unwrap_or(&[])
    }

    /// Names a routing call may choose from, in declaration order
    pub fn candidates(&self) -> Vec<String> {
        let mut candidates = self.links().to_vec();
        if self.exit && candidates.len() >= 2 {
            candidates.push(END.to_string());
        }
        candidates
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("tools", &self.tool_names())
            .field("links", &self.links)
            .field("state", &self.state)
            .field("exit", &self.exit)
            .finish()
    }
}

/// Check names and instructions of every node
pub fn validate(nodes: &[GraphNode]) -> Result<()> {
    if nodes.is_empty() {
        return Err(ConfigError::EmptyWorkflow.into());
    }

    let mut seen = HashSet::new();
    for (index, node) in nodes.iter().enumerate() {
        if node.name.trim().is_empty() {
            return Err(ConfigError::MissingName { index }.into());
        }
        if node.name == END {
            return Err(ConfigError::Invalid(format!(
                "Graph misconfigured. Node name `{}` is reserved",
                END
            ))
            .into());
        }
        if node.instructions.trim().is_empty() {
            return Err(ConfigError::MissingInstructions {
                node: node.name.clone(),
            }
            .into());
        }
        if !seen.insert(node.name.as_str()) {
            return Err(ConfigError::DuplicateNode {
                node: node.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::AutonomaisError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::error::Error;

    static EMPTY_SCHEMA: Value = Value::Null;

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn schema(&self) -> &Value {
            &EMPTY_SCHEMA
        }

        async fn execute(&self, _input: Value) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> {
            Ok(Value::Null)
        }
    }

    fn config_error(result: Result<()>) -> ConfigError {
        match result {
            Err(AutonomaisError::Config(e)) => e,
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_derivation() {
        assert_eq!(GraphNode::new("a", "x").kind(), NodeKind::Agent);
        assert_eq!(
            GraphNode::new("a", "x").with_links(Vec::<String>::new()).kind(),
            NodeKind::Agent
        );
        assert_eq!(GraphNode::new("a", "x").with_links(["b"]).kind(), NodeKind::Router);
        assert_eq!(
            GraphNode::new("a", "x")
                .with_links(["b", "c"])
                .with_tools(vec![Arc::new(NoopTool)])
                .kind(),
            NodeKind::Combined
        );
        // tools without links stay a plain agent
        assert_eq!(
            GraphNode::new("a", "x").with_tools(vec![Arc::new(NoopTool)]).kind(),
            NodeKind::Agent
        );
    }

    #[test]
    fn test_candidates_add_end_for_exit_nodes() {
        let node = GraphNode::new("a", "x").with_links(["b", "c"]).exit();
        assert_eq!(node.candidates(), vec!["b", "c", END]);

        let single = GraphNode::new("a", "x").with_links(["b"]).exit();
        assert_eq!(single.candidates(), vec!["b"]);

        let plain = GraphNode::new("a", "x").with_links(["b", "c"]);
        assert_eq!(plain.candidates(), vec!["b", "c"]);
    }

    #[test]
    fn test_validate_accepts_valid_nodes() {
        let nodes = vec![GraphNode::new("a", "x"), GraphNode::new("b", "y")];
        assert!(validate(&nodes).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_name() {
        let nodes = vec![GraphNode::new("a", "x"), GraphNode::new(" ", "y")];
        assert_eq!(
            config_error(validate(&nodes)),
            ConfigError::MissingName { index: 1 }
        );
    }

    #[test]
    fn test_validate_rejects_missing_instructions() {
        let nodes = vec![GraphNode::new("start", "")];
        assert_eq!(
            config_error(validate(&nodes)),
            ConfigError::MissingInstructions {
                node: "start".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_reserved_names() {
        let nodes = vec![GraphNode::new("a", "x"), GraphNode::new("a", "y")];
        assert_eq!(
            config_error(validate(&nodes)),
            ConfigError::DuplicateNode {
                node: "a".to_string()
            }
        );

        let nodes = vec![GraphNode::new(END, "x")];
        assert!(matches!(config_error(validate(&nodes)), ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_empty_workflow() {
        assert_eq!(config_error(validate(&[])), ConfigError::EmptyWorkflow);
    }
}
