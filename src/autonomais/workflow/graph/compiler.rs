// SPDX-License-Identifier: MIT

//! Graph compilation
//!
//! Turns a validated node list into an immutable [`CompiledGraph`]: the
//! entry node, each node's execution kind, and each node's outgoing
//! transition.

use crate::adk::error::{ConfigError, Result};
use crate::adk::model::Model;
use crate::autonomais::workflow::node::{GraphNode, NodeKind, END};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Where a transition leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    End,
}

/// Candidate names mapped to successors, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionTable {
    entries: Vec<(String, Target)>,
}

impl DecisionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, target: Target) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((key, target)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Target> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.entries.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Target)> for DecisionTable {
    fn from_iter<I: IntoIterator<Item = (K, Target)>>(iter: I) -> Self {
        let mut table = DecisionTable::new();
        for (key, target) in iter {
            table.insert(key, target);
        }
        table
    }
}

/// Outgoing edge of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Unconditional successor
    Goto(String),
    /// Successor chosen from the node's last message
    Decide(DecisionTable),
    /// The run ends after this node
    End,
}

/// A node ready for execution
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub node: GraphNode,
    pub kind: NodeKind,
    pub transition: Transition,
}

/// Execution-ready workflow graph.
///
/// Immutable once built; concurrent runs share it freely.
pub struct CompiledGraph {
    model: Arc<dyn Model>,
    entry: String,
    nodes: HashMap<String, CompiledNode>,
    node_order: Vec<String>,
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn node(&self, name: &str) -> Option<&CompiledNode> {
        self.nodes.get(name)
    }

    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.nodes.get(name).map(|n| &n.transition)
    }

    /// Node names in declaration order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    /// Edge table in declaration order
    pub fn edges(&self) -> Vec<(&str, &Transition)> {
        self.node_order
            .iter()
            .map(|name| (name.as_str(), &self.nodes[name].transition))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.node_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_order.is_empty()
    }
}

/// Compile validated nodes into a graph.
///
/// Fails when a link names an unknown node.
pub fn compile(model: Arc<dyn Model>, nodes: Vec<GraphNode>) -> Result<CompiledGraph> {
    let entry = nodes
        .first()
        .map(|n| n.name.clone())
        .ok_or(ConfigError::EmptyWorkflow)?;

    let known: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    for node in &nodes {
        if let Some(link) = node.links().iter().find(|l| !known.contains(l.as_str())) {
            return Err(ConfigError::UnknownLink {
                node: node.name.clone(),
                link: link.clone(),
            }
            .into());
        }
    }

    let node_order: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let mut compiled = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.into_iter().enumerate() {
        let transition = build_transition(&node, node_order.get(index + 1));
        log::debug!("Compiled node '{}': {:?}", node.name, transition);
        compiled.insert(
            node.name.clone(),
            CompiledNode {
                kind: node.kind(),
                node,
                transition,
            },
        );
    }

    Ok(CompiledGraph {
        model,
        entry,
        nodes: compiled,
        node_order,
    })
}

fn build_transition(node: &GraphNode, next: Option<&String>) -> Transition {
    match &node.links {
        None => match next {
            Some(name) => Transition::Goto(name.clone()),
            None => Transition::End,
        },
        Some(links) if links.is_empty() => Transition::End,
        Some(links) if links.len() == 1 => Transition::Goto(links[0].clone()),
        Some(_) => Transition::Decide(
            node.candidates()
                .into_iter()
                .map(|key| {
                    let target = if key == END {
                        Target::End
                    } else {
                        Target::Node(key.clone())
                    };
                    (key, target)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::AutonomaisError;
    use crate::adk::model::{Content, GenerationConfig};
    use crate::adk::tool::Tool;
    use async_trait::async_trait;

    struct SilentModel;

    #[async_trait]
    impl Model for SilentModel {
        fn model_name(&self) -> &str {
            "mock-model"
        }

        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content> {
            Ok(Content::model(""))
        }
    }

    fn build(nodes: Vec<GraphNode>) -> Result<CompiledGraph> {
        compile(Arc::new(SilentModel), nodes)
    }

    fn sample() -> Vec<GraphNode> {
        vec![
            GraphNode::new("start", "Route").with_links(["option1", "option2"]),
            GraphNode::new("option1", "One"),
            GraphNode::new("option2", "Two").with_links(["done"]),
            GraphNode::new("done", "Finish").with_links(Vec::<String>::new()),
        ]
    }

    #[test]
    fn test_first_node_is_entry() {
        let graph = build(sample()).unwrap();
        assert_eq!(graph.entry(), "start");
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_transitions() {
        let graph = build(sample()).unwrap();

        let expected: DecisionTable = [
            ("option1", Target::Node("option1".to_string())),
            ("option2", Target::Node("option2".to_string())),
        ]
        .into_iter()
        .collect();
        assert_eq!(graph.transition("start"), Some(&Transition::Decide(expected)));
        // absent links fall through in declaration order
        assert_eq!(
            graph.transition("option1"),
            Some(&Transition::Goto("option2".to_string()))
        );
        // one link is unconditional
        assert_eq!(
            graph.transition("option2"),
            Some(&Transition::Goto("done".to_string()))
        );
        // explicit empty list is terminal
        assert_eq!(graph.transition("done"), Some(&Transition::End));
    }

    #[test]
    fn test_last_node_without_links_is_terminal() {
        let graph = build(vec![GraphNode::new("a", "x"), GraphNode::new("b", "y")]).unwrap();
        assert_eq!(graph.transition("a"), Some(&Transition::Goto("b".to_string())));
        assert_eq!(graph.transition("b"), Some(&Transition::End));
    }

    #[test]
    fn test_single_node_is_entry_and_terminal() {
        let graph = build(vec![GraphNode::new("start", "Reply with hello")]).unwrap();
        assert_eq!(graph.entry(), "start");
        assert_eq!(graph.transition("start"), Some(&Transition::End));
        assert_eq!(graph.node("start").unwrap().kind, NodeKind::Agent);
    }

    #[test]
    fn test_exit_node_gets_end_key_last() {
        let graph = build(vec![
            GraphNode::new("triage", "Route")
                .with_links(["a", "b"])
                .exit(),
            GraphNode::new("a", "x"),
            GraphNode::new("b", "y"),
        ])
        .unwrap();

        match graph.transition("triage") {
            Some(Transition::Decide(table)) => {
                assert_eq!(table.keys().collect::<Vec<_>>(), vec!["a", "b", END]);
                assert_eq!(table.get(END), Some(&Target::End));
            }
            other => panic!("Expected decision table, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_link_fails() {
        let result = build(vec![GraphNode::new("a", "x").with_links(["ghost", "a"])]);
        match result {
            Err(AutonomaisError::Config(ConfigError::UnknownLink { node, link })) => {
                assert_eq!(node, "a");
                assert_eq!(link, "ghost");
            }
            other => panic!("Expected UnknownLink, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let first = build(sample()).unwrap();
        let second = build(sample()).unwrap();
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.entry(), second.entry());
    }

    #[test]
    fn test_decision_table_insert_keeps_position() {
        let mut table = DecisionTable::new();
        table.insert("a", Target::End);
        table.insert("b", Target::End);
        table.insert("a", Target::Node("a".to_string()));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(table.get("a"), Some(&Target::Node("a".to_string())));
    }
}
