//! Project flow graph: datasets and recipes joined by input/output edges.
//!
//! The graph is rebuilt from the dataset and recipe listings on every call.
//! Edges run dataset → recipe for inputs and recipe → dataset for outputs;
//! dependency maps are derived from the edge list in a single pass.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dataset,
    Recipe,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_type: Option<String>,
    pub tags: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Input,
    Output,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// Upstream and downstream neighbours of one node.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Dependencies {
    pub depends_on: Vec<String>,
    pub used_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlowStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub datasets: usize,
    pub recipes: usize,
    pub root_nodes: usize,
    pub leaf_nodes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dataset(&mut self, name: &str, dataset_type: &str, tags: Vec<Value>) {
        self.nodes.push(FlowNode {
            id: name.to_string(),
            name: name.to_string(),
            kind: NodeKind::Dataset,
            dataset_type: Some(dataset_type.to_string()),
            recipe_type: None,
            tags,
        });
    }

    /// Add a recipe node with one edge per input and per output.
    pub fn add_recipe(
        &mut self,
        name: &str,
        recipe_type: &str,
        tags: Vec<Value>,
        inputs: &[String],
        outputs: &[String],
    ) {
        self.nodes.push(FlowNode {
            id: name.to_string(),
            name: name.to_string(),
            kind: NodeKind::Recipe,
            dataset_type: None,
            recipe_type: Some(recipe_type.to_string()),
            tags,
        });
        for input in inputs {
            self.edges.push(FlowEdge {
                from: input.clone(),
                to: name.to_string(),
                kind: EdgeKind::Input,
            });
        }
        for output in outputs {
            self.edges.push(FlowEdge {
                from: name.to_string(),
                to: output.clone(),
                kind: EdgeKind::Output,
            });
        }
    }

    /// Dependency map over every node that takes part in an edge.
    pub fn dependencies(&self) -> BTreeMap<String, Dependencies> {
        let mut deps: BTreeMap<String, Dependencies> = BTreeMap::new();
        for edge in &self.edges {
            deps.entry(edge.to.clone())
                .or_default()
                .depends_on
                .push(edge.from.clone());
            deps.entry(edge.from.clone())
                .or_default()
                .used_by
                .push(edge.to.clone());
        }
        deps
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    pub fn stats(&self, deps: &BTreeMap<String, Dependencies>) -> FlowStats {
        FlowStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            datasets: self.count(NodeKind::Dataset),
            recipes: self.count(NodeKind::Recipe),
            root_nodes: roots(deps).len(),
            leaf_nodes: leaves(deps).len(),
        }
    }
}

/// Nodes nothing feeds into.
pub fn roots(deps: &BTreeMap<String, Dependencies>) -> Vec<String> {
    deps.iter()
        .filter(|(_, d)| d.depends_on.is_empty())
        .map(|(id, _)| id.clone())
        .collect()
}

/// Nodes nothing reads from.
pub fn leaves(deps: &BTreeMap<String, Dependencies>) -> Vec<String> {
    deps.iter()
        .filter(|(_, d)| d.used_by.is_empty())
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_flow() -> FlowGraph {
        let mut flow = FlowGraph::new();
        flow.add_dataset("raw", "Filesystem", vec![]);
        flow.add_dataset("clean", "Filesystem", vec![]);
        flow.add_dataset("report", "Filesystem", vec![]);
        flow.add_dataset("unused", "Filesystem", vec![]);
        flow.add_recipe("prepare", "python", vec![], &names(&["raw"]), &names(&["clean"]));
        flow.add_recipe("summarize", "sql", vec![], &names(&["clean"]), &names(&["report"]));
        flow
    }

    #[test]
    fn edges_follow_data_direction() {
        let flow = sample_flow();
        assert_eq!(flow.edges.len(), 4);
        assert_eq!(
            flow.edges[0],
            FlowEdge {
                from: "raw".into(),
                to: "prepare".into(),
                kind: EdgeKind::Input
            }
        );
        assert_eq!(flow.edges[1].kind, EdgeKind::Output);
        assert_eq!(flow.edges[1].to, "clean");
    }

    #[test]
    fn roots_and_leaves_come_from_connected_nodes() {
        let flow = sample_flow();
        let deps = flow.dependencies();
        assert_eq!(roots(&deps), vec!["raw"]);
        assert_eq!(leaves(&deps), vec!["report"]);
        assert!(!deps.contains_key("unused"));
        assert_eq!(deps["clean"].depends_on, vec!["prepare"]);
        assert_eq!(deps["clean"].used_by, vec!["summarize"]);

        let stats = flow.stats(&deps);
        assert_eq!(stats.total_nodes, 6);
        assert_eq!(stats.datasets, 4);
        assert_eq!(stats.recipes, 2);
        assert_eq!(stats.root_nodes, 1);
        assert_eq!(stats.leaf_nodes, 1);
    }

    #[test]
    fn node_serialization_uses_wire_names() {
        let flow = sample_flow();
        let json = serde_json::to_value(&flow.nodes[4]).unwrap();
        assert_eq!(json["type"], "recipe");
        assert_eq!(json["recipe_type"], "python");
        assert!(json.get("dataset_type").is_none());
    }
}
