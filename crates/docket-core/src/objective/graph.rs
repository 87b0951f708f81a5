//! Dependency graph derived from an objective's roadmap.
//!
//! Nodes are kept in roadmap order and every query preserves that order.
//! A dependency on an id that is not in the graph counts as satisfied.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::roadmap::RoadmapPhase;

// ---------------------------------------------------------------------------
// NodeStatus
// ---------------------------------------------------------------------------

/// Progress state of a roadmap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Planning,
    InProgress,
    Done,
    Blocked,
    Skipped,
}

impl NodeStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Planning,
        Self::InProgress,
        Self::Done,
        Self::Blocked,
        Self::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::Skipped => "skipped",
        }
    }

    /// `done` and `skipped` satisfy dependents.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = NodeStatusParseError;

    /// Case-insensitive; `in-progress`, `in_progress` and `in progress` are
    /// all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| NodeStatusParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`NodeStatus`] string.
#[derive(Debug, Clone)]
pub struct NodeStatusParseError(pub String);

impl fmt::Display for NodeStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step status: {:?}", self.0)
    }
}

impl std::error::Error for NodeStatusParseError {}

// ---------------------------------------------------------------------------
// Nodes and graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveNode {
    pub id: String,
    pub description: String,
    pub status: NodeStatus,
    pub plan: Option<String>,
    pub pr: Option<String>,
    pub depends_on: IndexSet<String>,
}

impl ObjectiveNode {
    /// A pending node with no dependencies.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: NodeStatus::Pending,
            plan: None,
            pr: None,
            depends_on: IndexSet::new(),
        }
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn depending_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Finished/total node counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphProgress {
    pub finished: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("dependency cycle detected involving steps: {0}")]
    CycleDetected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<ObjectiveNode>,
}

impl DependencyGraph {
    pub fn new(nodes: Vec<ObjectiveNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ObjectiveNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node with the given id.
    pub fn get(&self, id: &str) -> Option<&ObjectiveNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn dependency_satisfied(&self, dep: &str) -> bool {
        self.get(dep).is_none_or(|node| node.status.is_finished())
    }

    /// Nodes whose every dependency is finished or absent from the graph,
    /// in node order. Finished nodes themselves are included.
    pub fn unblocked_nodes(&self) -> Vec<&ObjectiveNode> {
        self.nodes
            .iter()
            .filter(|node| {
                node.depends_on
                    .iter()
                    .all(|dep| self.dependency_satisfied(dep))
            })
            .collect()
    }

    /// The first unblocked node that is still pending.
    pub fn next_node(&self) -> Option<&ObjectiveNode> {
        self.unblocked_nodes()
            .into_iter()
            .find(|node| node.status == NodeStatus::Pending)
    }

    /// True when every node is done or skipped. An empty graph is complete.
    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|node| node.status.is_finished())
    }

    /// A copy of the graph with node `id` set to `status`, or `None` when no
    /// such node exists.
    pub fn with_status(&self, id: &str, status: NodeStatus) -> Option<Self> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        let mut nodes = self.nodes.clone();
        nodes[index].status = status;
        Some(Self { nodes })
    }

    pub fn progress(&self) -> GraphProgress {
        GraphProgress {
            finished: self
                .nodes
                .iter()
                .filter(|node| node.status.is_finished())
                .count(),
            total: self.nodes.len(),
        }
    }

    /// `(node id, dependency id)` pairs whose dependency is not in the graph.
    pub fn dangling_dependencies(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.depends_on
                    .iter()
                    .filter(|dep| self.get(dep).is_none())
                    .map(move |dep| (node.id.as_str(), dep.as_str()))
            })
            .collect()
    }

    /// Detect dependency cycles using Kahn's algorithm.
    ///
    /// Dangling dependencies add no edges. Graphs built from roadmap phases
    /// are chains and always pass.
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        let n = self.nodes.len();
        let mut id_to_idx: HashMap<&str, usize> = HashMap::with_capacity(n);
        for (i, node) in self.nodes.iter().enumerate() {
            id_to_idx.entry(node.id.as_str()).or_insert(i);
        }

        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];
        for (node_idx, node) in self.nodes.iter().enumerate() {
            for dep in &node.depends_on {
                if let Some(&dep_idx) = id_to_idx.get(dep.as_str()) {
                    // Edge: dep -> node.
                    adj[dep_idx].push(node_idx);
                    in_degree[node_idx] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut sorted_count = 0usize;
        while let Some(node) = queue.pop_front() {
            sorted_count += 1;
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if sorted_count != n {
            let cycle_ids: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(i, _)| self.nodes[i].id.as_str())
                .collect();
            return Err(GraphError::CycleDetected(cycle_ids.join(", ")));
        }

        Ok(())
    }
}

/// Build a sequential graph from roadmap phases.
///
/// Each step depends on the step before it in the same phase. The first
/// step of a phase depends on the last step of the nearest preceding phase
/// that has steps.
pub fn graph_from_phases(phases: &[RoadmapPhase]) -> DependencyGraph {
    let mut nodes = Vec::new();
    let mut previous: Option<String> = None;

    for phase in phases {
        for step in &phase.steps {
            let mut node = ObjectiveNode::new(step.id.clone(), step.description.clone())
                .with_status(step.status);
            node.plan = step.plan.clone();
            node.pr = step.pr.clone();
            if let Some(prev) = previous.take() {
                node.depends_on.insert(prev);
            }
            previous = Some(step.id.clone());
            nodes.push(node);
        }
    }

    DependencyGraph::new(nodes)
}
