//! Weighted knowledge graph with shortest-path priority scoring.
//!
//! Nodes are analysis items (the analysis root, stocks, news, charts,
//! videos); directed edges carry a non-negative cost. Relevance is the
//! inverse of the cheapest path from the root: [`PriorityGraph::priority_nodes`]
//! normalizes Dijkstra distances into scores in [0, 1].
//!
//! A graph is built once per analysis cycle and then only read, so every
//! query takes `&self` and the type can be shared across threads freely.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::entities::market_data::Metadata;
use crate::domain::error::DomainError;
use crate::domain::values::node_kind::NodeKind;

pub const DEFAULT_RELATIONSHIP: &str = "related";

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub relationship: String,
}

#[derive(Debug, Clone)]
struct Link {
    target: usize,
    weight: f64,
    relationship: String,
}

/// Heap entry ordered so that `BinaryHeap` pops the smallest distance first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    distance: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriorityGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<Link>>,
    edge_count: usize,
}

impl PriorityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or overwrite kind and metadata of an existing one.
    /// An overwritten node keeps its insertion position and its edges.
    pub fn add_node(&mut self, id: impl Into<String>, kind: NodeKind, metadata: Metadata) {
        let id = id.into();
        if let Some(&idx) = self.index.get(&id) {
            let node = &mut self.nodes[idx];
            node.kind = kind;
            node.metadata = metadata;
            return;
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node { id, kind, metadata });
        self.adjacency.push(Vec::new());
    }

    /// Add or replace the edge `source → target`.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        weight: f64,
        relationship: impl Into<String>,
    ) -> Result<(), DomainError> {
        let from = self.index_of(source)?;
        let to = self.index_of(target)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(DomainError::InvalidWeight {
                source_id: source.to_string(),
                target_id: target.to_string(),
                weight,
            });
        }

        let relationship = relationship.into();
        let links = &mut self.adjacency[from];
        match links.iter_mut().find(|l| l.target == to) {
            Some(existing) => {
                existing.weight = weight;
                existing.relationship = relationship;
            }
            None => {
                links.push(Link {
                    target: to,
                    weight,
                    relationship,
                });
                self.edge_count += 1;
            }
        }
        Ok(())
    }

    /// [`add_edge`](Self::add_edge) with the default `related` tag.
    pub fn connect(&mut self, source: &str, target: &str, weight: f64) -> Result<(), DomainError> {
        self.add_edge(source, target, weight, DEFAULT_RELATIONSHIP)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_info(&self, id: &str) -> Result<&Node, DomainError> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    /// Direct successors of `id`, in edge insertion order.
    pub fn neighbors(&self, id: &str) -> Result<Vec<&str>, DomainError> {
        let idx = self.index_of(id)?;
        Ok(self.adjacency[idx]
            .iter()
            .map(|l| self.nodes[l.target].id.as_str())
            .collect())
    }

    pub fn edges_from(&self, id: &str) -> Result<Vec<Edge>, DomainError> {
        let idx = self.index_of(id)?;
        Ok(self.adjacency[idx]
            .iter()
            .map(|l| Edge {
                source: id.to_string(),
                target: self.nodes[l.target].id.clone(),
                weight: l.weight,
                relationship: l.relationship.clone(),
            })
            .collect())
    }

    /// First `root` node in insertion order, else the first node inserted.
    pub fn root(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::Root)
            .or_else(|| self.nodes.first())
            .map(|n| n.id.as_str())
    }

    /// Single-source shortest-path distances (Dijkstra). The source maps to
    /// 0; nodes unreachable from it are absent.
    pub fn shortest_paths(&self, source: &str) -> Result<HashMap<String, f64>, DomainError> {
        let src = self.index_of(source)?;
        Ok(self
            .distances_from(src)
            .into_iter()
            .enumerate()
            .filter_map(|(idx, d)| d.map(|d| (self.nodes[idx].id.clone(), d)))
            .collect())
    }

    /// Reachable non-source nodes scored `1 - distance / max_distance`,
    /// filtered by `threshold`, sorted by descending score (ties keep node
    /// insertion order) and truncated to `max_count`.
    pub fn priority_nodes(
        &self,
        source: &str,
        threshold: f64,
        max_count: Option<usize>,
    ) -> Result<Vec<(String, f64)>, DomainError> {
        let src = self.index_of(source)?;
        let distances = self.distances_from(src);

        let max_distance = distances
            .iter()
            .flatten()
            .copied()
            .reduce(f64::max)
            .unwrap_or(1.0);

        let mut scored: Vec<(String, f64)> = distances
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != src)
            .filter_map(|(idx, d)| d.map(|d| (idx, d)))
            .map(|(idx, d)| {
                let score = if max_distance > 0.0 {
                    1.0 - d / max_distance
                } else {
                    1.0
                };
                (self.nodes[idx].id.clone(), score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();

        // sort_by is stable: equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        if let Some(max) = max_count {
            scored.truncate(max);
        }
        Ok(scored)
    }

    /// Plain-text rendering of the graph structure.
    pub fn describe(&self) -> String {
        let mut out = String::from("Knowledge Graph Structure:\n");
        let _ = writeln!(out, "Nodes: {}", self.node_count());
        let _ = writeln!(out, "Edges: {}", self.edge_count());
        out.push_str("\nNode Details:\n");
        for (idx, node) in self.nodes.iter().enumerate() {
            let _ = writeln!(
                out,
                "  - {} (type: {}, neighbors: {})",
                node.id,
                node.kind,
                self.adjacency[idx].len()
            );
        }
        out
    }

    fn index_of(&self, id: &str) -> Result<usize, DomainError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::UnknownNode(id.to_string()))
    }

    fn distances_from(&self, source: usize) -> Vec<Option<f64>> {
        let mut dist: Vec<Option<f64>> = vec![None; self.nodes.len()];
        let mut settled = vec![false; self.nodes.len()];
        let mut frontier = BinaryHeap::new();

        dist[source] = Some(0.0);
        frontier.push(Frontier {
            distance: 0.0,
            node: source,
        });

        while let Some(Frontier { distance, node }) = frontier.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;

            for link in &self.adjacency[node] {
                if settled[link.target] {
                    continue;
                }
                let candidate = distance + link.weight;
                if dist[link.target].map_or(true, |d| candidate < d) {
                    dist[link.target] = Some(candidate);
                    frontier.push(Frontier {
                        distance: candidate,
                        node: link.target,
                    });
                }
            }
        }
        dist
    }
}
