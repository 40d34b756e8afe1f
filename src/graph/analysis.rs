//! Schema Graph Analysis
//!
//! Computes strongly connected components (SCCs) of the canonical graph and
//! the cycle handling metadata the type graph builder needs: which property
//! edges close a cycle (and therefore have to be held by reference in the
//! generated declaration) and which nodes are recursive at all.

use petgraph::algo::kosaraju_scc;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{EdgeKind, NodeId, SchemaGraph};

// =============================================================================
// Indirect Edge
// =============================================================================

/// An edge inside a cycle group. Fields generated from such an edge are
/// marked indirect so an emitter can break the recursion (pointer, box, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndirectEdge {
    pub from: NodeId,
    pub kind: EdgeKind,
    pub to: NodeId,
    /// The SCC this edge is part of
    pub scc_id: usize,
}

// =============================================================================
// SCC Group
// =============================================================================

/// A strongly connected component (cycle group) in the schema graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SccGroup {
    pub id: usize,
    /// Members in graph order
    pub members: Vec<NodeId>,
    pub edges: Vec<IndirectEdge>,
    /// Single node that refers to itself
    pub is_self_referential: bool,
}

// =============================================================================
// Analysis Result
// =============================================================================

/// Complete SCC analysis result for the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleAnalysis {
    /// Only cycles with >1 member OR self-refs
    pub groups: Vec<SccGroup>,
    membership: HashMap<NodeId, usize>,
}

impl CycleAnalysis {
    /// Check if a node takes part in any cycle
    pub fn is_cyclic(&self, id: NodeId) -> bool {
        self.membership.contains_key(&id)
    }

    pub fn scc_of(&self, id: NodeId) -> Option<&SccGroup> {
        self.membership.get(&id).and_then(|scc| self.groups.get(*scc))
    }

    /// Both nodes sit in the same cycle group
    pub fn same_component(&self, a: NodeId, b: NodeId) -> bool {
        match (self.membership.get(&a), self.membership.get(&b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Does the edge `from -> to` close a cycle?
    pub fn is_indirect(&self, from: NodeId, to: NodeId) -> bool {
        self.same_component(from, to)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

// =============================================================================
// Analysis Functions
// =============================================================================

/// Compute SCC analysis for a schema graph
pub fn compute_cycle_analysis(graph: &SchemaGraph) -> CycleAnalysis {
    let mut analysis = CycleAnalysis::default();

    for scc in kosaraju_scc(&graph.graph) {
        let is_cycle = scc.len() > 1
            || graph
                .graph
                .edges_directed(scc[0], Direction::Outgoing)
                .any(|e| e.target() == scc[0]);
        if !is_cycle {
            continue;
        }

        let scc_id = analysis.groups.len();
        let mut members: Vec<NodeId> = scc
            .iter()
            .filter_map(|idx| graph.graph.node_weight(*idx).copied())
            .collect();
        members.sort();

        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let mut edges = Vec::new();
        for member in &members {
            for edge in graph.graph.edges_directed(member.graph_index(), Direction::Outgoing) {
                let Some(to) = graph.graph.node_weight(edge.target()).copied() else {
                    continue;
                };
                if member_set.contains(&to) {
                    edges.push(IndirectEdge {
                        from: *member,
                        kind: *edge.weight(),
                        to,
                        scc_id,
                    });
                }
            }
        }

        for member in &members {
            analysis.membership.insert(*member, scc_id);
        }

        tracing::debug!(scc_id, members = members.len(), edges = edges.len(), "found cycle group");

        analysis.groups.push(SccGroup {
            id: scc_id,
            is_self_referential: members.len() == 1,
            members,
            edges,
        });
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::normalize;
    use crate::schema::Schema;
    use serde_json::json;

    fn analyze(value: serde_json::Value) -> (SchemaGraph, CycleAnalysis) {
        let graph = normalize(&Schema::from_value(value).unwrap()).unwrap();
        let analysis = compute_cycle_analysis(&graph);
        (graph, analysis)
    }

    #[test]
    fn test_acyclic_graph() {
        let (graph, analysis) = analyze(json!({
            "properties": {"a": {"$ref": "#/definitions/A"}},
            "definitions": {"A": {"type": "string"}}
        }));
        assert_eq!(analysis.group_count(), 0);
        assert!(!analysis.is_cyclic(graph.root()));
    }

    #[test]
    fn test_self_reference() {
        let (graph, analysis) = analyze(json!({
            "definitions": {
                "Node": {"properties": {"next": {"$ref": "#/definitions/Node"}}}
            }
        }));
        let node = graph.definition("Node").unwrap();
        assert!(analysis.is_cyclic(node));
        let group = analysis.scc_of(node).unwrap();
        assert!(group.is_self_referential);
        assert_eq!(group.edges.len(), 1);
        assert!(analysis.is_indirect(node, node));
    }

    #[test]
    fn test_mutual_recursion() {
        let (graph, analysis) = analyze(json!({
            "definitions": {
                "A": {"properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"properties": {"a": {"$ref": "#/definitions/A"}}},
                "C": {"properties": {"a": {"$ref": "#/definitions/A"}}}
            }
        }));
        let a = graph.definition("A").unwrap();
        let b = graph.definition("B").unwrap();
        let c = graph.definition("C").unwrap();
        assert!(analysis.same_component(a, b));
        assert!(!analysis.is_cyclic(c));
        assert!(!analysis.scc_of(a).unwrap().is_self_referential);
    }
}
