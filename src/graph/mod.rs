//! Canonical Schema Graph
//!
//! An arena of canonical schema nodes. Nodes refer to each other by [`NodeId`],
//! never by ownership, so recursive definitions are plain cycles in the graph.
//! The same edges are mirrored into a petgraph `DiGraph` for cycle analysis.
//!
//! The graph is built once by [`normalize`] and is immutable afterwards; every
//! downstream pass borrows it.

pub mod analysis;
pub mod diagnostics;
pub mod normalize;

pub use analysis::{CycleAnalysis, IndirectEdge, SccGroup, compute_cycle_analysis};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use normalize::normalize;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::schema::JsonType;

/// Canonical node identity within one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn graph_index(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural identity key. Two anonymous object schemas with the same key
/// collapse into one canonical node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(pub String);

impl IdentityKey {
    /// The key without its `@<location>` site suffix. Non-object nodes are
    /// site-scoped, but hash into their parents by structure alone.
    pub fn structural(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(shape, _)| shape)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON scalar type (before any language-specific lowering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn from_json_type(json_type: JsonType) -> Option<Self> {
        match json_type {
            JsonType::String => Some(Self::String),
            JsonType::Integer => Some(Self::Integer),
            JsonType::Number => Some(Self::Number),
            JsonType::Boolean => Some(Self::Boolean),
            JsonType::Null => Some(Self::Null),
            JsonType::Object | JsonType::Array => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// Does a JSON value structurally fit this type?
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of canonical node kinds.
///
/// `$ref` never survives normalization: a reference is an edge to the
/// referenced definition's node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Object {
        properties: IndexMap<String, NodeId>,
        required: Vec<String>,
    },
    Array {
        items: Option<NodeId>,
    },
    Primitive(PrimitiveType),
    Enum {
        literals: Vec<Value>,
    },
    AllOf(Vec<NodeId>),
    AnyOf(Vec<NodeId>),
    OneOf(Vec<NodeId>),
    /// Empty schema: any JSON value
    Any,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Object { .. } => "object",
            NodeKind::Array { .. } => "array",
            NodeKind::Primitive(_) => "primitive",
            NodeKind::Enum { .. } => "enum",
            NodeKind::AllOf(_) => "allOf",
            NodeKind::AnyOf(_) => "anyOf",
            NodeKind::OneOf(_) => "oneOf",
            NodeKind::Any => "any",
        }
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, NodeKind::AllOf(_) | NodeKind::AnyOf(_) | NodeKind::OneOf(_))
    }

    /// Outgoing edges in declaration order
    pub fn edges(&self) -> Vec<(EdgeKind, NodeId)> {
        match self {
            NodeKind::Object { properties, .. } => properties
                .values()
                .map(|id| (EdgeKind::Property, *id))
                .collect(),
            NodeKind::Array { items } => items.iter().map(|id| (EdgeKind::Items, *id)).collect(),
            NodeKind::AllOf(branches) => branches.iter().map(|id| (EdgeKind::AllOf, *id)).collect(),
            NodeKind::AnyOf(branches) => branches.iter().map(|id| (EdgeKind::AnyOf, *id)).collect(),
            NodeKind::OneOf(branches) => branches.iter().map(|id| (EdgeKind::OneOf, *id)).collect(),
            NodeKind::Primitive(_) | NodeKind::Enum { .. } | NodeKind::Any => Vec::new(),
        }
    }
}

/// Types of edges in the canonical graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Property,
    Items,
    AllOf,
    AnyOf,
    OneOf,
}

/// One canonical schema fragment. Immutable once the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Declared `type`, kept for enum base-type fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Name of the `definitions`/`$defs` entry this node was resolved from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_descriptions: Vec<String>,
    pub identity: IdentityKey,
    /// JSON pointer of the first site this node was seen at (diagnostics only)
    pub location: String,
}

impl SchemaNode {
    /// Reached through `$ref` (i.e. a named definition)
    pub fn is_reference(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_required(&self, property: &str) -> bool {
        match &self.kind {
            NodeKind::Object { required, .. } => required.iter().any(|r| r == property),
            _ => false,
        }
    }
}

/// The canonical schema graph for one document
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) root: NodeId,
    /// Definition name -> node (aliases map to their target's node)
    pub(crate) definitions: IndexMap<String, NodeId>,
    pub(crate) graph: DiGraph<NodeId, EdgeKind>,
    pub(crate) by_identity: HashMap<IdentityKey, NodeId>,
    /// Findings recorded while normalizing
    pub(crate) warnings: Diagnostics,
}

impl SchemaGraph {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Nodes are only created by the normalizer, so every `NodeId` handed out
    /// by this graph is valid for it.
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn definition(&self, name: &str) -> Option<NodeId> {
        self.definitions.get(name).copied()
    }

    /// Definition names in document order
    pub fn definitions(&self) -> impl Iterator<Item = (&String, NodeId)> {
        self.definitions.iter().map(|(name, id)| (name, *id))
    }

    pub fn by_identity(&self, key: &IdentityKey) -> Option<NodeId> {
        self.by_identity.get(key).copied()
    }

    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    /// Direct successors of a node
    pub fn successors(&self, id: NodeId) -> Vec<(EdgeKind, NodeId)> {
        self.node(id).kind.edges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_accepts() {
        assert!(PrimitiveType::Integer.accepts(&json!(5)));
        assert!(!PrimitiveType::Integer.accepts(&json!(5.5)));
        assert!(!PrimitiveType::Integer.accepts(&json!("5")));
        assert!(PrimitiveType::Number.accepts(&json!(5)));
        assert!(PrimitiveType::String.accepts(&json!("5")));
        assert!(PrimitiveType::Null.accepts(&Value::Null));
    }

    #[test]
    fn test_node_kind_edges() {
        let kind = NodeKind::OneOf(vec![NodeId(1), NodeId(2)]);
        assert!(kind.is_combinator());
        assert_eq!(
            kind.edges(),
            vec![(EdgeKind::OneOf, NodeId(1)), (EdgeKind::OneOf, NodeId(2))]
        );
        assert!(NodeKind::Any.edges().is_empty());
    }
}
