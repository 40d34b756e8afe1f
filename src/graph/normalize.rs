//! Canonical Schema Normalizer
//!
//! Turns the parsed [`Schema`] tree into a [`SchemaGraph`]:
//! - `$ref` to `definitions`/`$defs` (or `#`) becomes an edge to the target node
//! - structurally identical anonymous objects collapse into one node
//! - non-semantic keywords are dropped
//!
//! Definitions are allocated before any body is lowered, so a reference to a
//! definition that is still being lowered (recursion) is just its `NodeId`.

use indexmap::IndexMap;
use petgraph::graph::DiGraph;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::{
    DiagnosticCode, Diagnostics, IdentityKey, NodeId, NodeKind, PrimitiveType, SchemaGraph,
    SchemaNode,
};
use crate::error::SchemaError;
use crate::schema::{JsonType, Schema};

const ROOT_POINTER: &str = "#";

/// Normalize a parsed schema document into its canonical graph
pub fn normalize(schema: &Schema) -> Result<SchemaGraph, SchemaError> {
    Normalizer::new(schema).run()
}

struct Normalizer<'a> {
    root: &'a Schema,
    nodes: Vec<SchemaNode>,
    /// Pointer -> reserved node for every non-alias definition (and the root)
    slots: HashMap<String, NodeId>,
    /// Pointer -> `$ref` string for definitions that are pure references
    aliases: HashMap<String, String>,
    by_identity: HashMap<IdentityKey, NodeId>,
    warnings: Diagnostics,
}

impl<'a> Normalizer<'a> {
    fn new(root: &'a Schema) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            slots: HashMap::new(),
            aliases: HashMap::new(),
            by_identity: HashMap::new(),
            warnings: Diagnostics::new(),
        }
    }

    fn run(mut self) -> Result<SchemaGraph, SchemaError> {
        let root = self.root;

        // Phase 1: reserve a node for every definition body and for the root
        let mut bodies: Vec<(NodeId, &'a Schema, String)> = Vec::new();
        for (table, name, schema) in root.all_definitions() {
            let pointer = format!("#/{}/{}", table, name);
            if let Some(reference) = &schema.reference {
                self.aliases.insert(pointer, reference.clone());
                continue;
            }
            let id = self.reserve(IdentityKey(format!("def:{}/{}", table, name)), &pointer);
            self.nodes[id.0].definition = Some(name.clone());
            self.slots.insert(pointer.clone(), id);
            bodies.push((id, schema, pointer));
        }

        if let Some(reference) = &root.reference {
            self.aliases.insert(ROOT_POINTER.to_string(), reference.clone());
        } else {
            let id = self.reserve(IdentityKey("root".to_string()), ROOT_POINTER);
            self.slots.insert(ROOT_POINTER.to_string(), id);
            bodies.push((id, root, ROOT_POINTER.to_string()));
        }

        // Phase 2: resolve every definition name (aliases follow their chain)
        let mut definitions = IndexMap::new();
        for (table, name, _) in root.all_definitions() {
            let pointer = format!("#/{}/{}", table, name);
            let id = self.resolve(&pointer, &pointer)?;
            definitions.entry(name.clone()).or_insert(id);
        }
        let root_id = self.resolve(ROOT_POINTER, ROOT_POINTER)?;

        // Phase 3: lower the reserved bodies
        for (id, schema, pointer) in bodies {
            let kind = self.lower_kind(schema, &pointer)?;
            self.fill(id, schema, kind);
        }

        let graph = self.build_edges();
        tracing::debug!(
            nodes = self.nodes.len(),
            edges = graph.edge_count(),
            definitions = definitions.len(),
            "normalized schema"
        );

        Ok(SchemaGraph {
            nodes: self.nodes,
            root: root_id,
            definitions,
            graph,
            by_identity: self.by_identity,
            warnings: self.warnings,
        })
    }

    fn reserve(&mut self, identity: IdentityKey, location: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            id,
            kind: NodeKind::Any,
            declared_type: None,
            title: None,
            description: None,
            default: None,
            definition: None,
            enum_descriptions: Vec::new(),
            identity: identity.clone(),
            location: location.to_string(),
        });
        self.by_identity.insert(identity, id);
        id
    }

    fn fill(&mut self, id: NodeId, schema: &Schema, kind: NodeKind) {
        let node = &mut self.nodes[id.0];
        node.kind = kind;
        node.declared_type = schema.primary_type();
        node.title = schema.title.clone();
        node.description = schema.description.clone();
        node.default = schema.default.clone();
        node.enum_descriptions = schema.enum_descriptions.clone();
    }

    /// Follow a `$ref` to its reserved node
    fn resolve(&self, reference: &str, location: &str) -> Result<NodeId, SchemaError> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = reference.to_string();

        loop {
            let pointer = canonical_pointer(&current).ok_or_else(|| SchemaError::UnresolvedRef {
                location: location.to_string(),
                reference: current.clone(),
            })?;

            if chain.contains(&pointer) {
                chain.push(pointer);
                return Err(SchemaError::CyclicAlias { chain });
            }
            chain.push(pointer.clone());

            if let Some(id) = self.slots.get(&pointer) {
                return Ok(*id);
            }
            match self.aliases.get(&pointer) {
                Some(next) => current = next.clone(),
                None => {
                    return Err(SchemaError::UnresolvedRef {
                        location: location.to_string(),
                        reference: reference.to_string(),
                    })
                }
            }
        }
    }

    /// Lower an inline schema (not a definition body) to a node
    fn lower(&mut self, schema: &Schema, location: &str) -> Result<NodeId, SchemaError> {
        if let Some(reference) = &schema.reference {
            return self.resolve(reference, location);
        }

        let kind = self.lower_kind(schema, location)?;
        let digest = self.digest(schema, &kind);
        let identity = match kind {
            NodeKind::Object { .. } => IdentityKey(format!("object:{}", digest)),
            _ => IdentityKey(format!("{}:{}@{}", kind.label(), digest, location)),
        };

        if let Some(existing) = self.by_identity.get(&identity) {
            tracing::debug!(location, existing = %existing, "deduplicated anonymous object");
            return Ok(*existing);
        }

        let id = self.reserve(identity, location);
        self.fill(id, schema, kind);
        Ok(id)
    }

    fn lower_kind(&mut self, schema: &Schema, location: &str) -> Result<NodeKind, SchemaError> {
        let keywords = schema.composition_keywords();
        if keywords.len() > 1 {
            return Err(SchemaError::MalformedCombinator {
                location: location.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            });
        }

        if let Some(set) = &schema.schema_type {
            let ignored = set.ignored();
            if !ignored.is_empty() {
                self.warnings.warning(
                    location,
                    DiagnosticCode::MultipleTypes,
                    format!("Only the first declared type is used; ignoring {:?}", ignored),
                );
            }
        }

        if !schema.all_of.is_empty() {
            return Ok(NodeKind::AllOf(self.lower_branches(&schema.all_of, location, "allOf")?));
        }
        if !schema.any_of.is_empty() {
            return Ok(NodeKind::AnyOf(self.lower_branches(&schema.any_of, location, "anyOf")?));
        }
        if !schema.one_of.is_empty() {
            return Ok(NodeKind::OneOf(self.lower_branches(&schema.one_of, location, "oneOf")?));
        }

        if let Some(literals) = schema.literals() {
            return Ok(NodeKind::Enum { literals });
        }

        match schema.primary_type() {
            Some(JsonType::Object) => self.lower_object(schema, location),
            None if !schema.properties.is_empty() => self.lower_object(schema, location),
            Some(JsonType::Array) => self.lower_array(schema, location),
            None if schema.items.is_some() => self.lower_array(schema, location),
            Some(other) => Ok(PrimitiveType::from_json_type(other)
                .map(NodeKind::Primitive)
                .unwrap_or(NodeKind::Any)),
            None => Ok(NodeKind::Any),
        }
    }

    fn lower_branches(
        &mut self,
        branches: &[Schema],
        location: &str,
        keyword: &str,
    ) -> Result<Vec<NodeId>, SchemaError> {
        branches
            .iter()
            .enumerate()
            .map(|(i, branch)| self.lower(branch, &format!("{}/{}/{}", location, keyword, i)))
            .collect()
    }

    fn lower_object(&mut self, schema: &Schema, location: &str) -> Result<NodeKind, SchemaError> {
        let mut properties = IndexMap::with_capacity(schema.properties.len());
        for (name, property) in &schema.properties {
            let child = self.lower(property, &format!("{}/properties/{}", location, escape(name)))?;
            properties.insert(name.clone(), child);
        }

        let mut required: Vec<String> = Vec::with_capacity(schema.required.len());
        for name in &schema.required {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }

        Ok(NodeKind::Object { properties, required })
    }

    fn lower_array(&mut self, schema: &Schema, location: &str) -> Result<NodeKind, SchemaError> {
        let items = match &schema.items {
            Some(items) => Some(self.lower(items, &format!("{}/items", location))?),
            None => None,
        };
        Ok(NodeKind::Array { items })
    }

    /// Stable structural digest of a node: semantic keywords only, children by identity
    fn digest(&self, schema: &Schema, kind: &NodeKind) -> String {
        let identity_of =
            |id: &NodeId| Value::String(self.nodes[id.0].identity.structural().to_string());

        let shape = match kind {
            NodeKind::Object { properties, required } => {
                let mut required = required.clone();
                required.sort();
                json!({
                    "properties": properties
                        .iter()
                        .map(|(name, id)| json!([name, identity_of(id)]))
                        .collect::<Vec<_>>(),
                    "required": required,
                })
            }
            NodeKind::Array { items } => json!({ "items": items.as_ref().map(identity_of) }),
            NodeKind::AllOf(ids) | NodeKind::AnyOf(ids) | NodeKind::OneOf(ids) => {
                json!({ "branches": ids.iter().map(identity_of).collect::<Vec<_>>() })
            }
            NodeKind::Enum { literals } => json!({ "literals": literals }),
            NodeKind::Primitive(p) => json!({ "primitive": p.as_str() }),
            NodeKind::Any => json!({}),
        };

        let canonical = json!({
            "kind": kind.label(),
            "shape": shape,
            "type": schema.primary_type(),
            "title": schema.title,
            "description": schema.description,
            "default": schema.default,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn build_edges(&self) -> DiGraph<NodeId, super::EdgeKind> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.nodes.len() * 2);
        for node in &self.nodes {
            graph.add_node(node.id);
        }
        for node in &self.nodes {
            for (edge, target) in node.kind.edges() {
                graph.add_edge(node.id.graph_index(), target.graph_index(), edge);
            }
        }
        graph
    }
}

/// Reduce a supported `$ref` to the pointer form used as slot key
fn canonical_pointer(reference: &str) -> Option<String> {
    if reference == ROOT_POINTER {
        return Some(ROOT_POINTER.to_string());
    }
    let rest = reference.strip_prefix("#/")?;
    let (table, name) = rest.split_once('/')?;
    if table != "definitions" && table != "$defs" {
        return None;
    }
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(format!("#/{}/{}", table, unescape(name)))
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(value: Value) -> SchemaGraph {
        normalize(&Schema::from_value(value).unwrap()).unwrap()
    }

    fn error_of(value: Value) -> SchemaError {
        normalize(&Schema::from_value(value).unwrap()).unwrap_err()
    }

    #[test]
    fn test_ref_becomes_edge() {
        let graph = graph_of(json!({
            "title": "Parent",
            "properties": {"address": {"$ref": "#/definitions/Address"}},
            "definitions": {"Address": {"properties": {"street": {"type": "string"}}}}
        }));

        let address = graph.definition("Address").unwrap();
        match &graph.node(graph.root()).kind {
            NodeKind::Object { properties, .. } => assert_eq!(properties["address"], address),
            other => panic!("Expected object, got {:?}", other),
        }
        assert_eq!(graph.node(address).definition.as_deref(), Some("Address"));
    }

    #[test]
    fn test_dedup_identical_anonymous_objects() {
        let item = json!({"type": "object", "properties": {"x": {"type": "integer"}}});
        let graph = graph_of(json!({
            "properties": {
                "single": item.clone(),
                "many": {"type": "array", "items": item}
            }
        }));

        let (single, many) = match &graph.node(graph.root()).kind {
            NodeKind::Object { properties, .. } => (properties["single"], properties["many"]),
            other => panic!("Expected object, got {:?}", other),
        };
        match &graph.node(many).kind {
            NodeKind::Array { items } => assert_eq!(*items, Some(single)),
            other => panic!("Expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_position_metadata_is_ignored() {
        let graph = graph_of(json!({
            "properties": {
                "a": {"type": "object", "x-line": 3, "properties": {"v": {"type": "string"}}},
                "b": {"type": "object", "x-line": 9, "properties": {"v": {"type": "string"}}}
            }
        }));
        match &graph.node(graph.root()).kind {
            NodeKind::Object { properties, .. } => assert_eq!(properties["a"], properties["b"]),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let graph = graph_of(json!({
            "$ref": "#/definitions/Node",
            "definitions": {
                "Node": {
                    "properties": {
                        "next": {"$ref": "#/definitions/Node"},
                        "children": {"type": "array", "items": {"$ref": "#/definitions/Node"}}
                    }
                }
            }
        }));

        let node = graph.definition("Node").unwrap();
        assert_eq!(graph.root(), node);
        assert!(graph.successors(node).iter().any(|(_, target)| *target == node));
    }

    #[test]
    fn test_alias_chain() {
        let graph = graph_of(json!({
            "properties": {"a": {"$ref": "#/$defs/First"}},
            "$defs": {
                "First": {"$ref": "#/$defs/Second"},
                "Second": {"type": "string"}
            }
        }));
        assert_eq!(graph.definition("First"), graph.definition("Second"));
    }

    #[test]
    fn test_cyclic_alias_is_an_error() {
        let err = error_of(json!({
            "definitions": {
                "A": {"$ref": "#/definitions/B"},
                "B": {"$ref": "#/definitions/A"}
            }
        }));
        assert!(matches!(err, SchemaError::CyclicAlias { .. }));
    }

    #[test]
    fn test_unresolved_ref() {
        let err = error_of(json!({"properties": {"a": {"$ref": "#/definitions/Missing"}}}));
        match err {
            SchemaError::UnresolvedRef { location, reference } => {
                assert_eq!(location, "#/properties/a");
                assert_eq!(reference, "#/definitions/Missing");
            }
            other => panic!("Expected UnresolvedRef, got {:?}", other),
        }

        let err = error_of(json!({"properties": {"a": {"$ref": "other.json#/Thing"}}}));
        assert!(matches!(err, SchemaError::UnresolvedRef { .. }));
    }

    #[test]
    fn test_mixed_combinators_rejected() {
        let err = error_of(json!({
            "properties": {
                "a": {"allOf": [{"type": "string"}], "oneOf": [{"type": "integer"}]}
            }
        }));
        match err {
            SchemaError::MalformedCombinator { location, keywords } => {
                assert_eq!(location, "#/properties/a");
                assert_eq!(keywords, vec!["allOf", "oneOf"]);
            }
            other => panic!("Expected MalformedCombinator, got {:?}", other),
        }
    }

    #[test]
    fn test_escaped_pointer() {
        let graph = graph_of(json!({
            "properties": {"a": {"$ref": "#/definitions/a~1b"}},
            "definitions": {"a/b": {"type": "integer"}}
        }));
        assert!(graph.definition("a/b").is_some());
    }

    #[test]
    fn test_multiple_types_warns() {
        let graph = graph_of(json!({"properties": {"a": {"type": ["string", "integer"]}}}));
        assert_eq!(graph.warnings().with_code(DiagnosticCode::MultipleTypes).count(), 1);
    }
}
