//! Type Graph Builder
//!
//! Walks the canonical graph from the root and from every definition and
//! emits one [`TypeDecl`] per distinct node that needs a declaration:
//! - objects become structs
//! - enumerations are handed to the enum materializer
//! - combinators are handed to the combinator resolver
//! - a root or definition that is a primitive or array becomes an alias
//!
//! Anonymous primitives and arrays are inlined into the field type (`[]T`).
//! Every visit is memoized by node, and the memo entry is written before the
//! node's children are visited, so a reference cycle ends at the revisit.

use indexmap::IndexMap;

use super::decl::{CombinatorPolicy, DeclKind, FieldDecl, TypeDecl, TypeRef, ValidationRule};
use super::names::{FieldNames, NameHint};
use super::CodegenContext;
use crate::error::Result;
use crate::graph::{DiagnosticItem, NodeId, NodeKind, SchemaNode};

impl<'g> CodegenContext<'g> {
    /// Visit the root and every definition
    pub fn build(&mut self) -> Result<()> {
        let graph = self.graph;

        self.resolve_node(graph.root(), NameHint::none())?;
        for (_, id) in graph.definitions() {
            self.resolve_node(id, NameHint::none())?;
        }

        self.report_cycles()?;
        Ok(())
    }

    /// Roots and definitions are always declared, whatever their kind
    fn is_standalone(&self, id: NodeId) -> bool {
        id == self.graph.root() || self.graph.node(id).is_reference()
    }

    /// Type reference for a node, declaring it on first visit
    pub(crate) fn resolve_node(&mut self, id: NodeId, hint: NameHint) -> Result<TypeRef> {
        if let Some(type_ref) = self.visited.get(&id) {
            return Ok(type_ref.clone());
        }

        let graph = self.graph;
        let node = graph.node(id);
        if !self.is_standalone(id) {
            match &node.kind {
                NodeKind::Primitive(p) => return Ok(TypeRef::Primitive(*p)),
                NodeKind::Any => return Ok(TypeRef::Any),
                NodeKind::Array { items } => {
                    let base = hint
                        .derived
                        .unwrap_or_else(|| self.config.naming.fallback_name.clone());
                    let item = self.resolve_items(*items, &base)?;
                    return Ok(TypeRef::Array(Box::new(item)));
                }
                _ => {}
            }
        }

        self.declare(node, hint)
    }

    fn resolve_items(&mut self, items: Option<NodeId>, base: &str) -> Result<TypeRef> {
        match items {
            Some(item) => self.resolve_node(item, NameHint::derived(format!("{}Item", base))),
            None => Ok(TypeRef::Any),
        }
    }

    fn declare(&mut self, node: &'g SchemaNode, hint: NameHint) -> Result<TypeRef> {
        let name = self.names.name_of(self.graph, node.id, hint)?;
        let type_ref = TypeRef::Named(name.clone());

        let kind = match &node.kind {
            NodeKind::Object { .. }
            | NodeKind::AllOf(_)
            | NodeKind::AnyOf(_)
            | NodeKind::OneOf(_) => DeclKind::Struct,
            NodeKind::Enum { .. } => DeclKind::Enum,
            NodeKind::Array { .. } | NodeKind::Primitive(_) | NodeKind::Any => DeclKind::Alias,
        };
        self.visited.insert(node.id, type_ref.clone());
        self.kinds.insert(name.clone(), kind);

        tracing::debug!(
            name = %name,
            kind = node.kind.label(),
            location = %node.location,
            "declaring type"
        );

        let mut decl = match &node.kind {
            NodeKind::Object {
                properties,
                required,
            } => self.build_struct(node, &name, properties, required)?,
            NodeKind::Enum { literals } => self.materialize_enum(node, &name, literals)?,
            NodeKind::AllOf(branches) => self.resolve_all_of(node, &name, branches)?,
            NodeKind::AnyOf(branches) => {
                self.resolve_union(node, &name, CombinatorPolicy::AnyOf, branches)?
            }
            NodeKind::OneOf(branches) => {
                self.resolve_union(node, &name, CombinatorPolicy::OneOf, branches)?
            }
            NodeKind::Primitive(p) => self.alias(node, &name, TypeRef::Primitive(*p)),
            NodeKind::Any => self.alias(node, &name, TypeRef::Any),
            NodeKind::Array { items } => {
                let item = self.resolve_items(*items, &name)?;
                self.alias(node, &name, TypeRef::Array(Box::new(item)))
            }
        };

        decl.description = node.description.clone();
        decl.refresh_flags();
        self.decls.push(decl);
        Ok(type_ref)
    }

    fn alias(&self, node: &SchemaNode, name: &str, target: TypeRef) -> TypeDecl {
        let mut decl = TypeDecl::new(
            name.to_string(),
            DeclKind::Alias,
            node.id,
            node.location.clone(),
        );
        decl.alias_of = Some(target);
        decl
    }

    fn build_struct(
        &mut self,
        node: &'g SchemaNode,
        name: &str,
        properties: &'g IndexMap<String, NodeId>,
        required: &[String],
    ) -> Result<TypeDecl> {
        let mut decl = TypeDecl::new(
            name.to_string(),
            DeclKind::Struct,
            node.id,
            node.location.clone(),
        );
        let mut field_names = FieldNames::default();

        for (json_name, child) in properties {
            let derived = format!("{}{}", name, self.names.type_name(json_name));
            let type_ref = self.resolve_node(*child, NameHint::derived(derived))?;
            let field_name = field_names.claim(self.names.field_name(json_name));
            let is_required = required.iter().any(|r| r == json_name);

            let field = self.make_field(
                node.id,
                field_name,
                Some(json_name.clone()),
                *child,
                type_ref,
                is_required,
            )?;
            decl.fields.push(field);
        }

        Ok(decl)
    }

    /// Build a field for `child` inside the declaration of `parent`, with its
    /// validation rules and materialized default
    pub(crate) fn make_field(
        &mut self,
        parent: NodeId,
        name: String,
        json_name: Option<String>,
        child: NodeId,
        type_ref: TypeRef,
        required: bool,
    ) -> Result<FieldDecl> {
        let graph = self.graph;
        let child_node = graph.node(child);
        let label = json_name.clone().unwrap_or_else(|| name.clone());

        let mut field = FieldDecl::new(name, json_name, type_ref, required);
        field.description = child_node.description.clone();
        field.indirect = !field.type_ref.is_array() && self.analysis.same_component(parent, child);

        if required {
            field.rules.push(ValidationRule::Required {
                message: format!("field '{}' is required", label),
            });
        }

        if let TypeRef::Named(type_name) = &field.type_ref {
            if let Some(model) = self.enums.get(type_name) {
                field.enum_ref = Some(type_name.clone());
                field.rules.push(ValidationRule::EnumMembership {
                    enum_name: type_name.clone(),
                    allowed: model.values.iter().map(|v| v.value.to_json()).collect(),
                    message: format!("field '{}' must be one of the {} values", label, type_name),
                });
            }
        }

        if let Some(type_name) = field.type_ref.named() {
            if self.kinds.get(type_name) == Some(&DeclKind::Struct) {
                field.rules.push(ValidationRule::NestedValidate {
                    type_name: type_name.to_string(),
                    message: format!("field '{}' is not a valid {}", label, type_name),
                });
            }
        }

        field.default = self.materialize_default(child_node, &field)?;
        Ok(field)
    }

    /// One informational diagnostic per reference cycle
    fn report_cycles(&mut self) -> Result<()> {
        let groups = self.analysis.groups.clone();
        for group in groups {
            let members: Vec<String> = group
                .members
                .iter()
                .map(|id| {
                    self.names
                        .canonical_name(*id)
                        .map(str::to_string)
                        .unwrap_or_else(|| self.graph.node(*id).location.clone())
                })
                .collect();
            let location = group
                .members
                .first()
                .map(|id| self.graph.node(*id).location.clone())
                .unwrap_or_default();
            self.report(DiagnosticItem::recursive_reference(location, &members))?;
        }
        Ok(())
    }
}
