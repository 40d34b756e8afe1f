//! Combinator Resolver
//!
//! Three disjoint policies:
//! - `allOf` merges its branches into one struct. Referenced branches are
//!   embedded as `<Type>_AllOf` fields, inline object branches are flattened
//!   into `<Field>_AllOf` fields.
//! - `anyOf` and `oneOf` become a struct with one optional field per branch.
//!   Which branches decode is decided at runtime by branch trial (see
//!   [`super::contract`]); the two differ only in how many matches they accept.
//!
//! Inline branches that need a declaration of their own (objects, enums,
//! nested combinators) are named after the combinator type.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::decl::{
    Combinator, CombinatorPolicy, CombinatorVariant, DeclKind, TypeDecl, TypeRef,
};
use super::names::{FieldNames, NameHint};
use super::CodegenContext;
use crate::error::Result;
use crate::graph::{DiagnosticItem, NodeId, NodeKind, PrimitiveType, SchemaNode};

/// Positional names with numeric suffixes for repeats: `StringValue`, `StringValue2`, ...
#[derive(Debug, Default)]
struct PositionalNames {
    seen: HashMap<String, usize>,
}

impl PositionalNames {
    fn next(&mut self, base: String) -> String {
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}{}", base, count)
        }
    }
}

/// Word used for positional branch names
fn kind_word(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Primitive(PrimitiveType::String) => "String",
        NodeKind::Primitive(PrimitiveType::Integer) => "Integer",
        NodeKind::Primitive(PrimitiveType::Number) => "Number",
        NodeKind::Primitive(PrimitiveType::Boolean) => "Boolean",
        NodeKind::Primitive(PrimitiveType::Null) => "Null",
        NodeKind::Object { .. } => "Object",
        NodeKind::Array { .. } => "Array",
        NodeKind::Enum { .. } => "Enum",
        NodeKind::AllOf(_) => "AllOf",
        NodeKind::AnyOf(_) => "AnyOf",
        NodeKind::OneOf(_) => "OneOf",
        NodeKind::Any => "Any",
    }
}

fn base_word(base: PrimitiveType) -> &'static str {
    match base {
        PrimitiveType::String => "String",
        PrimitiveType::Integer => "Integer",
        PrimitiveType::Number => "Number",
        PrimitiveType::Boolean => "Boolean",
        PrimitiveType::Null => "Null",
    }
}

/// A flattened `allOf` property collected across inline branches
struct MergedProperty {
    child: NodeId,
    type_ref: TypeRef,
}

/// One field of the merged struct, in branch order
enum Slot {
    /// A branch decoded whole into one field
    Embedded {
        branch: NodeId,
        type_ref: TypeRef,
        name: String,
        variant: usize,
    },
    /// A property of an inline object branch, by JSON name
    Flattened(String),
}

impl<'g> CodegenContext<'g> {
    /// Resolve an `allOf` node into one merged struct
    pub(crate) fn resolve_all_of(
        &mut self,
        node: &'g SchemaNode,
        name: &str,
        branches: &[NodeId],
    ) -> Result<TypeDecl> {
        let graph = self.graph;
        let mut decl = TypeDecl::new(
            name.to_string(),
            DeclKind::Struct,
            node.id,
            node.location.clone(),
        );
        let mut variants: Vec<CombinatorVariant> = Vec::with_capacity(branches.len());
        let mut positional = PositionalNames::default();
        let mut type_names = PositionalNames::default();

        let mut slots: Vec<Slot> = Vec::new();
        let mut merged: IndexMap<String, MergedProperty> = IndexMap::new();
        let mut inline_required: Vec<Vec<String>> = Vec::new();

        for branch_id in branches {
            let branch = graph.node(*branch_id);

            if branch.is_reference() {
                let type_ref = self.resolve_node(*branch_id, NameHint::none())?;
                let base = type_ref.named().unwrap_or("Any").to_string();
                slots.push(Slot::Embedded {
                    branch: *branch_id,
                    type_ref: type_ref.clone(),
                    name: positional.next(format!("{}{}", base, CombinatorPolicy::AllOf.marker())),
                    variant: variants.len(),
                });
                variants.push(CombinatorVariant {
                    field_name: None,
                    type_ref: Some(type_ref),
                    reference: true,
                    required_fields: required_of(branch),
                    enum_values: Vec::new(),
                    inline_fields: Vec::new(),
                });
                continue;
            }

            match &branch.kind {
                NodeKind::Object { properties, required } => {
                    for (json_name, child) in properties {
                        let derived = format!("{}{}", name, self.names.type_name(json_name));
                        let type_ref = self.resolve_node(*child, NameHint::derived(derived))?;

                        match merged.get(json_name) {
                            Some(existing) if existing.type_ref != type_ref => {
                                self.report(DiagnosticItem::conflicting_field_type(
                                    graph.node(*child).location.clone(),
                                    json_name,
                                    &existing.type_ref.to_string(),
                                    &type_ref.to_string(),
                                ))?;
                            }
                            Some(_) => {}
                            None => {
                                merged.insert(
                                    json_name.clone(),
                                    MergedProperty {
                                        child: *child,
                                        type_ref,
                                    },
                                );
                                slots.push(Slot::Flattened(json_name.clone()));
                            }
                        }
                    }

                    inline_required.push(required.clone());

                    variants.push(CombinatorVariant {
                        field_name: None,
                        type_ref: None,
                        reference: false,
                        required_fields: required.clone(),
                        enum_values: Vec::new(),
                        // JSON names until the merged identifiers are claimed
                        inline_fields: properties.keys().cloned().collect(),
                    });
                }
                other => {
                    let (type_ref, field_name) = self.inline_branch(
                        name,
                        *branch_id,
                        other,
                        "_AllOf",
                        &mut positional,
                        &mut type_names,
                    )?;
                    slots.push(Slot::Embedded {
                        branch: *branch_id,
                        type_ref: type_ref.clone(),
                        name: field_name,
                        variant: variants.len(),
                    });
                    variants.push(CombinatorVariant {
                        field_name: None,
                        enum_values: self.enum_values_of(&type_ref),
                        type_ref: Some(type_ref),
                        reference: false,
                        required_fields: Vec::new(),
                        inline_fields: Vec::new(),
                    });
                }
            }
        }

        let mut field_names = FieldNames::default();
        let mut flattened: HashMap<String, String> = HashMap::new();

        for slot in slots {
            match slot {
                Slot::Embedded {
                    branch,
                    type_ref,
                    name: base,
                    variant,
                } => {
                    let field_name = field_names.claim(base);
                    let mut field =
                        self.make_field(node.id, field_name.clone(), None, branch, type_ref, true)?;
                    field.embedded = true;
                    variants[variant].field_name = Some(field_name);
                    decl.fields.push(field);
                }
                Slot::Flattened(json_name) => {
                    let Some(property) = merged.get(&json_name) else {
                        continue;
                    };
                    let (child, type_ref) = (property.child, property.type_ref.clone());

                    // counted over every inline branch, whether it declares the property or not
                    let inline_objects = inline_required.len();
                    let required_in = inline_required
                        .iter()
                        .filter(|r| r.contains(&json_name))
                        .count();
                    let required = inline_objects > 0 && required_in == inline_objects;
                    if required_in > 0 && !required {
                        self.report(DiagnosticItem::allof_required_mismatch(
                            format!("{}/allOf", node.location),
                            &json_name,
                            required_in,
                            inline_objects,
                        ))?;
                    }

                    let field_name = field_names.claim(self.all_of_field_name(&json_name));
                    flattened.insert(json_name.clone(), field_name.clone());
                    let field = self.make_field(
                        node.id,
                        field_name,
                        Some(json_name),
                        child,
                        type_ref,
                        required,
                    )?;
                    decl.fields.push(field);
                }
            }
        }

        for variant in &mut variants {
            for field in &mut variant.inline_fields {
                if let Some(identifier) = flattened.get(field) {
                    *field = identifier.clone();
                }
            }
        }

        decl.combinator = Some(Combinator {
            policy: CombinatorPolicy::AllOf,
            variants,
        });
        decl.refresh_flags();
        // structural decode cannot enforce the cross-branch semantics
        decl.flags.has_custom_serialization = true;
        Ok(decl)
    }

    /// Resolve an `anyOf` / `oneOf` node into a struct with one optional field per branch
    pub(crate) fn resolve_union(
        &mut self,
        node: &'g SchemaNode,
        name: &str,
        policy: CombinatorPolicy,
        branches: &[NodeId],
    ) -> Result<TypeDecl> {
        let graph = self.graph;
        let mut decl = TypeDecl::new(
            name.to_string(),
            DeclKind::Struct,
            node.id,
            node.location.clone(),
        );
        let mut variants = Vec::with_capacity(branches.len());
        let mut positional = PositionalNames::default();
        let mut type_names = PositionalNames::default();
        let mut field_names = FieldNames::default();

        for branch_id in branches {
            let branch = graph.node(*branch_id);

            let (type_ref, base) = if branch.is_reference() {
                let type_ref = self.resolve_node(*branch_id, NameHint::none())?;
                let base = type_ref.named().unwrap_or("Any").to_string();
                let field_name = positional.next(format!("{}{}", base, policy.marker()));
                (type_ref, field_name)
            } else {
                self.inline_branch(
                    name,
                    *branch_id,
                    &branch.kind,
                    "",
                    &mut positional,
                    &mut type_names,
                )?
            };
            let field_name = field_names.claim(base);

            let field = self.make_field(
                node.id,
                field_name.clone(),
                None,
                *branch_id,
                type_ref.clone(),
                false,
            )?;
            decl.fields.push(field);

            variants.push(CombinatorVariant {
                field_name: Some(field_name),
                enum_values: self.enum_values_of(&type_ref),
                type_ref: Some(type_ref),
                reference: branch.is_reference(),
                required_fields: required_of(branch),
                inline_fields: Vec::new(),
            });
        }

        decl.combinator = Some(Combinator { policy, variants });
        Ok(decl)
    }

    /// Type and positional field name for a non-reference branch.
    ///
    /// Primitives stay primitive (`StringValue`). Enumerations get their own
    /// declaration (`<Parent>_Enum`, field `<Base>Value_Enum`). Objects, arrays
    /// and nested combinators are named `<Parent><Kind>Value`.
    fn inline_branch(
        &mut self,
        parent: &str,
        branch_id: NodeId,
        kind: &NodeKind,
        marker: &str,
        positional: &mut PositionalNames,
        type_names: &mut PositionalNames,
    ) -> Result<(TypeRef, String)> {
        let word = kind_word(kind);
        match kind {
            NodeKind::Enum { .. } => {
                let derived = type_names.next(format!("{}_Enum", parent));
                let type_ref = self.resolve_node(branch_id, NameHint::derived(derived))?;
                let base = type_ref
                    .named()
                    .and_then(|n| self.enums.get(n))
                    .map(|model| base_word(model.base))
                    .unwrap_or(word);
                Ok((type_ref, positional.next(format!("{}Value_Enum", base))))
            }
            _ => {
                let derived = type_names.next(format!("{}{}Value", parent, word));
                let type_ref = self.resolve_node(branch_id, NameHint::derived(derived))?;
                Ok((type_ref, positional.next(format!("{}Value{}", word, marker))))
            }
        }
    }

    fn all_of_field_name(&self, json_name: &str) -> String {
        format!("{}{}", self.names.field_name(json_name), CombinatorPolicy::AllOf.marker())
    }

    fn enum_values_of(&self, type_ref: &TypeRef) -> Vec<serde_json::Value> {
        match type_ref {
            TypeRef::Named(name) => self
                .enums
                .get(name)
                .map(|model| model.values.iter().map(|v| v.value.to_json()).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn required_of(node: &SchemaNode) -> Vec<String> {
    match &node.kind {
        NodeKind::Object { required, .. } => required.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{compile, CodegenConfig, GeneratedOutput};
    use crate::graph::DiagnosticCode;
    use crate::schema::Schema;
    use serde_json::json;

    fn compile_value(value: serde_json::Value) -> GeneratedOutput {
        compile(&Schema::from_value(value).unwrap(), &CodegenConfig::default()).unwrap()
    }

    #[test]
    fn test_positional_names() {
        let mut names = PositionalNames::default();
        assert_eq!(names.next("StringValue".into()), "StringValue");
        assert_eq!(names.next("StringValue".into()), "StringValue2");
        assert_eq!(names.next("IntegerValue".into()), "IntegerValue");
        assert_eq!(names.next("StringValue".into()), "StringValue3");
    }

    #[test]
    fn test_all_of_merge() {
        let output = compile_value(json!({
            "title": "Merged",
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}, "required": ["a", "b"]},
                {"type": "object", "properties": {"c": {"type": "boolean"}}, "required": ["b", "c"]}
            ]
        }));

        let merged = output.get("Merged").unwrap();
        let json_names: Vec<&str> = merged
            .fields
            .iter()
            .filter_map(|f| f.json_name.as_deref())
            .collect();
        assert_eq!(json_names, vec!["a", "b", "c"]);
        assert!(merged.field("B_AllOf").unwrap().required);
        assert!(!merged.field("A_AllOf").unwrap().required);
        assert!(!merged.field("C_AllOf").unwrap().required);
        assert!(merged.flags.has_custom_serialization);
        assert!(merged.flags.has_combinator);
        assert_eq!(output.diagnostics.with_code(DiagnosticCode::AllOfRequiredMismatch).count(), 2);
    }

    #[test]
    fn test_all_of_embeds_references() {
        let output = compile_value(json!({
            "title": "Employee",
            "allOf": [
                {"$ref": "#/definitions/Person"},
                {"type": "object", "properties": {"employeeId": {"type": "string"}}, "required": ["employeeId"]}
            ],
            "definitions": {
                "Person": {"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}
            }
        }));

        let employee = output.get("Employee").unwrap();
        let person = employee.field("Person_AllOf").unwrap();
        assert!(person.embedded);
        assert!(person.json_name.is_none());
        assert_eq!(person.type_ref, TypeRef::Named("Person".into()));
        assert!(employee.field("EmployeeID_AllOf").unwrap().required);

        let variants = &employee.combinator.as_ref().unwrap().variants;
        assert!(variants[0].reference);
        assert_eq!(variants[0].required_fields, vec!["name"]);
        assert_eq!(variants[1].inline_fields, vec!["EmployeeID_AllOf"]);
    }

    #[test]
    fn test_all_of_embedded_and_flattened_names_stay_distinct() {
        let output = compile_value(json!({
            "title": "Wrapper",
            "allOf": [
                {"$ref": "#/definitions/A"},
                {"properties": {"a": {"type": "string"}}, "required": ["a"]}
            ],
            "definitions": {
                "A": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        }));

        let wrapper = output.get("Wrapper").unwrap();
        let names: Vec<&str> = wrapper.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["A_AllOf", "A_AllOf2"]);
        assert!(wrapper.field("A_AllOf").unwrap().embedded);
        assert_eq!(wrapper.field("A_AllOf2").unwrap().json_name.as_deref(), Some("a"));

        let variants = &wrapper.combinator.as_ref().unwrap().variants;
        assert_eq!(variants[0].field_name.as_deref(), Some("A_AllOf"));
        assert_eq!(variants[1].inline_fields, vec!["A_AllOf2"]);

        let runtime = crate::runtime::Runtime::new(&output);
        let input = json!({"name": "n", "a": "x"});
        let decoded = runtime.unmarshal("Wrapper", &input).unwrap();
        assert_eq!(decoded.field("A_AllOf").unwrap().type_name(), Some("A"));
        assert_eq!(runtime.marshal(&decoded).unwrap(), input);
    }

    #[test]
    fn test_all_of_conflicting_types() {
        let output = compile_value(json!({
            "title": "Clash",
            "allOf": [
                {"properties": {"v": {"type": "string"}}},
                {"properties": {"v": {"type": "integer"}}}
            ]
        }));
        let clash = output.get("Clash").unwrap();
        assert_eq!(clash.fields.len(), 1);
        assert_eq!(clash.fields[0].type_ref, TypeRef::Primitive(PrimitiveType::String));
        assert_eq!(output.diagnostics.with_code(DiagnosticCode::ConflictingFieldType).count(), 1);
    }

    #[test]
    fn test_union_field_layout() {
        let output = compile_value(json!({
            "title": "Value",
            "anyOf": [
                {"type": "string"},
                {"type": "number"},
                {"type": "boolean"},
                {"$ref": "#/definitions/Point"},
                {"type": "string"}
            ],
            "definitions": {"Point": {"type": "object", "properties": {"x": {"type": "number"}}}}
        }));

        let value = output.get("Value").unwrap();
        let names: Vec<&str> = value.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["StringValue", "NumberValue", "BooleanValue", "Point_AnyOf", "StringValue2"]
        );
        assert!(value.fields.iter().all(|f| f.optional && !f.required));
        assert_eq!(value.combinator.as_ref().unwrap().policy, CombinatorPolicy::AnyOf);
    }

    #[test]
    fn test_one_of_enum_branch() {
        let output = compile_value(json!({
            "title": "Size",
            "oneOf": [
                {"type": "integer"},
                {"type": "string", "enum": ["small", "large"]},
                {"type": "object", "properties": {"w": {"type": "integer"}}}
            ]
        }));

        let size = output.get("Size").unwrap();
        let names: Vec<&str> = size.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["IntegerValue", "StringValue_Enum", "ObjectValue"]);

        let enum_decl = output.get("Size_Enum").unwrap();
        assert_eq!(enum_decl.kind, DeclKind::Enum);
        assert_eq!(enum_decl.enum_values[0].name, "Size_EnumSmall");
        assert!(output.get("SizeObjectValue").is_some());

        let variants = &size.combinator.as_ref().unwrap().variants;
        assert_eq!(variants[1].enum_values, vec![json!("small"), json!("large")]);
        assert_eq!(size.field("StringValue_Enum").unwrap().enum_ref.as_deref(), Some("Size_Enum"));
    }

    #[test]
    fn test_nested_combinator() {
        let output = compile_value(json!({
            "title": "Outer",
            "oneOf": [
                {"anyOf": [{"type": "string"}, {"type": "integer"}]},
                {"type": "boolean"}
            ]
        }));

        let outer = output.get("Outer").unwrap();
        assert_eq!(outer.fields[0].name, "AnyOfValue");
        assert_eq!(outer.fields[0].type_ref, TypeRef::Named("OuterAnyOfValue".into()));
        let inner = output.get("OuterAnyOfValue").unwrap();
        assert_eq!(inner.combinator.as_ref().unwrap().policy, CombinatorPolicy::AnyOf);
    }
}
