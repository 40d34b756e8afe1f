//! Contract Runtime
//!
//! Executes the validate / unmarshal / marshal instruction lists of a
//! [`GeneratedOutput`] directly over `serde_json` values. It behaves the way
//! emitted code is expected to behave, so it backs the CLI `check` command
//! and the behavioral tests.
//!
//! Decoding is strict: `"5"` is not an integer, `1.5` is not an integer, and
//! a struct only decodes from a JSON object. A `null` member counts as absent.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::codegen::enums::coerce_literal;
use crate::codegen::{CombinatorPolicy, DeclKind, GeneratedOutput, Instruction, TypeDecl, TypeRef};
use crate::error::RuntimeValidationError;
use crate::graph::PrimitiveType;

type Result<T> = std::result::Result<T, RuntimeValidationError>;

// =============================================================================
// Instances
// =============================================================================

/// A decoded value of a generated type
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Array(Vec<Instance>),
    /// Fields keyed by declared field name; absent fields are not present
    Struct {
        type_name: String,
        fields: IndexMap<String, Instance>,
    },
    Enum {
        type_name: String,
        /// Matching constant, `None` when the value is outside the enumeration
        constant: Option<String>,
        value: Value,
    },
    Any(Value),
}

impl Instance {
    /// Name of the generated type, for structs and enums
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Instance::Struct { type_name, .. } | Instance::Enum { type_name, .. } => {
                Some(type_name)
            }
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Instance> {
        match self {
            Instance::Struct { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Instance) {
        if let Instance::Struct { fields, .. } = self {
            fields.insert(name.into(), value);
        }
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Instance> {
        match self {
            Instance::Struct { fields, .. } => fields.shift_remove(name),
            _ => None,
        }
    }

    /// Names of the populated fields, in declaration order
    pub fn populated(&self) -> Vec<&str> {
        match self {
            Instance::Struct { fields, .. } => fields.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn constant(&self) -> Option<&str> {
        match self {
            Instance::Enum { constant, .. } => constant.as_deref(),
            _ => None,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: impl Into<String>, found: &Value) -> RuntimeValidationError {
    RuntimeValidationError::Decode {
        expected: expected.into(),
        found: json_kind(found).to_string(),
    }
}

fn decode_primitive(primitive: PrimitiveType, value: &Value) -> Result<Instance> {
    let decoded = match (primitive, value) {
        (PrimitiveType::String, Value::String(s)) => Some(Instance::String(s.clone())),
        (PrimitiveType::Integer, Value::Number(n)) => n.as_i64().map(Instance::Integer),
        (PrimitiveType::Number, Value::Number(n)) => n.as_f64().map(Instance::Number),
        (PrimitiveType::Boolean, Value::Bool(b)) => Some(Instance::Bool(*b)),
        (PrimitiveType::Null, Value::Null) => Some(Instance::Null),
        _ => None,
    };
    decoded.ok_or_else(|| mismatch(primitive.as_str(), value))
}

/// Nest an error under `<Type>.<Field>`
fn field_error(decl: &TypeDecl, field: &str, e: RuntimeValidationError) -> RuntimeValidationError {
    RuntimeValidationError::nested(format!("{}.{}", decl.name, field), e)
}

// =============================================================================
// Runtime
// =============================================================================

/// Interpreter over the declarations of one compilation
pub struct Runtime<'a> {
    decls: HashMap<&'a str, &'a TypeDecl>,
}

impl<'a> Runtime<'a> {
    pub fn new(output: &'a GeneratedOutput) -> Self {
        Self {
            decls: output.decls.iter().map(|d| (d.name.as_str(), d)).collect(),
        }
    }

    fn decl(&self, name: &str) -> Result<&'a TypeDecl> {
        self.decls
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeValidationError::UnknownType(name.to_string()))
    }

    /// Decode `value` as the named type, running its unmarshal contract
    pub fn unmarshal(&self, type_name: &str, value: &Value) -> Result<Instance> {
        let decl = self.decl(type_name)?;

        let mut fields: IndexMap<String, Instance> = IndexMap::new();
        let mut decoded: Option<Instance> = None;

        for instruction in &decl.contract.unmarshal {
            match instruction {
                Instruction::DecodeAlias { .. } => {
                    decoded = self.decode_structure(decl, value, &mut fields)?;
                }
                Instruction::DecodeEmbedded { field, type_ref } => {
                    let instance = self
                        .decode(type_ref, value)
                        .map_err(|e| field_error(decl, field, e))?;
                    fields.insert(field.clone(), instance);
                }
                Instruction::TryBranches { policy, branches } => {
                    let mut matched = Vec::new();
                    let mut failures = Vec::new();
                    for branch in branches {
                        match self.decode(&branch.type_ref, value) {
                            Ok(instance) => {
                                matched.push(branch.field.clone());
                                fields.insert(branch.field.clone(), instance);
                            }
                            Err(e) => failures.push((branch.field.clone(), e)),
                        }
                    }
                    tracing::trace!(
                        type_name = %decl.name,
                        matched = matched.len(),
                        "branch trial"
                    );
                    if !policy.accepts(matched.len()) {
                        return Err(RuntimeValidationError::BranchMatch {
                            type_name: decl.name.clone(),
                            policy: *policy,
                            matched,
                            failures,
                        });
                    }
                }
                Instruction::ApplyDefault { field, value: default, .. } => {
                    if fields.contains_key(field) {
                        continue;
                    }
                    if let Some(field_decl) = decl.field(field) {
                        let instance = self
                            .decode(&field_decl.type_ref, default)
                            .map_err(|e| field_error(decl, field, e))?;
                        fields.insert(field.clone(), instance);
                    }
                }
                Instruction::InvokeValidate => {
                    let current = Self::assemble(decl, &fields, &decoded);
                    self.run_validate(decl, &current)?;
                }
                other => {
                    tracing::debug!(
                        instruction = ?other,
                        type_name = %decl.name,
                        "ignoring non-unmarshal instruction"
                    );
                }
            }
        }

        Ok(Self::assemble(decl, &fields, &decoded))
    }

    fn assemble(
        decl: &TypeDecl,
        fields: &IndexMap<String, Instance>,
        decoded: &Option<Instance>,
    ) -> Instance {
        match decoded {
            Some(instance) => instance.clone(),
            None => Instance::Struct {
                type_name: decl.name.clone(),
                fields: fields.clone(),
            },
        }
    }

    /// Structural decode through the plain alias: keyed struct members, the
    /// enum base value, or the aliased type
    fn decode_structure(
        &self,
        decl: &TypeDecl,
        value: &Value,
        fields: &mut IndexMap<String, Instance>,
    ) -> Result<Option<Instance>> {
        match decl.kind {
            DeclKind::Struct => {
                // an allOf of embedded branches leaves the shape check to each branch
                let embedded_only = decl
                    .combinator
                    .as_ref()
                    .map_or(false, |c| c.policy == CombinatorPolicy::AllOf)
                    && decl.fields.iter().all(|f| f.embedded);
                let object = match value {
                    Value::Object(map) => map,
                    _ if embedded_only => return Ok(None),
                    other => return Err(mismatch("object", other)),
                };
                for field in &decl.fields {
                    let Some(json_name) = &field.json_name else {
                        continue;
                    };
                    match object.get(json_name) {
                        None | Some(Value::Null) => {}
                        Some(member) => {
                            let instance = self
                                .decode(&field.type_ref, member)
                                .map_err(|e| field_error(decl, &field.name, e))?;
                            fields.insert(field.name.clone(), instance);
                        }
                    }
                }
                Ok(None)
            }
            DeclKind::Enum => {
                let base = decl.enum_base.unwrap_or(PrimitiveType::String);
                decode_primitive(base, value)?;
                let literal = coerce_literal(value, base);
                let matched = literal
                    .as_ref()
                    .and_then(|l| decl.enum_values.iter().find(|v| &v.value == l));
                // a member takes the declared form of its literal
                let normalized = match (matched, literal) {
                    (Some(member), _) => member.value.to_json(),
                    (None, Some(literal)) => literal.to_json(),
                    (None, None) => value.clone(),
                };
                Ok(Some(Instance::Enum {
                    type_name: decl.name.clone(),
                    constant: matched.map(|v| v.name.clone()),
                    value: normalized,
                }))
            }
            DeclKind::Alias => match &decl.alias_of {
                Some(target) => self.decode(target, value).map(Some),
                None => Ok(Some(Instance::Any(value.clone()))),
            },
        }
    }

    fn decode(&self, type_ref: &TypeRef, value: &Value) -> Result<Instance> {
        match type_ref {
            TypeRef::Primitive(p) => decode_primitive(*p, value),
            TypeRef::Named(name) => self.unmarshal(name, value),
            TypeRef::Array(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.decode(inner, item)
                            .map_err(|e| RuntimeValidationError::nested(format!("[{}]", i), e))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Instance::Array),
                other => Err(mismatch("array", other)),
            },
            TypeRef::Any => Ok(Instance::Any(value.clone())),
        }
    }

    /// Run the validate contract of the instance's type
    pub fn validate(&self, instance: &Instance) -> Result<()> {
        match instance {
            Instance::Struct { type_name, .. } | Instance::Enum { type_name, .. } => {
                let decl = self.decl(type_name)?;
                self.run_validate(decl, instance)
            }
            Instance::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate(item)
                        .map_err(|e| RuntimeValidationError::nested(format!("[{}]", i), e))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn run_validate(&self, decl: &TypeDecl, instance: &Instance) -> Result<()> {
        for instruction in &decl.contract.validate {
            match instruction {
                Instruction::CheckBranches { policy, fields } => {
                    let matched: Vec<String> = fields
                        .iter()
                        .filter(|f| instance.field(f).is_some())
                        .cloned()
                        .collect();
                    if !policy.accepts(matched.len()) {
                        return Err(RuntimeValidationError::BranchMatch {
                            type_name: decl.name.clone(),
                            policy: *policy,
                            matched,
                            failures: Vec::new(),
                        });
                    }
                }
                Instruction::CheckRequired { field, message, .. } => {
                    if instance.field(field).is_none() {
                        return Err(RuntimeValidationError::RequiredFieldMissing {
                            type_name: decl.name.clone(),
                            field: field.clone(),
                            message: message.clone(),
                        });
                    }
                }
                Instruction::CheckEnum { field, allowed, .. } => {
                    if let Some(Instance::Enum { value, .. }) = instance.field(field) {
                        if !allowed.contains(value) {
                            return Err(RuntimeValidationError::EnumMembership {
                                type_name: decl.name.clone(),
                                field: field.clone(),
                                value: value.clone(),
                                allowed: allowed.clone(),
                            });
                        }
                    }
                }
                Instruction::ValidateNested { field, .. } => {
                    if let Some(nested) = instance.field(field) {
                        self.validate(nested)
                            .map_err(|e| field_error(decl, field, e))?;
                    }
                }
                Instruction::CheckSelfEnum { allowed, .. } => {
                    if let Instance::Enum { value, .. } = instance {
                        if !allowed.contains(value) {
                            return Err(RuntimeValidationError::EnumMembership {
                                type_name: decl.name.clone(),
                                field: "value".to_string(),
                                value: value.clone(),
                                allowed: allowed.clone(),
                            });
                        }
                    }
                }
                Instruction::ValidateAlias { .. } => self.validate(instance)?,
                other => {
                    tracing::debug!(
                        instruction = ?other,
                        type_name = %decl.name,
                        "ignoring non-validate instruction"
                    );
                }
            }
        }
        Ok(())
    }

    /// Encode an instance, running its marshal contract first
    pub fn marshal(&self, instance: &Instance) -> Result<Value> {
        match instance {
            Instance::Null => Ok(Value::Null),
            Instance::Bool(b) => Ok(Value::Bool(*b)),
            Instance::Integer(i) => Ok(Value::from(*i)),
            Instance::Number(n) => Ok(Value::from(*n)),
            Instance::String(s) => Ok(Value::String(s.clone())),
            Instance::Any(v) => Ok(v.clone()),
            Instance::Array(items) => items
                .iter()
                .map(|item| self.marshal(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Instance::Struct { type_name, .. } | Instance::Enum { type_name, .. } => {
                let decl = self.decl(type_name)?;
                self.run_marshal(decl, instance)
            }
        }
    }

    fn run_marshal(&self, decl: &TypeDecl, instance: &Instance) -> Result<Value> {
        let mut out = Value::Object(Map::new());

        for instruction in &decl.contract.marshal {
            match instruction {
                Instruction::InvokeValidate => self.run_validate(decl, instance)?,
                Instruction::EncodeAlias { .. } => {
                    out = self.encode_structure(decl, instance)?;
                }
                Instruction::MergeEmbedded { field } => {
                    let Some(embedded) = instance.field(field) else {
                        continue;
                    };
                    match self.marshal(embedded)? {
                        Value::Object(members) => {
                            if let Value::Object(target) = &mut out {
                                target.extend(members);
                            }
                        }
                        other => {
                            if out.as_object().map_or(false, Map::is_empty) {
                                out = other;
                            }
                        }
                    }
                }
                Instruction::EncodePopulatedBranch { fields } => {
                    out = match fields.iter().find_map(|f| instance.field(f)) {
                        Some(branch) => self.marshal(branch)?,
                        None => Value::Null,
                    };
                }
                other => {
                    tracing::debug!(
                        instruction = ?other,
                        type_name = %decl.name,
                        "ignoring non-marshal instruction"
                    );
                }
            }
        }
        Ok(out)
    }

    fn encode_structure(&self, decl: &TypeDecl, instance: &Instance) -> Result<Value> {
        match instance {
            Instance::Enum { value, .. } => Ok(value.clone()),
            Instance::Struct { .. } => {
                let mut map = Map::new();
                for field in &decl.fields {
                    let Some(json_name) = &field.json_name else {
                        continue;
                    };
                    let Some(value) = instance.field(&field.name) else {
                        continue;
                    };
                    map.insert(json_name.clone(), self.marshal(value)?);
                }
                Ok(Value::Object(map))
            }
            other => self.marshal(other),
        }
    }

    /// Unmarshal then marshal
    pub fn round_trip(&self, type_name: &str, value: &Value) -> Result<Value> {
        let instance = self.unmarshal(type_name, value)?;
        self.marshal(&instance)
    }
}
