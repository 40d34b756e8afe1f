//! Declarations
//!
//! The language-neutral output of the compiler. An emitter renders these into
//! source text; the [`crate::runtime`] interpreter executes them directly.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

use super::contract::Contract;
use crate::graph::{NodeId, PrimitiveType};

// =============================================================================
// Type References
// =============================================================================

/// Reference from a field (or alias) to its type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(PrimitiveType),
    /// A generated declaration, by name
    Named(String),
    Array(Box<TypeRef>),
    /// Any JSON value
    Any,
}

impl TypeRef {
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Name of the declaration this reference bottoms out in, looking through arrays
    pub fn named(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Array(inner) => inner.named(),
            TypeRef::Primitive(_) | TypeRef::Any => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p),
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Array(inner) => write!(f, "[]{}", inner),
            TypeRef::Any => write!(f, "any"),
        }
    }
}

// =============================================================================
// Type Declarations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Struct,
    Enum,
    Alias,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclFlags {
    pub has_combinator: bool,
    pub has_validation: bool,
    pub has_defaults: bool,
    pub has_custom_serialization: bool,
}

/// A type to be declared in the target language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: DeclKind,
    /// Canonical node this declaration was generated from
    pub node: NodeId,
    /// JSON pointer of that node
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<EnumValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_base: Option<PrimitiveType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combinator: Option<Combinator>,
    pub flags: DeclFlags,
    pub contract: Contract,
}

impl TypeDecl {
    pub(crate) fn new(name: String, kind: DeclKind, node: NodeId, location: String) -> Self {
        Self {
            name,
            kind,
            node,
            location,
            description: None,
            fields: Vec::new(),
            enum_values: Vec::new(),
            enum_base: None,
            alias_of: None,
            combinator: None,
            flags: DeclFlags::default(),
            contract: Contract::default(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_json(&self, json_name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.json_name.as_deref() == Some(json_name))
    }

    pub fn enum_value(&self, name: &str) -> Option<&EnumValue> {
        self.enum_values.iter().find(|v| v.name == name)
    }

    /// Recompute the flags from the declaration's contents
    pub(crate) fn refresh_flags(&mut self) {
        let has_combinator = self.combinator.is_some();
        let has_defaults = self.fields.iter().any(|f| f.default.is_some());
        let has_validation = self.kind == DeclKind::Enum
            || has_combinator
            || self.fields.iter().any(|f| !f.rules.is_empty());

        self.flags = DeclFlags {
            has_combinator,
            has_validation,
            has_defaults,
            has_custom_serialization: has_combinator || has_defaults || has_validation,
        };
    }
}

// =============================================================================
// Fields
// =============================================================================

/// One struct member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Declared identifier
    pub name: String,
    /// Wire name; `None` for embedded and union branch fields, which take the whole value
    pub json_name: Option<String>,
    pub required: bool,
    /// Nullable representation (not required and not a slice)
    pub optional: bool,
    pub type_ref: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<String>,
    /// Merged `allOf` member
    pub embedded: bool,
    /// Field closes a reference cycle and must be held indirectly
    pub indirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDecl {
    pub(crate) fn new(
        name: String,
        json_name: Option<String>,
        type_ref: TypeRef,
        required: bool,
    ) -> Self {
        let optional = !required && !type_ref.is_array();
        Self {
            name,
            json_name,
            required,
            optional,
            type_ref,
            default: None,
            rules: Vec::new(),
            enum_ref: None,
            embedded: false,
            indirect: false,
            description: None,
        }
    }

    pub fn has_rule(&self, predicate: impl Fn(&ValidationRule) -> bool) -> bool {
        self.rules.iter().any(predicate)
    }
}

/// Materialized default: raw JSON plus the form an emitter writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultValue {
    pub raw: Value,
    /// JSON literal, or the enum constant identifier for enum fields
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    Required {
        message: String,
    },
    EnumMembership {
        enum_name: String,
        allowed: Vec<Value>,
        message: String,
    },
    NestedValidate {
        type_name: String,
        message: String,
    },
}

impl ValidationRule {
    pub fn message(&self) -> &str {
        match self {
            ValidationRule::Required { message }
            | ValidationRule::EnumMembership { message, .. }
            | ValidationRule::NestedValidate { message, .. } => message,
        }
    }
}

// =============================================================================
// Enumerations
// =============================================================================

/// Literal form of an enum value, fixed by the enum's base type.
///
/// Number literals keep the written form of the schema (`1` stays `1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumLiteral {
    Bool(bool),
    Integer(i64),
    Number(Number),
    String(String),
}

impl EnumLiteral {
    pub fn to_json(&self) -> Value {
        match self {
            EnumLiteral::Bool(b) => Value::Bool(*b),
            EnumLiteral::Integer(i) => Value::from(*i),
            EnumLiteral::Number(n) => Value::Number(n.clone()),
            EnumLiteral::String(s) => Value::String(s.clone()),
        }
    }
}

/// Numeric literals compare by value: `1` and `1.0` are the same literal
impl PartialEq for EnumLiteral {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EnumLiteral::Bool(a), EnumLiteral::Bool(b)) => a == b,
            (EnumLiteral::Integer(a), EnumLiteral::Integer(b)) => a == b,
            (EnumLiteral::Number(a), EnumLiteral::Number(b)) => a.as_f64() == b.as_f64(),
            (EnumLiteral::Integer(a), EnumLiteral::Number(b))
            | (EnumLiteral::Number(b), EnumLiteral::Integer(a)) => b.as_f64() == Some(*a as f64),
            (EnumLiteral::String(a), EnumLiteral::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for EnumLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: EnumLiteral,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Combinators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinatorPolicy {
    AllOf,
    AnyOf,
    OneOf,
}

impl CombinatorPolicy {
    pub fn keyword(&self) -> &'static str {
        match self {
            CombinatorPolicy::AllOf => "allOf",
            CombinatorPolicy::AnyOf => "anyOf",
            CombinatorPolicy::OneOf => "oneOf",
        }
    }

    /// Field name marker for referenced branches
    pub fn marker(&self) -> &'static str {
        match self {
            CombinatorPolicy::AllOf => "_AllOf",
            CombinatorPolicy::AnyOf => "_AnyOf",
            CombinatorPolicy::OneOf => "_OneOf",
        }
    }
}

impl fmt::Display for CombinatorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combinator {
    pub policy: CombinatorPolicy,
    pub variants: Vec<CombinatorVariant>,
}

/// One branch of a combinator and how it was resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinatorVariant {
    /// Field carrying the branch (embedded or union member); `None` when flattened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    /// Branch was a `$ref`
    pub reference: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
    /// Permitted values when the branch is an enumeration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    /// Flattened field names (inline `allOf` object branches)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline_fields: Vec<String>,
}
