//! Input schema AST
//!
//! This is the shape an upstream JSON/YAML parser hands to the compiler. It
//! mirrors the Draft-07 vocabulary the compiler understands; every other keyword
//! (including source position metadata) lands in [`Schema::extensions`] and is
//! dropped during normalization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A JSON Schema `type` keyword value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

/// `type` may be a single name or a list of names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

impl TypeSet {
    /// The declared type used for generation: the first non-null entry, or
    /// `null` when that is the only thing declared.
    pub fn primary(&self) -> Option<JsonType> {
        match self {
            TypeSet::Single(t) => Some(*t),
            TypeSet::Multiple(types) => types
                .iter()
                .copied()
                .find(|t| *t != JsonType::Null)
                .or_else(|| types.first().copied()),
        }
    }

    /// Non-null entries beyond the primary one (these are ignored)
    pub fn ignored(&self) -> Vec<JsonType> {
        match self {
            TypeSet::Single(_) => Vec::new(),
            TypeSet::Multiple(types) => types
                .iter()
                .copied()
                .filter(|t| *t != JsonType::Null)
                .skip(1)
                .collect(),
        }
    }
}

/// One schema fragment as parsed from the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<TypeSet>,

    /// Insertion order is preserved (it drives field order)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "allOf", skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,

    #[serde(rename = "anyOf", skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,

    #[serde(rename = "oneOf", skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: IndexMap<String, Schema>,

    #[serde(rename = "$defs", skip_serializing_if = "IndexMap::is_empty")]
    pub defs: IndexMap<String, Schema>,

    /// Per-literal descriptions, parallel to `enum`
    #[serde(rename = "x-enum-descriptions", skip_serializing_if = "Vec::is_empty")]
    pub enum_descriptions: Vec<String>,

    /// Everything else (`$schema`, `$id`, `format`, position metadata, ...)
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Schema {
    /// Parse a schema from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Convert an already-parsed JSON value
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Declared primary type, if any
    pub fn primary_type(&self) -> Option<JsonType> {
        self.schema_type.as_ref().and_then(TypeSet::primary)
    }

    /// Enum literals, treating `const` as a single-literal enum
    pub fn literals(&self) -> Option<Vec<Value>> {
        match (&self.enum_values, &self.const_value) {
            (Some(values), _) => Some(values.clone()),
            (None, Some(value)) => Some(vec![value.clone()]),
            (None, None) => None,
        }
    }

    /// Composition keywords present on this node, in a fixed order.
    ///
    /// A node with inline `properties` counts as the "object" composition.
    pub fn composition_keywords(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if !self.all_of.is_empty() {
            found.push("allOf");
        }
        if !self.any_of.is_empty() {
            found.push("anyOf");
        }
        if !self.one_of.is_empty() {
            found.push("oneOf");
        }
        if !self.properties.is_empty() {
            found.push("properties");
        }
        found
    }

    /// All definition tables, `definitions` first, then `$defs`
    pub fn all_definitions(&self) -> impl Iterator<Item = (&'static str, &String, &Schema)> {
        self.definitions
            .iter()
            .map(|(name, schema)| ("definitions", name, schema))
            .chain(self.defs.iter().map(|(name, schema)| ("$defs", name, schema)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keywords() {
        let schema = Schema::from_value(json!({
            "title": "Parent",
            "type": "object",
            "required": ["id"],
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "integer", "default": 3},
                "id": {"$ref": "#/definitions/Id"}
            },
            "definitions": {"Id": {"type": "string"}},
            "x-line": 12
        }))
        .unwrap();

        assert_eq!(schema.title.as_deref(), Some("Parent"));
        assert_eq!(schema.primary_type(), Some(JsonType::Object));
        // insertion order, not alphabetical
        let names: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha", "id"]);
        assert_eq!(schema.properties["id"].reference.as_deref(), Some("#/definitions/Id"));
        assert_eq!(schema.extensions.get("x-line"), Some(&json!(12)));
        assert_eq!(schema.definitions.len(), 1);
    }

    #[test]
    fn test_type_list() {
        let schema = Schema::from_value(json!({"type": ["null", "string", "integer"]})).unwrap();
        assert_eq!(schema.primary_type(), Some(JsonType::String));
        assert_eq!(schema.schema_type.unwrap().ignored(), vec![JsonType::Integer]);
    }

    #[test]
    fn test_const_is_single_literal() {
        let schema = Schema::from_value(json!({"const": "fixed"})).unwrap();
        assert_eq!(schema.literals(), Some(vec![json!("fixed")]));
    }

    #[test]
    fn test_composition_keywords() {
        let schema = Schema::from_value(json!({
            "oneOf": [{"type": "string"}],
            "properties": {"a": {}}
        }))
        .unwrap();
        assert_eq!(schema.composition_keywords(), vec!["oneOf", "properties"]);
    }
}
