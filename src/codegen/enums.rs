//! Enum & Default Materializer
//!
//! Base type inference looks at the first literal only:
//! - boolean gives a bool enum
//! - a number, or a string that parses as an integer, gives a numeric enum
//! - anything else falls back to the declared `type`, then to string
//!
//! The base type never changes afterwards. Later literals that do not fit it
//! are dropped with a warning.

use serde_json::{Number, Value};

use super::decl::{DeclKind, DefaultValue, EnumLiteral, EnumValue, FieldDecl, TypeDecl, TypeRef};
use super::{CodegenContext, EnumModel};
use crate::error::{Result, SchemaError};
use crate::graph::{DiagnosticItem, PrimitiveType, SchemaNode};
use crate::schema::JsonType;

/// Infer the base type of an enumeration from its first literal
pub fn infer_base(literals: &[Value], declared: Option<JsonType>) -> PrimitiveType {
    let fallback = match declared {
        Some(JsonType::Integer) => PrimitiveType::Integer,
        Some(JsonType::Number) => PrimitiveType::Number,
        Some(JsonType::Boolean) => PrimitiveType::Boolean,
        _ => PrimitiveType::String,
    };

    match literals.first() {
        Some(Value::Bool(_)) => PrimitiveType::Boolean,
        Some(Value::Number(n)) => {
            if declared == Some(JsonType::Number) || !(n.is_i64() || n.is_u64()) {
                PrimitiveType::Number
            } else {
                PrimitiveType::Integer
            }
        }
        Some(Value::String(s)) if s.parse::<i64>().is_ok() => PrimitiveType::Integer,
        _ => fallback,
    }
}

/// Coerce a literal to the enum base type, if it fits
pub fn coerce_literal(value: &Value, base: PrimitiveType) -> Option<EnumLiteral> {
    match (base, value) {
        (PrimitiveType::Boolean, Value::Bool(b)) => Some(EnumLiteral::Bool(*b)),
        (PrimitiveType::Integer, Value::Number(n)) => n.as_i64().map(EnumLiteral::Integer),
        (PrimitiveType::Integer, Value::String(s)) => {
            s.parse::<i64>().ok().map(EnumLiteral::Integer)
        }
        (PrimitiveType::Number, Value::Number(n)) => Some(EnumLiteral::Number(n.clone())),
        (PrimitiveType::Number, Value::String(s)) => s
            .parse::<i64>()
            .ok()
            .map(Number::from)
            .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
            .map(EnumLiteral::Number),
        (PrimitiveType::String, Value::String(s)) => Some(EnumLiteral::String(s.clone())),
        _ => None,
    }
}

impl<'g> CodegenContext<'g> {
    /// Build the enum declaration for an enum-bearing node
    pub(crate) fn materialize_enum(
        &mut self,
        node: &SchemaNode,
        name: &str,
        literals: &[Value],
    ) -> Result<TypeDecl> {
        let base = infer_base(literals, node.declared_type);
        let mut decl = TypeDecl::new(
            name.to_string(),
            DeclKind::Enum,
            node.id,
            node.location.clone(),
        );
        decl.enum_base = Some(base);
        decl.alias_of = Some(TypeRef::Primitive(base));

        for (index, literal) in literals.iter().enumerate() {
            let Some(value) = coerce_literal(literal, base) else {
                self.report(DiagnosticItem::dropped_enum_literal(
                    node.location.clone(),
                    literal,
                    base,
                ))?;
                continue;
            };
            if decl.enum_values.iter().any(|v| v.value == value) {
                tracing::debug!(
                    literal = %literal,
                    enum_name = name,
                    "skipping duplicate enum literal"
                );
                continue;
            }

            let constant = self.names.constant_name(name, &value.to_json())?;
            decl.enum_values.push(EnumValue {
                name: constant,
                value,
                description: node.enum_descriptions.get(index).cloned(),
            });
        }

        self.enums.insert(
            name.to_string(),
            EnumModel {
                base,
                values: decl.enum_values.clone(),
            },
        );
        Ok(decl)
    }

    /// Materialize the `default` of the node behind a field.
    ///
    /// Enum fields map the default to the matching constant; a default that
    /// matches no literal is an error. Other defaults become a JSON literal,
    /// or are dropped with a warning if they do not fit the field type.
    pub(crate) fn materialize_default(
        &mut self,
        node: &SchemaNode,
        field: &FieldDecl,
    ) -> Result<Option<DefaultValue>> {
        let Some(raw) = &node.default else {
            return Ok(None);
        };

        if let Some(enum_name) = &field.enum_ref {
            let Some(model) = self.enums.get(enum_name) else {
                return Ok(None);
            };
            let matched = coerce_literal(raw, model.base)
                .and_then(|literal| model.values.iter().find(|v| v.value == literal));
            return match matched {
                Some(value) => Ok(Some(DefaultValue {
                    raw: value.value.to_json(),
                    display: value.name.clone(),
                })),
                None => Err(SchemaError::InvalidDefault {
                    location: node.location.clone(),
                    default: raw.to_string(),
                    reason: format!("no literal of enum {} matches", enum_name),
                }
                .into()),
            };
        }

        if self.default_fits(raw, &field.type_ref) {
            Ok(Some(DefaultValue {
                raw: raw.clone(),
                display: raw.to_string(),
            }))
        } else {
            self.report(DiagnosticItem::default_type_mismatch(
                node.location.clone(),
                raw,
                &field.type_ref.to_string(),
            ))?;
            Ok(None)
        }
    }

    fn default_fits(&self, raw: &Value, type_ref: &TypeRef) -> bool {
        match type_ref {
            TypeRef::Primitive(p) => p.accepts(raw),
            TypeRef::Array(inner) => raw
                .as_array()
                .map_or(false, |items| items.iter().all(|item| self.default_fits(item, inner))),
            TypeRef::Named(name) => match self.kinds.get(name) {
                Some(DeclKind::Struct) => raw.is_object(),
                Some(DeclKind::Enum) => self
                    .enums
                    .get(name)
                    .map_or(false, |model| coerce_literal(raw, model.base).is_some()),
                _ => true,
            },
            TypeRef::Any => true,
        }
    }
}
