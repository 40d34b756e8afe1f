//! Error types for schema compilation

use thiserror::Error;

use crate::codegen::BranchPolicy;
use crate::graph::DiagnosticItem;

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Problems with the schema document itself. All of them abort compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Malformed combinator composition at {location}: found {}", keywords.join(", "))]
    MalformedCombinator {
        location: String,
        keywords: Vec<String>,
    },

    #[error("Unresolved $ref '{reference}' at {location}")]
    UnresolvedRef { location: String, reference: String },

    #[error("Cyclic alias chain: {}", chain.join(" -> "))]
    CyclicAlias { chain: Vec<String> },

    #[error("Invalid default {default} at {location}: {reason}")]
    InvalidDefault {
        location: String,
        default: String,
        reason: String,
    },
}

/// Compilation errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Naming conflict: '{name}' is claimed by both {first} and {second}")]
    NamingConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("Diagnostic escalated to error: {0}")]
    Escalated(Box<DiagnosticItem>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// The schema error behind this failure, if any
    pub fn as_schema_error(&self) -> Option<&SchemaError> {
        match self {
            CompileError::Schema(e) => Some(e),
            _ => None,
        }
    }
}

fn join_values(values: &[serde_json::Value]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

/// Failures raised by the generated validate / unmarshal / marshal contracts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeValidationError {
    #[error("{type_name}: {message}")]
    RequiredFieldMissing {
        type_name: String,
        field: String,
        message: String,
    },

    #[error("{type_name}.{field}: {value} is not one of [{}]", join_values(allowed))]
    EnumMembership {
        type_name: String,
        field: String,
        value: serde_json::Value,
        allowed: Vec<serde_json::Value>,
    },

    #[error("{type_name}: expected {policy} matching branch, found {}", matched.len())]
    BranchMatch {
        type_name: String,
        policy: BranchPolicy,
        /// Branch fields that decoded successfully
        matched: Vec<String>,
        /// Branch field and the reason it was rejected
        failures: Vec<(String, RuntimeValidationError)>,
    },

    #[error("{context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<RuntimeValidationError>,
    },

    #[error("expected {expected}, found {found}")]
    Decode { expected: String, found: String },

    #[error("unknown type '{0}'")]
    UnknownType(String),
}

impl RuntimeValidationError {
    pub(crate) fn nested(context: impl Into<String>, source: RuntimeValidationError) -> Self {
        RuntimeValidationError::Nested {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through `Nested` wrappers
    pub fn root_cause(&self) -> &RuntimeValidationError {
        match self {
            RuntimeValidationError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Field / branch path from the outermost type down to the root cause
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let RuntimeValidationError::Nested { context, source } = current {
            path.push(context.as_str());
            current = source;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_chain() {
        let err = RuntimeValidationError::nested(
            "Order.Customer",
            RuntimeValidationError::nested(
                "Customer.Email",
                RuntimeValidationError::RequiredFieldMissing {
                    type_name: "Customer".into(),
                    field: "Email".into(),
                    message: "field 'email' is required".into(),
                },
            ),
        );
        assert_eq!(err.path(), vec!["Order.Customer", "Customer.Email"]);
        assert!(matches!(
            err.root_cause(),
            RuntimeValidationError::RequiredFieldMissing { field, .. } if field == "Email"
        ));
        assert_eq!(
            err.to_string(),
            "Order.Customer: Customer.Email: Customer: field 'email' is required"
        );
    }

    #[test]
    fn test_branch_match_message() {
        let err = RuntimeValidationError::BranchMatch {
            type_name: "Shape".into(),
            policy: BranchPolicy::ExactlyOne,
            matched: vec!["Circle_OneOf".into(), "Square_OneOf".into()],
            failures: Vec::new(),
        };
        assert_eq!(err.to_string(), "Shape: expected exactly one matching branch, found 2");
    }
}
