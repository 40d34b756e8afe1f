//! Codegen Configuration
//!
//! Settings that shape the generated declarations:
//! - package: the output namespace (carried through, never interpreted)
//! - naming: acronym handling and fallback names
//! - diagnostics: per-code level (error / warn / ignore)
//!
//! Normalization and cycle analysis are config-free. Only naming and
//! diagnostic reporting read configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::graph::DiagnosticCode;

// =============================================================================
// Global Configuration
// =============================================================================

/// Codegen configuration for one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Target package / namespace identifier
    pub package: String,

    /// Naming conventions
    pub naming: NamingConfig,

    /// Diagnostics thresholds
    pub diagnostics: DiagnosticsConfig,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            package: "schema".to_string(),
            naming: NamingConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl CodegenConfig {
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }
}

/// Naming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Acronyms kept upper-case inside identifiers (e.g., ID, URL, UUID, API)
    pub acronyms: BTreeSet<String>,

    /// Keep all-caps words as written instead of title-casing them
    pub preserve_screaming_case: bool,

    /// Name used when a type has no title, definition name or parent path
    pub fallback_name: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            acronyms: ["ID", "URL", "URI", "UUID", "API", "HTTP", "JSON"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preserve_screaming_case: false,
            fallback_name: "Object".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn is_acronym(&self, word: &str) -> bool {
        self.acronyms.contains(&word.to_ascii_uppercase())
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Enum literal that does not fit the inferred base type
    pub dropped_enum_literal: DiagnosticLevel,

    /// allOf branches disagree on required-ness
    pub allof_required_mismatch: DiagnosticLevel,

    /// allOf branches declare one field with different types
    pub conflicting_field_type: DiagnosticLevel,

    /// Non-enum default that does not fit its field type
    pub default_type_mismatch: DiagnosticLevel,

    /// `type` lists more than one non-null type
    pub multiple_types: DiagnosticLevel,

    /// Recursive references
    pub recursive_reference: DiagnosticLevel,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dropped_enum_literal: DiagnosticLevel::Warn,
            allof_required_mismatch: DiagnosticLevel::Warn,
            conflicting_field_type: DiagnosticLevel::Warn,
            default_type_mismatch: DiagnosticLevel::Warn,
            multiple_types: DiagnosticLevel::Warn,
            recursive_reference: DiagnosticLevel::Ignore,
        }
    }
}

impl DiagnosticsConfig {
    /// Configured level for a diagnostic code
    pub fn level(&self, code: DiagnosticCode) -> DiagnosticLevel {
        match code {
            DiagnosticCode::DroppedEnumLiteral => self.dropped_enum_literal,
            DiagnosticCode::AllOfRequiredMismatch => self.allof_required_mismatch,
            DiagnosticCode::ConflictingFieldType => self.conflicting_field_type,
            DiagnosticCode::DefaultTypeMismatch => self.default_type_mismatch,
            DiagnosticCode::MultipleTypes => self.multiple_types,
            DiagnosticCode::RecursiveReference => self.recursive_reference,
        }
    }

    /// Treat every warning as an error
    pub fn strict() -> Self {
        Self {
            dropped_enum_literal: DiagnosticLevel::Error,
            allof_required_mismatch: DiagnosticLevel::Error,
            conflicting_field_type: DiagnosticLevel::Error,
            default_type_mismatch: DiagnosticLevel::Error,
            multiple_types: DiagnosticLevel::Error,
            recursive_reference: DiagnosticLevel::Ignore,
        }
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warn,
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodegenConfig::default();
        assert_eq!(config.package, "schema");
        assert_eq!(config.naming.fallback_name, "Object");
        assert!(config.naming.is_acronym("id"));
        assert!(!config.naming.is_acronym("name"));
        assert_eq!(
            config.diagnostics.level(DiagnosticCode::AllOfRequiredMismatch),
            DiagnosticLevel::Warn
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: CodegenConfig = toml::from_str(
            r#"
            package = "models"

            [diagnostics]
            dropped_enum_literal = "error"
            "#,
        )
        .unwrap();

        assert_eq!(config.package, "models");
        assert_eq!(config.diagnostics.dropped_enum_literal, DiagnosticLevel::Error);
        assert_eq!(config.diagnostics.multiple_types, DiagnosticLevel::Warn);
        assert_eq!(config.naming, NamingConfig::default());
    }

    #[test]
    fn test_strict() {
        let diagnostics = DiagnosticsConfig::strict();
        assert_eq!(diagnostics.level(DiagnosticCode::DefaultTypeMismatch), DiagnosticLevel::Error);
        assert_eq!(diagnostics.level(DiagnosticCode::RecursiveReference), DiagnosticLevel::Ignore);
    }
}
