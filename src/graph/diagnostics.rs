//! Diagnostics
//!
//! Collects non-terminal findings during compilation. Terminal problems are
//! errors (see `crate::error`); everything here lets compilation continue and
//! is handed back to the caller next to the generated declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::PrimitiveType;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Enum literal incompatible with the inferred base type was dropped
    DroppedEnumLiteral,
    /// allOf branches disagree on whether a field is required
    AllOfRequiredMismatch,
    /// allOf branches declare the same field with different shapes
    ConflictingFieldType,
    /// Default value does not fit the field type and was dropped
    DefaultTypeMismatch,
    /// `type` lists several non-null types; only the first is used
    MultipleTypes,
    /// Schema refers to itself (directly or transitively)
    RecursiveReference,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DroppedEnumLiteral => "W001",
            Self::AllOfRequiredMismatch => "W002",
            Self::ConflictingFieldType => "W003",
            Self::DefaultTypeMismatch => "W004",
            Self::MultipleTypes => "W005",
            Self::RecursiveReference => "I001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::DroppedEnumLiteral
            | Self::AllOfRequiredMismatch
            | Self::ConflictingFieldType
            | Self::DefaultTypeMismatch
            | Self::MultipleTypes => Severity::Warning,

            Self::RecursiveReference => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// JSON pointer (or type name) the finding is about
    pub location: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (related branches, literals, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(
        location: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn dropped_enum_literal(
        location: impl Into<String>,
        literal: &Value,
        base: PrimitiveType,
    ) -> Self {
        Self::new(
            location,
            DiagnosticCode::DroppedEnumLiteral,
            format!("Enum literal {} is not a valid {} and was dropped", literal, base),
        )
    }

    pub fn allof_required_mismatch(
        location: impl Into<String>,
        field: &str,
        required_in: usize,
        branches: usize,
    ) -> Self {
        Self::new(
            location,
            DiagnosticCode::AllOfRequiredMismatch,
            format!("Field '{}' treated as optional", field),
        )
        .with_context(format!("required in {} of {} allOf branches", required_in, branches))
    }

    pub fn conflicting_field_type(
        location: impl Into<String>,
        field: &str,
        kept: &str,
        dropped: &str,
    ) -> Self {
        Self::new(
            location,
            DiagnosticCode::ConflictingFieldType,
            format!("allOf branches disagree on the type of '{}'; keeping {}", field, kept),
        )
        .with_context(format!("ignored: {}", dropped))
    }

    pub fn default_type_mismatch(
        location: impl Into<String>,
        default: &Value,
        expected: &str,
    ) -> Self {
        Self::new(
            location,
            DiagnosticCode::DefaultTypeMismatch,
            format!("Default {} is not a valid {} and was dropped", default, expected),
        )
    }

    pub fn recursive_reference(location: impl Into<String>, members: &[String]) -> Self {
        Self::new(
            location,
            DiagnosticCode::RecursiveReference,
            "Recursive reference resolved by name",
        )
        .with_context(format!("cycle: {}", members.join(" -> ")))
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.location
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Info => {
                tracing::debug!(code = %item.code, location = %item.location, "{}", item.message)
            }
            _ => tracing::warn!(code = %item.code, location = %item.location, "{}", item.message),
        }
        self.items.push(item);
    }

    /// Add a warning
    pub fn warning(
        &mut self,
        location: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(location, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items with a given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::DroppedEnumLiteral.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::RecursiveReference.severity(), Severity::Info);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticItem::dropped_enum_literal(
            "#/properties/a",
            &json!(true),
            PrimitiveType::String,
        ));
        diags.push(DiagnosticItem::recursive_reference(
            "#/definitions/Node",
            &["Node".into(), "Node".into()],
        ));

        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_errors());
        assert_eq!(diags.with_code(DiagnosticCode::RecursiveReference).count(), 1);
    }

    #[test]
    fn test_display() {
        let item = DiagnosticItem::allof_required_mismatch("Merged", "name", 1, 2);
        let text = item.to_string();
        assert!(text.starts_with("[W002] warning:"));
        assert!(text.contains("required in 1 of 2 allOf branches"));
    }
}
