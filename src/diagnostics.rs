//! Diagnostic Infrastructure
//!
//! Collects per-compilation notices: field-scoped rewrite failures,
//! capture-set mismatches, skipped fields. Diagnostics are data — the
//! core never prints them; the host's reporting UI decides presentation.
//!
//! # Example
//!
//! ```ignore
//! let mut bag = DiagnosticBag::new();
//! bag.warning(DiagnosticCode::MapOperatorNotFound, "Items", "no map operator call found");
//! assert!(!bag.has_errors());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info = 3,
    /// A warning
    Warning = 2,
    /// An error (highest severity)
    Error = 1,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable codes for everything the compiler can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// A field looked like a nested collection projection but the map
    /// operator call could not be located; the field passed through
    /// unrewritten.
    MapOperatorNotFound,
    /// A caller-declared capture is not used by the projection.
    UnnecessaryCapture,
    /// The projection uses a capture the caller did not declare.
    MissingCapture,
    /// A field was skipped: no name could be inferred, or the resolver
    /// could not type its value expression.
    FieldSkipped,
    /// Two structurally different schemas produced the same identity.
    HashCollision,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::MapOperatorNotFound => "map-operator-not-found",
            DiagnosticCode::UnnecessaryCapture => "unnecessary-capture",
            DiagnosticCode::MissingCapture => "missing-capture",
            DiagnosticCode::FieldSkipped => "field-skipped",
            DiagnosticCode::HashCollision => "hash-collision",
        }
    }
}

/// A single diagnostic with code, severity and an optional owning field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Name of the projection field the diagnostic is scoped to, when
    /// field-scoped.
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn format(&self) -> String {
        match &self.field {
            Some(field) => format!(
                "{} [{}] {}: {}",
                self.severity,
                self.code.as_str(),
                field,
                self.message
            ),
            None => format!("{} [{}]: {}", self.severity, self.code.as_str(), self.message),
        }
    }
}

/// An ordered collection of diagnostics for one compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Error,
            field: None,
            message: message.into(),
        });
    }

    pub fn warning(
        &mut self,
        code: DiagnosticCode,
        field: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Warning,
            field: Some(field.into()),
            message: message.into(),
        });
    }

    pub fn info(
        &mut self,
        code: DiagnosticCode,
        field: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Info,
            field: Some(field.into()),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bag_collects_and_filters() {
        let mut bag = DiagnosticBag::new();
        bag.warning(
            DiagnosticCode::MapOperatorNotFound,
            "Items",
            "no map operator call found",
        );
        bag.info(DiagnosticCode::FieldSkipped, "2", "field name not inferable");

        assert_eq!(bag.len(), 2);
        assert!(!bag.has_errors());
        assert_eq!(bag.with_code(DiagnosticCode::FieldSkipped).count(), 1);
    }

    #[test]
    fn test_format_includes_field_scope() {
        let diag = Diagnostic {
            code: DiagnosticCode::MissingCapture,
            severity: Severity::Error,
            field: Some("threshold".to_string()),
            message: "used but not declared".to_string(),
        };
        assert_eq!(
            diag.format(),
            "error [missing-capture] threshold: used but not declared"
        );
    }
}
