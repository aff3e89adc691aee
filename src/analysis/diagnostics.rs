//! Diagnostics
//!
//! Collects soft advisory conditions found during analysis. None of these stop
//! generation by themselves; `examples_blocking` turns the example and default
//! findings into a fatal error after the run.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// An `examples` entry fails its own schema
    InvalidExample,
    /// A `default` value fails its own schema
    InvalidDefault,
    /// A `pattern` or `patternProperties` key is not a valid regex
    InvalidPattern,
    /// A `format` tag with no known treatment
    UnknownFormat,
    /// `anyOf` other than the nullable two-branch form
    IgnoredAnyOf,
    /// A document root that produces no generated type
    SkippedSchema,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidExample => "W001",
            Self::InvalidDefault => "W002",
            Self::InvalidPattern => "W003",
            Self::UnknownFormat => "W004",
            Self::IgnoredAnyOf => "I001",
            Self::SkippedSchema => "I002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidExample | Self::InvalidDefault | Self::InvalidPattern | Self::UnknownFormat => {
                Severity::Warning
            }
            Self::IgnoredAnyOf | Self::SkippedSchema => Severity::Info,
        }
    }

    /// Whether `examples_blocking` makes this code fatal
    pub fn is_example_check(&self) -> bool {
        matches!(self, Self::InvalidExample | Self::InvalidDefault)
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
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Schema location that caused this diagnostic
    pub location: String,
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (e.g., individual validation errors)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(location: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
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
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} ({})", self.code, self.code.severity(), self.message, self.location)?;
        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }
        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from analysis passes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item, skipping exact repeats
    pub fn push(&mut self, item: DiagnosticItem) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn invalid_example(&mut self, location: &str, example: &serde_json::Value, errors: Vec<String>) {
        let mut item = DiagnosticItem::new(
            location,
            DiagnosticCode::InvalidExample,
            format!("Example {} does not match its schema", example),
        );
        item.context = errors;
        self.push(item);
    }

    pub fn invalid_default(&mut self, location: &str, default: &serde_json::Value, errors: Vec<String>) {
        let mut item = DiagnosticItem::new(
            location,
            DiagnosticCode::InvalidDefault,
            format!("Default {} does not match its schema", default),
        );
        item.context = errors;
        self.push(item);
    }

    pub fn invalid_pattern(&mut self, location: &str, pattern: &str, error: &regex::Error) {
        self.push(
            DiagnosticItem::new(location, DiagnosticCode::InvalidPattern, format!("Invalid regex '{}'", pattern))
                .with_context(error.to_string()),
        );
    }

    pub fn unknown_format(&mut self, location: &str, format: &str) {
        self.push(DiagnosticItem::new(
            location,
            DiagnosticCode::UnknownFormat,
            format!("Unrecognised format '{}'", format),
        ));
    }

    pub fn ignored_any_of(&mut self, location: &str, branches: usize) {
        self.push(DiagnosticItem::new(
            location,
            DiagnosticCode::IgnoredAnyOf,
            format!("anyOf with {} branches is not used for code generation", branches),
        ));
    }

    pub fn skipped_schema(&mut self, location: &str, reason: &str) {
        self.push(DiagnosticItem::new(location, DiagnosticCode::SkippedSchema, reason.to_string()));
    }

    /// Items that block generation when `examples_blocking` is set
    pub fn blocking_count(&self) -> usize {
        self.items.iter().filter(|i| i.code.is_example_check()).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
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

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
