//! Error types for schema code generation
//!
//! Every variant here is fatal: a generation run either resolves every target
//! or stops before any output is produced. Soft conditions live in
//! [`crate::analysis::Diagnostics`] instead.

use thiserror::Error;

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Broad category of a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Conflicting declarations merged into one node
    Contradiction,
    /// Something referenced could not be found or represented
    Resolution,
    /// Identifier allocation ran out of attempts
    Exhaustion,
    /// Advisory diagnostics promoted to blocking by configuration
    Advisory,
    /// Configuration, IO and parse failures outside the engine
    Environment,
}

/// Schema code generation errors
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Contradictory {keyword} at {location}: {existing} vs {incoming}")]
    Contradiction {
        location: String,
        keyword: &'static str,
        existing: String,
        incoming: String,
    },

    #[error("Can't resolve reference {reference} at {location}")]
    UnresolvedRef { location: String, reference: String },

    #[error("Can't represent default value at {location}: {message}")]
    UnrepresentableDefault { location: String, message: String },

    #[error("Circular base class chain involving {0}")]
    CircularBase(String),

    #[error("Invalid schema at {location}: {message}")]
    InvalidSchema { location: String, message: String },

    #[error("Invalid custom class {class_name} for {key}")]
    InvalidCustomClass { key: String, class_name: String },

    #[error("Too many identically named classes - {0}")]
    NamesExhausted(String),

    #[error("{count} blocking diagnostic(s) reported")]
    BlockingDiagnostics { count: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl CodegenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Contradiction { .. } => ErrorCategory::Contradiction,
            Self::UnresolvedRef { .. }
            | Self::UnrepresentableDefault { .. }
            | Self::CircularBase(_)
            | Self::InvalidSchema { .. }
            | Self::InvalidCustomClass { .. } => ErrorCategory::Resolution,
            Self::NamesExhausted(_) => ErrorCategory::Exhaustion,
            Self::BlockingDiagnostics { .. } => ErrorCategory::Advisory,
            Self::Io(_) | Self::Json(_) | Self::Config(_) => ErrorCategory::Environment,
        }
    }

    /// Originating schema location, where one is known
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Contradiction { location, .. }
            | Self::UnresolvedRef { location, .. }
            | Self::UnrepresentableDefault { location, .. }
            | Self::InvalidSchema { location, .. } => Some(location),
            _ => None,
        }
    }

    pub(crate) fn contradiction(
        location: &str,
        keyword: &'static str,
        existing: impl ToString,
        incoming: impl ToString,
    ) -> Self {
        Self::Contradiction {
            location: location.to_string(),
            keyword,
            existing: existing.to_string(),
            incoming: incoming.to_string(),
        }
    }

    pub(crate) fn invalid(location: &str, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = CodegenError::contradiction("a.json#/properties/x", "const", "\"A\"", "\"B\"");
        assert_eq!(err.category(), ErrorCategory::Contradiction);
        assert_eq!(err.location(), Some("a.json#/properties/x"));
        assert!(err.to_string().contains("const"));

        let err = CodegenError::NamesExhausted("Variant".to_string());
        assert_eq!(err.category(), ErrorCategory::Exhaustion);
        assert_eq!(err.location(), None);
    }
}
