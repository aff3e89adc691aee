//! Codegen Configuration
//!
//! Settings that steer analysis and naming:
//! - Generator settings (target language, package, strict mode, nested-class naming)
//! - Naming conventions (acronyms kept upper-case in class names)
//! - Class-name overrides and custom-class tables
//!
//! Key principle: the tables here are plain data. The analysis passes consult them
//! but never mutate them; everything a run learns lives in its context.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{CodegenError, Result};

// =============================================================================
// Global Configuration
// =============================================================================

/// Everything the generator reads from configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default)]
    pub generator: GeneratorSettings,

    #[serde(default)]
    pub naming: NamingConfig,

    /// Schema URI -> class name
    #[serde(default)]
    pub class_names: IndexMap<String, String>,

    #[serde(default)]
    pub custom_classes: CustomClassTables,
}

impl CodegenConfig {
    /// Check custom-class names before a run starts
    pub fn validate(&self) -> Result<()> {
        self.custom_classes.validate()
    }
}

/// Generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub target_language: TargetLanguage,

    /// Package for generated classes
    pub base_package: Option<String>,

    /// Append input sub-directories to the base package
    pub derive_package_from_structure: bool,

    /// Enforce additional-properties and pattern-properties constraints
    pub strict_additional_properties: bool,

    pub nested_class_name: NestedClassName,

    /// Treat advisory diagnostics as fatal
    pub examples_blocking: bool,

    /// Passed through to the renderer
    pub generator_comment: Option<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            target_language: TargetLanguage::default(),
            base_package: None,
            derive_package_from_structure: true,
            strict_additional_properties: false,
            nested_class_name: NestedClassName::default(),
            examples_blocking: false,
            generator_comment: None,
        }
    }
}

/// How nested classes created for `$ref` properties are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedClassName {
    /// From the property name
    #[default]
    Property,
    /// From the last segment of the referenced schema location
    RefSchema,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Acronyms to preserve (e.g., ID, URL, UUID, API)
    pub acronyms: HashSet<String>,

    /// Whether to preserve all-caps words
    pub preserve_screaming_case: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            acronyms: ["ID", "URL", "UUID", "API", "HTTP", "JSON", "XML", "SQL", "URI", "UI", "IO"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preserve_screaming_case: true,
        }
    }
}

// =============================================================================
// Target Language
// =============================================================================

/// Supported target languages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Kotlin,
    Java,
    TypeScript,
    Rust,
}

impl TargetLanguage {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "kotlin" | "kt" => Some(Self::Kotlin),
            "java" => Some(Self::Java),
            "typescript" | "ts" => Some(Self::TypeScript),
            "rust" | "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        match self {
            Self::Kotlin => KOTLIN_KEYWORDS,
            Self::Java => JAVA_KEYWORDS,
            Self::TypeScript => TS_KEYWORDS,
            Self::Rust => RUST_KEYWORDS,
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_words().contains(&name)
    }

    /// Escape a reserved word; other names are returned unchanged
    pub fn escape_reserved(&self, name: &str) -> String {
        if !self.is_reserved(name) {
            return name.to_string();
        }
        match self {
            Self::Kotlin => format!("`{}`", name),
            Self::Java | Self::TypeScript => format!("{}_", name),
            // raw identifiers can't spell these
            Self::Rust if matches!(name, "self" | "Self" | "super" | "crate") => format!("{}_", name),
            Self::Rust => format!("r#{}", name),
        }
    }
}

// =============================================================================
// Custom Classes
// =============================================================================

/// What a custom class already supports, deciding which checks still apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Has a size (item-count checks)
    Sequence,
    /// Ordered (numeric range and const checks)
    Comparable,
    /// Has a length and text (length and pattern checks)
    CharSequence,
}

/// A class supplied by the user instead of a generated or system type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomClass {
    /// Simple or fully qualified class name
    pub class_name: String,

    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl CustomClass {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Package part of a qualified name
    pub fn package(&self) -> Option<&str> {
        self.class_name.rsplit_once('.').map(|(package, _)| package)
    }

    fn is_valid(&self) -> bool {
        !self.class_name.is_empty()
            && self.class_name.split('.').all(|segment| {
                let mut chars = segment.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
    }
}

/// Custom-class tables, consulted URI first, then format, then extension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomClassTables {
    /// Schema location (or `#`-fragment suffix) -> class
    #[serde(default)]
    pub uri: IndexMap<String, CustomClass>,

    /// Format tag -> class
    #[serde(default)]
    pub format: IndexMap<String, CustomClass>,

    /// Extension keyword -> extension value -> class
    #[serde(default)]
    pub extension: IndexMap<String, IndexMap<String, CustomClass>>,
}

impl CustomClassTables {
    pub fn is_empty(&self) -> bool {
        self.uri.is_empty() && self.format.is_empty() && self.extension.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let entries = self
            .uri
            .iter()
            .chain(self.format.iter())
            .chain(self.extension.values().flat_map(|values| values.iter()));
        for (key, class) in entries {
            if !class.is_valid() {
                return Err(CodegenError::InvalidCustomClass {
                    key: key.clone(),
                    class_name: class.class_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Find the custom class for a node, given the locations it answers to
    pub fn lookup<'a>(
        &self,
        locations: impl IntoIterator<Item = &'a str>,
        formats: &[String],
        extensions: &[(String, Value)],
    ) -> Option<&CustomClass> {
        for location in locations {
            let found = self
                .uri
                .iter()
                .find(|(key, _)| uri_matches(key, location))
                .map(|(_, class)| class);
            if found.is_some() {
                return found;
            }
        }
        if let Some(class) = formats.iter().find_map(|f| self.format.get(f)) {
            return Some(class);
        }
        extensions.iter().find_map(|(name, value)| {
            let value = value.as_str()?;
            self.extension.get(name)?.get(value)
        })
    }
}

fn uri_matches(key: &str, location: &str) -> bool {
    key == location
        || (key.starts_with('#') && location.ends_with(key))
        || (!key.contains('#') && location.strip_suffix('#') == Some(key))
}

// =============================================================================
// Keywords
// =============================================================================

const KOTLIN_KEYWORDS: &[&str] = &[
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if",
    "in", "interface", "is", "null", "object", "package", "return", "super", "this",
    "throw", "true", "try", "typealias", "typeof", "val", "var", "when", "while",
];

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "default", "do", "double", "else", "enum",
    "extends", "false", "final", "finally", "float", "for", "goto", "if",
    "implements", "import", "instanceof", "int", "interface", "long", "native",
    "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "void", "volatile", "while",
];

const TS_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "false",
    "finally", "for", "function", "if", "import", "in", "instanceof", "new",
    "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "as", "implements", "interface",
    "let", "package", "private", "protected", "public", "static", "yield",
    "any", "boolean", "constructor", "declare", "get", "module", "require",
    "number", "set", "string", "symbol", "type", "from", "of",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
    "super", "trait", "true", "type", "unsafe", "use", "where", "while",
    "async", "await", "dyn", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyword_escape() {
        assert_eq!(TargetLanguage::Kotlin.escape_reserved("class"), "`class`");
        assert_eq!(TargetLanguage::Java.escape_reserved("class"), "class_");
        assert_eq!(TargetLanguage::Rust.escape_reserved("type"), "r#type");
        assert_eq!(TargetLanguage::Rust.escape_reserved("self"), "self_");
        assert_eq!(TargetLanguage::TypeScript.escape_reserved("name"), "name");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(TargetLanguage::parse("Java"), Some(TargetLanguage::Java));
        assert_eq!(TargetLanguage::parse("ts"), Some(TargetLanguage::TypeScript));
        assert_eq!(TargetLanguage::parse("cobol"), None);
    }

    #[test]
    fn test_custom_class_lookup_order() {
        let mut tables = CustomClassTables::default();
        tables.uri.insert("#/properties/price".into(), CustomClass::new("com.example.Price"));
        tables.format.insert("money".into(), CustomClass::new("com.example.Money"));
        tables
            .extension
            .entry("x-type".into())
            .or_default()
            .insert("cash".into(), CustomClass::new("Cash"));

        let found = tables
            .lookup(["file:///a.json#/properties/price"], &["money".to_string()], &[])
            .unwrap();
        assert_eq!(found.class_name, "com.example.Price");
        assert_eq!(found.package(), Some("com.example"));

        let found = tables.lookup(["file:///a.json#/properties/cost"], &["money".to_string()], &[]).unwrap();
        assert_eq!(found.class_name, "com.example.Money");

        let found = tables
            .lookup(std::iter::empty(), &[], &[("x-type".to_string(), json!("cash"))])
            .unwrap();
        assert_eq!(found.package(), None);
        assert!(tables.lookup(["x"], &[], &[]).is_none());
    }

    #[test]
    fn test_invalid_custom_class_rejected() {
        let mut tables = CustomClassTables::default();
        tables.format.insert("money".into(), CustomClass::new("com.example.9Money"));
        let err = tables.validate().unwrap_err();
        assert!(matches!(err, CodegenError::InvalidCustomClass { .. }));
    }

    #[test]
    fn test_config_deserializes_from_toml() {
        let config: CodegenConfig = toml::from_str(
            r#"
            [generator]
            target_language = "java"
            strict_additional_properties = true
            nested_class_name = "ref_schema"

            [custom_classes.format.money]
            class_name = "com.example.Money"
            capabilities = ["comparable"]
            "#,
        )
        .unwrap();
        assert_eq!(config.generator.target_language, TargetLanguage::Java);
        assert!(config.generator.strict_additional_properties);
        assert_eq!(config.generator.nested_class_name, NestedClassName::RefSchema);
        assert!(config.custom_classes.format["money"].has(Capability::Comparable));
        assert!(config.naming.acronyms.contains("ID"));
    }
}
