//! Identifier Allocation
//!
//! Maps schema property names and candidate class names to identifiers that are
//! valid in the target language:
//! - Sanitization (safe characters kept, separators to `_`, others hex-encoded)
//! - Reserved-word escaping (per-language table)
//! - Collision resolution with a numeric suffix, up to a fixed ceiling
//!
//! Everything here is deterministic: the same input always yields the same name.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write;

use super::config::{NamingConfig, TargetLanguage};
use crate::error::{CodegenError, Result};

/// Highest numeric suffix tried before giving up on a name
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// Whether a string is already a bare identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

// =============================================================================
// Sanitization
// =============================================================================

/// Rebuild a name from identifier-safe characters.
///
/// `-` and space become `_`; any other unsafe character is hex-encoded as `_XX`
/// (one pair per UTF-8 byte). A leading digit gets a `_` prefix.
pub fn sanitize_identifier(name: &str) -> Cow<'_, str> {
    if is_identifier(name) {
        return Cow::Borrowed(name);
    }
    let mut result = String::with_capacity(name.len() + 4);
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        result.push('_');
    }
    for c in name.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' => result.push(c),
            '-' | ' ' => result.push('_'),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    let _ = write!(result, "_{:02X}", byte);
                }
            }
        }
    }
    Cow::Owned(result)
}

/// Sanitized and reserved-word-escaped field identifier
pub fn field_name(name: &str, language: TargetLanguage) -> String {
    language.escape_reserved(&sanitize_identifier(name))
}

// =============================================================================
// Collision Resolution
// =============================================================================

/// Return `candidate`, or `candidate` with the smallest free numeric suffix.
///
/// Fails once `MAX_NAME_ATTEMPTS` suffixes are taken.
pub fn allocate_name(candidate: &str, is_taken: impl Fn(&str) -> bool) -> Result<String> {
    if !is_taken(candidate) {
        return Ok(candidate.to_string());
    }
    for i in 1..MAX_NAME_ATTEMPTS {
        let name = format!("{}{}", candidate, i);
        if !is_taken(&name) {
            return Ok(name);
        }
    }
    Err(CodegenError::NamesExhausted(candidate.to_string()))
}

// =============================================================================
// Class Names
// =============================================================================

/// Builds class names from URIs, titles and property names
#[derive(Debug, Clone)]
pub struct ClassNamer {
    naming: NamingConfig,
}

impl ClassNamer {
    pub fn new(naming: NamingConfig) -> Self {
        Self { naming }
    }

    /// Class name from the last path segment of a document URI
    pub fn from_uri(&self, uri: &str) -> Option<String> {
        let document = uri.split('#').next().unwrap_or(uri);
        let segment = document
            .trim_end_matches('/')
            .rsplit(|c| c == '/' || c == ':')
            .next()
            .unwrap_or(document);
        let stem = segment
            .trim_end_matches(".schema.json")
            .trim_end_matches(".json")
            .replace('.', "_");
        if stem.is_empty() {
            return None;
        }
        Some(self.class_name(&stem))
    }

    /// Class name for free text such as a title or a property name
    pub fn class_name(&self, text: &str) -> String {
        let pascal = self.to_pascal_case(text);
        sanitize_identifier(&pascal).into_owned()
    }

    /// Class name for the items of an array property (`addresses` -> `Address`)
    pub fn item_class_name(&self, property: &str) -> String {
        self.class_name(&depluralise(property))
    }

    /// Convert string to PascalCase, respecting acronyms
    pub fn to_pascal_case(&self, s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut current_word = String::new();

        for c in s.chars() {
            if c == '_' || c == '-' || c == ' ' {
                if !current_word.is_empty() {
                    result.push_str(&self.case_word(&current_word));
                    current_word.clear();
                }
            } else {
                current_word.push(c);
            }
        }
        if !current_word.is_empty() {
            result.push_str(&self.case_word(&current_word));
        }
        result
    }

    /// Capitalize a word, preserving acronyms and inner camel case
    fn case_word(&self, word: &str) -> String {
        let upper = word.to_uppercase();
        if self.naming.acronyms.contains(&upper) {
            return upper;
        }
        if !self.naming.preserve_screaming_case && word.chars().all(|c| !c.is_ascii_lowercase()) {
            let mut chars = word.chars();
            return match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars.map(|c| c.to_ascii_lowercase())).collect(),
            };
        }
        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => first.to_uppercase().chain(chars).collect(),
        }
    }
}

/// Strip a plural suffix (`es`, else `s`)
pub fn depluralise(name: &str) -> Cow<'_, str> {
    if let Some(stem) = name.strip_suffix("es").filter(|s| !s.is_empty()) {
        Cow::Borrowed(stem)
    } else if let Some(stem) = name.strip_suffix('s').filter(|s| !s.is_empty()) {
        Cow::Borrowed(stem)
    } else {
        Cow::Borrowed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namer() -> ClassNamer {
        ClassNamer::new(NamingConfig::default())
    }

    #[test]
    fn test_sanitize_passes_identifiers_through() {
        assert!(matches!(sanitize_identifier("firstName"), Cow::Borrowed("firstName")));
        assert_eq!(sanitize_identifier("_x9"), "_x9");
    }

    #[test]
    fn test_sanitize_rebuilds_unsafe_names() {
        assert_eq!(sanitize_identifier("hyphenated-name"), "hyphenated_name");
        assert_eq!(sanitize_identifier("name@"), "name_40");
        assert_eq!(sanitize_identifier("name.#"), "name_2E_23");
        assert_eq!(sanitize_identifier("123test123"), "_123test123");
        assert_eq!(sanitize_identifier("1st-name"), "_1st_name");
        assert_eq!(sanitize_identifier("with space"), "with_space");
        assert_eq!(sanitize_identifier("é"), "_C3_A9");
    }

    #[test]
    fn test_field_name_escapes_reserved_words() {
        assert_eq!(field_name("class", TargetLanguage::Kotlin), "`class`");
        assert_eq!(field_name("class", TargetLanguage::Java), "class_");
        assert_eq!(field_name("1st-name", TargetLanguage::Java), "_1st_name");
    }

    #[test]
    fn test_allocate_name_uses_smallest_suffix() {
        let taken = ["Variant".to_string(), "Variant1".to_string()];
        assert_eq!(allocate_name("Other", |n| taken.iter().any(|t| t == n)).unwrap(), "Other");
        assert_eq!(allocate_name("Variant", |n| taken[..1].iter().any(|t| t == n)).unwrap(), "Variant1");
        assert_eq!(allocate_name("Variant", |n| taken.iter().any(|t| t == n)).unwrap(), "Variant2");
    }

    #[test]
    fn test_allocate_name_ceiling() {
        let err = allocate_name("Variant", |_| true).unwrap_err();
        assert!(matches!(err, CodegenError::NamesExhausted(ref n) if n == "Variant"));
    }

    #[test]
    fn test_class_name_from_uri() {
        let namer = namer();
        assert_eq!(namer.from_uri("file:///s/person.schema.json").as_deref(), Some("Person"));
        assert_eq!(namer.from_uri("http://pwall.net/test/schema/person").as_deref(), Some("Person"));
        assert_eq!(namer.from_uri("file:///s/user-id.json#/x").as_deref(), Some("UserID"));
        assert_eq!(namer.from_uri("urn:example:test-class").as_deref(), Some("TestClass"));
    }

    #[test]
    fn test_class_name_keeps_camel_case() {
        let namer = namer();
        assert_eq!(namer.class_name("shippingAddress"), "ShippingAddress");
        assert_eq!(namer.class_name("api_url"), "APIURL");
        assert_eq!(namer.class_name("1st-name"), "_1stName");
    }

    #[test]
    fn test_item_class_name() {
        let namer = namer();
        assert_eq!(namer.item_class_name("addresses"), "Address");
        assert_eq!(namer.item_class_name("items"), "Item");
        assert_eq!(namer.item_class_name("data"), "Data");
    }
}
