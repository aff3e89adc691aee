//! Type Classification
//!
//! Decides the single generated-type [`Shape`] of a fully merged constraint
//! record. Classification is a pure function of the record: running it twice on
//! the same record gives the same answer, and property order never matters.
//!
//! Decision order (first match wins):
//! 1. custom class mapping (URI, then format, then extension)
//! 2. an already resolved generated type
//! 3. a single explicit type tag (integers split into 32 and 64 bit)
//! 4. inference from properties, items, then string-only keywords
//! 5. untyped

use serde::Serialize;
use serde_json::Value;

use super::constraints::{ConstraintArena, ConstraintId, Constraints};
use super::target::TypeRef;
use crate::codegen::config::{CustomClass, CustomClassTables};
use crate::codegen::names::is_identifier;
use crate::schema::{JsonType, NumberValue, SchemaTree};

// =============================================================================
// Shapes
// =============================================================================

/// Richer types standing in for plain strings, plus support types a class needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemType {
    Decimal,
    List,
    Map,
    Regex,
    DateTime,
    Date,
    Time,
    Duration,
    Uuid,
    Uri,
}

/// The generated-type shape of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
    String,
    Boolean,
    Int32,
    Int64,
    Decimal,
    EnumOfIdentifiers,
    Reference(TypeRef),
    System(SystemType),
    Untyped,
}

// =============================================================================
// Formats
// =============================================================================

/// Formats that narrow the generated type instead of emitting a check
pub fn system_format(format: &str) -> Option<SystemType> {
    match format {
        "date-time" => Some(SystemType::DateTime),
        "date" => Some(SystemType::Date),
        "time" => Some(SystemType::Time),
        "duration" => Some(SystemType::Duration),
        "uuid" => Some(SystemType::Uuid),
        "uri" | "uri-reference" => Some(SystemType::Uri),
        _ => None,
    }
}

/// Formats that always emit a format check
pub fn is_validation_format(format: &str) -> bool {
    matches!(
        format,
        "email"
            | "hostname"
            | "ipv4"
            | "ipv6"
            | "idn-email"
            | "idn-hostname"
            | "iri"
            | "iri-reference"
            | "json-pointer"
            | "relative-json-pointer"
            | "regex"
            | "uri-template"
    )
}

/// Formats understood on numbers
pub fn is_numeric_format(format: &str) -> bool {
    matches!(format, "int32" | "int64" | "float" | "double")
}

// =============================================================================
// Classification
// =============================================================================

/// Custom class mapped to a record, if any. Negated mirrors never map.
pub fn custom_class_for<'c>(
    arena: &ConstraintArena,
    tree: &SchemaTree,
    tables: &'c CustomClassTables,
    id: ConstraintId,
) -> Option<&'c CustomClass> {
    if tables.is_empty() {
        return None;
    }
    let record = arena.get(id);
    if record.is_negated() {
        return None;
    }
    let locations = record
        .node
        .into_iter()
        .chain(record.ref_target)
        .map(|node| tree.get(node).location.as_str());
    tables.lookup(locations, &record.formats, &record.extensions)
}

/// Full classification of a record
pub fn classify(
    arena: &ConstraintArena,
    tree: &SchemaTree,
    tables: &CustomClassTables,
    id: ConstraintId,
    promote_enums: bool,
) -> Shape {
    if let Some(custom) = custom_class_for(arena, tree, tables, id) {
        return Shape::Reference(TypeRef::Custom(custom.clone()));
    }
    if let Some(type_ref) = &arena.get(id).type_ref {
        return Shape::Reference(type_ref.clone());
    }
    infer_shape(arena, id, promote_enums)
}

/// Shape inferred from the record's keywords alone
pub fn infer_shape(arena: &ConstraintArena, id: ConstraintId, promote_enums: bool) -> Shape {
    let record = arena.get(id);
    match arena.effective_types(id) {
        [single] => match single {
            JsonType::Integer => integer_shape(record),
            JsonType::Number => Shape::Decimal,
            JsonType::Boolean => Shape::Boolean,
            JsonType::Object => Shape::Object,
            JsonType::Array => Shape::Array,
            JsonType::String => string_shape(record, promote_enums),
            JsonType::Null => Shape::Untyped,
        },
        [] if !record.properties.is_empty() => Shape::Object,
        [] if record.items.is_some() => Shape::Array,
        [] if record.has_string_constraints() => string_shape(record, promote_enums),
        _ => Shape::Untyped,
    }
}

fn integer_shape(record: &Constraints) -> Shape {
    if is_int32(record) {
        Shape::Int32
    } else {
        Shape::Int64
    }
}

fn string_shape(record: &Constraints, promote_enums: bool) -> Shape {
    if !record.is_negated() {
        if let Some(system) = record.formats.iter().find_map(|f| system_format(f)) {
            return Shape::System(system);
        }
    }
    if promote_enums && is_enum_of_identifiers(record) {
        Shape::EnumOfIdentifiers
    } else {
        Shape::String
    }
}

/// Whether an integer record fits in 32 bits
pub fn is_int32(record: &Constraints) -> bool {
    let fits = |i: i64| i32::try_from(i).is_ok();

    if let (Some(min), Some(max)) = record.integer_range() {
        if fits(min) && fits(max) {
            return true;
        }
    }
    if let Some(value) = record.const_value.as_ref().and_then(NumberValue::from_json) {
        if value.fits_i32() {
            return true;
        }
    }
    if let Some(values) = &record.enum_values {
        if !values.is_empty()
            && values
                .iter()
                .all(|v| NumberValue::from_json(v).map(|n| n.fits_i32()).unwrap_or(false))
        {
            return true;
        }
    }
    record.formats.iter().any(|f| f == "int32")
}

/// A string enum whose values can all be emitted as identifiers
pub fn is_enum_of_identifiers(record: &Constraints) -> bool {
    match &record.enum_values {
        Some(values) if !values.is_empty() => values
            .iter()
            .all(|v| matches!(v, Value::String(s) if is_identifier(s))),
        _ => false,
    }
}
