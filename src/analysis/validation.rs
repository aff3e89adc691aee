//! Planned Validations
//!
//! A validation is a runtime check the generated code must perform, beyond what
//! the chosen type already guarantees. Sets are ordered by first insertion and
//! never hold two equal entries.

use serde::Serialize;

use super::constraints::Bound;
use crate::schema::NumberValue;

/// Validation taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
    Pattern,
    MultipleInt,
    MultipleLong,
    MultipleDecimal,
    RangeInt,
    RangeLong,
    RangeDecimal,
    ConstInt,
    ConstLong,
    ConstDecimal,
    ConstString,
    LengthRange,
    LengthConst,
    ItemsRange,
    ItemsConst,
    PropertiesRange,
    PropertiesConst,
    UniqueItems,
    EnumString,
    EnumNumber,
    Format,
    AdditionalProperties,
    PatternProperties,
    UnexpectedProperties,
    ArrayItem,
}

/// Value carried by a validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationValue {
    Number(NumberValue),
    Count(u64),
    Range { min: Option<Bound>, max: Option<Bound> },
    CountRange { min: Option<u64>, max: Option<u64> },
    /// Name of an entry in the target's static-constant pool
    Static(String),
    /// Format tag or string literal
    Text(String),
}

/// A single planned check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Validation {
    #[serde(rename = "type")]
    pub kind: ValidationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ValidationValue>,
    pub negated: bool,
}

impl Validation {
    pub fn new(kind: ValidationType, value: Option<ValidationValue>, negated: bool) -> Self {
        Self { kind, value, negated }
    }
}

/// Insertion-ordered set of validations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationSet {
    items: Vec<Validation>,
}

impl ValidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation unless an equal one is present. Returns whether it was added.
    pub fn add(&mut self, validation: Validation) -> bool {
        if self.items.contains(&validation) {
            return false;
        }
        self.items.push(validation);
        true
    }

    pub fn extend(&mut self, other: &ValidationSet) {
        for v in &other.items {
            self.add(v.clone());
        }
    }

    pub fn remove_all_in(&mut self, other: &ValidationSet) {
        self.items.retain(|v| !other.contains(v));
    }

    pub fn contains(&self, validation: &Validation) -> bool {
        self.items.contains(validation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, kind: ValidationType) -> usize {
        self.items.iter().filter(|v| v.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_dedups_on_all_three_fields() {
        let mut set = ValidationSet::new();
        let v = Validation::new(ValidationType::ConstInt, Some(ValidationValue::Number(NumberValue::Int(5))), false);
        assert!(set.add(v.clone()));
        assert!(!set.add(v.clone()));
        assert!(set.add(Validation { negated: true, ..v.clone() }));
        assert!(set.add(Validation::new(
            ValidationType::ConstInt,
            Some(ValidationValue::Number(NumberValue::Int(6))),
            false
        )));
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().next(), Some(&v));
    }

    #[test]
    fn test_remove_all_in() {
        let mut a = ValidationSet::new();
        let mut b = ValidationSet::new();
        let pattern = Validation::new(ValidationType::Pattern, Some(ValidationValue::Static("cg_regex0".into())), false);
        let length = Validation::new(ValidationType::LengthRange, None, false);
        a.add(pattern.clone());
        a.add(length.clone());
        b.add(pattern);
        a.remove_all_in(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![&length]);
    }
}
