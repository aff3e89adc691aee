//! Constraint Records
//!
//! One [`Constraints`] record accumulates every fact gathered for a schema node.
//! Records live in a [`ConstraintArena`] and refer to each other by
//! [`ConstraintId`]: properties, array items, pattern-property values,
//! additional properties, one-of branches and the negated mirror.
//!
//! Merging is monotonic within a node: type tags and pattern lists only grow,
//! lower bounds only rise, upper bounds only fall. Conflicting const, enum or
//! default declarations are contradictions.

use serde::Serialize;
use serde_json::Value;

use super::classify::Shape;
use super::target::TypeRef;
use super::validation::ValidationSet;
use crate::error::{CodegenError, Result};
use crate::schema::{JsonType, NodeId, NumberValue};

/// Index of a record in the [`ConstraintArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConstraintId(pub usize);

/// Index of a validation set; a record and its negated mirror share one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ValidationSetId(pub usize);

/// A numeric bound, inclusive or exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bound {
    pub value: NumberValue,
    pub exclusive: bool,
}

impl Bound {
    pub fn inclusive(value: NumberValue) -> Self {
        Self { value, exclusive: false }
    }

    pub fn exclusive(value: NumberValue) -> Self {
        Self { value, exclusive: true }
    }

    /// The tighter of two lower bounds
    pub fn tighter_minimum(current: Option<Bound>, incoming: Bound) -> Bound {
        match current {
            None => incoming,
            Some(c) if incoming.value > c.value => incoming,
            Some(c) if incoming.value == c.value && incoming.exclusive => incoming,
            Some(c) => c,
        }
    }

    /// The tighter of two upper bounds
    pub fn tighter_maximum(current: Option<Bound>, incoming: Bound) -> Bound {
        match current {
            None => incoming,
            Some(c) if incoming.value < c.value => incoming,
            Some(c) if incoming.value == c.value && incoming.exclusive => incoming,
            Some(c) => c,
        }
    }

    /// Smallest integer satisfying this bound as a minimum
    pub fn integer_minimum(&self) -> i64 {
        if self.exclusive {
            self.value.floor().saturating_add(1)
        } else {
            self.value.ceil()
        }
    }

    /// Largest integer satisfying this bound as a maximum
    pub fn integer_maximum(&self) -> i64 {
        if self.exclusive {
            self.value.ceil().saturating_sub(1)
        } else {
            self.value.floor()
        }
    }
}

/// A typed default value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum DefaultValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<DefaultValue>),
}

impl DefaultValue {
    pub fn from_json(location: &str, value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Decimal(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(
                items
                    .iter()
                    .map(|item| Self::from_json(location, item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(_) => {
                return Err(CodegenError::UnrepresentableDefault {
                    location: location.to_string(),
                    message: "object default values are not supported".to_string(),
                })
            }
        })
    }
}

/// The additional-properties sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdditionalProperties {
    /// `true`, or a schema that accepts anything
    Allowed,
    /// `false`
    Forbidden,
    Schema(ConstraintId),
}

/// A `patternProperties` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternProperty {
    pub pattern: String,
    pub constraints: ConstraintId,
    /// Static-constant holding the compiled pattern, once planned
    pub static_name: Option<String>,
}

/// Everything known about one schema node
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    /// Originating schema node
    pub node: Option<NodeId>,
    /// Property name, for named properties
    pub name: Option<String>,
    pub validations: ValidationSetId,
    pub negated: Option<ConstraintId>,
    pub negation_of: Option<ConstraintId>,

    pub types: Vec<JsonType>,
    pub nullable: Option<bool>,

    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub multiple_of: Vec<NumberValue>,

    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub patterns: Vec<String>,
    pub formats: Vec<String>,

    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,

    pub required: Vec<String>,
    pub properties: Vec<ConstraintId>,
    pub pattern_properties: Vec<PatternProperty>,
    pub additional_properties: Option<AdditionalProperties>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,

    pub items: Option<ConstraintId>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,

    pub one_of: Vec<ConstraintId>,

    pub default_value: Option<DefaultValue>,
    pub examples: Vec<Value>,
    pub extensions: Vec<(String, Value)>,
    pub title: Option<String>,
    pub description: Option<String>,

    /// Node targeted by the `$ref` written directly on this record's schema
    pub ref_target: Option<NodeId>,
    /// Reference text and target location of that `$ref`
    pub ref_uris: Vec<String>,

    /// Generated type assigned during resolution
    pub type_ref: Option<TypeRef>,
    /// Shape decided when the record was analysed
    pub shape: Option<Shape>,
    /// Set by required-set reconciliation on named properties
    pub is_required: bool,
    /// Same-shaped property inherited from a base class
    pub base_property: Option<ConstraintId>,
    /// A derived class re-declares this property with a different shape
    pub extended: bool,
    /// This property re-declares a base property with a different shape
    pub extends: bool,
    /// Object shape backed by a map because of the additional-properties policy
    pub map_backed: bool,
}

impl Constraints {
    pub fn is_negated(&self) -> bool {
        self.negation_of.is_some()
    }

    pub fn add_type(&mut self, json_type: JsonType) {
        if json_type == JsonType::Null {
            self.nullable = Some(true);
        } else if !self.types.contains(&json_type) {
            self.types.push(json_type);
        }
    }

    pub fn set_minimum(&mut self, bound: Bound) {
        self.minimum = Some(Bound::tighter_minimum(self.minimum, bound));
    }

    pub fn set_maximum(&mut self, bound: Bound) {
        self.maximum = Some(Bound::tighter_maximum(self.maximum, bound));
    }

    pub fn add_multiple_of(&mut self, value: NumberValue) {
        if !self.multiple_of.contains(&value) {
            self.multiple_of.push(value);
        }
    }

    pub fn add_pattern(&mut self, pattern: &str) {
        if !self.patterns.iter().any(|p| p == pattern) {
            self.patterns.push(pattern.to_string());
        }
    }

    pub fn add_format(&mut self, format: &str) {
        if !self.formats.iter().any(|f| f == format) {
            self.formats.push(format.to_string());
        }
    }

    pub fn add_required(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    pub fn set_const(&mut self, location: &str, value: &Value) -> Result<()> {
        match &self.const_value {
            Some(existing) if existing != value => {
                Err(CodegenError::contradiction(location, "const", existing, value))
            }
            _ => {
                self.const_value = Some(value.clone());
                Ok(())
            }
        }
    }

    pub fn set_enum(&mut self, location: &str, values: &[Value]) -> Result<()> {
        match &self.enum_values {
            Some(existing) if existing.as_slice() != values => Err(CodegenError::contradiction(
                location,
                "enum",
                Value::Array(existing.clone()),
                Value::Array(values.to_vec()),
            )),
            _ => {
                self.enum_values = Some(values.to_vec());
                Ok(())
            }
        }
    }

    pub fn set_default(&mut self, location: &str, value: &Value) -> Result<()> {
        let incoming = DefaultValue::from_json(location, value)?;
        match &self.default_value {
            Some(existing) if *existing != incoming => Err(CodegenError::contradiction(
                location,
                "default",
                format!("{:?}", existing),
                value,
            )),
            _ => {
                self.default_value = Some(incoming);
                Ok(())
            }
        }
    }

    /// Closed integer range after reconciling inclusive and exclusive bounds
    pub fn integer_range(&self) -> (Option<i64>, Option<i64>) {
        (
            self.minimum.map(|b| b.integer_minimum()),
            self.maximum.map(|b| b.integer_maximum()),
        )
    }

    pub fn has_string_constraints(&self) -> bool {
        !self.formats.is_empty()
            || !self.patterns.is_empty()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || matches!(self.const_value, Some(Value::String(_)))
            || self
                .enum_values
                .as_ref()
                .map(|values| !values.is_empty() && values.iter().all(Value::is_string))
                .unwrap_or(false)
    }
}

/// Owns every record and validation set of a generation run
#[derive(Debug, Default)]
pub struct ConstraintArena {
    records: Vec<Constraints>,
    validation_sets: Vec<ValidationSet>,
}

impl ConstraintArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, node: Option<NodeId>, name: Option<&str>) -> ConstraintId {
        let validations = self.new_validation_set();
        let id = ConstraintId(self.records.len());
        self.records.push(Constraints {
            node,
            name: name.map(str::to_string),
            validations,
            ..Constraints::default()
        });
        id
    }

    fn new_validation_set(&mut self) -> ValidationSetId {
        self.validation_sets.push(ValidationSet::new());
        ValidationSetId(self.validation_sets.len() - 1)
    }

    pub fn get(&self, id: ConstraintId) -> &Constraints {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: ConstraintId) -> &mut Constraints {
        &mut self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn validations(&self, id: ConstraintId) -> &ValidationSet {
        &self.validation_sets[self.get(id).validations.0]
    }

    pub fn validations_mut(&mut self, id: ConstraintId) -> &mut ValidationSet {
        let set = self.get(id).validations;
        &mut self.validation_sets[set.0]
    }

    /// The negated mirror of a record, created on first use. Both share one
    /// validation set. The mirror of a mirror is the positive record.
    pub fn negation(&mut self, id: ConstraintId) -> ConstraintId {
        let record = self.get(id);
        if let Some(positive) = record.negation_of {
            return positive;
        }
        if let Some(negated) = record.negated {
            return negated;
        }
        let (node, name, validations) = {
            let record = self.get(id);
            (record.node, record.name.clone(), record.validations)
        };
        let negated = ConstraintId(self.records.len());
        self.records.push(Constraints {
            node,
            name,
            validations,
            negation_of: Some(id),
            ..Constraints::default()
        });
        self.get_mut(id).negated = Some(negated);
        negated
    }

    /// Copy a record with its own copy of the validation set
    pub fn duplicate(&mut self, id: ConstraintId) -> ConstraintId {
        let copy_set = self.validations(id).clone();
        self.validation_sets.push(copy_set);
        let validations = ValidationSetId(self.validation_sets.len() - 1);
        let mut record = self.get(id).clone();
        record.validations = validations;
        record.negated = None;
        self.records.push(record);
        ConstraintId(self.records.len() - 1)
    }

    /// Type tags used for classification; a negated mirror without its own
    /// type keyword takes the positive record's tags
    pub fn effective_types(&self, id: ConstraintId) -> &[JsonType] {
        let record = self.get(id);
        match record.negation_of {
            Some(positive) if record.types.is_empty() => &self.get(positive).types,
            _ => &record.types,
        }
    }

    pub fn property(&self, id: ConstraintId, name: &str) -> Option<ConstraintId> {
        self.get(id)
            .properties
            .iter()
            .copied()
            .find(|p| self.get(*p).name.as_deref() == Some(name))
    }

    /// Look a named property up, creating it on first sight
    pub fn property_or_insert(&mut self, id: ConstraintId, name: &str, node: NodeId) -> ConstraintId {
        if let Some(existing) = self.property(id, name) {
            return existing;
        }
        let property = self.create(Some(node), Some(name));
        self.get_mut(id).properties.push(property);
        property
    }

    /// Look a pattern property up by regex text, creating it on first sight
    pub fn pattern_property_or_insert(&mut self, id: ConstraintId, pattern: &str, node: NodeId) -> ConstraintId {
        if let Some(existing) = self
            .get(id)
            .pattern_properties
            .iter()
            .find(|pp| pp.pattern == pattern)
        {
            return existing.constraints;
        }
        let value = self.create(Some(node), None);
        self.get_mut(id).pattern_properties.push(PatternProperty {
            pattern: pattern.to_string(),
            constraints: value,
            static_name: None,
        });
        value
    }

    pub fn items_or_insert(&mut self, id: ConstraintId, node: NodeId) -> ConstraintId {
        if let Some(items) = self.get(id).items {
            return items;
        }
        let items = self.create(Some(node), None);
        self.get_mut(id).items = Some(items);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tightest_bound_wins() {
        let mut c = Constraints::default();
        c.set_minimum(Bound::inclusive(NumberValue::Int(3)));
        c.set_minimum(Bound::inclusive(NumberValue::Int(7)));
        c.set_minimum(Bound::inclusive(NumberValue::Int(5)));
        assert_eq!(c.minimum, Some(Bound::inclusive(NumberValue::Int(7))));

        c.set_maximum(Bound::inclusive(NumberValue::Int(10)));
        c.set_maximum(Bound::exclusive(NumberValue::Int(10)));
        assert_eq!(c.maximum, Some(Bound::exclusive(NumberValue::Int(10))));
        assert_eq!(c.integer_range(), (Some(7), Some(9)));
    }

    #[test]
    fn test_const_conflict_is_contradiction() {
        let mut c = Constraints::default();
        c.set_const("x", &json!("A")).unwrap();
        c.set_const("x", &json!("A")).unwrap();
        let err = c.set_const("x", &json!("B")).unwrap_err();
        assert!(matches!(err, CodegenError::Contradiction { keyword: "const", .. }));
        assert_eq!(c.const_value, Some(json!("A")));
    }

    #[test]
    fn test_object_default_is_unrepresentable() {
        let mut c = Constraints::default();
        let err = c.set_default("x", &json!({ "a": 1 })).unwrap_err();
        assert!(matches!(err, CodegenError::UnrepresentableDefault { .. }));
        c.set_default("x", &json!([1, "two"])).unwrap();
        assert_eq!(
            c.default_value,
            Some(DefaultValue::Array(vec![DefaultValue::Integer(1), DefaultValue::String("two".into())]))
        );
    }

    #[test]
    fn test_negation_shares_validation_set() {
        let mut arena = ConstraintArena::new();
        let id = arena.create(None, Some("aaa"));
        let neg = arena.negation(id);
        assert_eq!(arena.negation(id), neg);
        assert_eq!(arena.get(id).validations, arena.get(neg).validations);
        assert_eq!(arena.get(neg).negation_of, Some(id));

        arena.get_mut(id).add_type(JsonType::Integer);
        assert_eq!(arena.effective_types(neg), &[JsonType::Integer]);
    }

    #[test]
    fn test_negation_of_mirror_is_positive_record() {
        let mut arena = ConstraintArena::new();
        let id = arena.create(None, Some("code"));
        let neg = arena.negation(id);
        assert_eq!(arena.negation(neg), id);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_property_lookup_is_idempotent() {
        let mut arena = ConstraintArena::new();
        let id = arena.create(None, None);
        let a = arena.property_or_insert(id, "a", NodeId(1));
        let b = arena.property_or_insert(id, "b", NodeId(2));
        assert_eq!(arena.property_or_insert(id, "a", NodeId(3)), a);
        assert_eq!(arena.get(id).properties, vec![a, b]);
    }

    #[test]
    fn test_null_type_sets_nullable() {
        let mut c = Constraints::default();
        c.add_type(JsonType::String);
        c.add_type(JsonType::Null);
        c.add_type(JsonType::String);
        assert_eq!(c.types, vec![JsonType::String]);
        assert_eq!(c.nullable, Some(true));
    }
}
