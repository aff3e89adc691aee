//! Validation Planner
//!
//! Decides which constraints of a classified record become runtime checks, and
//! which are already captured by the generated type. Planning writes into the
//! record's validation set (shared with its negated mirror) and into the owning
//! target's static-constant pool and system types.
//!
//! Rules that apply to every shape:
//! - equal minimum and maximum collapse into a single const check
//! - checks planned on a negated mirror carry the negated flag
//! - a custom class keeps only the checks its capabilities allow

use serde_json::Value;
use tracing::trace;

use super::classify::{is_numeric_format, is_validation_format, system_format, Shape, SystemType};
use super::constraints::{AdditionalProperties, Bound, Constraints, ConstraintId};
use super::context::GenerationContext;
use super::target::{StaticKind, StaticValue, TargetId, TypeRef};
use super::validation::{Validation, ValidationType, ValidationValue};
use crate::codegen::config::{Capability, CustomClass};
use crate::schema::{JsonType, NumberValue};

/// Plan the checks for `record`, already classified as `shape`, owned by `target`
pub fn plan_validations(ctx: &mut GenerationContext<'_>, target: TargetId, record: ConstraintId, shape: &Shape) {
    let constraints = ctx.arena.get(record).clone();
    let mut planner = Planner {
        ctx,
        target,
        record,
        negated: constraints.is_negated(),
    };
    planner.plan(&constraints, shape);
}

struct Planner<'c, 'a> {
    ctx: &'c mut GenerationContext<'a>,
    target: TargetId,
    record: ConstraintId,
    negated: bool,
}

impl Planner<'_, '_> {
    fn plan(&mut self, r: &Constraints, shape: &Shape) {
        match shape {
            Shape::Int32 => self.plan_integer(r, false),
            Shape::Int64 => self.plan_integer(r, true),
            Shape::Decimal => {
                self.system_type(SystemType::Decimal);
                self.plan_decimal(r);
            }
            Shape::String => self.plan_string(r, None),
            Shape::System(system) => {
                self.system_type(*system);
                self.plan_string(r, Some(*system));
            }
            Shape::Array => {
                self.system_type(SystemType::List);
                self.plan_item_counts(r);
                if r.unique_items {
                    self.add(ValidationType::UniqueItems, None);
                }
                if let Some(items) = r.items {
                    if !self.ctx.arena.validations(items).is_empty() {
                        self.add(ValidationType::ArrayItem, None);
                    }
                }
            }
            Shape::Object => self.plan_object(r),
            Shape::Reference(TypeRef::Custom(custom)) => self.plan_custom(r, custom),
            Shape::Reference(TypeRef::Class(_)) | Shape::EnumOfIdentifiers | Shape::Boolean | Shape::Untyped => {}
        }
    }

    fn add(&mut self, kind: ValidationType, value: Option<ValidationValue>) {
        let validation = Validation::new(kind, value, self.negated);
        if self.ctx.arena.validations_mut(self.record).add(validation) {
            trace!(record = self.record.0, ?kind, negated = self.negated, "validation planned");
        }
    }

    fn add_static(&mut self, kind: StaticKind, value: StaticValue) -> String {
        self.ctx.target_mut(self.target).statics.add(kind, value)
    }

    fn system_type(&mut self, system: SystemType) {
        self.ctx.target_mut(self.target).system_types.insert(system);
    }

    fn location(&self, r: &Constraints) -> String {
        r.node
            .map(|node| self.ctx.tree.get(node).location.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    fn plan_integer(&mut self, r: &Constraints, long: bool) {
        let (range, constant, multiple) = if long {
            (ValidationType::RangeLong, ValidationType::ConstLong, ValidationType::MultipleLong)
        } else {
            (ValidationType::RangeInt, ValidationType::ConstInt, ValidationType::MultipleInt)
        };

        match r.integer_range() {
            (Some(min), Some(max)) if min == max => {
                self.add(constant, Some(ValidationValue::Number(NumberValue::Int(min))));
            }
            (None, None) => {}
            (min, max) => self.add(
                range,
                Some(ValidationValue::Range {
                    min: min.map(|m| Bound::inclusive(NumberValue::Int(m))),
                    max: max.map(|m| Bound::inclusive(NumberValue::Int(m))),
                }),
            ),
        }
        if let Some(value) = r.const_value.as_ref().and_then(NumberValue::from_json) {
            self.add(constant, Some(ValidationValue::Number(value)));
        }
        for value in &r.multiple_of {
            self.add(multiple, Some(ValidationValue::Number(*value)));
        }
        self.plan_number_enum(r);
    }

    fn plan_decimal(&mut self, r: &Constraints) {
        match (r.minimum, r.maximum) {
            (Some(min), Some(max)) if min.value == max.value && !min.exclusive && !max.exclusive => {
                let name = self.add_static(StaticKind::Decimal, StaticValue::Number(min.value));
                self.add(ValidationType::ConstDecimal, Some(ValidationValue::Static(name)));
            }
            (None, None) => {}
            (min, max) => self.add(ValidationType::RangeDecimal, Some(ValidationValue::Range { min, max })),
        }
        if let Some(value) = r.const_value.as_ref().and_then(NumberValue::from_json) {
            let name = self.add_static(StaticKind::Decimal, StaticValue::Number(value));
            self.add(ValidationType::ConstDecimal, Some(ValidationValue::Static(name)));
        }
        for value in &r.multiple_of {
            let name = self.add_static(StaticKind::Decimal, StaticValue::Number(*value));
            self.add(ValidationType::MultipleDecimal, Some(ValidationValue::Static(name)));
        }
        self.plan_number_enum(r);
    }

    fn plan_number_enum(&mut self, r: &Constraints) {
        let Some(values) = &r.enum_values else { return };
        let numbers: Option<Vec<NumberValue>> = values.iter().map(NumberValue::from_json).collect();
        if let Some(numbers) = numbers.filter(|n| !n.is_empty()) {
            let name = self.add_static(StaticKind::NumberArray, StaticValue::Numbers(numbers));
            self.add(ValidationType::EnumNumber, Some(ValidationValue::Static(name)));
        }
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// `consumed` is the system type the generated type already narrowed to
    fn plan_string(&mut self, r: &Constraints, consumed: Option<SystemType>) {
        let mut consumed = consumed;
        for format in &r.formats {
            match system_format(format) {
                Some(system) if !self.negated && consumed == Some(system) => {
                    // narrowed by the type, once
                    consumed = None;
                }
                Some(_) => self.add(ValidationType::Format, Some(ValidationValue::Text(format.clone()))),
                None if is_validation_format(format) => {
                    self.add(ValidationType::Format, Some(ValidationValue::Text(format.clone())))
                }
                None if is_numeric_format(format) => {}
                None => {
                    let location = self.location(r);
                    self.ctx.diagnostics.unknown_format(&location, format);
                }
            }
        }
        self.plan_length(r);
        self.plan_patterns(r);

        if let Some(Value::String(text)) = &r.const_value {
            let name = self.add_static(StaticKind::String, StaticValue::Text(text.clone()));
            self.add(ValidationType::ConstString, Some(ValidationValue::Static(name)));
        }
        if let Some(values) = &r.enum_values {
            let strings: Option<Vec<String>> = values.iter().map(|v| v.as_str().map(str::to_string)).collect();
            if let Some(strings) = strings.filter(|s| !s.is_empty()) {
                let name = self.add_static(StaticKind::StringArray, StaticValue::Strings(strings));
                self.add(ValidationType::EnumString, Some(ValidationValue::Static(name)));
            }
        }
    }

    fn plan_length(&mut self, r: &Constraints) {
        if let Some(value) = count_value(r.min_length, r.max_length) {
            let kind = match value {
                ValidationValue::Count(_) => ValidationType::LengthConst,
                _ => ValidationType::LengthRange,
            };
            self.add(kind, Some(value));
        }
    }

    fn plan_patterns(&mut self, r: &Constraints) {
        for pattern in &r.patterns {
            let name = self.add_static(StaticKind::Regex, StaticValue::Text(pattern.clone()));
            self.system_type(SystemType::Regex);
            self.add(ValidationType::Pattern, Some(ValidationValue::Static(name)));
        }
    }

    // =========================================================================
    // Arrays and Objects
    // =========================================================================

    fn plan_item_counts(&mut self, r: &Constraints) {
        if let Some(value) = count_value(r.min_items, r.max_items) {
            let kind = match value {
                ValidationValue::Count(_) => ValidationType::ItemsConst,
                _ => ValidationType::ItemsRange,
            };
            self.add(kind, Some(value));
        }
    }

    fn plan_object(&mut self, r: &Constraints) {
        if let Some(value) = count_value(r.min_properties, r.max_properties) {
            let kind = match value {
                ValidationValue::Count(_) => ValidationType::PropertiesConst,
                _ => ValidationType::PropertiesRange,
            };
            self.add(kind, Some(value));
        }
        if !self.ctx.strict() {
            return;
        }

        let named = !r.properties.is_empty();
        let patterned = !r.pattern_properties.is_empty();
        let mut map_backed = false;
        match r.additional_properties.unwrap_or(AdditionalProperties::Allowed) {
            AdditionalProperties::Allowed => {}
            AdditionalProperties::Forbidden => {
                if patterned {
                    map_backed = true;
                    self.add(ValidationType::UnexpectedProperties, None);
                }
            }
            AdditionalProperties::Schema(sub) => {
                map_backed = true;
                if (named || patterned) && self.ctx.classify(sub, false) != Shape::Untyped {
                    self.add(ValidationType::AdditionalProperties, None);
                }
            }
        }

        for (i, pattern_property) in r.pattern_properties.iter().enumerate() {
            let name = self.add_static(StaticKind::Regex, StaticValue::Text(pattern_property.pattern.clone()));
            self.system_type(SystemType::Regex);
            self.ctx.arena.get_mut(self.record).pattern_properties[i].static_name = Some(name.clone());
            self.add(ValidationType::PatternProperties, Some(ValidationValue::Static(name)));
        }

        if map_backed {
            self.ctx.arena.get_mut(self.record).map_backed = true;
            self.system_type(SystemType::Map);
        }
    }

    // =========================================================================
    // Custom Classes
    // =========================================================================

    fn plan_custom(&mut self, r: &Constraints, custom: &CustomClass) {
        if custom.has(Capability::CharSequence) {
            self.plan_length(r);
            self.plan_patterns(r);
        }
        if custom.has(Capability::Comparable) {
            if self.ctx.arena.effective_types(self.record) == [JsonType::Integer] {
                self.plan_integer(r, true);
            } else {
                self.plan_decimal(r);
            }
        }
        if custom.has(Capability::Sequence) {
            self.plan_item_counts(r);
        }
    }
}

/// Const when both counts agree, otherwise a range over whichever are set
fn count_value(min: Option<u64>, max: Option<u64>) -> Option<ValidationValue> {
    match (min, max) {
        (None, None) => None,
        (Some(min), Some(max)) if min == max => Some(ValidationValue::Count(min)),
        (min, max) => Some(ValidationValue::CountRange { min, max }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::target::TargetKind;
    use crate::codegen::config::CodegenConfig;
    use crate::schema::{NodeId, SchemaTree};
    use ordered_float::OrderedFloat;
    use serde_json::json;

    fn with_context(strict: bool, test: impl FnOnce(&mut GenerationContext<'_>, TargetId, ConstraintId)) {
        let tree = SchemaTree::new();
        let mut config = CodegenConfig::default();
        config.generator.strict_additional_properties = strict;
        let mut ctx = GenerationContext::new(&tree, &config);
        let record = ctx.arena.create(None, None);
        let target = ctx
            .register_target("Test", None, "file:///test.json", NodeId(0), record, TargetKind::Class)
            .unwrap();
        test(&mut ctx, target, record);
    }

    fn kinds(ctx: &GenerationContext<'_>, record: ConstraintId) -> Vec<ValidationType> {
        ctx.arena.validations(record).iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_equal_integer_bounds_collapse_to_const() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::Integer);
            r.set_minimum(Bound::inclusive(NumberValue::Int(5)));
            r.set_maximum(Bound::inclusive(NumberValue::Int(5)));
            let shape = ctx.classify(record, true);
            plan_validations(ctx, target, record, &shape);

            let planned: Vec<_> = ctx.arena.validations(record).iter().cloned().collect();
            assert_eq!(
                planned,
                vec![Validation::new(
                    ValidationType::ConstInt,
                    Some(ValidationValue::Number(NumberValue::Int(5))),
                    false
                )]
            );
        });
    }

    #[test]
    fn test_exclusive_integer_bounds_reconcile() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::Integer);
            r.set_minimum(Bound::exclusive(NumberValue::Int(0)));
            r.set_maximum(Bound::exclusive(NumberValue::Int(10)));
            plan_validations(ctx, target, record, &Shape::Int32);

            let v = ctx.arena.validations(record).iter().next().cloned().unwrap();
            assert_eq!(v.kind, ValidationType::RangeInt);
            assert_eq!(
                v.value,
                Some(ValidationValue::Range {
                    min: Some(Bound::inclusive(NumberValue::Int(1))),
                    max: Some(Bound::inclusive(NumberValue::Int(9))),
                })
            );
        });
    }

    #[test]
    fn test_decimal_uses_statics_and_system_type() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::Number);
            r.add_multiple_of(NumberValue::Decimal(OrderedFloat(0.5)));
            plan_validations(ctx, target, record, &Shape::Decimal);

            assert_eq!(kinds(ctx, record), vec![ValidationType::MultipleDecimal]);
            let t = ctx.target(target);
            assert!(t.system_types.contains(&SystemType::Decimal));
            assert_eq!(t.statics.iter().next().map(|s| s.name.as_str()), Some("cg_dec0"));
        });
    }

    #[test]
    fn test_string_enum_not_promoted_gets_membership_check() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::String);
            r.enum_values = Some(vec![json!("RED"), json!("not-an-id")]);
            let shape = ctx.classify(record, true);
            assert_eq!(shape, Shape::String);
            plan_validations(ctx, target, record, &shape);

            assert_eq!(kinds(ctx, record), vec![ValidationType::EnumString]);
            assert_eq!(ctx.target(target).statics.len(), 1);
        });
    }

    #[test]
    fn test_system_format_flips_on_negated_record() {
        with_context(false, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::String);
            ctx.arena.get_mut(record).add_format("date");
            let neg = ctx.arena.negation(record);
            ctx.arena.get_mut(neg).add_format("date-time");

            let shape = ctx.classify(record, true);
            plan_validations(ctx, target, record, &shape);
            assert!(ctx.arena.validations(record).is_empty());

            let neg_shape = ctx.classify(neg, false);
            plan_validations(ctx, target, neg, &neg_shape);
            let planned: Vec<_> = ctx.arena.validations(record).iter().cloned().collect();
            assert_eq!(
                planned,
                vec![Validation::new(
                    ValidationType::Format,
                    Some(ValidationValue::Text("date-time".into())),
                    true
                )]
            );
            assert!(ctx.target(target).system_types.contains(&SystemType::Date));
        });
    }

    #[test]
    fn test_unknown_format_is_advisory() {
        with_context(false, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::String);
            ctx.arena.get_mut(record).add_format("shoe-size");
            ctx.arena.get_mut(record).add_format("email");
            plan_validations(ctx, target, record, &Shape::String);
            assert_eq!(kinds(ctx, record), vec![ValidationType::Format]);
            assert_eq!(ctx.diagnostics.len(), 1);
        });
    }

    #[test]
    fn test_length_and_pattern() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::String);
            r.min_length = Some(3);
            r.max_length = Some(3);
            r.add_pattern("^[a-z]+$");
            plan_validations(ctx, target, record, &Shape::String);
            assert_eq!(
                kinds(ctx, record),
                vec![ValidationType::LengthConst, ValidationType::Pattern]
            );
            assert!(ctx.target(target).system_types.contains(&SystemType::Regex));
        });
    }

    #[test]
    fn test_strict_off_never_map_backed() {
        with_context(false, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::Object);
            ctx.arena.property_or_insert(record, "a", NodeId(1));
            ctx.arena.pattern_property_or_insert(record, "^x-", NodeId(2));
            ctx.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Forbidden);
            ctx.arena.get_mut(record).min_properties = Some(1);
            plan_validations(ctx, target, record, &Shape::Object);
            assert_eq!(kinds(ctx, record), vec![ValidationType::PropertiesRange]);
            assert!(!ctx.arena.get(record).map_backed);
        });
    }

    #[test]
    fn test_strict_forbidden_without_patterns_is_plain() {
        with_context(true, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::Object);
            ctx.arena.property_or_insert(record, "a", NodeId(1));
            ctx.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Forbidden);
            plan_validations(ctx, target, record, &Shape::Object);
            assert!(ctx.arena.validations(record).is_empty());
            assert!(!ctx.arena.get(record).map_backed);
        });
    }

    #[test]
    fn test_strict_forbidden_with_patterns_is_map_backed() {
        with_context(true, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::Object);
            ctx.arena.property_or_insert(record, "a", NodeId(1));
            ctx.arena.pattern_property_or_insert(record, "^x-", NodeId(2));
            ctx.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Forbidden);
            plan_validations(ctx, target, record, &Shape::Object);

            let validations = ctx.arena.validations(record);
            assert_eq!(validations.count(ValidationType::UnexpectedProperties), 1);
            assert_eq!(validations.count(ValidationType::PatternProperties), 1);
            assert!(ctx.arena.get(record).map_backed);
            assert_eq!(
                ctx.arena.get(record).pattern_properties[0].static_name.as_deref(),
                Some("cg_regex0")
            );
            assert!(ctx.target(target).system_types.contains(&SystemType::Map));
        });
    }

    #[test]
    fn test_strict_schema_sentinel() {
        with_context(true, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::Object);
            ctx.arena.property_or_insert(record, "a", NodeId(1));
            let sub = ctx.arena.create(None, None);
            ctx.arena.get_mut(sub).add_type(JsonType::String);
            ctx.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Schema(sub));
            plan_validations(ctx, target, record, &Shape::Object);
            assert_eq!(kinds(ctx, record), vec![ValidationType::AdditionalProperties]);
            assert!(ctx.arena.get(record).map_backed);
        });

        // an untyped sentinel needs no check, but still backs the class with a map
        with_context(true, |ctx, target, record| {
            ctx.arena.get_mut(record).add_type(JsonType::Object);
            ctx.arena.property_or_insert(record, "a", NodeId(1));
            let sub = ctx.arena.create(None, None);
            ctx.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Schema(sub));
            plan_validations(ctx, target, record, &Shape::Object);
            assert!(ctx.arena.validations(record).is_empty());
            assert!(ctx.arena.get(record).map_backed);
        });
    }

    #[test]
    fn test_array_rules() {
        with_context(false, |ctx, target, record| {
            let items = ctx.arena.items_or_insert(record, NodeId(1));
            ctx.arena.get_mut(items).add_type(JsonType::String);
            ctx.arena.get_mut(items).max_length = Some(10);
            plan_validations(ctx, target, items, &Shape::String);

            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::Array);
            r.min_items = Some(1);
            r.unique_items = true;
            plan_validations(ctx, target, record, &Shape::Array);
            assert_eq!(
                kinds(ctx, record),
                vec![ValidationType::ItemsRange, ValidationType::UniqueItems, ValidationType::ArrayItem]
            );
            assert!(ctx.target(target).system_types.contains(&SystemType::List));
        });
    }

    #[test]
    fn test_custom_class_capabilities_filter_checks() {
        with_context(false, |ctx, target, record| {
            let r = ctx.arena.get_mut(record);
            r.add_type(JsonType::String);
            r.max_length = Some(8);
            r.add_pattern("^[A-Z]+$");
            r.set_maximum(Bound::inclusive(NumberValue::Int(3)));

            let plain = CustomClass::new("com.example.Code");
            plan_validations(ctx, target, record, &Shape::Reference(TypeRef::Custom(plain)));
            assert!(ctx.arena.validations(record).is_empty());

            let chars = CustomClass {
                class_name: "com.example.Code".into(),
                capabilities: vec![Capability::CharSequence],
            };
            plan_validations(ctx, target, record, &Shape::Reference(TypeRef::Custom(chars)));
            assert_eq!(
                kinds(ctx, record),
                vec![ValidationType::LengthRange, ValidationType::Pattern]
            );
        });
    }
}
