//! Schema Walker
//!
//! Merges a schema node's keywords into a constraint record, recursing into
//! sub-schemas:
//! - `allOf` branches merge into the same record
//! - `oneOf` branches get records of their own (nullable two-branch form aside)
//! - `not` goes to the record's negated mirror
//! - `$ref` re-walks the referenced schema into the same record
//!
//! A reference back to a node already on the walk stack is recorded but not
//! inlined, so recursive schemas terminate.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use super::constraints::{AdditionalProperties, Bound, ConstraintArena, ConstraintId};
use super::diagnostics::Diagnostics;
use crate::error::Result;
use crate::schema::{BoundKind, CombinationKind, CountKind, Keyword, NodeId, NodeKind, SchemaTree};

/// Walks schema nodes into records of a [`ConstraintArena`]
pub struct SchemaWalker<'a> {
    tree: &'a SchemaTree,
    arena: &'a mut ConstraintArena,
    diagnostics: &'a mut Diagnostics,
    /// Schema objects currently being walked
    active: Vec<NodeId>,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(tree: &'a SchemaTree, arena: &'a mut ConstraintArena, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            tree,
            arena,
            diagnostics,
            active: Vec::new(),
        }
    }

    /// Merge `node` into `record`
    pub fn walk(&mut self, node: NodeId, record: ConstraintId) -> Result<()> {
        let tree = self.tree;
        if self.arena.get(record).node == Some(node) && self.arena.get(record).ref_target.is_none() {
            if let Some((reference, target)) = tree.direct_ref(node) {
                let target_location = tree.get(target).location.clone();
                let r = self.arena.get_mut(record);
                r.ref_target = Some(target);
                r.ref_uris.push(reference.to_string());
                r.ref_uris.push(target_location);
            }
        }

        match &tree.get(node).kind {
            NodeKind::General(children) => {
                if self.active.contains(&node) {
                    trace!(location = %tree.get(node).location, "recursive schema not inlined");
                    return Ok(());
                }
                self.active.push(node);
                {
                    let schema = tree.get(node);
                    let r = self.arena.get_mut(record);
                    if r.title.is_none() {
                        r.title = schema.title.clone();
                    }
                    if r.description.is_none() {
                        r.description = schema.description.clone();
                    }
                }
                for child in children {
                    self.walk_keyword(*child, record)?;
                }
                self.check_examples(node);
                self.active.pop();
                Ok(())
            }
            // permissive fallback for `true`/`false` as a whole schema
            NodeKind::Boolean(_) => {
                self.arena.get_mut(record).nullable = Some(true);
                Ok(())
            }
            _ => self.walk_keyword(node, record),
        }
    }

    fn walk_keyword(&mut self, node: NodeId, record: ConstraintId) -> Result<()> {
        let tree = self.tree;
        let location = tree.get(node).location.as_str();

        match &tree.get(node).kind {
            NodeKind::Ref { reference, target } => {
                if self.active.contains(target) {
                    debug!(reference = %reference, location = %location, "recursive reference kept as link");
                    return Ok(());
                }
                self.walk(*target, record)
            }
            NodeKind::Combination { kind: CombinationKind::AllOf, branches } => {
                for branch in branches {
                    self.walk(*branch, record)?;
                }
                Ok(())
            }
            NodeKind::Combination { kind, branches } => self.walk_alternatives(*kind, branches, node, record),
            NodeKind::Not(inner) => {
                let negated = self.arena.negation(record);
                self.walk(*inner, negated)
            }
            NodeKind::Properties(entries) => {
                for (name, child) in entries {
                    let property = self.arena.property_or_insert(record, name, *child);
                    self.walk(*child, property)?;
                }
                Ok(())
            }
            NodeKind::PatternProperties(entries) => {
                for (pattern, child) in entries {
                    if let Err(e) = Regex::new(pattern) {
                        self.diagnostics.invalid_pattern(location, pattern, &e);
                    }
                    let value = self.arena.pattern_property_or_insert(record, pattern, *child);
                    self.walk(*child, value)?;
                }
                Ok(())
            }
            NodeKind::AdditionalProperties(child) => self.walk_additional(*child, record),
            NodeKind::Items(child) => {
                let items = self.arena.items_or_insert(record, *child);
                self.walk(*child, items)
            }
            NodeKind::Required(names) => {
                let r = self.arena.get_mut(record);
                for name in names {
                    r.add_required(name);
                }
                Ok(())
            }
            NodeKind::Validator(keyword) => self.apply_keyword(keyword, location, record),
            NodeKind::Extension { name, value } => {
                let r = self.arena.get_mut(record);
                if !r.extensions.iter().any(|(n, v)| n == name && v == value) {
                    r.extensions.push((name.clone(), value.clone()));
                }
                Ok(())
            }
            NodeKind::General(_) | NodeKind::Boolean(_) => self.walk(node, record),
        }
    }

    fn walk_alternatives(
        &mut self,
        kind: CombinationKind,
        branches: &[NodeId],
        node: NodeId,
        record: ConstraintId,
    ) -> Result<()> {
        if branches.len() == 2 {
            let null_branch = branches.iter().position(|b| self.tree.is_null_type(*b));
            if let Some(i) = null_branch {
                self.walk(branches[1 - i], record)?;
                self.arena.get_mut(record).nullable = Some(true);
                return Ok(());
            }
        }

        if kind == CombinationKind::AnyOf {
            let location = &self.tree.get(node).location;
            debug!(location = %location, branches = branches.len(), "anyOf ignored");
            self.diagnostics.ignored_any_of(location, branches.len());
            return Ok(());
        }

        for branch in branches {
            let known = self
                .arena
                .get(record)
                .one_of
                .iter()
                .any(|b| self.arena.get(*b).node == Some(*branch));
            if known {
                continue;
            }
            let branch_record = self.arena.create(Some(*branch), None);
            self.walk(*branch, branch_record)?;
            self.arena.get_mut(record).one_of.push(branch_record);
        }
        Ok(())
    }

    fn walk_additional(&mut self, child: NodeId, record: ConstraintId) -> Result<()> {
        let current = self.arena.get(record).additional_properties;
        match (&self.tree.get(child).kind, current) {
            (_, Some(AdditionalProperties::Forbidden)) => Ok(()),
            (NodeKind::Boolean(false), _) => {
                self.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Forbidden);
                Ok(())
            }
            (NodeKind::Boolean(true), Some(_)) => Ok(()),
            (NodeKind::Boolean(true), None) => {
                self.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Allowed);
                Ok(())
            }
            (_, Some(AdditionalProperties::Schema(sub))) => self.walk(child, sub),
            (_, _) => {
                let sub = self.arena.create(Some(child), None);
                self.arena.get_mut(record).additional_properties = Some(AdditionalProperties::Schema(sub));
                self.walk(child, sub)
            }
        }
    }

    fn apply_keyword(&mut self, keyword: &Keyword, location: &str, record: ConstraintId) -> Result<()> {
        let r = self.arena.get_mut(record);
        match keyword {
            Keyword::Type(types) => {
                for t in types {
                    r.add_type(*t);
                }
            }
            Keyword::Const(value) => r.set_const(location, value)?,
            Keyword::Enum(values) => r.set_enum(location, values)?,
            Keyword::Format(format) => r.add_format(format),
            Keyword::Pattern(pattern) => {
                if let Err(e) = Regex::new(pattern) {
                    self.diagnostics.invalid_pattern(location, pattern, &e);
                }
                r.add_pattern(pattern);
            }
            Keyword::Bound { kind: BoundKind::Minimum, value, exclusive } => r.set_minimum(Bound {
                value: *value,
                exclusive: *exclusive,
            }),
            Keyword::Bound { kind: BoundKind::Maximum, value, exclusive } => r.set_maximum(Bound {
                value: *value,
                exclusive: *exclusive,
            }),
            Keyword::MultipleOf(value) => r.add_multiple_of(*value),
            Keyword::MinCount(kind, value) => {
                let slot = match kind {
                    CountKind::Length => &mut r.min_length,
                    CountKind::Items => &mut r.min_items,
                    CountKind::Properties => &mut r.min_properties,
                };
                *slot = Some(slot.map_or(*value, |current| current.max(*value)));
            }
            Keyword::MaxCount(kind, value) => {
                let slot = match kind {
                    CountKind::Length => &mut r.max_length,
                    CountKind::Items => &mut r.max_items,
                    CountKind::Properties => &mut r.max_properties,
                };
                *slot = Some(slot.map_or(*value, |current| current.min(*value)));
            }
            Keyword::UniqueItems(unique) => r.unique_items |= *unique,
            Keyword::Default(value) => r.set_default(location, value)?,
            Keyword::Examples(values) => {
                for value in values {
                    if !r.examples.contains(value) {
                        r.examples.push(value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate `default` and `examples` against their own schema object.
    /// Schemas containing `$ref` are skipped since the validator can't see our
    /// document set.
    fn check_examples(&mut self, node: NodeId) {
        let tree = self.tree;
        let schema = tree.get(node);
        let Some(raw) = &schema.raw else { return };
        let default = raw.get("default");
        let examples: Vec<&Value> = match raw.get("examples") {
            Some(Value::Array(values)) => values.iter().collect(),
            _ => raw.get("example").into_iter().collect(),
        };
        if (default.is_none() && examples.is_empty()) || contains_ref(raw) {
            return;
        }
        let compiled = match jsonschema::JSONSchema::compile(raw) {
            Ok(compiled) => compiled,
            Err(e) => {
                debug!(location = %schema.location, error = %e, "schema not checkable");
                return;
            }
        };
        let failures = |value: &Value| -> Option<Vec<String>> {
            compiled
                .validate(value)
                .err()
                .map(|errors| errors.map(|e| e.to_string()).collect())
        };
        if let Some(value) = default {
            if let Some(errors) = failures(value) {
                self.diagnostics.invalid_default(&schema.location, value, errors);
            }
        }
        for value in examples {
            if let Some(errors) = failures(value) {
                self.diagnostics.invalid_example(&schema.location, value, errors);
            }
        }
    }
}

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_ref),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diagnostics::DiagnosticCode;
    use crate::error::CodegenError;
    use crate::schema::{JsonType, NumberValue, SchemaParser};
    use serde_json::json;

    struct Walked {
        arena: ConstraintArena,
        diagnostics: Diagnostics,
        record: ConstraintId,
    }

    fn walk(schema: Value) -> Result<Walked> {
        let mut parser = SchemaParser::new();
        let uri = parser.add_document("file:///schemas/test.schema.json", schema);
        let root = parser.parse_document(&uri)?;
        let tree = parser.into_tree();
        let mut arena = ConstraintArena::new();
        let mut diagnostics = Diagnostics::new();
        let record = arena.create(Some(root), None);
        SchemaWalker::new(&tree, &mut arena, &mut diagnostics).walk(root, record)?;
        Ok(Walked {
            arena,
            diagnostics,
            record,
        })
    }

    #[test]
    fn test_all_of_intersects_bounds() {
        let w = walk(json!({ "allOf": [ { "minimum": 3 }, { "maximum": 10 } ] })).unwrap();
        let r = w.arena.get(w.record);
        assert_eq!(r.minimum, Some(Bound::inclusive(NumberValue::Int(3))));
        assert_eq!(r.maximum, Some(Bound::inclusive(NumberValue::Int(10))));

        let w = walk(json!({ "allOf": [ { "minimum": 3 }, { "minimum": 7 } ] })).unwrap();
        assert_eq!(w.arena.get(w.record).minimum, Some(Bound::inclusive(NumberValue::Int(7))));
    }

    #[test]
    fn test_all_of_merges_properties_by_name() {
        let w = walk(json!({
            "allOf": [
                { "properties": { "a": { "type": "string" } } },
                { "properties": { "a": { "maxLength": 5 }, "b": { "type": "integer" } } }
            ]
        }))
        .unwrap();
        let r = w.arena.get(w.record);
        assert_eq!(r.properties.len(), 2);
        let a = w.arena.property(w.record, "a").unwrap();
        assert_eq!(w.arena.get(a).types, vec![JsonType::String]);
        assert_eq!(w.arena.get(a).max_length, Some(5));
    }

    #[test]
    fn test_conflicting_const_is_fatal() {
        let err = walk(json!({ "allOf": [ { "const": "A" }, { "const": "B" } ] })).err().unwrap();
        assert!(matches!(err, CodegenError::Contradiction { keyword: "const", .. }));
    }

    #[test]
    fn test_nullable_one_of() {
        let w = walk(json!({ "oneOf": [ { "type": "null" }, { "type": "string", "maxLength": 3 } ] })).unwrap();
        let r = w.arena.get(w.record);
        assert_eq!(r.nullable, Some(true));
        assert_eq!(r.types, vec![JsonType::String]);
        assert!(r.one_of.is_empty());
    }

    #[test]
    fn test_one_of_branches_stay_separate() {
        let w = walk(json!({
            "oneOf": [
                { "properties": { "a": { "type": "string" } } },
                { "properties": { "b": { "type": "string" } } }
            ]
        }))
        .unwrap();
        let r = w.arena.get(w.record);
        assert!(r.properties.is_empty());
        assert_eq!(r.one_of.len(), 2);
        assert!(w.arena.property(r.one_of[1], "b").is_some());
    }

    #[test]
    fn test_any_of_is_ignored_with_advisory() {
        let w = walk(json!({ "anyOf": [ { "type": "string" }, { "type": "integer" } ] })).unwrap();
        let r = w.arena.get(w.record);
        assert!(r.types.is_empty());
        assert!(r.one_of.is_empty());
        assert_eq!(w.diagnostics.all()[0].code, DiagnosticCode::IgnoredAnyOf);
    }

    #[test]
    fn test_not_fills_negated_mirror() {
        let w = walk(json!({ "type": "integer", "not": { "minimum": 5, "maximum": 8 } })).unwrap();
        let r = w.arena.get(w.record);
        let negated = r.negated.unwrap();
        assert_eq!(w.arena.get(negated).minimum, Some(Bound::inclusive(NumberValue::Int(5))));
        assert!(r.minimum.is_none());
        assert_eq!(w.arena.get(negated).validations, r.validations);
    }

    #[test]
    fn test_double_not_merges_into_record() {
        let w = walk(json!({ "type": "string", "not": { "not": { "maxLength": 3 } } })).unwrap();
        let r = w.arena.get(w.record);
        assert_eq!(r.max_length, Some(3));
        let negated = r.negated.unwrap();
        assert!(w.arena.get(negated).max_length.is_none());
        assert!(w.arena.get(negated).negated.is_none());
    }

    #[test]
    fn test_pattern_properties_dedup_by_text() {
        let w = walk(json!({
            "allOf": [
                { "patternProperties": { "^x-": { "type": "string" } } },
                { "patternProperties": { "^x-": { "maxLength": 2 } } }
            ]
        }))
        .unwrap();
        let r = w.arena.get(w.record);
        assert_eq!(r.pattern_properties.len(), 1);
        assert_eq!(w.arena.get(r.pattern_properties[0].constraints).max_length, Some(2));
    }

    #[test]
    fn test_additional_properties_false_overrides() {
        let w = walk(json!({
            "allOf": [ { "additionalProperties": { "type": "string" } }, { "additionalProperties": false } ]
        }))
        .unwrap();
        assert_eq!(
            w.arena.get(w.record).additional_properties,
            Some(AdditionalProperties::Forbidden)
        );
    }

    #[test]
    fn test_ref_inlines_target() {
        let w = walk(json!({
            "properties": { "id": { "$ref": "#/definitions/id" } },
            "definitions": { "id": { "type": "string", "format": "uuid" } }
        }))
        .unwrap();
        let id = w.arena.property(w.record, "id").unwrap();
        let r = w.arena.get(id);
        assert_eq!(r.types, vec![JsonType::String]);
        assert_eq!(r.formats, vec!["uuid".to_string()]);
        assert!(r.ref_target.is_some());
        assert_eq!(r.ref_uris[0], "#/definitions/id");
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let w = walk(json!({
            "type": "object",
            "properties": { "children": { "type": "array", "items": { "$ref": "#" } } }
        }))
        .unwrap();
        let children = w.arena.property(w.record, "children").unwrap();
        let items = w.arena.get(children).items.unwrap();
        assert!(w.arena.get(items).properties.is_empty());
        assert!(w.arena.get(items).ref_target.is_some());
    }

    #[test]
    fn test_boolean_schema_marks_nullable() {
        let w = walk(json!({ "properties": { "anything": true } })).unwrap();
        let p = w.arena.property(w.record, "anything").unwrap();
        assert_eq!(w.arena.get(p).nullable, Some(true));
    }

    #[test]
    fn test_object_default_is_fatal() {
        let err = walk(json!({ "properties": { "a": { "default": { "x": 1 } } } })).err().unwrap();
        assert!(matches!(err, CodegenError::UnrepresentableDefault { .. }));
    }

    #[test]
    fn test_invalid_example_is_advisory() {
        let w = walk(json!({ "type": "string", "maxLength": 2, "examples": ["ok", "too long"] })).unwrap();
        let codes: Vec<_> = w.diagnostics.all().iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::InvalidExample]);
    }
}
