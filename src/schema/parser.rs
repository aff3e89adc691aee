//! Schema Parsing
//!
//! Turns JSON documents into a [`SchemaTree`]. Sub-schemas are memoized by
//! location, and `$ref` keywords are linked to the node at the referenced
//! location, parsing it on demand. Documents must all be registered before
//! parsing starts so forward and cross-document references resolve.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use super::{
    BoundKind, CombinationKind, CountKind, JsonType, Keyword, NodeId, NodeKind, NumberValue,
    SchemaNode, SchemaTree,
};
use crate::error::{CodegenError, Result};

/// Builds a [`SchemaTree`] from a set of JSON documents
#[derive(Debug, Default)]
pub struct SchemaParser {
    tree: SchemaTree,
    /// canonical document URI -> document
    documents: IndexMap<String, Value>,
    /// file-derived URI -> canonical (`$id`) URI
    aliases: HashMap<String, String>,
}

impl SchemaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. Returns its canonical URI (the root `$id` if present).
    pub fn add_document(&mut self, uri: &str, document: Value) -> String {
        let canonical = document
            .get("$id")
            .and_then(Value::as_str)
            .map(|id| id.trim_end_matches('#').to_string())
            .unwrap_or_else(|| uri.to_string());
        if canonical != uri {
            self.aliases.insert(uri.to_string(), canonical.clone());
        }
        self.documents.insert(canonical.clone(), document);
        canonical
    }

    /// Parse the root of a registered document
    pub fn parse_document(&mut self, uri: &str) -> Result<NodeId> {
        let canonical = self.canonical_uri(uri).ok_or_else(|| CodegenError::UnresolvedRef {
            location: uri.to_string(),
            reference: uri.to_string(),
        })?;
        self.parse_at(&canonical, "")
    }

    pub fn into_tree(self) -> SchemaTree {
        self.tree
    }

    fn canonical_uri(&self, uri: &str) -> Option<String> {
        if self.documents.contains_key(uri) {
            return Some(uri.to_string());
        }
        self.aliases.get(uri).cloned()
    }

    fn parse_at(&mut self, document: &str, pointer: &str) -> Result<NodeId> {
        let location = format!("{}#{}", document, pointer);
        if let Some(id) = self.tree.find(&location) {
            return Ok(id);
        }
        let value = self
            .documents
            .get(document)
            .and_then(|doc| doc.pointer(pointer))
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedRef {
                location: location.clone(),
                reference: location.clone(),
            })?;
        self.parse_schema(document, pointer, &value)
    }

    fn parse_schema(&mut self, document: &str, pointer: &str, value: &Value) -> Result<NodeId> {
        let location = format!("{}#{}", document, pointer);
        if let Some(id) = self.tree.find(&location) {
            return Ok(id);
        }
        match value {
            Value::Bool(b) => {
                let id = self.tree.reserve(&location, document);
                self.tree.node_mut(id).kind = NodeKind::Boolean(*b);
                Ok(id)
            }
            Value::Object(map) => {
                let id = self.tree.reserve(&location, document);
                let mut children = Vec::with_capacity(map.len());
                for (key, keyword_value) in map {
                    if let Some(child) = self.parse_keyword(document, pointer, map, key, keyword_value)? {
                        children.push(child);
                    }
                }
                let node = self.tree.node_mut(id);
                node.kind = NodeKind::General(children);
                node.title = map.get("title").and_then(Value::as_str).map(str::to_string);
                node.description = map.get("description").and_then(Value::as_str).map(str::to_string);
                node.raw = Some(value.clone());
                Ok(id)
            }
            other => Err(CodegenError::invalid(
                &location,
                format!("schema must be an object or boolean, found {}", other),
            )),
        }
    }

    fn parse_keyword(
        &mut self,
        document: &str,
        pointer: &str,
        siblings: &Map<String, Value>,
        key: &str,
        value: &Value,
    ) -> Result<Option<NodeId>> {
        let keyword_pointer = format!("{}/{}", pointer, escape_pointer(key));
        let location = format!("{}#{}", document, keyword_pointer);

        let kind = match key {
            "$ref" => {
                let reference = value
                    .as_str()
                    .ok_or_else(|| CodegenError::invalid(&location, "$ref must be a string"))?;
                let (target_document, target_pointer) = self
                    .resolve_reference(document, reference)
                    .ok_or_else(|| CodegenError::UnresolvedRef {
                        location: location.clone(),
                        reference: reference.to_string(),
                    })?;
                let target = self.parse_at(&target_document, &target_pointer)?;
                NodeKind::Ref {
                    reference: reference.to_string(),
                    target,
                }
            }
            "type" => NodeKind::Validator(Keyword::Type(parse_types(&location, value)?)),
            "const" => NodeKind::Validator(Keyword::Const(value.clone())),
            "enum" => match value {
                Value::Array(values) => NodeKind::Validator(Keyword::Enum(values.clone())),
                _ => return Err(CodegenError::invalid(&location, "enum must be an array")),
            },
            "format" => NodeKind::Validator(Keyword::Format(expect_str(&location, value)?.to_string())),
            "pattern" => NodeKind::Validator(Keyword::Pattern(expect_str(&location, value)?.to_string())),
            "minimum" | "maximum" => {
                let kind = if key == "minimum" { BoundKind::Minimum } else { BoundKind::Maximum };
                // draft-04 boolean form modifies the sibling bound
                let exclusive_key = if key == "minimum" { "exclusiveMinimum" } else { "exclusiveMaximum" };
                let exclusive = matches!(siblings.get(exclusive_key), Some(Value::Bool(true)));
                NodeKind::Validator(Keyword::Bound {
                    kind,
                    value: expect_number(&location, value)?,
                    exclusive,
                })
            }
            "exclusiveMinimum" | "exclusiveMaximum" => {
                if value.is_boolean() {
                    return Ok(None);
                }
                let kind = if key == "exclusiveMinimum" { BoundKind::Minimum } else { BoundKind::Maximum };
                NodeKind::Validator(Keyword::Bound {
                    kind,
                    value: expect_number(&location, value)?,
                    exclusive: true,
                })
            }
            "multipleOf" => NodeKind::Validator(Keyword::MultipleOf(expect_number(&location, value)?)),
            "minLength" => NodeKind::Validator(Keyword::MinCount(CountKind::Length, expect_count(&location, value)?)),
            "maxLength" => NodeKind::Validator(Keyword::MaxCount(CountKind::Length, expect_count(&location, value)?)),
            "minItems" => NodeKind::Validator(Keyword::MinCount(CountKind::Items, expect_count(&location, value)?)),
            "maxItems" => NodeKind::Validator(Keyword::MaxCount(CountKind::Items, expect_count(&location, value)?)),
            "minProperties" => {
                NodeKind::Validator(Keyword::MinCount(CountKind::Properties, expect_count(&location, value)?))
            }
            "maxProperties" => {
                NodeKind::Validator(Keyword::MaxCount(CountKind::Properties, expect_count(&location, value)?))
            }
            "uniqueItems" => match value {
                Value::Bool(b) => NodeKind::Validator(Keyword::UniqueItems(*b)),
                _ => return Err(CodegenError::invalid(&location, "uniqueItems must be a boolean")),
            },
            "default" => NodeKind::Validator(Keyword::Default(value.clone())),
            "examples" => match value {
                Value::Array(values) => NodeKind::Validator(Keyword::Examples(values.clone())),
                _ => return Err(CodegenError::invalid(&location, "examples must be an array")),
            },
            "example" => NodeKind::Validator(Keyword::Examples(vec![value.clone()])),
            "required" => match value {
                Value::Array(names) => NodeKind::Required(
                    names
                        .iter()
                        .map(|n| expect_str(&location, n).map(str::to_string))
                        .collect::<Result<Vec<_>>>()?,
                ),
                // draft-03 per-property flag
                Value::Bool(_) => return Ok(None),
                _ => return Err(CodegenError::invalid(&location, "required must be an array")),
            },
            "properties" | "patternProperties" => {
                let map = value
                    .as_object()
                    .ok_or_else(|| CodegenError::invalid(&location, format!("{} must be an object", key)))?;
                let mut entries = Vec::with_capacity(map.len());
                for (name, schema) in map {
                    let child_pointer = format!("{}/{}", keyword_pointer, escape_pointer(name));
                    entries.push((name.clone(), self.parse_schema(document, &child_pointer, schema)?));
                }
                if key == "properties" {
                    NodeKind::Properties(entries)
                } else {
                    NodeKind::PatternProperties(entries)
                }
            }
            "additionalProperties" => {
                NodeKind::AdditionalProperties(self.parse_schema(document, &keyword_pointer, value)?)
            }
            "items" => match value {
                Value::Array(_) => {
                    return Err(CodegenError::invalid(&location, "tuple-form items is not supported"))
                }
                _ => NodeKind::Items(self.parse_schema(document, &keyword_pointer, value)?),
            },
            "allOf" | "anyOf" | "oneOf" => {
                let kind = match key {
                    "allOf" => CombinationKind::AllOf,
                    "anyOf" => CombinationKind::AnyOf,
                    _ => CombinationKind::OneOf,
                };
                let array = value
                    .as_array()
                    .ok_or_else(|| CodegenError::invalid(&location, format!("{} must be an array", key)))?;
                let mut branches = Vec::with_capacity(array.len());
                for (i, branch) in array.iter().enumerate() {
                    let child_pointer = format!("{}/{}", keyword_pointer, i);
                    branches.push(self.parse_schema(document, &child_pointer, branch)?);
                }
                NodeKind::Combination { kind, branches }
            }
            "not" => NodeKind::Not(self.parse_schema(document, &keyword_pointer, value)?),
            name if name.starts_with("x-") => NodeKind::Extension {
                name: name.to_string(),
                value: value.clone(),
            },
            "$id" | "$schema" | "$comment" | "title" | "description" | "definitions" | "$defs" => {
                return Ok(None)
            }
            other => {
                debug!(keyword = other, location = %location, "ignoring keyword");
                return Ok(None);
            }
        };

        Ok(Some(self.tree.push(SchemaNode {
            location,
            document: document.to_string(),
            kind,
            title: None,
            description: None,
            raw: None,
        })))
    }

    /// Split a reference into (document URI, JSON pointer)
    fn resolve_reference(&self, base_document: &str, reference: &str) -> Option<(String, String)> {
        let (uri_part, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let document = if uri_part.is_empty() {
            base_document.to_string()
        } else {
            let resolved = resolve_uri(base_document, uri_part);
            self.canonical_uri(&resolved)
                .or_else(|| self.canonical_uri(uri_part))?
        };
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return None;
        }
        Some((document, fragment.to_string()))
    }
}

/// Resolve a possibly relative URI against a base document URI
pub fn resolve_uri(base: &str, relative: &str) -> String {
    if relative.contains(':') {
        return relative.to_string();
    }
    let (prefix, base_path) = match base.find("://") {
        Some(i) => {
            let after = &base[i + 3..];
            let path_start = after.find('/').map(|p| i + 3 + p).unwrap_or(base.len());
            (&base[..path_start], &base[path_start..])
        }
        None => ("", base),
    };
    let mut segments: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        let dir = base_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        dir.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let absolute = base_path.starts_with('/') || !prefix.is_empty() || relative.starts_with('/');
    format!("{}{}{}", prefix, if absolute { "/" } else { "" }, segments.join("/"))
}

fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn expect_str<'v>(location: &str, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| CodegenError::invalid(location, format!("expected string, found {}", value)))
}

fn expect_number(location: &str, value: &Value) -> Result<NumberValue> {
    NumberValue::from_json(value)
        .ok_or_else(|| CodegenError::invalid(location, format!("expected number, found {}", value)))
}

fn expect_count(location: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
        .ok_or_else(|| CodegenError::invalid(location, format!("expected non-negative integer, found {}", value)))
}

fn parse_types(location: &str, value: &Value) -> Result<Vec<JsonType>> {
    let parse_one = |v: &Value| -> Result<JsonType> {
        let name = expect_str(location, v)?;
        JsonType::from_json_type(name)
            .ok_or_else(|| CodegenError::invalid(location, format!("unknown type {}", name)))
    };
    match value {
        Value::Array(values) => values.iter().map(parse_one).collect(),
        other => Ok(vec![parse_one(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> (SchemaTree, NodeId) {
        let mut parser = SchemaParser::new();
        let uri = parser.add_document("file:///schemas/test.schema.json", value);
        let root = parser.parse_document(&uri).unwrap();
        (parser.into_tree(), root)
    }

    #[test]
    fn test_keywords_become_children_in_order() {
        let (tree, root) = parse(json!({
            "type": "object",
            "required": ["a"],
            "properties": { "b": { "type": "string" }, "a": { "type": "integer" } }
        }));
        let children = tree.children(root);
        assert_eq!(children.len(), 3);
        match &tree.get(children[2]).kind {
            NodeKind::Properties(props) => {
                let names: Vec<_> = props.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["b", "a"]);
            }
            other => panic!("Expected Properties, got {:?}", other),
        }
    }

    #[test]
    fn test_local_ref_shares_node() {
        let (tree, root) = parse(json!({
            "properties": {
                "a": { "$ref": "#/definitions/Thing" },
                "b": { "$ref": "#/definitions/Thing" }
            },
            "definitions": { "Thing": { "type": "string" } }
        }));
        let NodeKind::Properties(props) = &tree.get(tree.children(root)[0]).kind else {
            panic!("Expected Properties");
        };
        let a = tree.pure_ref_target(props[0].1).unwrap();
        let b = tree.pure_ref_target(props[1].1).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.get(a).location, "file:///schemas/test.schema.json#/definitions/Thing");
        assert_eq!(tree.last_segment(a), "Thing");
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let (tree, root) = parse(json!({
            "type": "object",
            "properties": { "children": { "type": "array", "items": { "$ref": "#" } } }
        }));
        assert!(tree.len() > 1);
        let location = &tree.get(root).location;
        assert!(location.ends_with('#'));
    }

    #[test]
    fn test_cross_document_ref() {
        let mut parser = SchemaParser::new();
        parser.add_document("file:///schemas/base.schema.json", json!({ "type": "object" }));
        let derived = parser.add_document(
            "file:///schemas/derived.schema.json",
            json!({ "allOf": [ { "$ref": "base.schema.json" } ] }),
        );
        let base = parser.parse_document("file:///schemas/base.schema.json").unwrap();
        let root = parser.parse_document(&derived).unwrap();
        let tree = parser.into_tree();
        let branches = tree.all_of(root).unwrap();
        assert_eq!(tree.pure_ref_target(branches[0]), Some(base));
    }

    #[test]
    fn test_unresolved_ref_is_fatal() {
        let mut parser = SchemaParser::new();
        let uri = parser.add_document("file:///a.json", json!({ "$ref": "missing.json" }));
        let err = parser.parse_document(&uri).unwrap_err();
        assert!(matches!(err, CodegenError::UnresolvedRef { .. }));
    }

    #[test]
    fn test_draft04_exclusive_minimum() {
        let (tree, root) = parse(json!({ "minimum": 5, "exclusiveMinimum": true }));
        let children = tree.children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(
            tree.get(children[0]).kind,
            NodeKind::Validator(Keyword::Bound {
                kind: BoundKind::Minimum,
                value: NumberValue::Int(5),
                exclusive: true,
            })
        );
    }

    #[test]
    fn test_resolve_uri() {
        assert_eq!(resolve_uri("file:///a/b/c.json", "d.json"), "file:///a/b/d.json");
        assert_eq!(resolve_uri("file:///a/b/c.json", "../d.json"), "file:///a/d.json");
        assert_eq!(resolve_uri("http://x.org/s/c.json", "/d.json"), "http://x.org/d.json");
        assert_eq!(resolve_uri("a/c.json", "d.json"), "a/d.json");
        assert_eq!(resolve_uri("a/c.json", "urn:x:y"), "urn:x:y");
    }
}
