//! Schema Tree
//!
//! Arena of parsed schema nodes. Every keyword of a schema object becomes its own
//! child node so the walker can dispatch on node kind alone:
//! - composition nodes (`allOf`, `anyOf`, `oneOf`, `not`)
//! - single-keyword validator nodes (`minimum`, `pattern`, ...)
//! - reference nodes, already linked to their target node
//! - boolean literal schemas
//!
//! Nodes are identified by [`NodeId`]; the parser memoizes by location so two
//! references to the same place share one node.

pub mod loader;
pub mod parser;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub use loader::{load_path, LoadConfig, LoadedDocument};
pub use parser::SchemaParser;

/// Index of a node in the [`SchemaTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// JSON type tags from the `type` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl JsonType {
    pub fn from_json_type(type_str: &str) -> Option<Self> {
        match type_str {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }
}

/// A numeric keyword value, integer where the document wrote an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberValue {
    Int(i64),
    Decimal(OrderedFloat<f64>),
}

impl NumberValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        let n = value.as_number()?;
        if let Some(i) = n.as_i64() {
            return Some(Self::Int(i));
        }
        let f = n.as_f64()?;
        // 3.0 and 3 compare and hash the same way
        if f.fract() == 0.0 && f.abs() < 9.2e18 {
            Some(Self::Int(f as i64))
        } else {
            Some(Self::Decimal(OrderedFloat(f)))
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Decimal(d) => d.0,
        }
    }

    /// Integral value if this number has no fractional part
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Decimal(d) if d.0.fract() == 0.0 && d.0.abs() < 9.2e18 => Some(d.0 as i64),
            Self::Decimal(_) => None,
        }
    }

    /// Smallest integer not less than this value
    pub fn ceil(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            Self::Decimal(d) => d.0.ceil() as i64,
        }
    }

    /// Largest integer not greater than this value
    pub fn floor(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            Self::Decimal(d) => d.0.floor() as i64,
        }
    }

    pub fn fits_i32(&self) -> bool {
        match self.as_integral() {
            Some(i) => i32::try_from(i).is_ok(),
            None => {
                let t = self.as_f64().trunc();
                t >= i32::MIN as f64 && t <= i32::MAX as f64
            }
        }
    }
}

impl PartialOrd for NumberValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            _ => OrderedFloat(self.as_f64()).cmp(&OrderedFloat(other.as_f64())),
        }
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d.0),
        }
    }
}

/// Composition keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationKind {
    AllOf,
    AnyOf,
    OneOf,
}

/// Which numeric bound a keyword sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Minimum,
    Maximum,
}

/// Which count a min/max count keyword constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Length,
    Items,
    Properties,
}

/// Single validation keyword
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Type(Vec<JsonType>),
    Const(Value),
    Enum(Vec<Value>),
    Format(String),
    Pattern(String),
    Bound { kind: BoundKind, value: NumberValue, exclusive: bool },
    MultipleOf(NumberValue),
    MinCount(CountKind, u64),
    MaxCount(CountKind, u64),
    UniqueItems(bool),
    Default(Value),
    Examples(Vec<Value>),
}

/// Node kinds produced by the parser
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A schema object; its keywords are the children, in document order
    General(Vec<NodeId>),
    Combination { kind: CombinationKind, branches: Vec<NodeId> },
    Not(NodeId),
    Ref { reference: String, target: NodeId },
    Properties(Vec<(String, NodeId)>),
    PatternProperties(Vec<(String, NodeId)>),
    AdditionalProperties(NodeId),
    Items(NodeId),
    Required(Vec<String>),
    Validator(Keyword),
    Extension { name: String, value: Value },
    Boolean(bool),
}

/// A parsed schema node
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// `<document-uri>#<json-pointer>`
    pub location: String,
    /// URI of the document this node belongs to
    pub document: String,
    pub kind: NodeKind,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw JSON, kept for schema objects only
    pub raw: Option<Value>,
}

/// Arena of schema nodes with a location index
#[derive(Debug, Default)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    by_location: HashMap<String, NodeId>,
}

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, location: &str) -> Option<NodeId> {
        self.by_location.get(location).copied()
    }

    pub(crate) fn reserve(&mut self, location: &str, document: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            location: location.to_string(),
            document: document.to_string(),
            kind: NodeKind::Boolean(true),
            title: None,
            description: None,
            raw: None,
        });
        self.by_location.insert(location.to_string(), id);
        id
    }

    pub(crate) fn push(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Keyword children of a schema object (empty for other kinds)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.get(id).kind {
            NodeKind::General(children) => children,
            _ => &[],
        }
    }

    /// Target of the reference a node is made of, if it is nothing but a `$ref`
    pub fn pure_ref_target(&self, id: NodeId) -> Option<NodeId> {
        match &self.get(id).kind {
            NodeKind::Ref { target, .. } => Some(*target),
            NodeKind::General(children) => {
                let mut refs = None;
                for child in children {
                    match &self.get(*child).kind {
                        NodeKind::Ref { target, .. } if refs.is_none() => refs = Some(*target),
                        NodeKind::Extension { .. } => {}
                        _ => return None,
                    }
                }
                refs
            }
            _ => None,
        }
    }

    /// The `$ref` written directly on a schema object, with its reference text
    pub fn direct_ref(&self, id: NodeId) -> Option<(&str, NodeId)> {
        if let NodeKind::Ref { reference, target } = &self.get(id).kind {
            return Some((reference.as_str(), *target));
        }
        self.children(id).iter().find_map(|child| match &self.get(*child).kind {
            NodeKind::Ref { reference, target } => Some((reference.as_str(), *target)),
            _ => None,
        })
    }

    /// First `allOf` composition directly on a schema object
    pub fn all_of(&self, id: NodeId) -> Option<&[NodeId]> {
        self.children(id).iter().find_map(|child| match &self.get(*child).kind {
            NodeKind::Combination { kind: CombinationKind::AllOf, branches } => Some(branches.as_slice()),
            _ => None,
        })
    }

    /// Whether the node is exactly `{"type": "null"}`
    pub fn is_null_type(&self, id: NodeId) -> bool {
        let children = self.children(id);
        children.len() == 1
            && matches!(
                &self.get(children[0]).kind,
                NodeKind::Validator(Keyword::Type(types)) if types.as_slice() == [JsonType::Null]
            )
    }

    /// Last segment of a location, used for naming
    pub fn last_segment(&self, id: NodeId) -> String {
        let location = &self.get(id).location;
        let (document, pointer) = location.split_once('#').unwrap_or((location, ""));
        let segment = if pointer.is_empty() {
            document.rsplit('/').next().unwrap_or(document)
        } else {
            pointer.rsplit('/').next().unwrap_or(pointer)
        };
        segment.replace("~1", "/").replace("~0", "~")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_ordering() {
        assert!(NumberValue::Int(3) < NumberValue::Int(7));
        assert!(NumberValue::Decimal(OrderedFloat(2.5)) < NumberValue::Int(3));
        assert_eq!(NumberValue::Decimal(OrderedFloat(2.5)).ceil(), 3);
        assert_eq!(NumberValue::Decimal(OrderedFloat(2.5)).floor(), 2);
    }

    #[test]
    fn test_fits_i32() {
        assert!(NumberValue::Int(i32::MAX as i64).fits_i32());
        assert!(!NumberValue::Int(i32::MAX as i64 + 1).fits_i32());
        assert!(NumberValue::Decimal(OrderedFloat(12.0)).fits_i32());
    }

    #[test]
    fn test_json_type_names() {
        assert_eq!(JsonType::from_json_type("integer"), Some(JsonType::Integer));
        assert_eq!(JsonType::from_json_type("date"), None);
    }
}
