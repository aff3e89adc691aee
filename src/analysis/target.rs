//! Targets
//!
//! A [`Target`] is a constraint record promoted to a generated class. It carries
//! everything the renderer needs beyond the record itself: base and derived
//! classes, interfaces, nested classes, the static-constant pool, system types
//! and imports.

use serde::Serialize;
use std::collections::BTreeSet;

use super::classify::SystemType;
use super::constraints::ConstraintId;
use crate::codegen::config::CustomClass;
use crate::schema::{NodeId, NumberValue};

/// Index of a target in the generation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub usize);

/// Kind of generated type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Class,
    Enum,
    Interface,
}

/// A generated class, top-level or nested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassRef {
    Target(TargetId),
    Nested { target: TargetId, index: usize },
}

/// The generated type a record resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Class(ClassRef),
    Custom(CustomClass),
}

// =============================================================================
// Static Constants
// =============================================================================

/// Kind of static constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticKind {
    Regex,
    StringArray,
    NumberArray,
    Decimal,
    String,
}

impl StaticKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Regex => "cg_regex",
            Self::StringArray | Self::NumberArray => "cg_array",
            Self::Decimal => "cg_dec",
            Self::String => "cg_str",
        }
    }
}

/// Value held by a static constant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum StaticValue {
    Text(String),
    Strings(Vec<String>),
    Numbers(Vec<NumberValue>),
    Number(NumberValue),
}

/// A static constant emitted once per class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticConstant {
    pub name: String,
    pub kind: StaticKind,
    pub value: StaticValue,
}

/// Static constants of one target, deduplicated by kind and value
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StaticPool {
    entries: Vec<StaticConstant>,
}

impl StaticPool {
    /// Name of the constant holding `value`, adding it on first use.
    /// New names are numbered by the pool size at insertion.
    pub fn add(&mut self, kind: StaticKind, value: StaticValue) -> String {
        if let Some(existing) = self.entries.iter().find(|e| e.kind == kind && e.value == value) {
            return existing.name.clone();
        }
        let name = format!("{}{}", kind.prefix(), self.entries.len());
        self.entries.push(StaticConstant {
            name: name.clone(),
            kind,
            value,
        });
        name
    }

    pub fn get(&self, name: &str) -> Option<&StaticConstant> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticConstant> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Nested Classes
// =============================================================================

/// A class generated inside a target
#[derive(Debug, Clone)]
pub struct NestedClass {
    pub name: String,
    /// Enclosing nested class; `None` means the target itself
    pub parent: Option<usize>,
    pub kind: TargetKind,
    pub record: ConstraintId,
    /// Schema node this class was built from
    pub origin: Option<NodeId>,
    /// Node the originating schema references, for reuse across access paths
    pub ref_target: Option<NodeId>,
    pub interfaces: Vec<ClassRef>,
    /// Synthesized from a one-of branch of an object container
    pub variant: bool,
}

// =============================================================================
// Target
// =============================================================================

/// A record promoted to a generated class
#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub package: Option<String>,
    /// Canonical document URI
    pub uri: String,
    pub node: NodeId,
    pub record: ConstraintId,
    pub kind: TargetKind,

    pub base: Option<TargetId>,
    pub derived: Vec<TargetId>,
    pub interfaces: Vec<ClassRef>,
    pub nested: Vec<NestedClass>,
    pub statics: StaticPool,
    pub system_types: BTreeSet<SystemType>,
    pub imports: BTreeSet<String>,

    /// Pass A has run for this target
    pub validations_computed: bool,
    /// Pass B has run for this target
    pub variants_resolved: bool,
}

impl Target {
    pub fn new(
        id: TargetId,
        name: String,
        package: Option<String>,
        uri: String,
        node: NodeId,
        record: ConstraintId,
        kind: TargetKind,
    ) -> Self {
        Self {
            id,
            name,
            package,
            uri,
            node,
            record,
            kind,
            base: None,
            derived: Vec::new(),
            interfaces: Vec::new(),
            nested: Vec::new(),
            statics: StaticPool::default(),
            system_types: BTreeSet::new(),
            imports: BTreeSet::new(),
            validations_computed: false,
            variants_resolved: false,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether a sibling under `parent` already uses `name`
    pub fn nested_name_taken(&self, parent: Option<usize>, name: &str) -> bool {
        self.nested.iter().any(|n| n.parent == parent && n.name == name)
    }

    /// Existing nested class built from `origin`, or reachable via the same reference
    pub fn find_nested(&self, origin: Option<NodeId>, ref_target: Option<NodeId>) -> Option<usize> {
        self.nested.iter().position(|n| {
            (origin.is_some() && n.origin == origin) || (ref_target.is_some() && n.ref_target == ref_target)
        })
    }

    pub fn add_derived(&mut self, derived: TargetId) {
        if !self.derived.contains(&derived) {
            self.derived.push(derived);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pool_numbering_and_dedup() {
        let mut pool = StaticPool::default();
        let a = pool.add(StaticKind::Regex, StaticValue::Text("^a$".into()));
        let b = pool.add(StaticKind::StringArray, StaticValue::Strings(vec!["x".into()]));
        let again = pool.add(StaticKind::Regex, StaticValue::Text("^a$".into()));
        let c = pool.add(StaticKind::Decimal, StaticValue::Number(NumberValue::Int(5)));
        assert_eq!(a, "cg_regex0");
        assert_eq!(b, "cg_array1");
        assert_eq!(again, "cg_regex0");
        assert_eq!(c, "cg_dec2");
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_find_nested_by_origin_or_ref() {
        let mut target = Target::new(
            TargetId(0),
            "Person".into(),
            Some("com.example".into()),
            "file:///person.json".into(),
            NodeId(0),
            ConstraintId(0),
            TargetKind::Class,
        );
        target.nested.push(NestedClass {
            name: "Address".into(),
            parent: None,
            kind: TargetKind::Class,
            record: ConstraintId(1),
            origin: Some(NodeId(4)),
            ref_target: Some(NodeId(9)),
            interfaces: Vec::new(),
            variant: false,
        });
        assert_eq!(target.find_nested(Some(NodeId(4)), None), Some(0));
        assert_eq!(target.find_nested(Some(NodeId(5)), Some(NodeId(9))), Some(0));
        assert_eq!(target.find_nested(Some(NodeId(5)), None), None);
        assert!(target.nested_name_taken(None, "Address"));
        assert!(!target.nested_name_taken(Some(0), "Address"));
        assert_eq!(target.qualified_name(), "com.example.Person");
    }
}
