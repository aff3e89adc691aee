//! Renderer-facing IR
//!
//! A pure projection of a resolved [`GenerationContext`]. Everything is
//! pre-sorted and deduplicated, so a renderer only has to emit text: it never
//! reads schema JSON or constraint records.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use super::config::TargetLanguage;
use super::names::field_name;
use crate::analysis::{
    AdditionalProperties, ClassRef, ConstraintId, DefaultValue, Diagnostics, GenerationContext, Shape,
    StaticConstant, SystemType, Target, TargetKind, TypeRef, Validation, ValidationValue,
};

// =============================================================================
// Output
// =============================================================================

/// Result of one generation run
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_comment: Option<String>,
    pub language: TargetLanguage,
    pub classes: Vec<ClassIr>,
    pub diagnostics: Diagnostics,
}

impl GeneratedOutput {
    pub fn class(&self, name: &str) -> Option<&ClassIr> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// A generated class, enum or interface
#[derive(Debug, Clone, Serialize)]
pub struct ClassIr {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub kind: TargetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyIr>,
    /// Constants of an enum class
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    /// Class-level checks (property counts, additional properties)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<Validation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pattern_properties: Vec<PatternPropertyIr>,
    /// Value of properties matched neither by name nor by pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<ValueIr>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ClassIr>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statics: Vec<StaticConstant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system_types: Vec<SystemType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Backed by a map because of the additional-properties policy
    pub map_backed: bool,
    /// Synthesized from a one-of branch
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub variant: bool,
}

impl ClassIr {
    pub fn property(&self, name: &str) -> Option<&PropertyIr> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn nested_class(&self, name: &str) -> Option<&ClassIr> {
        self.nested.iter().find(|c| c.name == name)
    }
}

/// A property of a generated class
#[derive(Debug, Clone, Serialize)]
pub struct PropertyIr {
    /// Name as written in the schema
    pub name: String,
    /// Escaped identifier for the target language
    pub identifier: String,
    #[serde(rename = "type")]
    pub type_ir: TypeIr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<Validation>,
    /// Elements of an array property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ValueIr>>,
    pub required: bool,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Same-shaped property inherited from the base class
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub inherited: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extended: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extends: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An array element or map value together with its own checks
#[derive(Debug, Clone, Serialize)]
pub struct ValueIr {
    #[serde(rename = "type")]
    pub type_ir: TypeIr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<Validation>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ValueIr>>,
}

/// A `patternProperties` entry of a class
#[derive(Debug, Clone, Serialize)]
pub struct PatternPropertyIr {
    pub pattern: String,
    /// Static constant holding the compiled pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_name: Option<String>,
    pub value: ValueIr,
}

/// The generated type of a property, item or map value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeIr {
    /// Generated class, by dotted path (`pkg.Outer.Inner`)
    Class { name: String },
    Custom { name: String },
    System { system: SystemType },
    Array { items: Box<TypeIr> },
    String,
    Boolean,
    Int32,
    Int64,
    Decimal,
    Any,
}

// =============================================================================
// Projection
// =============================================================================

/// Project every target of a resolved context
pub fn project(ctx: &GenerationContext<'_>) -> Vec<ClassIr> {
    ctx.targets.iter().map(|target| project_target(ctx, target)).collect()
}

fn project_target(ctx: &GenerationContext<'_>, target: &Target) -> ClassIr {
    let record = ctx.arena.get(target.record);
    let mut class = class_body(ctx, target.kind, target.record);
    class.name = target.name.clone();
    class.package = target.package.clone();
    class.description = record.description.clone();
    class.base = target.base.map(|b| ctx.target(b).qualified_name());
    class.derived = target.derived.iter().map(|d| ctx.target(*d).qualified_name()).collect();
    class.interfaces = target.interfaces.iter().map(|i| class_path(ctx, *i)).collect();
    class.nested = nested_children(ctx, target, None);
    let mut referenced = HashSet::new();
    collect_statics(&class, &mut referenced);
    let statics: Vec<StaticConstant> = target
        .statics
        .iter()
        .filter(|s| referenced.contains(s.name.as_str()))
        .cloned()
        .collect();
    class.statics = statics;
    class.system_types = target.system_types.iter().copied().collect();
    class.imports = target.imports.iter().cloned().collect();
    class
}

fn nested_children(ctx: &GenerationContext<'_>, target: &Target, parent: Option<usize>) -> Vec<ClassIr> {
    target
        .nested
        .iter()
        .enumerate()
        .filter(|(_, n)| n.parent == parent)
        .map(|(index, n)| {
            let mut class = class_body(ctx, n.kind, n.record);
            class.name = n.name.clone();
            class.description = ctx.arena.get(n.record).description.clone();
            class.interfaces = n.interfaces.iter().map(|i| class_path(ctx, *i)).collect();
            class.nested = nested_children(ctx, target, Some(index));
            class.variant = n.variant;
            class
        })
        .collect()
}

/// Properties, enum constants and class-level checks of a class record
fn class_body(ctx: &GenerationContext<'_>, kind: TargetKind, record: ConstraintId) -> ClassIr {
    let r = ctx.arena.get(record);
    let mut class = ClassIr {
        name: String::new(),
        package: None,
        kind,
        description: None,
        properties: Vec::new(),
        enum_values: Vec::new(),
        validations: Vec::new(),
        pattern_properties: Vec::new(),
        additional_properties: None,
        base: None,
        derived: Vec::new(),
        interfaces: Vec::new(),
        nested: Vec::new(),
        statics: Vec::new(),
        system_types: Vec::new(),
        imports: Vec::new(),
        map_backed: r.map_backed,
        variant: false,
    };
    match kind {
        TargetKind::Class => {
            class.properties = r.properties.iter().map(|p| project_property(ctx, *p)).collect();
            class.validations = ctx.arena.validations(record).iter().cloned().collect();
            class.pattern_properties = r
                .pattern_properties
                .iter()
                .map(|pp| PatternPropertyIr {
                    pattern: pp.pattern.clone(),
                    static_name: pp.static_name.clone(),
                    value: project_value(ctx, pp.constraints),
                })
                .collect();
            if let Some(AdditionalProperties::Schema(sub)) = r.additional_properties {
                class.additional_properties = Some(project_value(ctx, sub));
            }
        }
        TargetKind::Enum => {
            class.enum_values = r
                .enum_values
                .iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        TargetKind::Interface => {}
    }
    class
}

fn project_property(ctx: &GenerationContext<'_>, property: ConstraintId) -> PropertyIr {
    let p = ctx.arena.get(property);
    let name = p.name.clone().unwrap_or_default();
    PropertyIr {
        identifier: field_name(&name, ctx.language()),
        name,
        type_ir: type_of(ctx, property),
        validations: own_validations(ctx, property),
        items: item_value(ctx, property),
        required: p.is_required,
        nullable: p.nullable == Some(true),
        default: p.default_value.clone(),
        inherited: p.base_property.is_some(),
        extended: p.extended,
        extends: p.extends,
        description: p.description.clone(),
    }
}

/// Array element or map value of an analysed record
fn project_value(ctx: &GenerationContext<'_>, record: ConstraintId) -> ValueIr {
    ValueIr {
        type_ir: type_of(ctx, record),
        validations: own_validations(ctx, record),
        nullable: ctx.arena.get(record).nullable == Some(true),
        items: item_value(ctx, record),
    }
}

fn item_value(ctx: &GenerationContext<'_>, record: ConstraintId) -> Option<Box<ValueIr>> {
    let r = ctx.arena.get(record);
    match (&r.shape, r.items) {
        (Some(Shape::Array), Some(items)) => Some(Box::new(project_value(ctx, items))),
        _ => None,
    }
}

/// Checks planned on a record, unless a class built from this very record
/// performs them itself
fn own_validations(ctx: &GenerationContext<'_>, record: ConstraintId) -> Vec<Validation> {
    if owns_class(ctx, record) {
        Vec::new()
    } else {
        ctx.arena.validations(record).iter().cloned().collect()
    }
}

fn owns_class(ctx: &GenerationContext<'_>, record: ConstraintId) -> bool {
    match &ctx.arena.get(record).type_ref {
        Some(TypeRef::Class(ClassRef::Nested { target, index })) => ctx.target(*target).nested[*index].record == record,
        _ => false,
    }
}

/// Static constants a projected class and its nested classes refer to
fn collect_statics<'c>(class: &'c ClassIr, names: &mut HashSet<&'c str>) {
    fn from_validations<'c>(validations: &'c [Validation], names: &mut HashSet<&'c str>) {
        for v in validations {
            if let Some(ValidationValue::Static(name)) = &v.value {
                names.insert(name.as_str());
            }
        }
    }
    fn from_value<'c>(value: &'c ValueIr, names: &mut HashSet<&'c str>) {
        from_validations(&value.validations, names);
        if let Some(items) = &value.items {
            from_value(items, names);
        }
    }

    from_validations(&class.validations, names);
    for property in &class.properties {
        from_validations(&property.validations, names);
        if let Some(items) = &property.items {
            from_value(items, names);
        }
    }
    for pattern_property in &class.pattern_properties {
        if let Some(name) = &pattern_property.static_name {
            names.insert(name.as_str());
        }
        from_value(&pattern_property.value, names);
    }
    if let Some(additional) = &class.additional_properties {
        from_value(additional, names);
    }
    for nested in &class.nested {
        collect_statics(nested, names);
    }
}

/// Generated type of an analysed record
pub fn type_of(ctx: &GenerationContext<'_>, record: ConstraintId) -> TypeIr {
    let r = ctx.arena.get(record);
    match r.shape.as_ref().unwrap_or(&Shape::Untyped) {
        Shape::Reference(TypeRef::Class(class_ref)) => TypeIr::Class {
            name: class_path(ctx, *class_ref),
        },
        Shape::Reference(TypeRef::Custom(custom)) => TypeIr::Custom {
            name: custom.class_name.clone(),
        },
        Shape::System(system) => TypeIr::System { system: *system },
        Shape::Array => TypeIr::Array {
            items: Box::new(r.items.map(|items| type_of(ctx, items)).unwrap_or(TypeIr::Any)),
        },
        Shape::String => TypeIr::String,
        Shape::Boolean => TypeIr::Boolean,
        Shape::Int32 => TypeIr::Int32,
        Shape::Int64 => TypeIr::Int64,
        Shape::Decimal => TypeIr::Decimal,
        Shape::Object | Shape::EnumOfIdentifiers | Shape::Untyped => TypeIr::Any,
    }
}

/// Dotted path of a generated class: the target's qualified name, then the
/// chain of enclosing nested classes
pub fn class_path(ctx: &GenerationContext<'_>, class_ref: ClassRef) -> String {
    match class_ref {
        ClassRef::Target(id) => ctx.target(id).qualified_name(),
        ClassRef::Nested { target, index } => {
            let owner = ctx.target(target);
            let mut chain = Vec::new();
            let mut current = Some(index);
            while let Some(i) = current {
                chain.push(owner.nested[i].name.as_str());
                current = owner.nested[i].parent;
            }
            chain.push(owner.name.as_str());
            chain.reverse();
            match &owner.package {
                Some(package) => format!("{}.{}", package, chain.join(".")),
                None => chain.join("."),
            }
        }
    }
}
