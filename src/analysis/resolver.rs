//! Structural Resolution
//!
//! Cross-target pass, run once every top-level target is registered:
//! - **Pass A** links base classes (`allOf` whose first branch references
//!   another target), analyses every property and diffs it against the
//!   base's same-named property
//! - **Pass B** resolves `oneOf` branch lists: a non-object container becomes
//!   an interface its branch targets implement, an object container gets one
//!   synthesized variant class per branch
//!
//! Both passes are memoized per target, so a base is always resolved before
//! its derived classes regardless of registration order.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;
use tracing::debug;

use super::classify::{self, Shape};
use super::constraints::{AdditionalProperties, ConstraintId};
use super::context::GenerationContext;
use super::planner::plan_validations;
use super::target::{ClassRef, NestedClass, StaticValue, TargetId, TargetKind, TypeRef};
use super::validation::{Validation, ValidationSet, ValidationType, ValidationValue};
use crate::codegen::config::NestedClassName;
use crate::codegen::names::allocate_name;
use crate::error::{CodegenError, Result};

/// Where a record sits, for naming nested classes and enum promotion
#[derive(Debug, Clone, Copy)]
enum Role<'n> {
    /// Named property
    Property(&'n str),
    /// Items of the named array property
    Item(&'n str),
    /// Pattern-property value, additional-properties schema, items of those
    Value,
}

impl Role<'_> {
    fn promotes_enums(&self) -> bool {
        matches!(self, Self::Property(_))
    }
}

/// Run both passes over every registered target
pub fn resolve(ctx: &mut GenerationContext<'_>) -> Result<()> {
    check_base_cycles(ctx)?;
    for i in 0..ctx.targets.len() {
        resolve_target(ctx, TargetId(i))?;
    }
    for i in 0..ctx.targets.len() {
        resolve_variants(ctx, TargetId(i))?;
    }
    Ok(())
}

/// Base target of a class: the first `allOf` branch, when it is nothing but a
/// reference to another target
pub fn base_of(ctx: &GenerationContext<'_>, id: TargetId) -> Option<TargetId> {
    let target = ctx.target(id);
    if target.kind != TargetKind::Class {
        return None;
    }
    let first = *ctx.tree.all_of(target.node)?.first()?;
    ctx.tree.pure_ref_target(first)?;
    ctx.target_for_node(first)
}

fn check_base_cycles(ctx: &GenerationContext<'_>) -> Result<()> {
    let mut graph = DiGraph::<TargetId, ()>::new();
    let indices: Vec<_> = ctx.targets.iter().map(|t| graph.add_node(t.id)).collect();
    for target in &ctx.targets {
        if let Some(base) = base_of(ctx, target.id) {
            graph.add_edge(indices[target.id.0], indices[base.0], ());
        }
    }
    for scc in kosaraju_scc(&graph) {
        let looped = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
        if scc.len() > 1 || looped {
            let first = scc.iter().map(|i| graph[*i]).min().unwrap_or(graph[scc[0]]);
            return Err(CodegenError::CircularBase(ctx.target(first).qualified_name()));
        }
    }
    Ok(())
}

// =============================================================================
// Pass A: bases and properties
// =============================================================================

fn resolve_target(ctx: &mut GenerationContext<'_>, id: TargetId) -> Result<()> {
    if ctx.target(id).validations_computed {
        return Ok(());
    }
    ctx.target_mut(id).validations_computed = true;

    let record = ctx.target(id).record;
    match ctx.target(id).kind {
        TargetKind::Enum => {
            ctx.arena.get_mut(record).shape = Some(Shape::EnumOfIdentifiers);
            return Ok(());
        }
        TargetKind::Interface => {
            ctx.arena.get_mut(record).shape = Some(Shape::Untyped);
            return Ok(());
        }
        TargetKind::Class => {}
    }

    let base = base_of(ctx, id);
    if let Some(base) = base {
        resolve_target(ctx, base)?;
        debug!(target = %ctx.target(id).name, base = %ctx.target(base).name, "base class linked");
        ctx.target_mut(id).base = Some(base);
        ctx.target_mut(base).add_derived(id);
        import_target(ctx, id, base);
    }

    ctx.arena.get_mut(record).shape = Some(Shape::Object);
    let base_record = base.map(|b| ctx.target(b).record);
    analyse_object(ctx, id, None, record, base_record)
}

/// Analyse an object record's members, plan its own checks and reconcile
/// required properties. With a base record, same-named properties are diffed
/// against the base.
fn analyse_object(
    ctx: &mut GenerationContext<'_>,
    owner: TargetId,
    scope: Option<usize>,
    record: ConstraintId,
    base: Option<ConstraintId>,
) -> Result<()> {
    let properties = ctx.arena.get(record).properties.clone();
    for property in properties {
        let name = ctx.arena.get(property).name.clone().unwrap_or_default();
        let inherited = base.and_then(|b| ctx.arena.property(b, &name));
        if let Some(base_property) = inherited {
            inherit_nested_class(ctx, property, base_property);
        }
        analyse_record(ctx, owner, scope, property, Role::Property(&name))?;
        if let Some(base_property) = inherited {
            diff_against_base(ctx, owner, property, base_property);
        }
    }

    let values: Vec<ConstraintId> = ctx
        .arena
        .get(record)
        .pattern_properties
        .iter()
        .map(|pp| pp.constraints)
        .collect();
    for value in values {
        analyse_record(ctx, owner, scope, value, Role::Value)?;
    }
    if let Some(AdditionalProperties::Schema(sub)) = ctx.arena.get(record).additional_properties {
        analyse_record(ctx, owner, scope, sub, Role::Value)?;
    }

    plan_validations(ctx, owner, record, &Shape::Object);
    plan_negation(ctx, owner, record);
    reconcile_required(ctx, record);
    Ok(())
}

/// An inherited property that still describes the base's nested class reuses it
fn inherit_nested_class(ctx: &mut GenerationContext<'_>, property: ConstraintId, base_property: ConstraintId) {
    let (node, ref_target) = {
        let p = ctx.arena.get(property);
        if p.type_ref.is_some() {
            return;
        }
        (p.node, p.ref_target)
    };
    let Some(TypeRef::Class(ClassRef::Nested { target, index })) = ctx.arena.get(base_property).type_ref.clone() else {
        return;
    };
    let nested = &ctx.target(target).nested[index];
    let same_origin = node.is_some() && nested.origin == node;
    let same_ref = ref_target.is_some() && nested.ref_target == ref_target;
    if same_origin || same_ref {
        ctx.arena.get_mut(property).type_ref = Some(TypeRef::Class(ClassRef::Nested { target, index }));
    }
}

fn diff_against_base(
    ctx: &mut GenerationContext<'_>,
    owner: TargetId,
    property: ConstraintId,
    base_property: ConstraintId,
) {
    if ctx.arena.get(property).shape == ctx.arena.get(base_property).shape {
        // thin override: only checks the base doesn't already perform
        let base_target = ctx.target(owner).base.unwrap_or(owner);
        let mut inherited = ValidationSet::new();
        for validation in ctx.arena.validations(property).iter() {
            let key = comparable(ctx, owner, validation);
            if ctx
                .arena
                .validations(base_property)
                .iter()
                .any(|b| comparable(ctx, base_target, b) == key)
            {
                inherited.add(validation.clone());
            }
        }
        ctx.arena.validations_mut(property).remove_all_in(&inherited);
        ctx.arena.get_mut(property).base_property = Some(base_property);
    } else {
        debug!(
            property = ctx.arena.get(property).name.as_deref().unwrap_or_default(),
            "property re-declared with a different shape"
        );
        ctx.arena.get_mut(base_property).extended = true;
        ctx.arena.get_mut(property).extends = true;
    }
}

/// A validation with its static reference replaced by the pooled value, so
/// checks of two targets compare regardless of pool numbering
fn comparable<'c>(
    ctx: &'c GenerationContext<'_>,
    target: TargetId,
    validation: &'c Validation,
) -> (ValidationType, bool, Option<&'c ValidationValue>, Option<&'c StaticValue>) {
    match &validation.value {
        Some(ValidationValue::Static(name)) => (
            validation.kind,
            validation.negated,
            None,
            ctx.target(target).statics.get(name).map(|c| &c.value),
        ),
        value => (validation.kind, validation.negated, value.as_ref(), None),
    }
}

/// Required-set reconciliation: a property named in `required` is flagged
/// required, any other becomes nullable unless it has a default
fn reconcile_required(ctx: &mut GenerationContext<'_>, record: ConstraintId) {
    let required = ctx.arena.get(record).required.clone();
    let properties = ctx.arena.get(record).properties.clone();
    for property in properties {
        let p = ctx.arena.get_mut(property);
        let named = p.name.as_deref().map(|n| required.iter().any(|r| r == n)).unwrap_or(false);
        if named {
            p.is_required = true;
        } else if p.nullable != Some(true) && p.default_value.is_none() {
            p.nullable = Some(true);
        }
    }
}

// =============================================================================
// Record Analysis
// =============================================================================

/// Classify a record, synthesize the nested class it needs, and plan its checks
/// (and those of its negated mirror). Each record is analysed once.
fn analyse_record(
    ctx: &mut GenerationContext<'_>,
    owner: TargetId,
    scope: Option<usize>,
    record: ConstraintId,
    role: Role<'_>,
) -> Result<()> {
    if ctx.arena.get(record).shape.is_some() {
        return Ok(());
    }

    let ref_target = ctx.arena.get(record).ref_target;
    let custom = classify::custom_class_for(&ctx.arena, ctx.tree, &ctx.config.custom_classes, record).is_some();
    if !custom && ctx.arena.get(record).type_ref.is_none() {
        if let Some(target) = ref_target.and_then(|node| ctx.target_for_node(node)) {
            ctx.arena.get_mut(record).type_ref = Some(TypeRef::Class(ClassRef::Target(target)));
            import_target(ctx, owner, target);
        } else if let Some(index) = ref_target.and_then(|node| ctx.target(owner).find_nested(None, Some(node))) {
            // recursive definitions land here before their body is inlined
            ctx.arena.get_mut(record).type_ref = Some(TypeRef::Class(ClassRef::Nested { target: owner, index }));
        }
    }

    let shape = match ctx.classify(record, role.promotes_enums()) {
        Shape::Object => {
            let (class_ref, created) = nested_class(ctx, owner, scope, record, TargetKind::Class, role)?;
            let shape = settle(ctx, record, class_ref);
            if let (true, ClassRef::Nested { index, .. }) = (created, class_ref) {
                analyse_object(ctx, owner, Some(index), record, None)?;
            }
            shape
        }
        Shape::EnumOfIdentifiers => {
            let (class_ref, _) = nested_class(ctx, owner, scope, record, TargetKind::Enum, role)?;
            settle(ctx, record, class_ref)
        }
        Shape::Array => {
            ctx.arena.get_mut(record).shape = Some(Shape::Array);
            if let Some(items) = ctx.arena.get(record).items {
                let item_role = match role {
                    Role::Property(name) => Role::Item(name),
                    _ => Role::Value,
                };
                analyse_record(ctx, owner, scope, items, item_role)?;
            }
            Shape::Array
        }
        Shape::Reference(TypeRef::Custom(custom)) => {
            if custom.package().is_some() {
                ctx.target_mut(owner).imports.insert(custom.class_name.clone());
            }
            Shape::Reference(TypeRef::Custom(custom))
        }
        other => other,
    };
    ctx.arena.get_mut(record).shape = Some(shape.clone());
    plan_validations(ctx, owner, record, &shape);
    plan_negation(ctx, owner, record);
    Ok(())
}

/// Negated mirrors are classified on their own, without enum promotion
fn plan_negation(ctx: &mut GenerationContext<'_>, owner: TargetId, record: ConstraintId) {
    let Some(negated) = ctx.arena.get(record).negated else { return };
    if ctx.arena.get(negated).shape.is_some() {
        return;
    }
    let shape = ctx.classify(negated, false);
    ctx.arena.get_mut(negated).shape = Some(shape.clone());
    plan_validations(ctx, owner, negated, &shape);
}

fn settle(ctx: &mut GenerationContext<'_>, record: ConstraintId, class_ref: ClassRef) -> Shape {
    let type_ref = TypeRef::Class(class_ref);
    let r = ctx.arena.get_mut(record);
    r.type_ref = Some(type_ref.clone());
    r.shape = Some(Shape::Reference(type_ref.clone()));
    Shape::Reference(type_ref)
}

/// Nested class for an anonymous object or identifier enum, reusing one built
/// from the same node or reached through the same reference. Returns whether
/// the class is new.
fn nested_class(
    ctx: &mut GenerationContext<'_>,
    owner: TargetId,
    scope: Option<usize>,
    record: ConstraintId,
    kind: TargetKind,
    role: Role<'_>,
) -> Result<(ClassRef, bool)> {
    let (origin, ref_target, title) = {
        let r = ctx.arena.get(record);
        (r.node, r.ref_target, r.title.clone())
    };
    if let Some(index) = ctx.target(owner).find_nested(origin, ref_target) {
        return Ok((ClassRef::Nested { target: owner, index }, false));
    }

    let candidate = match (ctx.config.generator.nested_class_name, ref_target, role) {
        (NestedClassName::RefSchema, Some(node), _) => ctx.namer.class_name(&ctx.tree.last_segment(node)),
        (_, _, Role::Property(name)) => ctx.namer.class_name(name),
        (_, _, Role::Item(name)) => ctx.namer.item_class_name(name),
        (_, _, Role::Value) => title
            .map(|t| ctx.namer.class_name(&t))
            .unwrap_or_else(|| "Value".to_string()),
    };
    let name = {
        let target = ctx.target(owner);
        allocate_name(&candidate, |c| target.nested_name_taken(scope, c))?
    };
    debug!(target = %ctx.target(owner).name, nested = %name, "nested class");

    let target = ctx.target_mut(owner);
    target.nested.push(NestedClass {
        name,
        parent: scope,
        kind,
        record,
        origin,
        ref_target,
        interfaces: Vec::new(),
        variant: false,
    });
    let index = target.nested.len() - 1;
    Ok((ClassRef::Nested { target: owner, index }, true))
}

fn import_target(ctx: &mut GenerationContext<'_>, owner: TargetId, other: TargetId) {
    let other = ctx.target(other);
    if other.package.is_some() && other.package != ctx.target(owner).package {
        let qualified = other.qualified_name();
        ctx.target_mut(owner).imports.insert(qualified);
    }
}

// =============================================================================
// Pass B: one-of branches
// =============================================================================

fn resolve_variants(ctx: &mut GenerationContext<'_>, id: TargetId) -> Result<()> {
    if ctx.target(id).variants_resolved {
        return Ok(());
    }
    ctx.target_mut(id).variants_resolved = true;

    let record = ctx.target(id).record;
    match ctx.target(id).kind {
        TargetKind::Enum => return Ok(()),
        TargetKind::Interface => resolve_interface(ctx, id, record)?,
        TargetKind::Class => {
            if !ctx.arena.get(record).one_of.is_empty() {
                synthesize_variants(ctx, id, None, record)?;
            }
        }
    }

    // nested containers, including any created while resolving
    let mut i = 0;
    while i < ctx.target(id).nested.len() {
        let nested = &ctx.target(id).nested[i];
        let container = nested.record;
        let eligible = nested.kind == TargetKind::Class && !nested.variant;
        if eligible && !ctx.arena.get(container).one_of.is_empty() {
            synthesize_variants(ctx, id, Some(i), container)?;
        }
        i += 1;
    }
    Ok(())
}

/// A pure union: branch targets implement the container; inline object
/// branches become nested classes implementing it
fn resolve_interface(ctx: &mut GenerationContext<'_>, id: TargetId, record: ConstraintId) -> Result<()> {
    let interface = ClassRef::Target(id);
    let branches = ctx.arena.get(record).one_of.clone();
    for branch in branches {
        let origin = ctx.arena.get(branch).node;
        match origin.and_then(|node| ctx.target_for_node(node)) {
            Some(implementor) if implementor != id => {
                debug!(interface = %ctx.target(id).name, implementor = %ctx.target(implementor).name, "interface linked");
                let target = ctx.target_mut(implementor);
                if !target.interfaces.contains(&interface) {
                    target.interfaces.push(interface);
                }
                ctx.target_mut(id).add_derived(implementor);
                import_target(ctx, implementor, id);
            }
            Some(_) => {}
            None => {
                if ctx.target(id).find_nested(origin, None).is_some() {
                    continue;
                }
                if ctx.classify(branch, false) != Shape::Object {
                    debug!(interface = %ctx.target(id).name, "non-object inline branch skipped");
                    continue;
                }
                let index = push_variant(ctx, id, None, branch, branch, interface)?;
                let class_ref = ClassRef::Nested { target: id, index };
                settle(ctx, branch, class_ref);
                analyse_object(ctx, id, Some(index), branch, None)?;
            }
        }
    }
    Ok(())
}

/// One merged variant class per branch of an object container: the container's
/// properties plus the branch's, with validations of shared names combined
fn synthesize_variants(
    ctx: &mut GenerationContext<'_>,
    id: TargetId,
    scope: Option<usize>,
    container: ConstraintId,
) -> Result<()> {
    let container_ref = match scope {
        Some(index) => ClassRef::Nested { target: id, index },
        None => ClassRef::Target(id),
    };
    let branches = ctx.arena.get(container).one_of.clone();
    for branch in branches {
        let origin = ctx.arena.get(branch).node;
        if ctx.target(id).find_nested(origin, None).is_some() {
            continue;
        }

        let variant = ctx.arena.duplicate(container);
        let properties: Vec<ConstraintId> = ctx
            .arena
            .get(variant)
            .properties
            .clone()
            .into_iter()
            .map(|p| ctx.arena.duplicate(p))
            .collect();
        {
            let v = ctx.arena.get_mut(variant);
            v.node = origin;
            v.properties = properties;
            v.one_of.clear();
            v.type_ref = None;
            v.shape = None;
        }
        let index = push_variant(ctx, id, scope, variant, branch, container_ref)?;
        settle(ctx, variant, ClassRef::Nested { target: id, index });

        let branch_properties = ctx.arena.get(branch).properties.clone();
        for branch_property in branch_properties {
            let name = ctx.arena.get(branch_property).name.clone().unwrap_or_default();
            analyse_record(ctx, id, Some(index), branch_property, Role::Property(&name))?;
            match ctx.arena.property(variant, &name) {
                Some(existing) => {
                    let added = ctx.arena.validations(branch_property).clone();
                    ctx.arena.validations_mut(existing).extend(&added);
                }
                None => ctx.arena.get_mut(variant).properties.push(branch_property),
            }
        }

        let container_required = ctx.arena.get(container).required.clone();
        let branch_required = ctx.arena.get(branch).required.clone();
        for name in &branch_required {
            if !container_required.contains(name) {
                // nullability implied by the container no longer applies
                if let Some(p) = ctx.arena.property(variant, name) {
                    ctx.arena.get_mut(p).nullable = None;
                }
            }
            ctx.arena.get_mut(variant).add_required(name);
        }

        plan_validations(ctx, id, variant, &Shape::Object);
        reconcile_required(ctx, variant);
    }
    Ok(())
}

/// Register a variant class built on `record`, named from the branch title
fn push_variant(
    ctx: &mut GenerationContext<'_>,
    id: TargetId,
    scope: Option<usize>,
    record: ConstraintId,
    branch: ConstraintId,
    implements: ClassRef,
) -> Result<usize> {
    let (origin, title) = {
        let b = ctx.arena.get(branch);
        (b.node, b.title.clone())
    };
    let candidate = match title {
        Some(title) => ctx.namer.class_name(&title),
        None => "Variant".to_string(),
    };
    let name = {
        let target = ctx.target(id);
        allocate_name(&candidate, |c| target.nested_name_taken(scope, c))?
    };
    debug!(target = %ctx.target(id).name, variant = %name, "variant class");

    let target = ctx.target_mut(id);
    target.nested.push(NestedClass {
        name,
        parent: scope,
        kind: TargetKind::Class,
        record,
        origin,
        ref_target: None,
        interfaces: vec![implements],
        variant: true,
    });
    Ok(target.nested.len() - 1)
}
