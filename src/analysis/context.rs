//! Generation Context
//!
//! Owns all mutable state of one generation run: the constraint arena, the
//! targets, diagnostics and the synthetic class counter. Every pass receives the
//! context explicitly, so independent runs never share anything.

use std::collections::HashMap;

use super::classify::{self, Shape};
use super::constraints::{ConstraintArena, ConstraintId};
use super::diagnostics::Diagnostics;
use super::target::{Target, TargetId, TargetKind};
use super::walker::SchemaWalker;
use crate::codegen::config::{CodegenConfig, TargetLanguage};
use crate::codegen::names::{allocate_name, ClassNamer};
use crate::error::Result;
use crate::schema::{NodeId, SchemaTree};

/// State of one generation run
pub struct GenerationContext<'a> {
    pub tree: &'a SchemaTree,
    pub config: &'a CodegenConfig,
    pub arena: ConstraintArena,
    pub targets: Vec<Target>,
    pub diagnostics: Diagnostics,
    pub namer: ClassNamer,
    target_by_node: HashMap<NodeId, TargetId>,
    generated_class_count: usize,
}

impl<'a> GenerationContext<'a> {
    pub fn new(tree: &'a SchemaTree, config: &'a CodegenConfig) -> Self {
        Self {
            tree,
            config,
            arena: ConstraintArena::new(),
            targets: Vec::new(),
            diagnostics: Diagnostics::new(),
            namer: ClassNamer::new(config.naming.clone()),
            target_by_node: HashMap::new(),
            generated_class_count: 0,
        }
    }

    pub fn language(&self) -> TargetLanguage {
        self.config.generator.target_language
    }

    pub fn strict(&self) -> bool {
        self.config.generator.strict_additional_properties
    }

    /// Walker borrowing this context's arena and diagnostics
    pub fn walker(&mut self) -> SchemaWalker<'_> {
        SchemaWalker::new(self.tree, &mut self.arena, &mut self.diagnostics)
    }

    /// Walk a schema node into a fresh record
    pub fn walk_new(&mut self, node: NodeId) -> Result<ConstraintId> {
        let record = self.arena.create(Some(node), None);
        self.walker().walk(node, record)?;
        Ok(record)
    }

    pub fn classify(&self, id: ConstraintId, promote_enums: bool) -> Shape {
        classify::classify(&self.arena, self.tree, &self.config.custom_classes, id, promote_enums)
    }

    pub fn target(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    pub fn target_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.targets[id.0]
    }

    /// Target generated for a node, following pure `$ref` chains
    pub fn target_for_node(&self, node: NodeId) -> Option<TargetId> {
        let mut current = node;
        for _ in 0..=self.tree.len() {
            if let Some(id) = self.target_by_node.get(&current) {
                return Some(*id);
            }
            current = self.tree.pure_ref_target(current)?;
        }
        None
    }

    /// Promote a walked record to a target, de-colliding its name within the package
    pub fn register_target(
        &mut self,
        name: &str,
        package: Option<String>,
        uri: &str,
        node: NodeId,
        record: ConstraintId,
        kind: TargetKind,
    ) -> Result<TargetId> {
        let name = allocate_name(name, |candidate| {
            self.targets
                .iter()
                .any(|t| t.package == package && t.name == candidate)
        })?;
        let id = TargetId(self.targets.len());
        self.targets
            .push(Target::new(id, name, package, uri.to_string(), node, record, kind));
        self.target_by_node.insert(node, id);
        Ok(id)
    }

    /// `GeneratedClass<n>` for schemas with nothing better to name them by
    pub fn next_generated_class_name(&mut self) -> String {
        let name = format!("GeneratedClass{}", self.generated_class_count);
        self.generated_class_count += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaParser;
    use serde_json::json;

    #[test]
    fn test_register_target_decollides_per_package() {
        let tree = SchemaTree::new();
        let config = CodegenConfig::default();
        let mut ctx = GenerationContext::new(&tree, &config);
        let a = ctx.arena.create(None, None);
        let first = ctx
            .register_target("Person", Some("p".into()), "file:///a.json", NodeId(0), a, TargetKind::Class)
            .unwrap();
        let second = ctx
            .register_target("Person", Some("p".into()), "file:///b.json", NodeId(1), a, TargetKind::Class)
            .unwrap();
        let other = ctx
            .register_target("Person", Some("q".into()), "file:///c.json", NodeId(2), a, TargetKind::Class)
            .unwrap();
        assert_eq!(ctx.target(first).name, "Person");
        assert_eq!(ctx.target(second).name, "Person1");
        assert_eq!(ctx.target(other).name, "Person");
    }

    #[test]
    fn test_target_for_node_follows_refs() {
        let mut parser = SchemaParser::new();
        let uri = parser.add_document(
            "file:///s/a.json",
            json!({
                "type": "object",
                "properties": { "self": { "$ref": "#/definitions/alias" } },
                "definitions": { "alias": { "$ref": "#" } }
            }),
        );
        let root = parser.parse_document(&uri).unwrap();
        let tree = parser.into_tree();
        let alias = tree.find("file:///s/a.json#/definitions/alias").unwrap();
        let config = CodegenConfig::default();
        let mut ctx = GenerationContext::new(&tree, &config);
        let record = ctx.walk_new(root).unwrap();
        let id = ctx
            .register_target("A", None, &uri, root, record, TargetKind::Class)
            .unwrap();
        assert_eq!(ctx.target_for_node(root), Some(id));
        assert_eq!(ctx.target_for_node(alias), Some(id));
    }

    #[test]
    fn test_generated_class_names_count_per_run() {
        let tree = SchemaTree::new();
        let config = CodegenConfig::default();
        let mut ctx = GenerationContext::new(&tree, &config);
        assert_eq!(ctx.next_generated_class_name(), "GeneratedClass0");
        assert_eq!(ctx.next_generated_class_name(), "GeneratedClass1");
        let mut other = GenerationContext::new(&tree, &config);
        assert_eq!(other.next_generated_class_name(), "GeneratedClass0");
    }
}
