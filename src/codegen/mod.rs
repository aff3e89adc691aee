//! Code Generation
//!
//! Drives one generation run from schema documents to the renderer-facing IR.
//!
//! Architecture:
//! - `Generator`: owns the configuration, builds a fresh context per run
//! - `GenerationContext`: all mutable state of a run (see [`crate::analysis`])
//! - `ir`: pure projection of the resolved context
//! - `emit`: renderers that consume the IR
//!
//! The key constraint: renderers NEVER read raw schema JSON - only IR fields.

pub mod config;
pub mod emit;
pub mod ir;
pub mod names;

use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::analysis::{resolve, GenerationContext, Shape, TargetKind};
use crate::error::{CodegenError, Result};
use crate::schema::{load_path, LoadConfig, LoadedDocument, NodeId, SchemaParser};

pub use config::{CodegenConfig, TargetLanguage};
pub use emit::{JsonRenderer, Renderer};
pub use ir::{ClassIr, GeneratedOutput, PatternPropertyIr, PropertyIr, TypeIr, ValueIr};

// =============================================================================
// Generator
// =============================================================================

/// Runs the analysis pipeline over a set of schema documents
#[derive(Debug, Clone)]
pub struct Generator {
    config: CodegenConfig,
    load_config: LoadConfig,
}

impl Generator {
    pub fn new(config: CodegenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            load_config: LoadConfig::default(),
        })
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    /// Load every schema under the given files or directories and generate
    pub fn generate_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<GeneratedOutput> {
        let mut documents = Vec::new();
        for path in paths {
            documents.extend(load_path(path.as_ref(), &self.load_config)?);
        }
        self.generate_documents(documents)
    }

    /// Generate from in-memory documents keyed by URI
    pub fn generate_values(&self, documents: Vec<(String, Value)>) -> Result<GeneratedOutput> {
        let documents = documents
            .into_iter()
            .map(|(uri, content)| LoadedDocument {
                path: uri.clone().into(),
                uri,
                sub_directories: Vec::new(),
                content,
            })
            .collect();
        self.generate_documents(documents)
    }

    pub fn generate_documents(&self, documents: Vec<LoadedDocument>) -> Result<GeneratedOutput> {
        info!(count = documents.len(), "generating from schema documents");

        // Register all documents first so cross-document refs resolve
        let mut parser = SchemaParser::new();
        let mut inputs = Vec::with_capacity(documents.len());
        for document in documents {
            let uri = parser.add_document(&document.uri, document.content);
            inputs.push((uri, document.sub_directories));
        }
        let mut roots = Vec::with_capacity(inputs.len());
        for (uri, sub_directories) in inputs {
            let root = parser.parse_document(&uri)?;
            roots.push((uri, sub_directories, root));
        }
        let tree = parser.into_tree();

        let mut ctx = GenerationContext::new(&tree, &self.config);
        for (uri, sub_directories, root) in &roots {
            self.register_root(&mut ctx, uri, sub_directories, *root)?;
        }

        resolve(&mut ctx)?;

        let classes = ir::project(&ctx);
        info!(
            classes = classes.len(),
            diagnostics = ctx.diagnostics.len(),
            "generation finished"
        );

        let blocking = ctx.diagnostics.blocking_count();
        if self.config.generator.examples_blocking && blocking > 0 {
            return Err(CodegenError::BlockingDiagnostics { count: blocking });
        }

        Ok(GeneratedOutput {
            generator_comment: self.config.generator.generator_comment.clone(),
            language: self.config.generator.target_language,
            classes,
            diagnostics: ctx.diagnostics,
        })
    }

    // =========================================================================
    // Top-level registration
    // =========================================================================

    fn register_root(
        &self,
        ctx: &mut GenerationContext<'_>,
        uri: &str,
        sub_directories: &[String],
        root: NodeId,
    ) -> Result<()> {
        let record = ctx.walk_new(root)?;
        let kind = match ctx.classify(record, true) {
            Shape::Object => TargetKind::Class,
            Shape::EnumOfIdentifiers => TargetKind::Enum,
            Shape::Untyped if !ctx.arena.get(record).one_of.is_empty() => TargetKind::Interface,
            shape => {
                info!(uri, ?shape, "schema does not generate a class");
                ctx.diagnostics
                    .skipped_schema(&ctx.tree.get(root).location, "not an object, enum or union schema");
                return Ok(());
            }
        };

        let name = self.class_name(ctx, uri, root);
        let package = self.package(sub_directories);
        let id = ctx.register_target(&name, package, uri, root, record, kind)?;
        debug!(uri, name = %ctx.target(id).qualified_name(), ?kind, "registered target");
        Ok(())
    }

    /// Override table, then the document URI, then the title, then a counter
    fn class_name(&self, ctx: &mut GenerationContext<'_>, uri: &str, root: NodeId) -> String {
        if let Some(name) = self.config.class_names.get(uri) {
            return name.clone();
        }
        if let Some(name) = ctx.namer.from_uri(uri) {
            return name;
        }
        if let Some(title) = &ctx.tree.get(root).title {
            let name = ctx.namer.class_name(title);
            if !name.is_empty() {
                return name;
            }
        }
        ctx.next_generated_class_name()
    }

    fn package(&self, sub_directories: &[String]) -> Option<String> {
        let mut parts: Vec<String> = self
            .config
            .generator
            .base_package
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        if self.config.generator.derive_package_from_structure {
            parts.extend(
                sub_directories
                    .iter()
                    .map(|d| d.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
                    .filter(|d| !d.is_empty()),
            );
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Generate the IR for schema files or directories with the given configuration
pub fn generate<P: AsRef<Path>>(paths: &[P], config: CodegenConfig) -> Result<GeneratedOutput> {
    Generator::new(config)?.generate_paths(paths)
}
