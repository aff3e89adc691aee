//! Schema Codegen
//!
//! Constraint resolution and type inference for JSON Schema. Schema documents go
//! in; a renderer-facing IR of classes, enums and interfaces comes out.
//!
//! ## Features
//!
//! - **Constraint Merging**: every keyword reaching a node, through `allOf` and
//!   `$ref` chains, is folded into one record with a negated mirror
//! - **Type Inference**: each record maps to exactly one generated-type shape
//! - **Inheritance**: base classes, interfaces and one-of variants are derived
//!   from schema composition
//! - **Validation Planning**: only constraints the chosen type can't express
//!   become runtime checks
//! - **Stable Naming**: collision-free class and field identifiers per target
//!   language
//!
//! ## Architecture
//!
//! ```text
//! documents ─▶ schema (tree) ─▶ analysis::walker ─▶ analysis::classify
//!                                                        │
//!              codegen::emit ◀─ codegen::ir ◀─ analysis::resolver + planner
//! ```

pub mod analysis;
pub mod codegen;
pub mod config;
pub mod error;
pub mod schema;

pub use analysis::{Diagnostics, GenerationContext};
pub use codegen::{generate, CodegenConfig, GeneratedOutput, Generator, JsonRenderer, Renderer, TargetLanguage};
pub use error::{CodegenError, ErrorCategory, Result};
