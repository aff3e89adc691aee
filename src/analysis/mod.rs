//! Constraint Analysis
//!
//! The engine between the parsed schema tree and the renderer-facing IR:
//! - `walker`: merges schema keywords into constraint records
//! - `classify`: decides each record's generated-type shape
//! - `resolver`: links bases, interfaces and variants across targets
//! - `planner`: decides which constraints become runtime checks
//!
//! All state of one run lives in a [`GenerationContext`].

pub mod classify;
pub mod constraints;
pub mod context;
pub mod diagnostics;
pub mod planner;
pub mod resolver;
pub mod target;
pub mod validation;
pub mod walker;

// Re-export key types from submodules
pub use classify::{Shape, SystemType};
pub use constraints::{AdditionalProperties, Bound, ConstraintArena, ConstraintId, Constraints, DefaultValue};
pub use context::GenerationContext;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use resolver::resolve;
pub use target::{ClassRef, StaticConstant, StaticKind, StaticValue, Target, TargetId, TargetKind, TypeRef};
pub use validation::{Validation, ValidationSet, ValidationType, ValidationValue};
pub use walker::SchemaWalker;
