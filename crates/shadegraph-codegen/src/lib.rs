//! Source generation for shadegraph IR documents.
//!
//! This crate lowers the hybrid data-flow/control-flow IR into a
//! self-contained C++ source file targeting the fixed runtime harness ABI,
//! plus the ordered external-resource ids and descriptors of any shader
//! functions referenced by dispatch nodes.
//!
//! # Modules
//!
//! - [`error`] -- Typed errors for every compile failure mode
//! - [`mangle`] -- Namespaced identifier mangling
//! - [`types`] -- IR type to target type mapping
//! - [`literal`] -- Numeric/boolean/array literal formatting
//! - [`edges`] -- Per-function port-keyed edge index
//! - [`callgraph`] -- Required-function discovery and recursion detection
//! - [`infer`] -- Per-node result type inference
//! - [`expr`] -- Recursive pure-expression compilation with memoisation
//! - [`flow`] -- Execution-chain walking and statement emission
//! - [`func`] / [`document`] -- Function and document emitters

pub mod callgraph;
pub mod document;
pub mod edges;
pub mod error;
pub mod expr;
pub mod flow;
pub mod func;
pub mod infer;
pub mod literal;
pub mod mangle;
pub mod types;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use document::compile;
pub use error::CompileError;

/// Result of a successful compile: the emitted source, the canonical
/// resource binding order, and descriptors for every referenced shader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    /// The emitted target source text.
    pub code: String,
    /// External resource ids in canonical order; the position of an id is
    /// the binding index the emitted code uses for it.
    pub resource_ids: Vec<String>,
    /// Shader functions referenced by dispatch/draw nodes, with their
    /// declared inputs.
    pub shader_refs: Vec<ShaderRef>,
}

/// A shader function referenced by the compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderRef {
    pub id: String,
    pub inputs: Vec<ShaderParam>,
}

/// One declared shader input: id plus IR type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderParam {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
}
