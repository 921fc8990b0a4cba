//! Compile error types covering all failure modes.
//!
//! The compiler either returns a complete result or one of these; there are
//! no soft/recovered failures. Every variant carries the offending
//! identifier, and where one exists, the node id.

use thiserror::Error;

/// Errors produced by [`compile`](crate::compile).
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The requested entry point id does not name a function.
    #[error("entry point not found: '{id}'")]
    EntryNotFound { id: String },

    /// A referenced function id does not exist in the document.
    #[error("function not found: '{id}'")]
    FunctionNotFound { id: String },

    /// The CPU call graph contains a cycle reachable from the entry.
    #[error("recursive call chain: {}", path.join(" -> "))]
    Recursion { path: Vec<String> },

    /// A `var` reference resolves to no local, function input, or global
    /// input.
    #[error("unknown variable '{var}' at node '{node}'")]
    UnknownVariable { node: String, var: String },

    /// A struct id is not defined in the document.
    #[error("unknown struct: '{id}'")]
    UnknownStruct { id: String },

    /// An op string the emitter does not recognise.
    #[error("unknown op '{op}' at node '{node}'")]
    UnknownOp { op: String, node: String },

    /// A GPU builtin with no CPU fallback.
    #[error("builtin '{name}' has no CPU fallback")]
    UnsupportedBuiltin { name: String },

    /// A type string that is neither part of the built-in grammar nor a
    /// struct id.
    #[error("unknown type: '{ty}'")]
    UnknownType { ty: String },

    /// A literal value the target language cannot represent (non-finite).
    #[error("unsupported literal: {value}")]
    UnsupportedLiteral { value: String },
}
