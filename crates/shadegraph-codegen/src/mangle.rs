//! Identifier mangling.
//!
//! Pure transform from IR ids to emitted identifiers. Every namespace gets a
//! distinct prefix, so ids from different namespaces can never collide and no
//! mangled name can equal a target-language keyword (no C++ keyword starts
//! with any of the prefixes).

/// Emission namespace of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Variable,
    Input,
    Function,
    Struct,
    Field,
    NodeResult,
    LoopIndex,
}

impl Namespace {
    /// The namespace prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Variable => "v_",
            Namespace::Input => "i_",
            Namespace::Function => "func_",
            Namespace::Struct => "S_",
            Namespace::Field => "f_",
            Namespace::NodeResult => "n_",
            Namespace::LoopIndex => "loop_",
        }
    }
}

/// Mangles a raw IR id into a target identifier for the given namespace.
///
/// Characters outside `[A-Za-z0-9_]` become `_`. Applying the mangler to an
/// already-mangled id of the same namespace is a no-op.
pub fn mangle(raw: &str, ns: Namespace) -> String {
    let clean = sanitize(raw);
    if clean.starts_with(ns.prefix()) {
        return clean;
    }
    format!("{}{}", ns.prefix(), clean)
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
