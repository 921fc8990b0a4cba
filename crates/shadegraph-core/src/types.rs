//! The IR type grammar.
//!
//! Types arrive as strings (`float`, `float3`, `array<float, 8>`, a struct
//! id, ...) and are parsed into [`ValueType`]. Parsing knows the built-in
//! grammar only; whether an unrecognised name is a struct id is decided
//! against the document (see [`ValueType::resolve`]).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::IrDocument;

/// A parsed IR type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Int,
    Uint,
    Bool,
    /// Fixed float vector of width 2, 3, or 4.
    Vec(u8),
    /// 3x3 float matrix (9 components).
    Mat3,
    /// 4x4 float matrix (16 components).
    Mat4,
    /// Quaternion (4 components).
    Quat,
    /// `array<T, N>`; `len` is `None` for dynamic arrays (`array<T>`).
    Array {
        elem: Box<ValueType>,
        len: Option<usize>,
    },
    /// A user struct, by IR struct id.
    Struct(String),
    Void,
    /// Inference could not determine a type; coercion degrades to identity.
    Unknown,
}

impl ValueType {
    /// Parses a built-in type string. Returns `None` for anything that is not
    /// part of the built-in grammar (candidate struct ids included).
    pub fn parse(s: &str) -> Option<ValueType> {
        let s = s.trim();
        match s {
            "float" => return Some(ValueType::Float),
            "int" | "i32" => return Some(ValueType::Int),
            "uint" | "u32" => return Some(ValueType::Uint),
            "bool" => return Some(ValueType::Bool),
            "float2" => return Some(ValueType::Vec(2)),
            "float3" => return Some(ValueType::Vec(3)),
            "float4" => return Some(ValueType::Vec(4)),
            "float3x3" => return Some(ValueType::Mat3),
            "float4x4" => return Some(ValueType::Mat4),
            "quat" => return Some(ValueType::Quat),
            "void" => return Some(ValueType::Void),
            _ => {}
        }
        if let Some(inner) = s.strip_prefix("array<").and_then(|r| r.strip_suffix('>')) {
            // Split element type from the optional length at the top-level
            // comma (nested arrays carry their own commas).
            let mut depth = 0usize;
            let mut split = None;
            for (i, c) in inner.char_indices() {
                match c {
                    '<' => depth += 1,
                    '>' => depth = depth.saturating_sub(1),
                    ',' if depth == 0 => {
                        split = Some(i);
                        break;
                    }
                    _ => {}
                }
            }
            return match split {
                Some(i) => {
                    let elem = ValueType::parse(&inner[..i])?;
                    let len: usize = inner[i + 1..].trim().parse().ok()?;
                    Some(ValueType::Array {
                        elem: Box::new(elem),
                        len: Some(len),
                    })
                }
                None => {
                    let elem = ValueType::parse(inner)?;
                    Some(ValueType::Array {
                        elem: Box::new(elem),
                        len: None,
                    })
                }
            };
        }
        None
    }

    /// Parses a type string against a document: built-in grammar first, then
    /// struct ids. `None` means the string is unknown to both.
    pub fn resolve(s: &str, doc: &IrDocument) -> Option<ValueType> {
        if let Some(t) = ValueType::parse(s) {
            return Some(t);
        }
        doc.struct_def(s).map(|sd| ValueType::Struct(sd.id.clone()))
    }

    /// `true` for `Float`, `Int`, `Uint`, and `Bool`.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ValueType::Float | ValueType::Int | ValueType::Uint | ValueType::Bool
        )
    }

    /// `true` for integer-like scalars (`Int`, `Uint`, `Bool`).
    pub fn is_integer_like(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Uint | ValueType::Bool)
    }

    /// Number of float components for the fixed-size float aggregates.
    /// `None` for scalars of other families, structs, arrays, and unknowns.
    pub fn float_components(&self) -> Option<usize> {
        match self {
            ValueType::Float => Some(1),
            ValueType::Vec(n) => Some(*n as usize),
            ValueType::Mat3 => Some(9),
            ValueType::Mat4 => Some(16),
            ValueType::Quat => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Float => write!(f, "float"),
            ValueType::Int => write!(f, "int"),
            ValueType::Uint => write!(f, "uint"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Vec(n) => write!(f, "float{n}"),
            ValueType::Mat3 => write!(f, "float3x3"),
            ValueType::Mat4 => write!(f, "float4x4"),
            ValueType::Quat => write!(f, "quat"),
            ValueType::Array {
                elem,
                len: Some(n),
            } => write!(f, "array<{elem}, {n}>"),
            ValueType::Array { elem, len: None } => write!(f, "array<{elem}>"),
            ValueType::Struct(id) => write!(f, "{id}"),
            ValueType::Void => write!(f, "void"),
            ValueType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A named struct with ordered members. No inheritance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub id: String,
    #[serde(default)]
    pub members: Vec<StructMember>,
}

/// One struct member: a name and an IR type string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl StructDef {
    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalars_parse() {
        assert_eq!(ValueType::parse("float"), Some(ValueType::Float));
        assert_eq!(ValueType::parse("int"), Some(ValueType::Int));
        assert_eq!(ValueType::parse("i32"), Some(ValueType::Int));
        assert_eq!(ValueType::parse("uint"), Some(ValueType::Uint));
        assert_eq!(ValueType::parse("u32"), Some(ValueType::Uint));
        assert_eq!(ValueType::parse("bool"), Some(ValueType::Bool));
    }

    #[test]
    fn vectors_and_matrices_parse() {
        assert_eq!(ValueType::parse("float2"), Some(ValueType::Vec(2)));
        assert_eq!(ValueType::parse("float3"), Some(ValueType::Vec(3)));
        assert_eq!(ValueType::parse("float4"), Some(ValueType::Vec(4)));
        assert_eq!(ValueType::parse("float3x3"), Some(ValueType::Mat3));
        assert_eq!(ValueType::parse("float4x4"), Some(ValueType::Mat4));
        assert_eq!(ValueType::parse("quat"), Some(ValueType::Quat));
    }

    #[test]
    fn fixed_array_parses() {
        assert_eq!(
            ValueType::parse("array<float, 8>"),
            Some(ValueType::Array {
                elem: Box::new(ValueType::Float),
                len: Some(8),
            })
        );
    }

    #[test]
    fn nested_array_parses() {
        assert_eq!(
            ValueType::parse("array<array<float3, 2>, 4>"),
            Some(ValueType::Array {
                elem: Box::new(ValueType::Array {
                    elem: Box::new(ValueType::Vec(3)),
                    len: Some(2),
                }),
                len: Some(4),
            })
        );
    }

    #[test]
    fn dynamic_array_parses() {
        assert_eq!(
            ValueType::parse("array<float>"),
            Some(ValueType::Array {
                elem: Box::new(ValueType::Float),
                len: None,
            })
        );
    }

    #[test]
    fn unknown_strings_do_not_parse() {
        assert_eq!(ValueType::parse("texture2d"), None);
        assert_eq!(ValueType::parse("MyStruct"), None);
        assert_eq!(ValueType::parse("array<wat, 3>"), None);
        assert_eq!(ValueType::parse("array<float, x>"), None);
    }

    #[test]
    fn float_components() {
        assert_eq!(ValueType::Float.float_components(), Some(1));
        assert_eq!(ValueType::Vec(3).float_components(), Some(3));
        assert_eq!(ValueType::Mat3.float_components(), Some(9));
        assert_eq!(ValueType::Mat4.float_components(), Some(16));
        assert_eq!(ValueType::Quat.float_components(), Some(4));
        assert_eq!(ValueType::Bool.float_components(), None);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let cases = [
            ValueType::Float,
            ValueType::Int,
            ValueType::Uint,
            ValueType::Bool,
            ValueType::Vec(2),
            ValueType::Vec(4),
            ValueType::Mat3,
            ValueType::Mat4,
            ValueType::Quat,
            ValueType::Array {
                elem: Box::new(ValueType::Vec(3)),
                len: Some(5),
            },
            ValueType::Array {
                elem: Box::new(ValueType::Float),
                len: None,
            },
            ValueType::Void,
        ];
        for t in cases {
            assert_eq!(ValueType::parse(&t.to_string()), Some(t.clone()), "{t}");
        }
    }

    proptest! {
        #[test]
        fn arbitrary_fixed_float_arrays_roundtrip(len in 1usize..64) {
            let t = ValueType::Array {
                elem: Box::new(ValueType::Float),
                len: Some(len),
            };
            prop_assert_eq!(ValueType::parse(&t.to_string()), Some(t));
        }
    }
}
