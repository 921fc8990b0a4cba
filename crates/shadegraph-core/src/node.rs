//! Graph nodes and their op classification.
//!
//! A node is an id, an op string, and the remaining attributes as a raw bag
//! ([`AttrValue`] map). The op set is open-ended in the IR, so the node stays
//! generic; [`OpClass`] gives the closed classification that drives which
//! nodes have results and which participate in control flow.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attr::AttrValue;

/// A node in a function graph.
///
/// `id` is unique within its function. Every field other than `id` and `op`
/// lands in `attrs`, in document order -- edge reconstruction and argument
/// resolution iterate the bag in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub op: String,
    #[serde(flatten)]
    pub attrs: IndexMap<String, AttrValue>,
}

impl Node {
    /// Raw attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// String-typed attribute.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    /// Number-typed attribute.
    pub fn attr_number(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(AttrValue::as_number)
    }

    /// Bool-typed attribute.
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(AttrValue::as_bool)
    }

    /// List-typed attribute.
    pub fn attr_list(&self, key: &str) -> Option<&[AttrValue]> {
        self.attr(key).and_then(AttrValue::as_list)
    }

    /// Map-typed attribute.
    pub fn attr_map(&self, key: &str) -> Option<&IndexMap<String, AttrValue>> {
        self.attr(key).and_then(AttrValue::as_map)
    }

    /// Classification of this node's op.
    pub fn class(&self) -> OpClass {
        OpClass::of(&self.op)
    }

    /// `true` if the node produces a value usable through data edges.
    ///
    /// `call_func` is conditional on the callee declaring outputs, which the
    /// data model cannot see; callers resolve that against the document.
    pub fn has_result(&self) -> bool {
        self.class().has_result()
    }

    /// `true` if the node's class participates in control flow (nodes with
    /// outgoing execution edges are additionally executable regardless of
    /// class; that is an edge-level question).
    pub fn is_executable_class(&self) -> bool {
        self.class().is_executable()
    }
}

/// Node classification per op family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// `literal`, `float`, `int`, `loop_index`, `math_pi`.
    Literal,
    /// `floatN`, matrix/quat constructors, `struct_construct`, `array_construct`.
    Constructor,
    /// `var_get`, `struct_extract`, `array_extract`, swizzles, `array_length`.
    Accessor,
    /// `math_*`, `vec_*`, `quat_*`, `mat_*`, `color_mix`.
    Arithmetic,
    /// `buffer_load`, `texture_sample`, resource metadata reads, `builtin_get`.
    Load,
    /// `static_cast_*`.
    Cast,
    /// `call_func`.
    Call,
    /// `var_set`, `array_set`, `buffer_store`, `texture_store`.
    Assign,
    /// `flow_branch`, `flow_loop`, `func_return`.
    Control,
    /// `cmd_*`.
    Command,
    /// Anything else; surfaced as `UnknownOp` when reached by emission.
    Unknown,
}

impl OpClass {
    /// Classifies an op string.
    pub fn of(op: &str) -> OpClass {
        match op {
            "literal" | "float" | "int" | "loop_index" | "math_pi" => return OpClass::Literal,
            "float2" | "float3" | "float4" | "float3x3" | "float4x4" | "quat"
            | "struct_construct" | "array_construct" => return OpClass::Constructor,
            "var_get" | "struct_extract" | "array_extract" | "vec_swizzle"
            | "vec_get_element" | "array_length" => return OpClass::Accessor,
            "buffer_load" | "texture_sample" | "resource_get_size" | "resource_get_format"
            | "builtin_get" => return OpClass::Load,
            "call_func" => return OpClass::Call,
            "var_set" | "array_set" | "buffer_store" | "texture_store" => {
                return OpClass::Assign
            }
            "flow_branch" | "flow_loop" | "func_return" => return OpClass::Control,
            "color_mix" => return OpClass::Arithmetic,
            _ => {}
        }
        if op.starts_with("static_cast_") {
            OpClass::Cast
        } else if op.starts_with("cmd_") {
            OpClass::Command
        } else if op.starts_with("math_")
            || op.starts_with("vec_")
            || op.starts_with("quat_")
            || op.starts_with("mat_")
        {
            OpClass::Arithmetic
        } else {
            OpClass::Unknown
        }
    }

    /// `true` for classes whose nodes carry a result value. `Call` counts;
    /// the void-callee case is resolved against the document by callers.
    pub fn has_result(&self) -> bool {
        matches!(
            self,
            OpClass::Literal
                | OpClass::Constructor
                | OpClass::Accessor
                | OpClass::Arithmetic
                | OpClass::Load
                | OpClass::Cast
                | OpClass::Call
        )
    }

    /// `true` for classes that participate in control flow by themselves.
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            OpClass::Assign | OpClass::Control | OpClass::Call | OpClass::Command
        )
    }
}
