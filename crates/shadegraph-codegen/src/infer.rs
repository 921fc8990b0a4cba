//! Per-function compile context and type inference.
//!
//! [`FunctionCx`] owns every cache a single function emission needs: the
//! edge index, the inference cache, and the memo table of already-emitted
//! pure nodes. All of it is discarded when the function is done; nothing
//! outlives one `compile` call.
//!
//! Inference is total: when a type cannot be determined (missing op, missing
//! struct, unresolved variable) the node type is [`ValueType::Unknown`] and
//! coercion degrades to identity. Hard errors surface later, at emission.

use std::collections::{HashMap, HashSet};

use shadegraph_core::{AttrValue, Function, IrDocument, Node, ValueType};

/// Ops that read a single operand from the `val` port.
pub(crate) const UNARY_OPS: &[&str] = &[
    "math_neg",
    "math_abs",
    "math_sign",
    "math_floor",
    "math_ceil",
    "math_round",
    "math_fract",
    "math_sqrt",
    "math_sin",
    "math_cos",
    "math_tan",
    "math_asin",
    "math_acos",
    "math_atan",
    "math_exp",
    "math_log",
];

/// Element-wise binary ops reading `a` and `b`.
pub(crate) const BINARY_OPS: &[&str] = &[
    "math_add",
    "math_sub",
    "math_mul",
    "math_div",
    "math_mod",
    "math_pow",
    "math_min",
    "math_max",
    "math_atan2",
];

/// Comparison ops producing the element-wise boolean-as-float mask.
pub(crate) const COMPARE_OPS: &[&str] = &[
    "math_eq",
    "math_neq",
    "math_gt",
    "math_lt",
    "math_ge",
    "math_le",
];

/// Builtins with a CPU fallback; everything else fails `UnsupportedBuiltin`.
pub(crate) const CPU_BUILTINS: &[&str] = &["time", "delta_time", "frame", "resolution"];

use crate::edges::EdgeIndex;

/// All per-function state for one emission pass.
pub(crate) struct FunctionCx<'a> {
    pub doc: &'a IrDocument,
    pub func: &'a Function,
    pub edges: EdgeIndex,
    node_map: HashMap<&'a str, usize>,
    type_cache: HashMap<String, ValueType>,
    /// Node id -> emitted identifier for memoised pure nodes and value calls.
    pub(crate) memo: HashMap<String, String>,
    /// Names of helper temporaries already declared in this function.
    pub(crate) temps: HashSet<String>,
}

impl<'a> FunctionCx<'a> {
    pub fn new(doc: &'a IrDocument, func: &'a Function) -> Self {
        FunctionCx {
            doc,
            func,
            edges: EdgeIndex::build(func),
            node_map: func.node_map(),
            type_cache: HashMap::new(),
            memo: HashMap::new(),
            temps: HashSet::new(),
        }
    }

    /// Node lookup; the returned reference borrows the function, not the
    /// context.
    pub fn node(&self, id: &str) -> Option<&'a Node> {
        let func = self.func;
        self.node_map.get(id).map(move |&i| &func.nodes[i])
    }

    // -----------------------------------------------------------------------
    // Type inference
    // -----------------------------------------------------------------------

    /// Inferred result type of a node, cached per function.
    pub fn infer(&mut self, id: &str) -> ValueType {
        if let Some(t) = self.type_cache.get(id) {
            return t.clone();
        }
        let t = self.compute_type(id);
        self.type_cache.insert(id.to_string(), t.clone());
        t
    }

    fn compute_type(&mut self, id: &str) -> ValueType {
        let Some(node) = self.node(id) else {
            return ValueType::Unknown;
        };
        let op = node.op.as_str();
        match op {
            "literal" | "float" => self.literal_type(node),
            "int" => ValueType::Int,
            "math_pi" | "loop_index" => ValueType::Float,
            "float2" => ValueType::Vec(2),
            "float3" => ValueType::Vec(3),
            "float4" => ValueType::Vec(4),
            "float3x3" => ValueType::Mat3,
            "float4x4" => ValueType::Mat4,
            "quat" | "quat_mul" | "quat_slerp" | "quat_conjugate" | "quat_normalize"
            | "quat_inverse" | "quat_from_axis_angle" => ValueType::Quat,
            "quat_rotate_vec" | "vec_cross" => ValueType::Vec(3),
            "struct_construct" => match node.attr_str("type") {
                Some(name) if self.doc.struct_def(name).is_some() => {
                    ValueType::Struct(name.to_string())
                }
                _ => ValueType::Unknown,
            },
            "array_construct" => self.array_construct_type(node),
            "var_get" => node
                .attr_str("var")
                .and_then(|v| self.var_type(v))
                .unwrap_or(ValueType::Unknown),
            "struct_extract" => self.struct_extract_type(node),
            "array_extract" => match self.arg_type(node, "array") {
                ValueType::Array { elem, .. } => *elem,
                _ => ValueType::Unknown,
            },
            "vec_swizzle" => {
                let channels = node
                    .attr_str("channels")
                    .or_else(|| node.attr_str("swizzle"))
                    .unwrap_or("");
                match channels.len() {
                    0 => ValueType::Unknown,
                    1 => ValueType::Float,
                    n => ValueType::Vec(n.min(4) as u8),
                }
            }
            "vec_get_element" | "vec_dot" | "vec_length" | "vec_distance"
            | "resource_get_format" => ValueType::Float,
            "array_length" => ValueType::Int,
            "static_cast_float" => ValueType::Float,
            "static_cast_int" => ValueType::Int,
            "static_cast_bool" => ValueType::Bool,
            "call_func" => self.call_type(node),
            "buffer_load" => node
                .attr_str("buffer")
                .and_then(|b| self.doc.resource(b))
                .and_then(|r| r.data_type.as_deref())
                .and_then(ValueType::parse)
                .unwrap_or(ValueType::Float),
            "texture_sample" => ValueType::Vec(4),
            "resource_get_size" => ValueType::Vec(2),
            "builtin_get" => match node.attr_str("name") {
                Some("time") | Some("delta_time") | Some("frame") => ValueType::Float,
                Some("resolution") => ValueType::Vec(2),
                _ => ValueType::Unknown,
            },
            "math_mix" | "color_mix" | "math_step" => {
                let a = self.arg_type(node, "a");
                let b = self.arg_type(node, "b");
                unify(&a, &b)
            }
            "math_clamp" | "math_smoothstep" | "vec_normalize" | "mat_transpose"
            | "mat_inverse" => self.arg_type(node, "val"),
            "math_select" => {
                let t = self.arg_type(node, "t");
                let f = self.arg_type(node, "f");
                unify(&t, &f)
            }
            "vec_reflect" | "vec_refract" => self.arg_type(node, "I"),
            "vec_faceforward" => self.arg_type(node, "N"),
            "mat_mul" => {
                let b = self.arg_type(node, "b");
                if matches!(b, ValueType::Vec(_)) {
                    b
                } else {
                    self.arg_type(node, "a")
                }
            }
            _ if BINARY_OPS.contains(&op) => {
                let a = self.arg_type(node, "a");
                let b = self.arg_type(node, "b");
                unify(&a, &b)
            }
            _ if COMPARE_OPS.contains(&op) => {
                let a = self.arg_type(node, "a");
                let b = self.arg_type(node, "b");
                mask_type(&unify(&a, &b))
            }
            _ if UNARY_OPS.contains(&op) => self.arg_type(node, "val"),
            _ => ValueType::Unknown,
        }
    }

    fn literal_type(&mut self, node: &Node) -> ValueType {
        if let Some(t) = node.attr_str("type").and_then(ValueType::parse) {
            return t;
        }
        match node.attr("val").or_else(|| node.attr("value")) {
            Some(AttrValue::Bool(_)) => ValueType::Bool,
            Some(AttrValue::List(items)) if items.iter().all(|v| v.as_number().is_some()) => {
                ValueType::Array {
                    elem: Box::new(ValueType::Float),
                    len: Some(items.len()),
                }
            }
            _ => ValueType::Float,
        }
    }

    fn array_construct_type(&mut self, node: &Node) -> ValueType {
        if let Some(values) = node.attr_list("values") {
            let values = values.to_vec();
            let mut elem = ValueType::Unknown;
            for v in &values {
                let t = self.attr_entry_type(v);
                elem = unify(&elem, &t);
            }
            return ValueType::Array {
                elem: Box::new(elem),
                len: Some(values.len()),
            };
        }
        if node.attr("fill").is_some() {
            let elem = self.arg_type(node, "fill");
            let len = node.attr_number("count").map(|n| n as usize).unwrap_or(0);
            return ValueType::Array {
                elem: Box::new(elem),
                len: Some(len),
            };
        }
        ValueType::Unknown
    }

    fn struct_extract_type(&mut self, node: &Node) -> ValueType {
        let ValueType::Struct(name) = self.arg_type(node, "struct") else {
            return ValueType::Unknown;
        };
        let Some(def) = self.doc.struct_def(&name) else {
            return ValueType::Unknown;
        };
        let Some(field) = node.attr_str("field") else {
            return ValueType::Unknown;
        };
        def.member(field)
            .and_then(|m| ValueType::resolve(&m.ty, self.doc))
            .unwrap_or(ValueType::Unknown)
    }

    fn call_type(&mut self, node: &Node) -> ValueType {
        let Some(target) = node.attr_str("func") else {
            return ValueType::Unknown;
        };
        match self.doc.function(target) {
            Some(callee) => match callee.outputs.first() {
                Some(out) => ValueType::resolve(&out.ty, self.doc).unwrap_or(ValueType::Unknown),
                None => ValueType::Void,
            },
            None => ValueType::Unknown,
        }
    }

    /// Type of the value feeding `(node, key)`: the source node's type when
    /// a data edge exists, otherwise the shape of the raw attribute.
    pub(crate) fn arg_type(&mut self, node: &Node, key: &str) -> ValueType {
        let from = self
            .edges
            .data_into(&node.id, key)
            .map(|e| e.from.clone());
        if let Some(from) = from {
            return self.infer(&from);
        }
        let value = node
            .attr(key)
            .or_else(|| shadegraph_core::ports::alias(key).and_then(|k| node.attr(k)))
            .cloned();
        match value {
            Some(v) => self.attr_entry_type(&v),
            None => ValueType::Unknown,
        }
    }

    fn attr_entry_type(&mut self, value: &AttrValue) -> ValueType {
        match value {
            AttrValue::Number(_) => ValueType::Float,
            AttrValue::Bool(_) => ValueType::Bool,
            AttrValue::Str(s) => {
                if let Some(t) = self.var_type(s) {
                    t
                } else if self.node(s).is_some() {
                    let id = s.clone();
                    self.infer(&id)
                } else {
                    ValueType::Unknown
                }
            }
            AttrValue::List(items) if value.is_number_list() => match items.len() {
                2 => ValueType::Vec(2),
                3 => ValueType::Vec(3),
                4 => ValueType::Vec(4),
                n => ValueType::Array {
                    elem: Box::new(ValueType::Float),
                    len: Some(n),
                },
            },
            _ => ValueType::Unknown,
        }
    }

    /// Declared type of a variable reference, resolved against locals,
    /// function inputs, then global inputs.
    pub(crate) fn var_type(&self, name: &str) -> Option<ValueType> {
        if let Some(lv) = self.func.local_var(name) {
            return Some(ValueType::resolve(&lv.ty, self.doc).unwrap_or(ValueType::Unknown));
        }
        if let Some(p) = self.func.input(name) {
            return Some(ValueType::resolve(&p.ty, self.doc).unwrap_or(ValueType::Float));
        }
        if let Some(gi) = self.doc.global_input(name) {
            return Some(ValueType::resolve(&gi.ty, self.doc).unwrap_or(ValueType::Unknown));
        }
        None
    }
}

/// Joins two operand types under element-wise broadcasting: equal types
/// join to themselves, `(aggregate, scalar)` broadcasts to the aggregate,
/// mixed scalars widen to float, and unknowns defer to the other side.
pub(crate) fn unify(a: &ValueType, b: &ValueType) -> ValueType {
    use ValueType::*;
    match (a, b) {
        (Unknown, t) | (t, Unknown) => t.clone(),
        _ if a == b => a.clone(),
        (t, s) if !t.is_scalar() && s.is_scalar() => t.clone(),
        (s, t) if s.is_scalar() && !t.is_scalar() => t.clone(),
        (Float, _) | (_, Float) => Float,
        (Int, _) | (_, Int) => Int,
        (Uint, _) | (_, Uint) => Uint,
        _ => a.clone(),
    }
}

/// The boolean-as-float mask type for a comparison over operands of the
/// given joined type: scalars compare to a float, aggregates keep their
/// shape.
fn mask_type(t: &ValueType) -> ValueType {
    if t.is_scalar() || *t == ValueType::Unknown {
        ValueType::Float
    } else {
        t.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx_fixture(v: serde_json::Value) -> IrDocument {
        serde_json::from_value(v).unwrap()
    }

    fn infer_in<'a>(doc: &'a IrDocument, node: &str) -> ValueType {
        let func = doc.function("main").unwrap();
        let mut cx = FunctionCx::new(doc, func);
        cx.infer(node)
    }

    #[test]
    fn literals_default_to_float() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [{"id": "main", "nodes": [
                {"id": "a", "op": "literal", "val": 1},
                {"id": "b", "op": "literal", "val": true},
                {"id": "c", "op": "literal", "val": [1, 2, 3, 4, 5]},
                {"id": "d", "op": "int", "val": 3}
            ]}]
        }));
        assert_eq!(infer_in(&doc, "a"), ValueType::Float);
        assert_eq!(infer_in(&doc, "b"), ValueType::Bool);
        assert_eq!(
            infer_in(&doc, "c"),
            ValueType::Array {
                elem: Box::new(ValueType::Float),
                len: Some(5)
            }
        );
        assert_eq!(infer_in(&doc, "d"), ValueType::Int);
    }

    #[test]
    fn arithmetic_broadcasts_and_widens() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [{"id": "main",
                "local_vars": [{"id": "p", "type": "float3"}],
                "nodes": [
                    {"id": "i", "op": "int", "val": 2},
                    {"id": "f", "op": "literal", "val": 0.5},
                    {"id": "v", "op": "var_get", "var": "p"},
                    {"id": "wide", "op": "math_mul", "a": "i", "b": "f"},
                    {"id": "bcast", "op": "math_add", "a": "v", "b": "f"},
                    {"id": "ints", "op": "math_add", "a": "i", "b": "i"}
                ]}]
        }));
        assert_eq!(infer_in(&doc, "wide"), ValueType::Float);
        assert_eq!(infer_in(&doc, "bcast"), ValueType::Vec(3));
        assert_eq!(infer_in(&doc, "ints"), ValueType::Int);
    }

    #[test]
    fn comparisons_produce_float_masks() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [{"id": "main",
                "local_vars": [{"id": "p", "type": "float3"}],
                "nodes": [
                    {"id": "i", "op": "int", "val": 2},
                    {"id": "v", "op": "var_get", "var": "p"},
                    {"id": "s", "op": "math_gt", "a": "i", "b": "i"},
                    {"id": "m", "op": "math_lt", "a": "v", "b": "v"}
                ]}]
        }));
        assert_eq!(infer_in(&doc, "s"), ValueType::Float);
        assert_eq!(infer_in(&doc, "m"), ValueType::Vec(3));
    }

    #[test]
    fn swizzle_width_follows_channels() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [{"id": "main",
                "local_vars": [{"id": "p", "type": "float4"}],
                "nodes": [
                    {"id": "v", "op": "var_get", "var": "p"},
                    {"id": "x", "op": "vec_swizzle", "vec": "v", "channels": "x"},
                    {"id": "rg", "op": "vec_swizzle", "vec": "v", "channels": "rg"}
                ]}]
        }));
        assert_eq!(infer_in(&doc, "x"), ValueType::Float);
        assert_eq!(infer_in(&doc, "rg"), ValueType::Vec(2));
    }

    #[test]
    fn loads_follow_resource_metadata() {
        let doc = cx_fixture(serde_json::json!({
            "resources": [
                {"id": "buf", "type": "buffer", "dataType": "float3"},
                {"id": "plain", "type": "buffer"}
            ],
            "functions": [{"id": "main", "nodes": [
                {"id": "i", "op": "int", "val": 0},
                {"id": "a", "op": "buffer_load", "buffer": "buf", "index": "i"},
                {"id": "b", "op": "buffer_load", "buffer": "plain", "index": "i"},
                {"id": "t", "op": "texture_sample", "tex": "buf", "coords": "a"},
                {"id": "s", "op": "resource_get_size", "resource": "buf"}
            ]}]
        }));
        assert_eq!(infer_in(&doc, "a"), ValueType::Vec(3));
        assert_eq!(infer_in(&doc, "b"), ValueType::Float);
        assert_eq!(infer_in(&doc, "t"), ValueType::Vec(4));
        assert_eq!(infer_in(&doc, "s"), ValueType::Vec(2));
    }

    #[test]
    fn struct_chain_infers_member_type() {
        let doc = cx_fixture(serde_json::json!({
            "structs": [{"id": "P", "members": [
                {"name": "pos", "type": "float3"},
                {"name": "age", "type": "float"}
            ]}],
            "functions": [{"id": "main", "nodes": [
                {"id": "c", "op": "struct_construct", "type": "P"},
                {"id": "e", "op": "struct_extract", "struct": "c", "field": "pos"}
            ]}]
        }));
        assert_eq!(infer_in(&doc, "c"), ValueType::Struct("P".into()));
        assert_eq!(infer_in(&doc, "e"), ValueType::Vec(3));
    }

    #[test]
    fn call_type_follows_callee_outputs() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [
                {"id": "main", "nodes": [
                    {"id": "c", "op": "call_func", "func": "helper"},
                    {"id": "v", "op": "call_func", "func": "sink"}
                ]},
                {"id": "helper", "outputs": [{"type": "float"}]},
                {"id": "sink"}
            ]
        }));
        assert_eq!(infer_in(&doc, "c"), ValueType::Float);
        assert_eq!(infer_in(&doc, "v"), ValueType::Void);
    }

    #[test]
    fn unknown_degrades_to_identity() {
        let doc = cx_fixture(serde_json::json!({
            "functions": [{"id": "main", "nodes": [
                {"id": "m", "op": "mystery_op"},
                {"id": "a", "op": "math_add", "a": "m", "b": "m"}
            ]}]
        }));
        assert_eq!(infer_in(&doc, "m"), ValueType::Unknown);
        assert_eq!(infer_in(&doc, "a"), ValueType::Unknown);
    }

    #[test]
    fn unify_rules() {
        use ValueType::*;
        assert_eq!(unify(&Float, &Int), Float);
        assert_eq!(unify(&Int, &Int), Int);
        assert_eq!(unify(&Vec(3), &Float), Vec(3));
        assert_eq!(unify(&Unknown, &Quat), Quat);
        assert_eq!(unify(&Int, &Bool), Int);
    }
}
