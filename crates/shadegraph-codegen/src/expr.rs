//! Recursive expression compilation.
//!
//! Pure nodes compile to inline expressions; nodes referenced more than once
//! in a function (and nodes whose lowering needs statements) are promoted to
//! a named temporary `n_<id>` the first time they are materialised, and every
//! later reference resolves to that identifier through the memo table.
//! Value-producing side-effectful nodes (`call_func` with outputs) are always
//! force-emitted as declarations.

use shadegraph_core::{ports, AttrValue, GlobalInput, IrDocument, Node, ValueType};
use smallvec::SmallVec;

use crate::error::CompileError;
use crate::infer::{unify, FunctionCx, BINARY_OPS, COMPARE_OPS, UNARY_OPS};
use crate::literal;
use crate::mangle::{mangle, Namespace};
use crate::types::{c_type, input_components, is_input_leaf, map_type, zero_value};
use crate::writer::CodeWriter;

impl<'a> FunctionCx<'a> {
    /// Compiles a node for use inside an enclosing expression. Multiply
    /// referenced pure nodes come back as their memoised identifier.
    pub(crate) fn compile_inline(
        &mut self,
        w: &mut CodeWriter,
        id: &str,
    ) -> Result<String, CompileError> {
        if let Some(name) = self.memo.get(id) {
            return Ok(name.clone());
        }
        let node = self.node(id).ok_or_else(|| CompileError::UnknownVariable {
            node: id.to_string(),
            var: id.to_string(),
        })?;
        if self.needs_binding(node) {
            self.ensure_emitted(w, node)?;
            return Ok(self
                .memo
                .get(id)
                .cloned()
                .unwrap_or_else(|| "0.0f".to_string()));
        }
        self.node_expr(w, node)
    }

    /// `true` when the node must be bound to a name rather than inlined:
    /// value calls, multi-statement lowerings, and nodes referenced more
    /// than once.
    fn needs_binding(&mut self, node: &Node) -> bool {
        match node.op.as_str() {
            "call_func" => return true,
            "array_construct" if node.attr("fill").is_some() => return true,
            "math_smoothstep" => {
                let t = self.infer(&node.id);
                if t.is_scalar() || t == ValueType::Unknown {
                    return true;
                }
            }
            // Reads of locals and parameters are already identifiers;
            // binding them would only rename.
            "var_get" => {
                if let Some(var) = node.attr_str("var") {
                    if self.func.local_var(var).is_some() || self.func.input(var).is_some() {
                        return false;
                    }
                }
            }
            _ => {}
        }
        self.edges.ref_count(&node.id) > 1
    }

    /// Emits the node as a named declaration (once); later references use
    /// the memoised `n_<id>`.
    pub(crate) fn ensure_emitted(
        &mut self,
        w: &mut CodeWriter,
        node: &'a Node,
    ) -> Result<(), CompileError> {
        if self.memo.contains_key(&node.id) {
            return Ok(());
        }
        let name = mangle(&node.id, Namespace::NodeResult);
        match node.op.as_str() {
            "call_func" => {
                let (expr, returns) = self.call_expr(w, node)?;
                if returns {
                    w.line(&format!("float {name} = {expr};"));
                    self.memo.insert(node.id.clone(), name);
                } else {
                    // A void call reached through a data reference still runs
                    // exactly once; references degrade to zero.
                    w.line(&format!("{expr};"));
                    self.memo.insert(node.id.clone(), "0.0f".to_string());
                }
            }
            "math_smoothstep" => {
                let start = self.resolve_arg(w, node, "start", &ValueType::Float)?;
                let end = self.resolve_arg(w, node, "end", &ValueType::Float)?;
                let val = self.resolve_arg(w, node, "val", &ValueType::Float)?;
                // t is clamped to [0, 1] in the emitted code.
                w.line(&format!(
                    "float {name}_t = clamp_val((({val}) - ({start})) / (({end}) - ({start})), 0.0f, 1.0f);"
                ));
                w.line(&format!(
                    "float {name} = {name}_t * {name}_t * (3.0f - 2.0f * {name}_t);"
                ));
                self.memo.insert(node.id.clone(), name);
            }
            "array_construct" if node.attr("fill").is_some() => {
                let ty = self.infer(&node.id);
                let (elem, len) = match &ty {
                    ValueType::Array {
                        elem,
                        len: Some(n),
                    } => ((**elem).clone(), *n),
                    _ => (ValueType::Float, 0),
                };
                let fill = self.resolve_arg(w, node, "fill", &elem)?;
                w.line(&format!("{} {name}{{}};", c_type(&ty)));
                let i = format!("{name}_i");
                w.open_block(&format!("for (size_t {i} = 0; {i} < {len}; ++{i})"));
                w.line(&format!("{name}[{i}] = {fill};"));
                w.close_block();
                self.memo.insert(node.id.clone(), name);
            }
            _ => {
                let ty = self.infer(&node.id);
                let expr = self.node_expr(w, node)?;
                w.line(&format!("{} {name} = {expr};", c_type(&ty)));
                self.memo.insert(node.id.clone(), name);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Operand resolution
    // -----------------------------------------------------------------------

    /// Resolves the operand feeding `(node, key)`: a data edge source first,
    /// then the raw attribute (variable name, node reference, or literal),
    /// and finally the zero value of the expected type.
    pub(crate) fn resolve_arg(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        key: &str,
        expected: &ValueType,
    ) -> Result<String, CompileError> {
        let from = self
            .edges
            .data_into(&node.id, key)
            .map(|e| e.from.clone());
        if let Some(from) = from {
            let ty = self.infer(&from);
            let expr = self.compile_inline(w, &from)?;
            return Ok(coerce(expr, &ty, expected));
        }
        let value = node
            .attr(key)
            .or_else(|| ports::alias(key).and_then(|k| node.attr(k)))
            .cloned();
        match value {
            Some(v) => self.attr_value_expr(w, node, &v, expected),
            None => Ok(zero_value(expected)),
        }
    }

    /// Compiles a raw attribute value to an expression in the expected type
    /// context.
    pub(crate) fn attr_value_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        value: &AttrValue,
        expected: &ValueType,
    ) -> Result<String, CompileError> {
        match value {
            AttrValue::Number(n) => literal::number(*n, expected),
            AttrValue::Bool(b) => Ok(literal::bool_literal(*b, expected).to_string()),
            AttrValue::Str(s) => self.resolve_ident(w, node, s, expected),
            AttrValue::List(items) if value.is_number_list() => {
                let nums = literal::number_list(items).unwrap_or_default();
                let len = match expected {
                    ValueType::Vec(n) => *n as usize,
                    ValueType::Quat => 4,
                    ValueType::Mat3 => 9,
                    ValueType::Mat4 => 16,
                    ValueType::Array { len: Some(n), .. } => *n,
                    _ => nums.len(),
                };
                literal::float_array_literal(&nums, len)
            }
            _ => Ok(zero_value(expected)),
        }
    }

    /// Resolves a string reference against local variables, function inputs,
    /// global inputs, and finally node ids. Anything else is an unknown
    /// variable.
    fn resolve_ident(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        name: &str,
        expected: &ValueType,
    ) -> Result<String, CompileError> {
        let doc = self.doc;
        if self.func.local_var(name).is_some() {
            let ty = self.var_type(name).unwrap_or(ValueType::Unknown);
            return Ok(coerce(mangle(name, Namespace::Variable), &ty, expected));
        }
        if self.func.input(name).is_some() {
            return Ok(mangle(name, Namespace::Input));
        }
        if let Some(gi) = doc.global_input(name) {
            return self.global_input_read(gi);
        }
        if self.node(name).is_some() {
            let ty = self.infer(name);
            let expr = self.compile_inline(w, name)?;
            return Ok(coerce(expr, &ty, expected));
        }
        Err(CompileError::UnknownVariable {
            node: node.id.clone(),
            var: name.to_string(),
        })
    }

    /// Reads a global input through the harness, reassembling aggregates
    /// from their flattened `name_0..name_{n-1}` components.
    pub(crate) fn global_input_read(
        &mut self,
        gi: &GlobalInput,
    ) -> Result<String, CompileError> {
        let ty = map_type(&gi.ty, self.doc)?;
        Ok(input_read_expr(&gi.id, &ty, self.doc))
    }

    /// Binds a non-trivial expression to a helper temporary so that its
    /// components can be read more than once without re-evaluation.
    pub(crate) fn as_ident(
        &mut self,
        w: &mut CodeWriter,
        expr: String,
        ty: &ValueType,
        hint: &str,
    ) -> String {
        if is_simple_ident(&expr) {
            return expr;
        }
        let name = mangle(hint, Namespace::NodeResult);
        if self.temps.insert(name.clone()) {
            w.line(&format!("{} {name} = {expr};", c_type(ty)));
        }
        name
    }

    // -----------------------------------------------------------------------
    // Per-op lowering
    // -----------------------------------------------------------------------

    /// Builds the target expression for a single node.
    pub(crate) fn node_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &'a Node,
    ) -> Result<String, CompileError> {
        let op = node.op.as_str();
        match op {
            "literal" | "float" | "int" => self.literal_expr(w, node),
            "math_pi" => Ok("3.14159265358979323846f".to_string()),
            "loop_index" => {
                let loop_id = node.attr_str("loop").ok_or_else(|| {
                    CompileError::UnknownVariable {
                        node: node.id.clone(),
                        var: "loop".to_string(),
                    }
                })?;
                Ok(format!("(float){}", mangle(loop_id, Namespace::LoopIndex)))
            }
            "var_get" => {
                let var = node.attr_str("var").unwrap_or("").to_string();
                let doc = self.doc;
                if self.func.local_var(&var).is_some() {
                    Ok(mangle(&var, Namespace::Variable))
                } else if self.func.input(&var).is_some() {
                    Ok(mangle(&var, Namespace::Input))
                } else if let Some(gi) = doc.global_input(&var) {
                    self.global_input_read(gi)
                } else {
                    Err(CompileError::UnknownVariable {
                        node: node.id.clone(),
                        var,
                    })
                }
            }
            "float2" | "float3" | "float4" | "quat" => self.vector_ctor_expr(w, node),
            "float3x3" | "float4x4" => self.matrix_ctor_expr(w, node),
            "struct_construct" => self.struct_ctor_expr(w, node),
            "array_construct" => self.array_ctor_expr(w, node),
            "struct_extract" => {
                let sty = self.arg_type(node, "struct");
                if !matches!(sty, ValueType::Struct(_)) {
                    return Err(CompileError::UnknownStruct {
                        id: sty.to_string(),
                    });
                }
                let base = self.resolve_arg(w, node, "struct", &sty)?;
                let field = node.attr_str("field").unwrap_or("");
                Ok(format!("{base}.{}", mangle(field, Namespace::Field)))
            }
            "array_extract" => {
                let aty = self.arg_type(node, "array");
                let base = self.resolve_arg(w, node, "array", &aty)?;
                let index = self.resolve_arg(w, node, "index", &ValueType::Int)?;
                Ok(format!("({base})[(unsigned int)({index})]"))
            }
            "vec_swizzle" => self.swizzle_expr(w, node),
            "vec_get_element" => {
                let vty = self.arg_type(node, "vec");
                let base = self.resolve_arg(w, node, "vec", &vty)?;
                let index = self.resolve_arg(w, node, "index", &ValueType::Int)?;
                Ok(format!("({base})[(unsigned int)({index})]"))
            }
            "array_length" => {
                let aty = self.arg_type(node, "array");
                match aty {
                    ValueType::Array {
                        len: Some(n), ..
                    } => Ok(format!("{n}")),
                    ValueType::Array { len: None, .. } => {
                        let base = self.resolve_arg(w, node, "array", &aty)?;
                        Ok(format!("(int)({base}).size()"))
                    }
                    _ => Ok("0".to_string()),
                }
            }
            "static_cast_float" => {
                let v = self.resolve_arg(w, node, "val", &ValueType::Unknown)?;
                Ok(format!("(float)({v})"))
            }
            "static_cast_int" => {
                let v = self.resolve_arg(w, node, "val", &ValueType::Unknown)?;
                Ok(format!("(int)({v})"))
            }
            "static_cast_bool" => {
                let v = self.resolve_arg(w, node, "val", &ValueType::Float)?;
                Ok(format!("(({v}) != 0.0f)"))
            }
            "math_select" => {
                let c = self.resolve_arg(w, node, "cond", &ValueType::Float)?;
                let ty = self.infer(&node.id);
                let t = self.resolve_arg(w, node, "t", &ty)?;
                let f = self.resolve_arg(w, node, "f", &ty)?;
                Ok(format!("(({c}) != 0.0f ? ({t}) : ({f}))"))
            }
            "math_clamp" => {
                let ty = self.infer(&node.id);
                let v = self.resolve_arg(w, node, "val", &ty)?;
                let lo = self.resolve_arg(w, node, "min", &ValueType::Float)?;
                let hi = self.resolve_arg(w, node, "max", &ValueType::Float)?;
                Ok(format!("clamp_val({v}, {lo}, {hi})"))
            }
            "math_mix" | "color_mix" => self.mix_expr(w, node, op),
            "math_step" => self.step_expr(w, node),
            "math_smoothstep" => {
                // The scalar form is bound in ensure_emitted; only aggregates
                // reach this path.
                let ty = self.infer(&node.id);
                let s = self.resolve_arg(w, node, "start", &ty)?;
                let e = self.resolve_arg(w, node, "end", &ty)?;
                let v = self.resolve_arg(w, node, "val", &ty)?;
                Ok(format!("vec_smoothstep({s}, {e}, {v})"))
            }
            "mat_inverse" => {
                // Identity passthrough until a correct inverse is specified.
                let ty = self.arg_type(node, "val");
                self.resolve_arg(w, node, "val", &ty)
            }
            "mat_mul" => {
                let ta = self.arg_type(node, "a");
                let tb = self.arg_type(node, "b");
                let a = self.resolve_arg(w, node, "a", &ta)?;
                let b = self.resolve_arg(w, node, "b", &tb)?;
                Ok(format!("mat_mul({a}, {b})"))
            }
            "mat_transpose" => {
                let ty = self.arg_type(node, "val");
                let v = self.resolve_arg(w, node, "val", &ty)?;
                Ok(format!("mat_transpose({v})"))
            }
            "vec_dot" | "vec_distance" => self.vec_binary_helper(w, node, op),
            "vec_length" | "vec_normalize" => {
                let ty = self.arg_type(node, "val");
                let v = self.resolve_arg(w, node, "val", &ty)?;
                Ok(format!("{op}({v})"))
            }
            "vec_cross" => self.vec_binary_helper(w, node, op),
            "vec_reflect" => {
                let ty = self.arg_type(node, "I");
                let i = self.resolve_arg(w, node, "I", &ty)?;
                let n = self.resolve_arg(w, node, "N", &ty)?;
                Ok(format!("vec_reflect({i}, {n})"))
            }
            "vec_refract" => {
                let ty = self.arg_type(node, "I");
                let i = self.resolve_arg(w, node, "I", &ty)?;
                let n = self.resolve_arg(w, node, "N", &ty)?;
                let eta = self.resolve_arg(w, node, "eta", &ValueType::Float)?;
                Ok(format!("vec_refract({i}, {n}, {eta})"))
            }
            "vec_faceforward" => {
                let ty = self.arg_type(node, "N");
                let n = self.resolve_arg(w, node, "N", &ty)?;
                let i = self.resolve_arg(w, node, "I", &ty)?;
                let nref = self.resolve_arg(w, node, "Nref", &ty)?;
                Ok(format!("vec_faceforward({n}, {i}, {nref})"))
            }
            "quat_mul" | "quat_slerp" | "quat_conjugate" | "quat_normalize"
            | "quat_inverse" | "quat_from_axis_angle" | "quat_rotate_vec" => {
                self.quat_helper_expr(w, node, op)
            }
            "buffer_load" => self.buffer_load_expr(w, node),
            "texture_sample" => self.texture_sample_expr(w, node),
            "resource_get_size" => {
                let rid = node.attr_str("resource").unwrap_or("");
                let idx = self.binding_of(node, rid)?;
                Ok(format!(
                    "std::array<float, 2>{{(float)ctx.resources[{idx}]->width, (float)ctx.resources[{idx}]->height}}"
                ))
            }
            "resource_get_format" => {
                let rid = node.attr_str("resource").unwrap_or("");
                let code = shadegraph_core::format_code(
                    self.doc.resource(rid).and_then(|r| r.format.as_deref()),
                );
                literal::float_literal(code as f64)
            }
            "builtin_get" => {
                let name = node.attr_str("name").unwrap_or("").to_string();
                match name.as_str() {
                    "time" | "delta_time" | "frame" => {
                        Ok(format!("ctx.getInput(\"{name}\")"))
                    }
                    "resolution" => Ok(
                        "std::array<float, 2>{ctx.getInput(\"resolution_0\"), ctx.getInput(\"resolution_1\")}"
                            .to_string(),
                    ),
                    _ => Err(CompileError::UnsupportedBuiltin { name }),
                }
            }
            "call_func" => {
                // Reached only through ensure_emitted; kept for completeness.
                let (expr, _) = self.call_expr(w, node)?;
                Ok(expr)
            }
            _ if BINARY_OPS.contains(&op) => self.binary_expr(w, node, op),
            _ if COMPARE_OPS.contains(&op) => self.compare_expr(w, node, op),
            _ if UNARY_OPS.contains(&op) => self.unary_expr(w, node, op),
            _ => Err(CompileError::UnknownOp {
                op: op.to_string(),
                node: node.id.clone(),
            }),
        }
    }

    fn literal_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let ty = self.infer(&node.id);
        let value = node
            .attr("val")
            .or_else(|| node.attr("value"))
            .cloned();
        match value {
            Some(v) => self.attr_value_expr(w, node, &v, &ty),
            None => Ok(zero_value(&ty)),
        }
    }

    fn vector_ctor_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let n = match node.op.as_str() {
            "float2" => 2,
            "float3" => 3,
            _ => 4,
        };
        let is_quat = node.op == "quat";
        let mut parts = Vec::with_capacity(n);
        for (i, key) in ["x", "y", "z", "w"].into_iter().take(n).enumerate() {
            let missing = self.edges.data_into(&node.id, key).is_none()
                && node.attr(key).is_none();
            if missing && is_quat && i == 3 {
                // Identity quaternion default.
                parts.push("1.0f".to_string());
            } else {
                parts.push(self.resolve_arg(w, node, key, &ValueType::Float)?);
            }
        }
        Ok(format!("std::array<float, {n}>{{{}}}", parts.join(", ")))
    }

    fn matrix_ctor_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let n = if node.op == "float3x3" { 9 } else { 16 };
        let values = node.attr_list("values").map(<[AttrValue]>::to_vec);
        let mut parts = Vec::with_capacity(n);
        match values {
            Some(items) => {
                for i in 0..n {
                    match items.get(i) {
                        Some(v) => {
                            parts.push(self.attr_value_expr(w, node, v, &ValueType::Float)?)
                        }
                        None => parts.push("0.0f".to_string()),
                    }
                }
                Ok(format!("std::array<float, {n}>{{{}}}", parts.join(", ")))
            }
            None => Ok(format!("std::array<float, {n}>{{}}")),
        }
    }

    fn struct_ctor_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &'a Node,
    ) -> Result<String, CompileError> {
        let doc = self.doc;
        let name = node.attr_str("type").unwrap_or("");
        let def = doc
            .struct_def(name)
            .ok_or_else(|| CompileError::UnknownStruct {
                id: name.to_string(),
            })?;
        let values = node.attr_map("values").cloned();
        let mut parts = Vec::with_capacity(def.members.len());
        for member in &def.members {
            let mty = ValueType::resolve(&member.ty, doc).unwrap_or(ValueType::Unknown);
            let has_edge = self.edges.data_into(&node.id, &member.name).is_some();
            let expr = if has_edge {
                self.resolve_arg(w, node, &member.name, &mty)?
            } else if let Some(v) = values.as_ref().and_then(|m| m.get(&member.name)).cloned() {
                self.attr_value_expr(w, node, &v, &mty)?
            } else {
                zero_value(&mty)
            };
            parts.push(expr);
        }
        Ok(format!(
            "{}{{{}}}",
            mangle(&def.id, Namespace::Struct),
            parts.join(", ")
        ))
    }

    fn array_ctor_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        // The fill form is bound in ensure_emitted; only the values form
        // reaches this path.
        let ty = self.infer(&node.id);
        let elem = match &ty {
            ValueType::Array { elem, .. } => (**elem).clone(),
            _ => ValueType::Float,
        };
        let values = node.attr_list("values").map(<[AttrValue]>::to_vec).unwrap_or_default();
        let mut parts = Vec::with_capacity(values.len());
        for v in &values {
            parts.push(self.attr_value_expr(w, node, v, &elem)?);
        }
        Ok(format!(
            "std::array<{}, {}>{{{}}}",
            c_type(&elem),
            values.len(),
            parts.join(", ")
        ))
    }

    fn swizzle_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let channels = node
            .attr_str("channels")
            .or_else(|| node.attr_str("swizzle"))
            .unwrap_or("")
            .to_string();
        let mut indices: SmallVec<[usize; 4]> = SmallVec::new();
        for c in channels.chars() {
            let i = swizzle_index(c).ok_or_else(|| CompileError::UnknownOp {
                op: format!("vec_swizzle '{channels}'"),
                node: node.id.clone(),
            })?;
            indices.push(i);
        }
        let vty = self.arg_type(node, "vec");
        let base = self.resolve_arg(w, node, "vec", &vty)?;
        if indices.len() == 1 {
            return Ok(format!("({base})[{}]", indices[0]));
        }
        let ident = self.as_ident(w, base, &vty, &format!("{}_v", node.id));
        let parts: Vec<String> = indices.iter().map(|i| format!("{ident}[{i}]")).collect();
        Ok(format!(
            "std::array<float, {}>{{{}}}",
            indices.len(),
            parts.join(", ")
        ))
    }

    fn binary_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        let ta = self.arg_type(node, "a");
        let tb = self.arg_type(node, "b");
        let joined = unify(&ta, &tb);
        let scalar = joined.is_scalar() || joined == ValueType::Unknown;
        if scalar {
            // Integer ops stay integer; any float participant widens both
            // sides to float.
            let both_int = ta.is_integer_like() && tb.is_integer_like();
            let expected = if both_int {
                ValueType::Int
            } else {
                ValueType::Float
            };
            let a = self.resolve_arg(w, node, "a", &expected)?;
            let b = self.resolve_arg(w, node, "b", &expected)?;
            return Ok(match op {
                "math_add" => format!("({a} + {b})"),
                "math_sub" => format!("({a} - {b})"),
                "math_mul" => format!("({a} * {b})"),
                "math_div" => format!("({a} / {b})"),
                "math_mod" => format!("fmod({a}, {b})"),
                "math_pow" => format!("pow({a}, {b})"),
                "math_min" => format!("fmin({a}, {b})"),
                "math_max" => format!("fmax({a}, {b})"),
                "math_atan2" => format!("atan2({a}, {b})"),
                _ => unreachable!("non-binary op {op}"),
            });
        }
        let a = self.resolve_arg(w, node, "a", &ta)?;
        let b = self.resolve_arg(w, node, "b", &tb)?;
        let body = match op {
            "math_add" => "x + y".to_string(),
            "math_sub" => "x - y".to_string(),
            "math_mul" => "x * y".to_string(),
            "math_div" => "x / y".to_string(),
            "math_mod" => "fmod(x, y)".to_string(),
            "math_pow" => "pow(x, y)".to_string(),
            "math_min" => "fmin(x, y)".to_string(),
            "math_max" => "fmax(x, y)".to_string(),
            "math_atan2" => "atan2(x, y)".to_string(),
            _ => unreachable!("non-binary op {op}"),
        };
        Ok(format!(
            "applyBinary({a}, {b}, [](float x, float y) {{ return {body}; }})"
        ))
    }

    fn compare_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        let sym = match op {
            "math_eq" => "==",
            "math_neq" => "!=",
            "math_gt" => ">",
            "math_lt" => "<",
            "math_ge" => ">=",
            _ => "<=",
        };
        let ta = self.arg_type(node, "a");
        let tb = self.arg_type(node, "b");
        let joined = unify(&ta, &tb);
        if joined.is_scalar() || joined == ValueType::Unknown {
            let a = self.resolve_arg(w, node, "a", &ValueType::Float)?;
            let b = self.resolve_arg(w, node, "b", &ValueType::Float)?;
            return Ok(format!("(({a}) {sym} ({b}) ? 1.0f : 0.0f)"));
        }
        let a = self.resolve_arg(w, node, "a", &ta)?;
        let b = self.resolve_arg(w, node, "b", &tb)?;
        Ok(format!(
            "applyBinary({a}, {b}, [](float x, float y) {{ return x {sym} y ? 1.0f : 0.0f; }})"
        ))
    }

    fn unary_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        let ty = self.arg_type(node, "val");
        let scalar = ty.is_scalar() || ty == ValueType::Unknown;
        let v = self.resolve_arg(w, node, "val", if scalar { &ValueType::Float } else { &ty })?;
        if scalar {
            return Ok(match op {
                "math_neg" => format!("(-({v}))"),
                "math_sign" => format!(
                    "(({v}) > 0.0f ? 1.0f : (({v}) < 0.0f ? -1.0f : 0.0f))"
                ),
                "math_fract" => format!("(({v}) - floor({v}))"),
                _ => format!("{}({v})", unary_fn(op)),
            });
        }
        let body = match op {
            "math_neg" => "-x".to_string(),
            "math_sign" => "x > 0.0f ? 1.0f : (x < 0.0f ? -1.0f : 0.0f)".to_string(),
            "math_fract" => "x - floor(x)".to_string(),
            _ => format!("{}(x)", unary_fn(op)),
        };
        Ok(format!("applyUnary({v}, [](float x) {{ return {body}; }})"))
    }

    fn mix_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        let ty = self.infer(&node.id);
        if op == "color_mix" || !(ty.is_scalar() || ty == ValueType::Unknown) {
            let a = self.resolve_arg(w, node, "a", &ty)?;
            let b = self.resolve_arg(w, node, "b", &ty)?;
            let t = self.resolve_arg(w, node, "t", &ValueType::Float)?;
            let helper = if op == "color_mix" { "color_mix" } else { "vec_mix" };
            return Ok(format!("{helper}({a}, {b}, {t})"));
        }
        let a = self.resolve_arg(w, node, "a", &ValueType::Float)?;
        let b = self.resolve_arg(w, node, "b", &ValueType::Float)?;
        let t = self.resolve_arg(w, node, "t", &ValueType::Float)?;
        Ok(format!("(({a}) + (({b}) - ({a})) * ({t}))"))
    }

    fn step_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let ty = self.infer(&node.id);
        if ty.is_scalar() || ty == ValueType::Unknown {
            let edge = self.resolve_arg(w, node, "a", &ValueType::Float)?;
            let v = self.resolve_arg(w, node, "b", &ValueType::Float)?;
            return Ok(format!("(({v}) < ({edge}) ? 0.0f : 1.0f)"));
        }
        let ta = self.arg_type(node, "a");
        let tb = self.arg_type(node, "b");
        let edge = self.resolve_arg(w, node, "a", &ta)?;
        let v = self.resolve_arg(w, node, "b", &tb)?;
        Ok(format!(
            "applyBinary({edge}, {v}, [](float x, float y) {{ return y < x ? 0.0f : 1.0f; }})"
        ))
    }

    fn vec_binary_helper(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        let ta = self.arg_type(node, "a");
        let tb = self.arg_type(node, "b");
        let a = self.resolve_arg(w, node, "a", &ta)?;
        let b = self.resolve_arg(w, node, "b", &tb)?;
        Ok(format!("{op}({a}, {b})"))
    }

    fn quat_helper_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        op: &str,
    ) -> Result<String, CompileError> {
        match op {
            "quat_mul" => self.vec_binary_helper(w, node, op),
            "quat_slerp" => {
                let a = self.resolve_arg(w, node, "a", &ValueType::Quat)?;
                let b = self.resolve_arg(w, node, "b", &ValueType::Quat)?;
                let t = self.resolve_arg(w, node, "t", &ValueType::Float)?;
                Ok(format!("quat_slerp({a}, {b}, {t})"))
            }
            "quat_rotate_vec" => {
                let q = self.resolve_arg(w, node, "quat", &ValueType::Quat)?;
                let v = self.resolve_arg(w, node, "vec", &ValueType::Vec(3))?;
                Ok(format!("quat_rotate_vec({q}, {v})"))
            }
            "quat_from_axis_angle" => {
                let axis = self.resolve_arg(w, node, "axis", &ValueType::Vec(3))?;
                let angle = self.resolve_arg(w, node, "angle", &ValueType::Float)?;
                Ok(format!("quat_from_axis_angle({axis}, {angle})"))
            }
            _ => {
                let v = self.resolve_arg(w, node, "val", &ValueType::Quat)?;
                Ok(format!("{op}({v})"))
            }
        }
    }

    fn buffer_load_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let rid = node.attr_str("buffer").unwrap_or("");
        let idx = self.binding_of(node, rid)?;
        let stride = self
            .doc
            .resource(rid)
            .map(|r| r.stride())
            .unwrap_or(1);
        let index = self.resolve_arg(w, node, "index", &ValueType::Int)?;
        if stride == 1 {
            return Ok(format!(
                "ctx.resources[{idx}]->data[(unsigned int)({index})]"
            ));
        }
        let base = self.as_ident(
            w,
            format!("(unsigned int)({index})"),
            &ValueType::Uint,
            &format!("{}_idx", node.id),
        );
        let parts: Vec<String> = (0..stride)
            .map(|k| format!("ctx.resources[{idx}]->data[{base} * {stride}u + {k}u]"))
            .collect();
        Ok(format!(
            "std::array<float, {stride}>{{{}}}",
            parts.join(", ")
        ))
    }

    fn texture_sample_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        let rid = node.attr_str("tex").unwrap_or("");
        let idx = self.binding_of(node, rid)?;
        let resource = self.doc.resource(rid);
        let sampler = resource.and_then(|r| r.sampler.clone());
        let wrap = shadegraph_core::wrap_code(
            sampler.as_ref().and_then(|s| s.wrap.as_deref()),
        );
        let filter = shadegraph_core::filter_code(
            sampler.as_ref().and_then(|s| s.filter.as_deref()),
        );
        let stride = if shadegraph_core::is_single_channel(
            resource.and_then(|r| r.format.as_deref()),
        ) {
            1
        } else {
            4
        };
        let coords = self.resolve_arg(w, node, "coords", &ValueType::Vec(2))?;
        let c = self.as_ident(w, coords, &ValueType::Vec(2), &format!("{}_uv", node.id));
        Ok(format!(
            "ctx.sampleTexture({idx}, {c}[0], {c}[1], {wrap}, {filter}, {stride})"
        ))
    }

    /// Canonical binding index of a resource or texture input id.
    pub(crate) fn binding_of(
        &self,
        node: &Node,
        rid: &str,
    ) -> Result<usize, CompileError> {
        self.doc
            .binding_index(rid)
            .ok_or_else(|| CompileError::UnknownVariable {
                node: node.id.clone(),
                var: rid.to_string(),
            })
    }

    /// Builds a call expression against the callee's declared input order;
    /// missing arguments are zero. Returns the expression and whether the
    /// callee produces a value.
    pub(crate) fn call_expr(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<(String, bool), CompileError> {
        let doc = self.doc;
        let target = node.attr_str("func").unwrap_or("").to_string();
        let callee = doc
            .function(&target)
            .ok_or_else(|| CompileError::FunctionNotFound { id: target.clone() })?;
        let arg_map = node.attr_map("args").cloned();
        let mut args = vec!["ctx".to_string()];
        for p in &callee.inputs {
            let from = self
                .edges
                .data_into(&node.id, &p.id)
                .map(|e| e.from.clone());
            let expr = if let Some(from) = from {
                let ty = self.infer(&from);
                let e = self.compile_inline(w, &from)?;
                coerce(e, &ty, &ValueType::Float)
            } else if let Some(v) = arg_map.as_ref().and_then(|m| m.get(&p.id)).cloned() {
                self.attr_value_expr(w, node, &v, &ValueType::Float)?
            } else if let Some(v) = node.attr(&p.id).cloned() {
                self.attr_value_expr(w, node, &v, &ValueType::Float)?
            } else {
                "0.0f".to_string()
            };
            args.push(expr);
        }
        Ok((
            format!(
                "{}({})",
                mangle(&callee.id, Namespace::Function),
                args.join(", ")
            ),
            callee.returns_value(),
        ))
    }
}

/// Widens an integer-like expression to float when the context expects one.
/// Boolean literals become their numeric form directly.
fn coerce(expr: String, from: &ValueType, to: &ValueType) -> String {
    if *to == ValueType::Float && from.is_integer_like() {
        if expr == "true" {
            return "1.0f".to_string();
        }
        if expr == "false" {
            return "0.0f".to_string();
        }
        return format!("(float)({expr})");
    }
    expr
}

/// `true` if the expression is a bare identifier.
fn is_simple_ident(expr: &str) -> bool {
    !expr.is_empty()
        && !expr.starts_with(|c: char| c.is_ascii_digit())
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Channel letter to component index: `x/r->0, y/g->1, z/b->2, w/a->3`.
fn swizzle_index(c: char) -> Option<usize> {
    match c {
        'x' | 'r' => Some(0),
        'y' | 'g' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// C library function for a unary math op.
fn unary_fn(op: &str) -> &'static str {
    match op {
        "math_abs" => "fabs",
        "math_floor" => "floor",
        "math_ceil" => "ceil",
        "math_round" => "round",
        "math_sqrt" => "sqrt",
        "math_sin" => "sin",
        "math_cos" => "cos",
        "math_tan" => "tan",
        "math_asin" => "asin",
        "math_acos" => "acos",
        "math_atan" => "atan",
        "math_exp" => "exp",
        "math_log" => "log",
        _ => "sqrt",
    }
}

/// Expression that reads a global input through the harness, reassembling
/// aggregates from the fixed `name_0..name_{n-1}` flattening convention
/// (one [`input_components`] walk shared with the document emitter).
pub(crate) fn input_read_expr(name: &str, ty: &ValueType, doc: &IrDocument) -> String {
    let components = input_components(name, ty, None, doc);
    if components.is_empty() {
        if is_input_leaf(ty) {
            return format!("ctx.getInput(\"{name}\")");
        }
        return zero_value(ty);
    }
    let parts: Vec<String> = components
        .iter()
        .map(|(n, t, _)| input_read_expr(n, t, doc))
        .collect();
    format!("{}{{{}}}", c_type(ty), parts.join(", "))
}
