//! Control-flow reconstruction.
//!
//! A function body is the set of execution chains rooted at executable nodes
//! with no incoming execution edge, walked in textual order. Each chain
//! carries a visited set to terminate joins and back-edges; branches clone
//! the set at the fork so sibling arms stay independent while the
//! post-branch continuation still sees the prefix.

use std::collections::HashSet;

use shadegraph_core::{ports, AttrValue, Node, ValueType};
use tracing::warn;

use crate::error::CompileError;
use crate::infer::{FunctionCx, CPU_BUILTINS};
use crate::literal;
use crate::mangle::{mangle, Namespace};
use crate::types::{flat_float_count, map_type};
use crate::writer::CodeWriter;

impl<'a> FunctionCx<'a> {
    /// Emits the whole function body by walking every entry execution chain.
    pub(crate) fn emit_body(&mut self, w: &mut CodeWriter) -> Result<(), CompileError> {
        let entries: Vec<String> = self
            .func
            .nodes
            .iter()
            .filter(|n| {
                (n.is_executable_class() || self.edges.has_exec_outgoing(&n.id))
                    && !self.edges.has_exec_incoming(&n.id)
            })
            .map(|n| n.id.clone())
            .collect();
        for id in entries {
            let mut visited = HashSet::new();
            self.walk_chain(w, &id, &mut visited)?;
        }
        Ok(())
    }

    fn walk_chain(
        &mut self,
        w: &mut CodeWriter,
        start: &str,
        visited: &mut HashSet<String>,
    ) -> Result<(), CompileError> {
        let mut current = Some(start.to_string());
        while let Some(id) = current.take() {
            if !visited.insert(id.clone()) {
                break;
            }
            let node = self.node(&id).ok_or_else(|| CompileError::UnknownVariable {
                node: id.clone(),
                var: id.clone(),
            })?;
            self.materialize_deps(w, node)?;
            match node.op.as_str() {
                "flow_branch" => {
                    let cond = self.resolve_arg(w, node, "cond", &ValueType::Float)?;
                    w.open_block(&format!("if ({cond} != 0.0f)"));
                    if let Some(t) = self.edges.exec_out(&id, ports::EXEC_TRUE).map(str::to_string)
                    {
                        let mut arm = visited.clone();
                        self.walk_chain(w, &t, &mut arm)?;
                    }
                    if let Some(f) =
                        self.edges.exec_out(&id, ports::EXEC_FALSE).map(str::to_string)
                    {
                        w.chain_block("else");
                        let mut arm = visited.clone();
                        self.walk_chain(w, &f, &mut arm)?;
                    }
                    w.close_block();
                    current = self.edges.exec_out(&id, ports::EXEC_OUT).map(str::to_string);
                }
                "flow_loop" => {
                    let lv = mangle(&id, Namespace::LoopIndex);
                    let start_e = self.int_bound(w, node, "start", 0)?;
                    let end_e = self.int_bound(w, node, "end", 0)?;
                    w.open_block(&format!(
                        "for (int {lv} = {start_e}; {lv} < {end_e}; ++{lv})"
                    ));
                    if let Some(b) =
                        self.edges.exec_out(&id, ports::EXEC_BODY).map(str::to_string)
                    {
                        let mut body = visited.clone();
                        self.walk_chain(w, &b, &mut body)?;
                    }
                    w.close_block();
                    // The completion continuation runs in the parent scope.
                    current = self
                        .edges
                        .exec_out(&id, ports::EXEC_COMPLETED)
                        .map(str::to_string);
                }
                "func_return" => {
                    self.emit_return(w, node)?;
                    break;
                }
                _ => {
                    self.emit_statement(w, node)?;
                    current = self.edges.exec_out(&id, ports::EXEC_OUT).map(str::to_string);
                }
            }
        }
        Ok(())
    }

    /// Ensures every data dependency of a statement is materialised before
    /// the statement itself, so memoised names are in scope.
    fn materialize_deps(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let sources: Vec<String> = self
            .edges
            .all_data_into(&node.id)
            .map(|e| e.from.clone())
            .collect();
        for from in sources {
            if self.node(&from).is_some_and(Node::has_result) {
                let _ = self.compile_inline(w, &from)?;
            }
        }
        let attr_refs: Vec<String> = node
            .attrs
            .values()
            .filter_map(AttrValue::as_str)
            .filter(|s| *s != node.id && self.node(s).is_some_and(Node::has_result))
            .map(str::to_string)
            .collect();
        for from in attr_refs {
            let _ = self.compile_inline(w, &from)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, w: &mut CodeWriter, node: &'a Node) -> Result<(), CompileError> {
        match node.op.as_str() {
            "var_set" => self.emit_var_set(w, node),
            "array_set" => self.emit_array_set(w, node),
            "buffer_store" => self.emit_buffer_store(w, node),
            "texture_store" => {
                // CPU path is a no-op; the write happens via a GPU dispatch.
                let tex = node.attr_str("tex").unwrap_or("");
                w.line(&format!("// texture '{tex}' is written by the GPU path"));
                Ok(())
            }
            "call_func" => {
                let target = node.attr_str("func").unwrap_or("").to_string();
                let returns = self
                    .doc
                    .function(&target)
                    .ok_or_else(|| CompileError::FunctionNotFound { id: target })?
                    .returns_value();
                if returns {
                    self.ensure_emitted(w, node)
                } else {
                    let (expr, _) = self.call_expr(w, node)?;
                    w.line(&format!("{expr};"));
                    Ok(())
                }
            }
            "cmd_dispatch" => self.emit_dispatch(w, node),
            "cmd_resize_resource" => self.emit_resize(w, node),
            "cmd_draw" => self.emit_draw(w, node),
            _ if node.has_result() => {
                // A pure node wired into the execution chain materialises as
                // a declaration.
                self.ensure_emitted(w, node)
            }
            _ => Err(CompileError::UnknownOp {
                op: node.op.clone(),
                node: node.id.clone(),
            }),
        }
    }

    fn emit_var_set(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let var = node.attr_str("var").unwrap_or("").to_string();
        let (name, ty) = if self.func.local_var(&var).is_some() {
            (
                mangle(&var, Namespace::Variable),
                self.var_type(&var).unwrap_or(ValueType::Unknown),
            )
        } else if self.func.input(&var).is_some() {
            (mangle(&var, Namespace::Input), ValueType::Float)
        } else {
            return Err(CompileError::UnknownVariable {
                node: node.id.clone(),
                var,
            });
        };
        let val = self.resolve_arg(w, node, "val", &ty)?;
        w.line(&format!("{name} = {val};"));
        Ok(())
    }

    fn emit_array_set(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let elem = match self.arg_type(node, "array") {
            ValueType::Array { elem, .. } => *elem,
            _ => ValueType::Unknown,
        };
        let index = self.resolve_arg(w, node, "index", &ValueType::Int)?;
        let val = self.resolve_arg(w, node, "val", &elem)?;

        // In-place update when the array traces back to a variable.
        if let Some(var) = self.array_set_target(node) {
            w.line(&format!(
                "{}[(unsigned int)({index})] = {val};",
                mangle(&var, Namespace::Variable)
            ));
            return Ok(());
        }

        warn!(node = %node.id, "array_set source is not a variable; storing into a copy");
        let aty = self.arg_type(node, "array");
        let base = self.resolve_arg(w, node, "array", &aty)?;
        let ident = self.as_ident(w, base, &aty, &format!("{}_copy", node.id));
        w.line(&format!("{ident}[(unsigned int)({index})] = {val};"));
        Ok(())
    }

    /// The local variable behind an `array_set`, when the array operand is a
    /// `var_get` (directly or through an edge) or names a local itself.
    fn array_set_target(&mut self, node: &Node) -> Option<String> {
        let source = self
            .edges
            .data_into(&node.id, "array")
            .map(|e| e.from.clone())
            .or_else(|| node.attr_str("array").map(str::to_string))?;
        if self.func.local_var(&source).is_some() {
            return Some(source);
        }
        let src_node = self.node(&source)?;
        if src_node.op == "var_get" {
            let var = src_node.attr_str("var")?.to_string();
            if self.func.local_var(&var).is_some() {
                return Some(var);
            }
        }
        None
    }

    fn emit_buffer_store(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let rid = node.attr_str("buffer").unwrap_or("").to_string();
        let idx = self.binding_of(node, &rid)?;
        let stride = self.doc.resource(&rid).map(|r| r.stride()).unwrap_or(1);
        let index = self.resolve_arg(w, node, "index", &ValueType::Int)?;
        if stride == 1 {
            let val = self.resolve_arg(w, node, "val", &ValueType::Float)?;
            w.line(&format!(
                "ctx.resources[{idx}]->data[(unsigned int)({index})] = {val};"
            ));
        } else {
            let val = self.resolve_arg(w, node, "val", &ValueType::Vec(stride as u8))?;
            w.line(&format!(
                "ctx.resources[{idx}]->storeVec((unsigned int)({index}), {val});"
            ));
        }
        Ok(())
    }

    fn emit_return(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        if !self.func.returns_value() {
            w.line("return;");
            return Ok(());
        }
        let has_value = self.edges.data_into(&node.id, ports::VAL).is_some()
            || node.attr(ports::VAL).is_some()
            || node.attr(ports::VALUE).is_some();
        let val = if has_value {
            self.resolve_arg(w, node, ports::VAL, &ValueType::Float)?
        } else {
            "0.0f".to_string()
        };
        // Publish the value so value-returning entry functions can be
        // inspected by the harness.
        w.line(&format!("ctx.setReturnValue({val});"));
        w.line(&format!("return {val};"));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn emit_dispatch(&mut self, w: &mut CodeWriter, node: &'a Node) -> Result<(), CompileError> {
        let doc = self.doc;
        let target = node.attr_str("func").unwrap_or("").to_string();
        let callee = doc
            .function(&target)
            .ok_or_else(|| CompileError::FunctionNotFound { id: target.clone() })?;
        let args_name = format!("{}_args", mangle(&node.id, Namespace::NodeResult));
        w.line(&format!("std::vector<float> {args_name};"));

        let arg_map = node.attr_map("args").cloned();
        for (pos, p) in callee.inputs.iter().enumerate() {
            if p.ty == "texture2d" {
                continue; // textures bind through the resource table
            }
            let ty = map_type(&p.ty, doc)?;
            let from = self
                .edges
                .data_into(&node.id, &p.id)
                .map(|e| e.from.clone());
            let expr = if let Some(from) = from {
                Some(self.compile_inline(w, &from)?)
            } else if let Some(v) = arg_map.as_ref().and_then(|m| m.get(&p.id)).cloned() {
                Some(self.attr_value_expr(w, node, &v, &ty)?)
            } else if let Some(v) = node.attr(&p.id).cloned() {
                Some(self.attr_value_expr(w, node, &v, &ty)?)
            } else {
                None
            };
            match expr {
                None => {
                    // Missing argument: zero-fill (a dynamic array gets a
                    // zero length prefix).
                    let zeros = flat_float_count(&ty, doc).unwrap_or(1);
                    for _ in 0..zeros {
                        w.line(&format!("{args_name}.push_back(0.0f);"));
                    }
                }
                Some(e) => {
                    if ty.is_scalar() || ty == ValueType::Unknown {
                        let e = if ty.is_integer_like() {
                            format!("(float)({e})")
                        } else {
                            e
                        };
                        w.line(&format!("{args_name}.push_back({e});"));
                    } else {
                        let hint = format!("{}_a{pos}", node.id);
                        let ident = self.as_ident(w, e, &ty, &hint);
                        self.flatten_push(w, &args_name, &ident, &ty, 0)?;
                    }
                }
            }
        }

        // CPU-visible builtins the shader reads are appended after the
        // declared inputs.
        let mut seen: Vec<&str> = Vec::new();
        for n in &callee.nodes {
            if n.op != "builtin_get" {
                continue;
            }
            let Some(name) = n.attr_str("name") else { continue };
            if !CPU_BUILTINS.contains(&name) || seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if name == "resolution" {
                w.line(&format!(
                    "{args_name}.push_back(ctx.getInput(\"resolution_0\"));"
                ));
                w.line(&format!(
                    "{args_name}.push_back(ctx.getInput(\"resolution_1\"));"
                ));
            } else {
                w.line(&format!(
                    "{args_name}.push_back(ctx.getInput(\"{name}\"));"
                ));
            }
        }

        let (x, y, z) = self.dispatch_dims(w, node)?;
        w.line(&format!(
            "ctx.dispatchShader(\"{target}\", {x}, {y}, {z}, {args_name});"
        ));
        Ok(())
    }

    /// Pushes the flattened float components of `expr` (an identifier) onto
    /// the argument vector. Dynamic arrays prepend their length.
    fn flatten_push(
        &mut self,
        w: &mut CodeWriter,
        args: &str,
        expr: &str,
        ty: &ValueType,
        depth: usize,
    ) -> Result<(), CompileError> {
        match ty {
            ValueType::Float => w.line(&format!("{args}.push_back({expr});")),
            ValueType::Int | ValueType::Uint | ValueType::Bool => {
                w.line(&format!("{args}.push_back((float)({expr}));"))
            }
            ValueType::Vec(_) | ValueType::Mat3 | ValueType::Mat4 | ValueType::Quat => {
                let n = ty.float_components().unwrap_or(0);
                for k in 0..n {
                    w.line(&format!("{args}.push_back({expr}[{k}]);"));
                }
            }
            ValueType::Struct(id) => {
                let def = self
                    .doc
                    .struct_def(id)
                    .ok_or_else(|| CompileError::UnknownStruct { id: id.clone() })?;
                let members: Vec<(String, String)> = def
                    .members
                    .iter()
                    .map(|m| (m.name.clone(), m.ty.clone()))
                    .collect();
                for (name, mty) in members {
                    let mty = map_type(&mty, self.doc)?;
                    let access = format!("{expr}.{}", mangle(&name, Namespace::Field));
                    self.flatten_push(w, args, &access, &mty, depth)?;
                }
            }
            ValueType::Array {
                elem,
                len: Some(n),
            } => {
                for k in 0..*n {
                    self.flatten_push(w, args, &format!("{expr}[{k}]"), elem, depth)?;
                }
            }
            ValueType::Array { elem, len: None } => {
                w.line(&format!("{args}.push_back((float)({expr}.size()));"));
                let i = format!("k{depth}");
                w.open_block(&format!(
                    "for (size_t {i} = 0; {i} < {expr}.size(); ++{i})"
                ));
                let elem = (**elem).clone();
                self.flatten_push(w, args, &format!("{expr}[{i}]"), &elem, depth + 1)?;
                w.close_block();
            }
            ValueType::Void | ValueType::Unknown => {
                w.line(&format!("{args}.push_back(0.0f);"))
            }
        }
        Ok(())
    }

    /// The three dispatch extents: literal numbers, a `resource_get_size`
    /// result, or per-axis node references.
    fn dispatch_dims(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<(String, String, String), CompileError> {
        match node.attr("dispatch").cloned() {
            Some(AttrValue::List(items)) => {
                let mut dims = Vec::with_capacity(3);
                for item in items.iter().take(3) {
                    dims.push(match item {
                        AttrValue::Number(n) => literal::int_literal(*n),
                        AttrValue::Str(s) => {
                            let e = self.attr_value_expr(
                                w,
                                node,
                                &AttrValue::Str(s.clone()),
                                &ValueType::Float,
                            )?;
                            format!("(int)({e})")
                        }
                        _ => "1".to_string(),
                    });
                }
                while dims.len() < 3 {
                    dims.push("1".to_string());
                }
                Ok((dims[0].clone(), dims[1].clone(), dims[2].clone()))
            }
            Some(AttrValue::Str(s)) => {
                let ty = self.arg_type(node, "dispatch");
                let e =
                    self.attr_value_expr(w, node, &AttrValue::Str(s), &ValueType::Vec(2))?;
                if ty == ValueType::Vec(2) {
                    let ident = self.as_ident(
                        w,
                        e,
                        &ValueType::Vec(2),
                        &format!("{}_dim", node.id),
                    );
                    Ok((
                        format!("(int)({ident}[0])"),
                        format!("(int)({ident}[1])"),
                        "1".to_string(),
                    ))
                } else {
                    Ok((format!("(int)({e})"), "1".to_string(), "1".to_string()))
                }
            }
            Some(AttrValue::Number(n)) => Ok((
                literal::int_literal(n),
                "1".to_string(),
                "1".to_string(),
            )),
            _ => Ok(("1".to_string(), "1".to_string(), "1".to_string())),
        }
    }

    fn emit_resize(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let rid = node.attr_str("resource").unwrap_or("").to_string();
        let idx = self.binding_of(node, &rid)?;
        let resource = self.doc.resource(&rid);
        let is_texture = resource.map(|r| r.is_texture()).unwrap_or(true);
        let clear = node.attr("clear").cloned();

        if is_texture {
            let (wd, ht) = self.resize_extent_2d(w, node)?;
            match clear {
                Some(AttrValue::Number(n)) => w.line(&format!(
                    "ctx.resizeResource2DWithClear({idx}, {wd}, {ht}, {});",
                    literal::float_literal(n)?
                )),
                Some(AttrValue::Bool(true)) => w.line(&format!(
                    "ctx.resizeResource2DWithClear({idx}, {wd}, {ht}, 0.0f);"
                )),
                _ => w.line(&format!("ctx.resizeResource2D({idx}, {wd}, {ht});")),
            }
        } else {
            let len = self.resize_extent_1d(w, node)?;
            let stride = resource.map(|r| r.stride()).unwrap_or(1);
            match clear {
                Some(AttrValue::Bool(b)) => w.line(&format!(
                    "ctx.resizeResource({idx}, {len}, {stride}u, {b});"
                )),
                Some(AttrValue::Number(n)) => w.line(&format!(
                    "ctx.resizeResource({idx}, {len}, {stride}u, {});",
                    literal::float_literal(n)?
                )),
                _ => w.line(&format!("ctx.resizeResource({idx}, {len}, {stride}u);")),
            }
        }
        Ok(())
    }

    fn resize_extent_1d(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<String, CompileError> {
        match node.attr("size").cloned() {
            Some(AttrValue::Number(n)) => Ok(literal::uint_literal(n)),
            Some(v) => {
                let e = self.attr_value_expr(w, node, &v, &ValueType::Float)?;
                Ok(format!("(unsigned int)({e})"))
            }
            None => Ok("0u".to_string()),
        }
    }

    fn resize_extent_2d(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
    ) -> Result<(String, String), CompileError> {
        match node.attr("size").cloned() {
            Some(AttrValue::List(items)) if items.len() >= 2 => {
                let mut out = Vec::with_capacity(2);
                for item in items.iter().take(2) {
                    out.push(match item {
                        AttrValue::Number(n) => literal::uint_literal(*n),
                        other => {
                            let e =
                                self.attr_value_expr(w, node, other, &ValueType::Float)?;
                            format!("(unsigned int)({e})")
                        }
                    });
                }
                Ok((out[0].clone(), out[1].clone()))
            }
            Some(AttrValue::Str(s)) => {
                let e = self.attr_value_expr(
                    w,
                    node,
                    &AttrValue::Str(s),
                    &ValueType::Vec(2),
                )?;
                let ident =
                    self.as_ident(w, e, &ValueType::Vec(2), &format!("{}_size", node.id));
                Ok((
                    format!("(unsigned int)({ident}[0])"),
                    format!("(unsigned int)({ident}[1])"),
                ))
            }
            _ => Ok(("0u".to_string(), "0u".to_string())),
        }
    }

    fn emit_draw(&mut self, w: &mut CodeWriter, node: &Node) -> Result<(), CompileError> {
        let target = node.attr_str("target").unwrap_or("").to_string();
        let idx = self.binding_of(node, &target)?;
        let vs = node.attr_str("vertex").unwrap_or("").to_string();
        let fs = node.attr_str("fragment").unwrap_or("").to_string();
        let count = match node.attr("count").cloned() {
            Some(AttrValue::Number(n)) => literal::uint_literal(n),
            Some(v) => {
                let e = self.attr_value_expr(w, node, &v, &ValueType::Float)?;
                format!("(unsigned int)({e})")
            }
            None => "0u".to_string(),
        };
        w.line(&format!("ctx.draw({idx}, \"{vs}\", \"{fs}\", {count});"));
        Ok(())
    }

    /// Resolves a loop bound or 1-D extent to an integer expression.
    fn int_bound(
        &mut self,
        w: &mut CodeWriter,
        node: &Node,
        key: &str,
        default: i64,
    ) -> Result<String, CompileError> {
        if self.edges.data_into(&node.id, key).is_none() {
            match node.attr(key) {
                Some(AttrValue::Number(n)) => return Ok(literal::int_literal(*n)),
                None => return Ok(default.to_string()),
                _ => {}
            }
        }
        let ty = self.arg_type(node, key);
        let expr = self.resolve_arg(w, node, key, &ValueType::Int)?;
        if ty.is_integer_like() {
            Ok(expr)
        } else {
            Ok(format!("(int)({expr})"))
        }
    }
}
