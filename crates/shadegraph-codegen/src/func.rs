//! Function emission: headers, locals, body, forward declarations.
//!
//! Every CPU function takes the harness context first, then one `float`
//! parameter per declared input; the return type is `float` when the
//! function declares any output and `void` otherwise.

use shadegraph_core::{AttrValue, Function, IrDocument, ValueType};

use crate::error::CompileError;
use crate::infer::FunctionCx;
use crate::literal;
use crate::mangle::{mangle, Namespace};
use crate::types::{c_type, map_type, zero_value};
use crate::writer::CodeWriter;

/// The function header, shared between forward declarations and
/// definitions.
pub(crate) fn signature(func: &Function) -> String {
    let ret = if func.returns_value() { "float" } else { "void" };
    let mut params = vec!["EvalContext& ctx".to_string()];
    for p in &func.inputs {
        params.push(format!("float {}", mangle(&p.id, Namespace::Input)));
    }
    format!(
        "{ret} {}({})",
        mangle(&func.id, Namespace::Function),
        params.join(", ")
    )
}

/// A forward declaration line.
pub(crate) fn forward_declaration(func: &Function) -> String {
    format!("{};", signature(func))
}

/// Emits a full function definition: header, local declarations, body.
pub(crate) fn emit_function(
    w: &mut CodeWriter,
    doc: &IrDocument,
    func: &Function,
) -> Result<(), CompileError> {
    w.open_block(&signature(func));
    for lv in &func.local_vars {
        let ty = map_type(&lv.ty, doc)?;
        let name = mangle(&lv.id, Namespace::Variable);
        let init = local_initializer(&ty, lv.initial_value.as_ref())?;
        w.line(&format!("{} {name} = {init};", c_type(&ty)));
    }
    let mut cx = FunctionCx::new(doc, func);
    cx.emit_body(w)?;
    w.close_block();
    Ok(())
}

/// Initial value of a local: the declared scalar/aggregate literal, or the
/// type's zero value.
fn local_initializer(
    ty: &ValueType,
    initial: Option<&AttrValue>,
) -> Result<String, CompileError> {
    match initial {
        Some(AttrValue::Number(n)) => literal::number(*n, ty),
        Some(AttrValue::Bool(b)) => Ok(literal::bool_literal(*b, ty).to_string()),
        Some(AttrValue::List(items)) => {
            let Some(nums) = literal::number_list(items) else {
                return Ok(zero_value(ty));
            };
            let len = match ty {
                ValueType::Vec(n) => *n as usize,
                ValueType::Quat => 4,
                ValueType::Mat3 => 9,
                ValueType::Mat4 => 16,
                ValueType::Array { len: Some(n), .. } => *n,
                _ => nums.len(),
            };
            literal::float_array_literal(&nums, len)
        }
        _ => Ok(zero_value(ty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(v: serde_json::Value) -> Function {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn signature_shapes() {
        let void_fn = func(serde_json::json!({"id": "main"}));
        assert_eq!(signature(&void_fn), "void func_main(EvalContext& ctx)");

        let value_fn = func(serde_json::json!({
            "id": "helper",
            "inputs": [{"id": "x", "type": "float"}, {"id": "y", "type": "float"}],
            "outputs": [{"type": "float"}]
        }));
        assert_eq!(
            signature(&value_fn),
            "float func_helper(EvalContext& ctx, float i_x, float i_y)"
        );
        assert_eq!(
            forward_declaration(&value_fn),
            "float func_helper(EvalContext& ctx, float i_x, float i_y);"
        );
    }

    #[test]
    fn local_initializers() {
        let doc = IrDocument::default();
        let f = func(serde_json::json!({
            "id": "main",
            "local_vars": [
                {"id": "a", "type": "float", "initial_value": 0},
                {"id": "b", "type": "float3", "initial_value": [1, 2, 3]},
                {"id": "c", "type": "int", "initial_value": 7},
                {"id": "d", "type": "bool", "initial_value": true},
                {"id": "e", "type": "float4"}
            ]
        }));
        let mut w = CodeWriter::new();
        emit_function(&mut w, &doc, &f).unwrap();
        let out = w.finish();
        assert!(out.contains("float v_a = 0.0f;"));
        assert!(out.contains(
            "std::array<float, 3> v_b = std::array<float, 3>{1.0f, 2.0f, 3.0f};"
        ));
        assert!(out.contains("int v_c = 7;"));
        assert!(out.contains("bool v_d = true;"));
        assert!(out.contains("std::array<float, 4> v_e = std::array<float, 4>{};"));
    }

    #[test]
    fn unknown_local_type_errors() {
        let doc = IrDocument::default();
        let f = func(serde_json::json!({
            "id": "main",
            "local_vars": [{"id": "a", "type": "wat"}]
        }));
        let mut w = CodeWriter::new();
        assert!(matches!(
            emit_function(&mut w, &doc, &f),
            Err(CompileError::UnknownType { .. })
        ));
    }
}
