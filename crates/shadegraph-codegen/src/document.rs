//! Document-level emission and the `compile` entry point.
//!
//! Composition order of the emitted file: banner, includes, struct
//! definitions (every struct in the IR, regardless of use), forward
//! declarations for the required functions, definitions in reverse
//! insertion order (callees first), the `func_main` entry wrapper, and the
//! guarded plug-in adapter block.

use shadegraph_core::{AttrValue, Function, IrDocument, ValueType};

use crate::callgraph;
use crate::error::CompileError;
use crate::func::{emit_function, forward_declaration};
use crate::literal;
use crate::mangle::{mangle, Namespace};
use crate::types::{c_type, flat_float_count, input_components, is_input_leaf, map_type};
use crate::writer::CodeWriter;
use crate::{CompileResult, ShaderParam, ShaderRef};

/// Compiles the IR document for the given entry function into target source
/// plus the canonical resource order and referenced shader descriptors.
pub fn compile(doc: &IrDocument, entry_point_id: &str) -> Result<CompileResult, CompileError> {
    let entry = doc
        .function(entry_point_id)
        .ok_or_else(|| CompileError::EntryNotFound {
            id: entry_point_id.to_string(),
        })?;
    let graph = callgraph::walk(doc, entry_point_id)?;

    let mut w = CodeWriter::new();
    w.line(&format!(
        "// Generated CPU program for entry '{entry_point_id}'"
    ));
    w.blank();
    w.line("#include <array>");
    w.line("#include <cmath>");
    w.line("#include <cstddef>");
    w.line("#include <vector>");
    w.blank();
    w.line("#include \"shadegraph_harness.h\"");
    w.blank();

    emit_structs(&mut w, doc)?;

    for id in &graph.required {
        let func = doc
            .function(id)
            .ok_or_else(|| CompileError::FunctionNotFound { id: id.clone() })?;
        w.line(&forward_declaration(func));
    }
    if !graph.required.is_empty() {
        w.blank();
    }

    for id in graph.emission_order() {
        let func = doc
            .function(id)
            .ok_or_else(|| CompileError::FunctionNotFound { id: id.to_string() })?;
        emit_function(&mut w, doc, func)?;
        w.blank();
    }

    emit_entry_wrapper(&mut w, doc, entry)?;
    emit_plugin_adapter(&mut w, doc)?;

    let resource_ids: Vec<String> = doc
        .resource_order()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut shader_refs = Vec::with_capacity(graph.shaders.len());
    for id in &graph.shaders {
        let func = doc
            .function(id)
            .ok_or_else(|| CompileError::FunctionNotFound { id: id.clone() })?;
        shader_refs.push(ShaderRef {
            id: id.clone(),
            inputs: func
                .inputs
                .iter()
                .map(|p| ShaderParam {
                    id: p.id.clone(),
                    ty: p.ty.clone(),
                })
                .collect(),
        });
    }

    Ok(CompileResult {
        code: w.finish(),
        resource_ids,
        shader_refs,
    })
}

/// Every struct in the IR is emitted, used or not, so emitted files never
/// depend on cross-file struct availability.
fn emit_structs(w: &mut CodeWriter, doc: &IrDocument) -> Result<(), CompileError> {
    for def in &doc.structs {
        w.open_block(&format!("struct {}", mangle(&def.id, Namespace::Struct)));
        for m in &def.members {
            let ty = map_type(&m.ty, doc)?;
            w.line(&format!(
                "{} {};",
                c_type(&ty),
                mangle(&m.name, Namespace::Field)
            ));
        }
        w.close_block_stmt();
        w.blank();
    }
    Ok(())
}

/// The `func_main` wrapper. CPU entries forward harness-read inputs; shader
/// entries marshal global inputs into a dispatch argument buffer and
/// dispatch `1, 1, 1`.
fn emit_entry_wrapper(
    w: &mut CodeWriter,
    doc: &IrDocument,
    entry: &Function,
) -> Result<(), CompileError> {
    if entry.is_shader() {
        w.open_block("void func_main(EvalContext& ctx)");
        w.line("std::vector<float> args;");
        for p in &entry.inputs {
            if p.ty == "texture2d" {
                continue; // bound through the resource table
            }
            let ty = map_type(&p.ty, doc)?;
            if doc.global_input(&p.id).is_some() {
                push_input_reads(w, "args", &p.id, &ty, doc);
            } else {
                let zeros = flat_float_count(&ty, doc).unwrap_or(1);
                for _ in 0..zeros {
                    w.line("args.push_back(0.0f);");
                }
            }
        }
        w.line(&format!(
            "ctx.dispatchShader(\"{}\", 1, 1, 1, args);",
            entry.id
        ));
        w.close_block();
        w.blank();
        return Ok(());
    }

    let mangled = mangle(&entry.id, Namespace::Function);
    if mangled == "func_main" {
        return Ok(());
    }
    let ret = entry.returns_value();
    w.open_block(&format!(
        "{} func_main(EvalContext& ctx)",
        if ret { "float" } else { "void" }
    ));
    let mut args = vec!["ctx".to_string()];
    for p in &entry.inputs {
        args.push(format!("ctx.getInput(\"{}\")", p.id));
    }
    let call = format!("{mangled}({})", args.join(", "));
    if ret {
        w.line(&format!("return {call};"));
    } else {
        w.line(&format!("{call};"));
    }
    w.close_block();
    w.blank();
    Ok(())
}

/// Pushes the flattened harness reads of one global input onto an argument
/// vector, following the `name_0..name_{n-1}` convention (one
/// [`input_components`] walk shared with the expression compiler).
fn push_input_reads(w: &mut CodeWriter, args: &str, name: &str, ty: &ValueType, doc: &IrDocument) {
    let components = input_components(name, ty, None, doc);
    if components.is_empty() {
        if is_input_leaf(ty) {
            w.line(&format!("{args}.push_back(ctx.getInput(\"{name}\"));"));
        } else {
            w.line(&format!("{args}.push_back(0.0f);"));
        }
        return;
    }
    for (n, t, _) in &components {
        push_input_reads(w, args, n, t, doc);
    }
}

/// One flattened parameter slot per scalar leaf of the same
/// [`input_components`] walk: emitted name and default value.
fn flatten_param_slots(
    name: &str,
    ty: &ValueType,
    default: Option<&AttrValue>,
    doc: &IrDocument,
    out: &mut Vec<(String, f64)>,
) {
    let components = input_components(name, ty, default, doc);
    if components.is_empty() {
        if is_input_leaf(ty) {
            let d = match default {
                Some(AttrValue::Number(n)) => *n,
                Some(AttrValue::Bool(true)) => 1.0,
                _ => 0.0,
            };
            out.push((name.to_string(), d));
        }
        return;
    }
    for (n, t, d) in &components {
        flatten_param_slots(n, t, *d, doc, out);
    }
}

/// The guarded plug-in adapter: parameter slot registration, host-to-harness
/// parameter mapping, and resource registration in canonical order.
fn emit_plugin_adapter(w: &mut CodeWriter, doc: &IrDocument) -> Result<(), CompileError> {
    let mut slots: Vec<(String, f64)> = Vec::new();
    for gi in &doc.inputs {
        if gi.is_texture() {
            continue;
        }
        let ty = map_type(&gi.ty, doc)?;
        flatten_param_slots(&gi.id, &ty, gi.default.as_ref(), doc, &mut slots);
    }

    w.line("#ifdef SHADEGRAPH_PLUGIN_ADAPTER");
    w.open_block("void shadegraph_register_plugin(PluginHost& host)");
    for (slot, (name, default)) in slots.iter().enumerate() {
        w.line(&format!(
            "host.addParameter({slot}, \"{name}\", {});",
            literal::float_literal(*default)?
        ));
    }
    for (i, rid) in doc.resource_order().iter().enumerate() {
        let (is_texture, width, height) = match doc.resource(rid) {
            Some(r) => (
                r.is_texture(),
                r.width.unwrap_or(0.0) as i64,
                r.height.unwrap_or(0.0) as i64,
            ),
            // Ids in canonical order that are not resources are texture
            // inputs.
            None => (true, 0, 0),
        };
        w.line(&format!(
            "host.addResource({i}, \"{rid}\", {is_texture}, {width}, {height});"
        ));
    }
    w.close_block();
    w.blank();
    w.open_block("void shadegraph_apply_parameters(PluginHost& host, EvalContext& ctx)");
    for (slot, (name, _)) in slots.iter().enumerate() {
        w.line(&format!(
            "ctx.setInput(\"{name}\", host.parameterValue({slot}));"
        ));
    }
    w.close_block();
    w.line("#endif // SHADEGRAPH_PLUGIN_ADAPTER");
    Ok(())
}
