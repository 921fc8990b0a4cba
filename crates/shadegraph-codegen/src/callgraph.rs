//! Call-graph traversal.
//!
//! Depth-first walk from the entry function collecting the transitive set of
//! CPU functions, in insertion order. Emission order is the reverse of
//! insertion, so callees are always defined before their callers. Shader
//! functions referenced by `cmd_dispatch`/`cmd_draw` are collected
//! separately and never recursed into for CPU emission.

use shadegraph_core::IrDocument;

use crate::error::CompileError;

/// Result of the call-graph walk.
#[derive(Debug, Default)]
pub struct CallGraph {
    /// CPU functions required by the entry, in discovery order.
    pub required: Vec<String>,
    /// Shader functions referenced by dispatch/draw nodes, in discovery
    /// order.
    pub shaders: Vec<String>,
}

impl CallGraph {
    /// Function ids in emission order (callees before callers).
    pub fn emission_order(&self) -> impl Iterator<Item = &str> {
        self.required.iter().rev().map(String::as_str)
    }
}

/// Walks the call graph from `entry`, failing with
/// [`CompileError::Recursion`] when a CPU call cycle is reachable.
pub fn walk(doc: &IrDocument, entry: &str) -> Result<CallGraph, CompileError> {
    let mut graph = CallGraph::default();
    let mut stack = Vec::new();
    visit(doc, entry, &mut stack, &mut graph)?;
    Ok(graph)
}

fn visit(
    doc: &IrDocument,
    id: &str,
    stack: &mut Vec<String>,
    graph: &mut CallGraph,
) -> Result<(), CompileError> {
    if stack.iter().any(|s| s == id) {
        let mut path = stack.clone();
        path.push(id.to_string());
        return Err(CompileError::Recursion { path });
    }

    let func = doc
        .function(id)
        .ok_or_else(|| CompileError::FunctionNotFound { id: id.to_string() })?;

    if func.is_shader() {
        record_shader(graph, id);
        return Ok(());
    }

    if graph.required.iter().any(|f| f == id) {
        return Ok(());
    }
    graph.required.push(id.to_string());

    stack.push(id.to_string());
    for node in &func.nodes {
        match node.op.as_str() {
            "call_func" => {
                if let Some(target) = node.attr_str("func") {
                    visit(doc, target, stack, graph)?;
                }
            }
            "cmd_dispatch" => {
                if let Some(target) = node.attr_str("func") {
                    record_shader(graph, target);
                }
            }
            "cmd_draw" => {
                for key in ["vertex", "fragment"] {
                    if let Some(target) = node.attr_str(key) {
                        record_shader(graph, target);
                    }
                }
            }
            _ => {}
        }
    }
    stack.pop();
    Ok(())
}

fn record_shader(graph: &mut CallGraph, id: &str) {
    if !graph.shaders.iter().any(|s| s == id) {
        graph.shaders.push(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(v: serde_json::Value) -> IrDocument {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn collects_transitive_callees_in_discovery_order() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "main", "nodes": [
                    {"id": "c1", "op": "call_func", "func": "helper"},
                    {"id": "c2", "op": "call_func", "func": "other"}
                ]},
                {"id": "helper", "nodes": [
                    {"id": "c", "op": "call_func", "func": "leaf"}
                ]},
                {"id": "other", "nodes": []},
                {"id": "leaf", "nodes": []}
            ]
        }));
        let g = walk(&d, "main").unwrap();
        assert_eq!(g.required, vec!["main", "helper", "leaf", "other"]);
        let order: Vec<&str> = g.emission_order().collect();
        assert_eq!(order, vec!["other", "leaf", "helper", "main"]);
        assert!(g.shaders.is_empty());
    }

    #[test]
    fn diamond_calls_are_visited_once() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "a", "nodes": [
                    {"id": "c1", "op": "call_func", "func": "b"},
                    {"id": "c2", "op": "call_func", "func": "c"}
                ]},
                {"id": "b", "nodes": [{"id": "c", "op": "call_func", "func": "d"}]},
                {"id": "c", "nodes": [{"id": "c", "op": "call_func", "func": "d"}]},
                {"id": "d", "nodes": []}
            ]
        }));
        let g = walk(&d, "a").unwrap();
        assert_eq!(g.required, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn recursion_is_rejected_with_the_full_path() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "a", "nodes": [{"id": "c", "op": "call_func", "func": "b"}]},
                {"id": "b", "nodes": [{"id": "c", "op": "call_func", "func": "a"}]}
            ]
        }));
        match walk(&d, "a") {
            Err(CompileError::Recursion { path }) => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("expected Recursion, got {other:?}"),
        }
    }

    #[test]
    fn self_recursion_is_rejected() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "a", "nodes": [{"id": "c", "op": "call_func", "func": "a"}]}
            ]
        }));
        assert!(matches!(
            walk(&d, "a"),
            Err(CompileError::Recursion { .. })
        ));
    }

    #[test]
    fn dispatch_targets_go_to_the_shader_set() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "main", "nodes": [
                    {"id": "d", "op": "cmd_dispatch", "func": "K"},
                    {"id": "w", "op": "cmd_draw", "vertex": "vs", "fragment": "fs"}
                ]},
                {"id": "K", "type": "shader", "nodes": []},
                {"id": "vs", "type": "shader", "nodes": []},
                {"id": "fs", "type": "shader", "nodes": []}
            ]
        }));
        let g = walk(&d, "main").unwrap();
        assert_eq!(g.required, vec!["main"]);
        assert_eq!(g.shaders, vec!["K", "vs", "fs"]);
    }

    #[test]
    fn shader_entry_contributes_no_cpu_functions() {
        let d = doc(serde_json::json!({
            "functions": [{"id": "K", "type": "shader", "nodes": []}]
        }));
        let g = walk(&d, "K").unwrap();
        assert!(g.required.is_empty());
        assert_eq!(g.shaders, vec!["K"]);
    }

    #[test]
    fn missing_function_errors() {
        let d = doc(serde_json::json!({
            "functions": [
                {"id": "main", "nodes": [{"id": "c", "op": "call_func", "func": "ghost"}]}
            ]
        }));
        assert!(matches!(
            walk(&d, "main"),
            Err(CompileError::FunctionNotFound { .. })
        ));
    }
}
