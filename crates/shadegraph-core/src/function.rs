//! Function definitions.
//!
//! A function owns its nodes and (optionally) explicit edges. CPU functions
//! are emitted as target source; shader functions are only referenced by
//! dispatch/draw commands and excluded from CPU emission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attr::AttrValue;
use crate::edge::Edge;
use crate::node::Node;

/// Where a function executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Cpu,
    Shader,
}

impl Default for FunctionKind {
    fn default() -> Self {
        FunctionKind::Cpu
    }
}

/// A declared function input: id plus IR type string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A declared output. At most one; an empty output list means void.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "type")]
    pub ty: String,
}

/// A function-local variable with an optional initial value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalVar {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub initial_value: Option<AttrValue>,
}

/// A function: signature, locals, and the node/edge graph of its body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub local_vars: Vec<LocalVar>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Function {
    /// `true` for shader functions.
    pub fn is_shader(&self) -> bool {
        self.kind == FunctionKind::Shader
    }

    /// `true` if the function declares a return value.
    pub fn returns_value(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Linear node lookup by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Builds an id -> index map over `nodes` for O(1) lookup during a
    /// compile pass.
    pub fn node_map(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect()
    }

    /// Declared local by id.
    pub fn local_var(&self, id: &str) -> Option<&LocalVar> {
        self.local_vars.iter().find(|v| v.id == id)
    }

    /// Declared input by id.
    pub fn input(&self, id: &str) -> Option<&Param> {
        self.inputs.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Function {
        serde_json::from_value(serde_json::json!({
            "id": "main",
            "inputs": [{"id": "x", "type": "float"}],
            "outputs": [{"type": "float"}],
            "local_vars": [{"id": "v", "type": "float", "initial_value": 0}],
            "nodes": [
                {"id": "a", "op": "literal", "val": 1},
                {"id": "r", "op": "func_return", "val": "a"}
            ],
            "edges": []
        }))
        .unwrap()
    }

    #[test]
    fn kind_defaults_to_cpu() {
        let f = sample();
        assert_eq!(f.kind, FunctionKind::Cpu);
        assert!(!f.is_shader());
    }

    #[test]
    fn shader_kind_parses() {
        let f: Function =
            serde_json::from_value(serde_json::json!({"id": "K", "type": "shader"})).unwrap();
        assert!(f.is_shader());
        assert!(!f.returns_value());
    }

    #[test]
    fn lookups() {
        let f = sample();
        assert!(f.returns_value());
        assert_eq!(f.node("a").unwrap().op, "literal");
        assert!(f.node("zzz").is_none());
        assert_eq!(f.local_var("v").unwrap().ty, "float");
        assert_eq!(f.input("x").unwrap().ty, "float");
        let map = f.node_map();
        assert_eq!(map["a"], 0);
        assert_eq!(map["r"], 1);
    }

    #[test]
    fn serde_roundtrip() {
        let f = sample();
        let json = serde_json::to_string(&f).unwrap();
        let back: Function = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&back).unwrap();
        assert_eq!(json, json2);
    }
}
