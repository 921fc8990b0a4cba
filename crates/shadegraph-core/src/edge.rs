//! Edges between node ports.
//!
//! Data edges carry values between typed ports; execution edges order side
//! effects and select branch/loop arms. Execution edges are only ever stored
//! explicitly; data edges may be reconstructed from node attributes when a
//! function stores none (see the codegen edge index).

use serde::{Deserialize, Serialize};

/// Edge kind: value flow or execution ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Data,
    Execution,
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::Data
    }
}

/// A directed edge between two node ports within one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub port_out: String,
    #[serde(default)]
    pub port_in: String,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
}

impl Edge {
    /// `true` for data edges.
    pub fn is_data(&self) -> bool {
        self.kind == EdgeKind::Data
    }

    /// `true` for execution edges.
    pub fn is_execution(&self) -> bool {
        self.kind == EdgeKind::Execution
    }
}

/// Well-known port names.
pub mod ports {
    pub const EXEC_IN: &str = "exec_in";
    pub const EXEC_OUT: &str = "exec_out";
    pub const EXEC_TRUE: &str = "exec_true";
    pub const EXEC_FALSE: &str = "exec_false";
    pub const EXEC_BODY: &str = "exec_body";
    pub const EXEC_COMPLETED: &str = "exec_completed";
    pub const VAL: &str = "val";
    pub const VALUE: &str = "value";

    /// The `val`/`value` port alias: the IR uses both spellings for the same
    /// port on assigns and returns. Returns the other spelling, or `None` for
    /// unaliased ports.
    pub fn alias(port: &str) -> Option<&'static str> {
        match port {
            VAL => Some(VALUE),
            VALUE => Some(VAL),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        let data = Edge {
            from: "a".into(),
            to: "b".into(),
            port_out: "out".into(),
            port_in: "a".into(),
            kind: EdgeKind::Data,
        };
        assert!(data.is_data());
        assert!(!data.is_execution());

        let exec = Edge {
            kind: EdgeKind::Execution,
            ..data.clone()
        };
        assert!(exec.is_execution());
    }

    #[test]
    fn kind_defaults_to_data() {
        let e: Edge = serde_json::from_value(serde_json::json!({
            "from": "a", "to": "b", "port_out": "out", "port_in": "val"
        }))
        .unwrap();
        assert!(e.is_data());
    }

    #[test]
    fn kind_string_forms() {
        let e: Edge = serde_json::from_value(serde_json::json!({
            "from": "a", "to": "b", "port_out": "exec_out", "port_in": "exec_in",
            "type": "execution"
        }))
        .unwrap();
        assert!(e.is_execution());
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"execution\""));
    }

    #[test]
    fn val_value_alias() {
        assert_eq!(ports::alias("val"), Some("value"));
        assert_eq!(ports::alias("value"), Some("val"));
        assert_eq!(ports::alias("cond"), None);
    }
}
