//! Per-function edge index.
//!
//! Built once per function. Provides port-keyed lookups over data and
//! execution edges, plus the per-node reference counts that decide when a
//! pure node is promoted to a named temporary.
//!
//! When a function stores no explicit edges, data edges are reconstructed
//! from the attribute bags: a string-typed attribute whose value names
//! another result-bearing node is a data edge with `port_in` equal to the
//! attribute key. Execution edges are only ever stored explicitly.

use std::collections::{HashMap, HashSet};

use shadegraph_core::{ports, AttrValue, Edge, EdgeKind, Function};

/// Port-keyed edge lookups for one function.
#[derive(Debug)]
pub struct EdgeIndex {
    edges: Vec<Edge>,
    /// (to, port_in) -> index into `edges`, data edges only.
    data_in: HashMap<(String, String), usize>,
    /// (from, port_out) -> index into `edges`, execution edges only.
    exec_out: HashMap<(String, String), usize>,
    /// to -> indices of incoming data edges, in edge order.
    data_in_by_node: HashMap<String, Vec<usize>>,
    /// Nodes with an incoming execution edge.
    exec_in: HashSet<String>,
    /// Nodes with an outgoing execution edge.
    exec_from: HashSet<String>,
    /// Times each node is referenced as a data source (edges plus attribute
    /// references not covered by an edge).
    refs: HashMap<String, usize>,
}

impl EdgeIndex {
    /// Builds the index for a function, reconstructing data edges from node
    /// attributes when the function stores none explicitly.
    pub fn build(func: &Function) -> EdgeIndex {
        let node_map = func.node_map();
        let edges = if func.edges.is_empty() {
            reconstruct_edges(func, &node_map)
        } else {
            func.edges.clone()
        };

        let mut index = EdgeIndex {
            edges,
            data_in: HashMap::new(),
            exec_out: HashMap::new(),
            data_in_by_node: HashMap::new(),
            exec_in: HashSet::new(),
            exec_from: HashSet::new(),
            refs: HashMap::new(),
        };

        for (i, e) in index.edges.iter().enumerate() {
            match e.kind {
                EdgeKind::Data => {
                    index
                        .data_in
                        .entry((e.to.clone(), e.port_in.clone()))
                        .or_insert(i);
                    index
                        .data_in_by_node
                        .entry(e.to.clone())
                        .or_default()
                        .push(i);
                    *index.refs.entry(e.from.clone()).or_insert(0) += 1;
                }
                EdgeKind::Execution => {
                    index
                        .exec_out
                        .entry((e.from.clone(), e.port_out.clone()))
                        .or_insert(i);
                    index.exec_in.insert(e.to.clone());
                    index.exec_from.insert(e.from.clone());
                }
            }
        }

        // Attribute references that name result-bearing nodes count towards
        // promotion even when explicit edges exist, unless an edge already
        // covers the same (node, port).
        for node in &func.nodes {
            for (key, value) in &node.attrs {
                let AttrValue::Str(s) = value else { continue };
                if s == &node.id {
                    continue;
                }
                let Some(&idx) = node_map.get(s.as_str()) else {
                    continue;
                };
                if !func.nodes[idx].has_result() {
                    continue;
                }
                if index.lookup_data_in(&node.id, key).is_some() {
                    continue;
                }
                *index.refs.entry(s.clone()).or_insert(0) += 1;
            }
        }

        index
    }

    fn lookup_data_in(&self, to: &str, port_in: &str) -> Option<&Edge> {
        if let Some(&i) = self.data_in.get(&(to.to_string(), port_in.to_string())) {
            return Some(&self.edges[i]);
        }
        let alias = ports::alias(port_in)?;
        self.data_in
            .get(&(to.to_string(), alias.to_string()))
            .map(|&i| &self.edges[i])
    }

    /// The data edge into `(to, port_in)`, honouring the `val`/`value`
    /// alias.
    pub fn data_into(&self, to: &str, port_in: &str) -> Option<&Edge> {
        self.lookup_data_in(to, port_in)
    }

    /// The execution target reached from `(from, port_out)`.
    pub fn exec_out(&self, from: &str, port_out: &str) -> Option<&str> {
        self.exec_out
            .get(&(from.to_string(), port_out.to_string()))
            .map(|&i| self.edges[i].to.as_str())
    }

    /// All data edges into `to`, in edge order.
    pub fn all_data_into(&self, to: &str) -> impl Iterator<Item = &Edge> {
        self.data_in_by_node
            .get(to)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// `true` if the node has an incoming execution edge.
    pub fn has_exec_incoming(&self, id: &str) -> bool {
        self.exec_in.contains(id)
    }

    /// `true` if the node has an outgoing execution edge.
    pub fn has_exec_outgoing(&self, id: &str) -> bool {
        self.exec_from.contains(id)
    }

    /// How many places reference this node as a data source.
    pub fn ref_count(&self, id: &str) -> usize {
        self.refs.get(id).copied().unwrap_or(0)
    }
}

/// Reconstructs data edges from attribute bags for functions that store
/// nodes but no edges. A string attribute naming another result-bearing node
/// becomes a data edge with `port_in` equal to the attribute key.
fn reconstruct_edges(func: &Function, node_map: &HashMap<&str, usize>) -> Vec<Edge> {
    let mut edges = Vec::new();
    for node in &func.nodes {
        for (key, value) in &node.attrs {
            let AttrValue::Str(s) = value else { continue };
            if s == &node.id {
                continue;
            }
            let Some(&idx) = node_map.get(s.as_str()) else {
                continue;
            };
            if !func.nodes[idx].has_result() {
                continue;
            }
            edges.push(Edge {
                from: s.clone(),
                to: node.id.clone(),
                port_out: "out".to_string(),
                port_in: key.clone(),
                kind: EdgeKind::Data,
            });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(v: serde_json::Value) -> Function {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn explicit_edges_are_indexed() {
        let f = func(serde_json::json!({
            "id": "main",
            "nodes": [
                {"id": "a", "op": "literal", "val": 1},
                {"id": "set", "op": "var_set", "var": "v"},
                {"id": "ret", "op": "func_return"}
            ],
            "edges": [
                {"from": "a", "to": "set", "port_out": "out", "port_in": "val", "type": "data"},
                {"from": "set", "to": "ret", "port_out": "exec_out", "port_in": "exec_in",
                 "type": "execution"}
            ]
        }));
        let idx = EdgeIndex::build(&f);
        assert_eq!(idx.data_into("set", "val").unwrap().from, "a");
        // The value alias finds the same edge.
        assert_eq!(idx.data_into("set", "value").unwrap().from, "a");
        assert_eq!(idx.exec_out("set", "exec_out"), Some("ret"));
        assert!(idx.has_exec_incoming("ret"));
        assert!(!idx.has_exec_incoming("set"));
        assert!(idx.has_exec_outgoing("set"));
        assert_eq!(idx.ref_count("a"), 1);
    }

    #[test]
    fn edges_reconstruct_from_attributes() {
        let f = func(serde_json::json!({
            "id": "main",
            "nodes": [
                {"id": "a", "op": "literal", "val": 1},
                {"id": "b", "op": "literal", "val": 2},
                {"id": "add", "op": "math_add", "a": "a", "b": "b"},
                {"id": "set", "op": "var_set", "var": "v", "val": "add"}
            ]
        }));
        let idx = EdgeIndex::build(&f);
        assert_eq!(idx.data_into("add", "a").unwrap().from, "a");
        assert_eq!(idx.data_into("add", "b").unwrap().from, "b");
        assert_eq!(idx.data_into("set", "val").unwrap().from, "add");
        // "v" names no node, so no edge was invented for the var attribute.
        assert!(idx.data_into("set", "var").is_none());
        assert_eq!(idx.all_data_into("add").count(), 2);
    }

    #[test]
    fn reconstruction_skips_resultless_sources() {
        let f = func(serde_json::json!({
            "id": "main",
            "nodes": [
                {"id": "l", "op": "flow_loop", "start": 0, "end": 4},
                {"id": "i", "op": "loop_index", "loop": "l"}
            ]
        }));
        let idx = EdgeIndex::build(&f);
        // flow_loop has no result; the loop attribute is not a data edge.
        assert!(idx.data_into("i", "loop").is_none());
    }

    #[test]
    fn ref_counts_combine_edges_and_attributes() {
        let f = func(serde_json::json!({
            "id": "main",
            "nodes": [
                {"id": "a", "op": "literal", "val": 1},
                {"id": "add", "op": "math_add", "a": "a", "b": "a"}
            ]
        }));
        let idx = EdgeIndex::build(&f);
        // Referenced on both ports of the add.
        assert_eq!(idx.ref_count("a"), 2);
        assert_eq!(idx.ref_count("add"), 0);
    }
}
