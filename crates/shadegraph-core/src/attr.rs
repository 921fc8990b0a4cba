//! Attribute values for the schema-light node bag.
//!
//! IR nodes carry op-specific attributes (`var`, `val`, `func`, `args`,
//! `dispatch`, ...) whose shapes are only known per op. [`AttrValue`] is the
//! untagged sum of every shape the IR produces; nodes store an
//! insertion-ordered map of them so that attribute order survives a load/save
//! round trip (edge reconstruction iterates attributes in document order).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single attribute value on a node, input default, or `meta` entry.
///
/// Untagged: JSON `true`, `1.5`, `"a"`, `[...]` and `{...}` map directly onto
/// the variants. `Bool` is listed before `Number` so booleans are not read as
/// numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<AttrValue>),
    Map(IndexMap<String, AttrValue>),
}

impl AttrValue {
    /// The value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as a number, if it is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The value as a map, if it is one.
    pub fn as_map(&self) -> Option<&IndexMap<String, AttrValue>> {
        match self {
            AttrValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// `true` if every element of a list value is a number. Non-lists are
    /// `false`.
    pub fn is_number_list(&self) -> bool {
        match self {
            AttrValue::List(items) => items.iter().all(|v| matches!(v, AttrValue::Number(_))),
            _ => false,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_not_read_as_number() {
        let v: AttrValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttrValue::Bool(true));
        assert!(v.as_number().is_none());
    }

    #[test]
    fn number_roundtrip() {
        let v: AttrValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(v.as_number(), Some(2.5));
        let json = serde_json::to_string(&v).unwrap();
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn string_and_list() {
        let v: AttrValue = serde_json::from_str(r#"["a", 1, true]"#).unwrap();
        let items = v.as_list().unwrap();
        assert_eq!(items[0].as_str(), Some("a"));
        assert_eq!(items[1].as_number(), Some(1.0));
        assert_eq!(items[2].as_bool(), Some(true));
        assert!(!v.is_number_list());
    }

    #[test]
    fn number_list_detection() {
        let v: AttrValue = serde_json::from_str("[1, 2, 3.5]").unwrap();
        assert!(v.is_number_list());
    }

    #[test]
    fn map_preserves_insertion_order() {
        let v: AttrValue = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = v.as_map().unwrap().keys().map(|s| s.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
