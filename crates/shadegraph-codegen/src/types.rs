//! Mapping from IR types to target type expressions.
//!
//! The target commits to contiguous fixed-size containers only:
//! `std::array<float, N>` for vectors, matrices, and quaternions,
//! `std::array<T, N>` for fixed arrays, and `std::vector<T>` for dynamic
//! arrays. Struct types map to their mangled identifiers.

use shadegraph_core::{AttrValue, IrDocument, ValueType};

use crate::error::CompileError;
use crate::mangle::{mangle, Namespace};

/// Parses an IR type string against the document, failing with
/// [`CompileError::UnknownType`] when it is neither built-in nor a struct id.
pub fn map_type(ty: &str, doc: &IrDocument) -> Result<ValueType, CompileError> {
    ValueType::resolve(ty, doc).ok_or_else(|| CompileError::UnknownType { ty: ty.to_string() })
}

/// The target type expression for a parsed IR type.
///
/// `Unknown` falls back to `float` -- inference degrades to identity, and a
/// scalar is the only shape that composes with every arithmetic path.
pub fn c_type(ty: &ValueType) -> String {
    match ty {
        ValueType::Float | ValueType::Unknown => "float".to_string(),
        ValueType::Int => "int".to_string(),
        ValueType::Uint => "unsigned int".to_string(),
        ValueType::Bool => "bool".to_string(),
        ValueType::Vec(n) => format!("std::array<float, {n}>"),
        ValueType::Mat3 => "std::array<float, 9>".to_string(),
        ValueType::Mat4 => "std::array<float, 16>".to_string(),
        ValueType::Quat => "std::array<float, 4>".to_string(),
        ValueType::Array {
            elem,
            len: Some(n),
        } => format!("std::array<{}, {n}>", c_type(elem)),
        ValueType::Array { elem, len: None } => format!("std::vector<{}>", c_type(elem)),
        ValueType::Struct(id) => mangle(id, Namespace::Struct),
        ValueType::Void => "void".to_string(),
    }
}

/// The zero value for a type: `0.0f`, `0`, `false`, or an empty aggregate
/// initialiser.
pub fn zero_value(ty: &ValueType) -> String {
    match ty {
        ValueType::Float | ValueType::Unknown => "0.0f".to_string(),
        ValueType::Int => "0".to_string(),
        ValueType::Uint => "0u".to_string(),
        ValueType::Bool => "false".to_string(),
        ValueType::Void => "0.0f".to_string(),
        other => format!("{}{{}}", c_type(other)),
    }
}

/// `true` for the scalar leaves of the global-input flattening convention.
pub(crate) fn is_input_leaf(ty: &ValueType) -> bool {
    ty.is_scalar() || *ty == ValueType::Unknown
}

/// The single source of truth for the global-input flattening convention.
///
/// Returns the immediate components of an aggregate input under the fixed
/// `name_0..name_{n-1}` naming scheme, in declaration order, each paired
/// with the default value that applies to it (list defaults by position,
/// map defaults by struct member name). Scalar leaves, dynamic arrays, and
/// unknown structs have no components.
pub(crate) fn input_components<'v>(
    name: &str,
    ty: &ValueType,
    default: Option<&'v AttrValue>,
    doc: &IrDocument,
) -> Vec<(String, ValueType, Option<&'v AttrValue>)> {
    match ty {
        ValueType::Vec(_) | ValueType::Mat3 | ValueType::Mat4 | ValueType::Quat => {
            let n = ty.float_components().unwrap_or(0);
            (0..n)
                .map(|i| {
                    let d = default.and_then(AttrValue::as_list).and_then(|l| l.get(i));
                    (format!("{name}_{i}"), ValueType::Float, d)
                })
                .collect()
        }
        ValueType::Array {
            elem,
            len: Some(n),
        } => (0..*n)
            .map(|i| {
                let d = default.and_then(AttrValue::as_list).and_then(|l| l.get(i));
                (format!("{name}_{i}"), (**elem).clone(), d)
            })
            .collect(),
        ValueType::Struct(id) => match doc.struct_def(id) {
            Some(def) => def
                .members
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let mty = ValueType::resolve(&m.ty, doc).unwrap_or(ValueType::Unknown);
                    let d = default
                        .and_then(AttrValue::as_map)
                        .and_then(|map| map.get(&m.name))
                        .or_else(|| {
                            default.and_then(AttrValue::as_list).and_then(|l| l.get(i))
                        });
                    (format!("{name}_{i}"), mty, d)
                })
                .collect(),
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Number of floats a value of this type flattens into for dispatch argument
/// marshalling. `None` for dynamic arrays (their length is a runtime prefix)
/// and unknowns.
pub fn flat_float_count(ty: &ValueType, doc: &IrDocument) -> Option<usize> {
    match ty {
        ValueType::Float | ValueType::Int | ValueType::Uint | ValueType::Bool => Some(1),
        ValueType::Vec(n) => Some(*n as usize),
        ValueType::Mat3 => Some(9),
        ValueType::Mat4 => Some(16),
        ValueType::Quat => Some(4),
        ValueType::Array {
            elem,
            len: Some(n),
        } => flat_float_count(elem, doc).map(|c| c * n),
        ValueType::Array { len: None, .. } => None,
        ValueType::Struct(id) => {
            let def = doc.struct_def(id)?;
            let mut total = 0;
            for m in &def.members {
                let mt = ValueType::resolve(&m.ty, doc)?;
                total += flat_float_count(&mt, doc)?;
            }
            Some(total)
        }
        ValueType::Void | ValueType::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> IrDocument {
        serde_json::from_value(serde_json::json!({
            "structs": [
                {"id": "Particle", "members": [
                    {"name": "pos", "type": "float3"},
                    {"name": "age", "type": "float"}
                ]},
                {"id": "Burst", "members": [
                    {"name": "seed", "type": "Particle"},
                    {"name": "count", "type": "int"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn scalar_mapping() {
        assert_eq!(c_type(&ValueType::Float), "float");
        assert_eq!(c_type(&ValueType::Int), "int");
        assert_eq!(c_type(&ValueType::Uint), "unsigned int");
        assert_eq!(c_type(&ValueType::Bool), "bool");
    }

    #[test]
    fn aggregate_mapping() {
        assert_eq!(c_type(&ValueType::Vec(3)), "std::array<float, 3>");
        assert_eq!(c_type(&ValueType::Mat3), "std::array<float, 9>");
        assert_eq!(c_type(&ValueType::Mat4), "std::array<float, 16>");
        assert_eq!(c_type(&ValueType::Quat), "std::array<float, 4>");
        assert_eq!(
            c_type(&ValueType::parse("array<float2, 6>").unwrap()),
            "std::array<std::array<float, 2>, 6>"
        );
        assert_eq!(
            c_type(&ValueType::parse("array<float>").unwrap()),
            "std::vector<float>"
        );
    }

    #[test]
    fn struct_mapping_uses_mangled_name() {
        let d = doc();
        let t = map_type("Particle", &d).unwrap();
        assert_eq!(c_type(&t), "S_Particle");
    }

    #[test]
    fn unknown_type_errors() {
        let d = doc();
        assert!(matches!(
            map_type("vec5", &d),
            Err(CompileError::UnknownType { .. })
        ));
    }

    #[test]
    fn zero_values() {
        assert_eq!(zero_value(&ValueType::Float), "0.0f");
        assert_eq!(zero_value(&ValueType::Int), "0");
        assert_eq!(zero_value(&ValueType::Bool), "false");
        assert_eq!(zero_value(&ValueType::Vec(4)), "std::array<float, 4>{}");
        assert_eq!(zero_value(&ValueType::Struct("P".into())), "S_P{}");
    }

    #[test]
    fn input_components_name_vector_parts() {
        let d = doc();
        let default: AttrValue = serde_json::from_value(serde_json::json!([0.5, 0.25])).unwrap();
        let parts = input_components("u_dir", &ValueType::Vec(2), Some(&default), &d);
        let names: Vec<&str> = parts.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["u_dir_0", "u_dir_1"]);
        assert!(parts.iter().all(|(_, t, _)| *t == ValueType::Float));
        assert_eq!(parts[0].2.and_then(AttrValue::as_number), Some(0.5));
        assert_eq!(parts[1].2.and_then(AttrValue::as_number), Some(0.25));
    }

    #[test]
    fn input_components_recurse_through_fixed_arrays() {
        let d = doc();
        let ty = ValueType::parse("array<float3, 2>").unwrap();
        let parts = input_components("u_a", &ty, None, &d);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "u_a_0");
        assert_eq!(parts[0].1, ValueType::Vec(3));
        let inner = input_components(&parts[1].0, &parts[1].1, None, &d);
        assert_eq!(inner[2].0, "u_a_1_2");
    }

    #[test]
    fn input_components_use_struct_member_defaults_by_name() {
        let d = doc();
        let default: AttrValue =
            serde_json::from_value(serde_json::json!({"age": 2.0})).unwrap();
        let parts = input_components(
            "u_p",
            &ValueType::Struct("Particle".into()),
            Some(&default),
            &d,
        );
        let names: Vec<&str> = parts.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["u_p_0", "u_p_1"]);
        assert_eq!(parts[0].1, ValueType::Vec(3));
        assert!(parts[0].2.is_none());
        assert_eq!(parts[1].2.and_then(AttrValue::as_number), Some(2.0));
    }

    #[test]
    fn input_components_leaves_and_dynamic_arrays_are_empty() {
        let d = doc();
        assert!(is_input_leaf(&ValueType::Float));
        assert!(is_input_leaf(&ValueType::Unknown));
        assert!(!is_input_leaf(&ValueType::Vec(3)));
        assert!(input_components("u_x", &ValueType::Float, None, &d).is_empty());
        let dynamic = ValueType::parse("array<float>").unwrap();
        assert!(!is_input_leaf(&dynamic));
        assert!(input_components("u_d", &dynamic, None, &d).is_empty());
    }

    #[test]
    fn flat_counts() {
        let d = doc();
        assert_eq!(flat_float_count(&ValueType::Float, &d), Some(1));
        assert_eq!(flat_float_count(&ValueType::Vec(4), &d), Some(4));
        assert_eq!(flat_float_count(&ValueType::Mat4, &d), Some(16));
        assert_eq!(
            flat_float_count(&ValueType::Struct("Particle".into()), &d),
            Some(4)
        );
        // Nested struct: Particle (4) + int (1).
        assert_eq!(
            flat_float_count(&ValueType::Struct("Burst".into()), &d),
            Some(5)
        );
        assert_eq!(
            flat_float_count(&ValueType::parse("array<float3, 2>").unwrap(), &d),
            Some(6)
        );
        assert_eq!(
            flat_float_count(&ValueType::parse("array<float>").unwrap(), &d),
            None
        );
    }
}
