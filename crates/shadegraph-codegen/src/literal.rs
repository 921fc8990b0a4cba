//! Literal formatting for the emitted target.
//!
//! Numbers arrive as `f64` from the attribute bag. Floats print as the
//! shortest decimal that round-trips, with a forced fraction and an `f`
//! suffix so the target always parses them as single-precision floats;
//! re-parsing an emitted literal and re-formatting it reproduces the same
//! string.

use shadegraph_core::{AttrValue, ValueType};

use crate::error::CompileError;

/// Extracts the numbers from an attribute list; `None` if any element is not
/// a number.
pub fn number_list(values: &[AttrValue]) -> Option<Vec<f64>> {
    values.iter().map(AttrValue::as_number).collect()
}

/// Formats a float literal, e.g. `1` -> `1.0f`, `2.5` -> `2.5f`.
pub fn float_literal(v: f64) -> Result<String, CompileError> {
    if !v.is_finite() {
        return Err(CompileError::UnsupportedLiteral {
            value: v.to_string(),
        });
    }
    let mut s = format!("{v}");
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    s.push('f');
    Ok(s)
}

/// Formats an integer literal; the fractional part is truncated.
pub fn int_literal(v: f64) -> String {
    format!("{}", v as i64)
}

/// Formats an unsigned literal with a `u` suffix.
pub fn uint_literal(v: f64) -> String {
    format!("{}u", v as u64)
}

/// Formats a number in the context of the given type. Integer-typed contexts
/// keep integer syntax; everything else (including unknown) gets the float
/// form.
pub fn number(v: f64, ctx: &ValueType) -> Result<String, CompileError> {
    match ctx {
        ValueType::Int => Ok(int_literal(v)),
        ValueType::Uint => Ok(uint_literal(v)),
        ValueType::Bool => Ok(bool_literal(v != 0.0, ctx).to_string()),
        _ => float_literal(v),
    }
}

/// Formats a boolean for the given context: `true`/`false` in boolean
/// context, `1.0f`/`0.0f` in numeric context.
pub fn bool_literal(b: bool, ctx: &ValueType) -> &'static str {
    match ctx {
        ValueType::Bool => {
            if b {
                "true"
            } else {
                "false"
            }
        }
        _ => {
            if b {
                "1.0f"
            } else {
                "0.0f"
            }
        }
    }
}

/// Formats a fixed-length float sequence as a `std::array` initialiser.
pub fn float_array_literal(values: &[f64], len: usize) -> Result<String, CompileError> {
    let mut parts = Vec::with_capacity(len);
    for i in 0..len {
        parts.push(float_literal(values.get(i).copied().unwrap_or(0.0))?);
    }
    Ok(format!("std::array<float, {len}>{{{}}}", parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integers_get_a_fraction() {
        assert_eq!(float_literal(1.0).unwrap(), "1.0f");
        assert_eq!(float_literal(0.0).unwrap(), "0.0f");
        assert_eq!(float_literal(-3.0).unwrap(), "-3.0f");
    }

    #[test]
    fn fractions_are_preserved() {
        assert_eq!(float_literal(2.5).unwrap(), "2.5f");
        assert_eq!(float_literal(0.125).unwrap(), "0.125f");
    }

    #[test]
    fn non_finite_is_rejected() {
        assert!(matches!(
            float_literal(f64::NAN),
            Err(CompileError::UnsupportedLiteral { .. })
        ));
        assert!(matches!(
            float_literal(f64::INFINITY),
            Err(CompileError::UnsupportedLiteral { .. })
        ));
    }

    #[test]
    fn context_selects_the_form() {
        assert_eq!(number(3.0, &ValueType::Int).unwrap(), "3");
        assert_eq!(number(3.0, &ValueType::Uint).unwrap(), "3u");
        assert_eq!(number(3.0, &ValueType::Float).unwrap(), "3.0f");
        assert_eq!(number(3.0, &ValueType::Unknown).unwrap(), "3.0f");
        assert_eq!(number(1.0, &ValueType::Bool).unwrap(), "true");
    }

    #[test]
    fn booleans_by_context() {
        assert_eq!(bool_literal(true, &ValueType::Bool), "true");
        assert_eq!(bool_literal(false, &ValueType::Bool), "false");
        assert_eq!(bool_literal(true, &ValueType::Float), "1.0f");
        assert_eq!(bool_literal(false, &ValueType::Float), "0.0f");
    }

    #[test]
    fn array_literal_pads_with_zeros() {
        assert_eq!(
            float_array_literal(&[1.0, 2.5], 3).unwrap(),
            "std::array<float, 3>{1.0f, 2.5f, 0.0f}"
        );
    }

    proptest! {
        // Re-parsing an emitted literal and re-formatting it is a fixed
        // point.
        #[test]
        fn formatting_is_idempotent(v in prop::num::f64::NORMAL) {
            let first = float_literal(v).unwrap();
            let reparsed: f64 = first[..first.len() - 1].parse().unwrap();
            prop_assert_eq!(float_literal(reparsed).unwrap(), first);
        }
    }
}
