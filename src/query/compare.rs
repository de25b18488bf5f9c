//! Value comparison for ordering and range predicates

use std::cmp::Ordering;

use serde_json::Value;

/// Compares two optional field values for sorting.
///
/// Ordering rules:
/// - missing < null < bool < number < string < array < object
/// - For same types, natural ordering
/// - Arrays and objects compare equal to each other
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let a_type = type_rank(a_val);
            let b_type = type_rank(b_val);

            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            partial_order(a_val, b_val).unwrap_or(Ordering::Equal)
        }
    }
}

/// Compares two values of the same comparable type.
///
/// Returns `None` for mixed types, nulls, arrays, objects and NaN-like numbers.
/// Range predicates treat `None` as "no match".
pub fn partial_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Equality for filters: numbers compare by value across integer and float
/// forms, everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => partial_order(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
