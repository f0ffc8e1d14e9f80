//! Database type definitions
//!
//! Rows travel through the crate as semi-structured JSON records; their
//! shape is owned by the database views, not by this crate.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A single row keyed by column name
pub type Record = Map<String, Value>;

/// Total order over JSON scalars used for in-memory sorting.
///
/// Numbers compare numerically, strings lexicographically, booleans
/// false-before-true. Values of different kinds order by kind.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Convert a JSON value into a record, if it is an object.
pub fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
