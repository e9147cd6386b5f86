//! Filter evaluation and sort/skip/limit shared by the store backends.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Filter, FindOptions, SortOrder};

/// Resolve a dotted path inside a document.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

/// Equality with numbers compared by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// A scalar filter value also matches any element of an array field.
fn field_matches(field: &Value, wanted: &Value) -> bool {
    if values_equal(field, wanted) {
        return true;
    }
    match (field, wanted) {
        (Value::Array(items), w) if !w.is_array() => items.iter().any(|i| values_equal(i, w)),
        _ => false,
    }
}

impl Filter {
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, wanted) => {
                get_path(doc, path).is_some_and(|field| field_matches(field, wanted))
            }
            Filter::In(path, options) => get_path(doc, path)
                .is_some_and(|field| options.iter().any(|w| field_matches(field, w))),
            Filter::Gt(path, bound) => get_path(doc, path).is_some_and(|field| {
                type_rank(Some(field)) == type_rank(Some(bound))
                    && compare_values(Some(field), Some(bound)) == Ordering::Greater
            }),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Total order used for sorting: missing < null < bool < number < string.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Apply sort, skip and limit. Sorting is stable, so ties keep insertion order.
pub fn apply_options(mut docs: Vec<Value>, options: &FindOptions) -> Vec<Value> {
    if let Some((path, order)) = &options.sort {
        docs.sort_by(|a, b| {
            let ord = compare_values(get_path(a, path), get_path(b, path));
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }

    let iter = docs.into_iter().skip(options.skip);
    match options.limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}
