//! Sequence filters keyed by a query path.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::path::{deep_get, Navigable};

/// Keep entries whose value at `path` equals `cmp`.
///
/// Numbers compare by numeric value, so `80` matches `80.0`.
pub fn where_eq<'a, T: Navigable>(entries: &'a [T], path: &str, cmp: &Value) -> Vec<&'a T> {
    select(entries, path, |value| {
        value.is_some_and(|value| values_equal(&value, cmp))
    })
}

/// Keep entries that have a value at `path`.
pub fn where_exist<'a, T: Navigable>(entries: &'a [T], path: &str) -> Vec<&'a T> {
    select(entries, path, |value| value.is_some())
}

/// Keep entries that have no value at `path`.
pub fn where_not_exist<'a, T: Navigable>(entries: &'a [T], path: &str) -> Vec<&'a T> {
    select(entries, path, |value| value.is_none())
}

/// Keep entries whose `sep`-delimited string at `path` shares at least one
/// token with `cmp`.
pub fn where_any<'a, T: Navigable>(
    entries: &'a [T],
    path: &str,
    sep: &str,
    cmp: &[String],
) -> Vec<&'a T> {
    select(entries, path, |value| match token_set(value, sep) {
        Some(tokens) => cmp.iter().any(|c| tokens.contains(c.as_str())),
        None => false,
    })
}

/// Keep entries whose `sep`-delimited string at `path` contains every token
/// in `cmp`.
pub fn where_all<'a, T: Navigable>(
    entries: &'a [T],
    path: &str,
    sep: &str,
    cmp: &[String],
) -> Vec<&'a T> {
    select(entries, path, |value| match token_set(value, sep) {
        Some(tokens) => cmp.iter().all(|c| tokens.contains(c.as_str())),
        None => false,
    })
}

fn select<'a, T, F>(entries: &'a [T], path: &str, test: F) -> Vec<&'a T>
where
    T: Navigable,
    F: Fn(Option<Value>) -> bool,
{
    entries
        .iter()
        .filter(|entry| test(deep_get(*entry, path)))
        .collect()
}

fn token_set(value: Option<Value>, sep: &str) -> Option<BTreeSet<String>> {
    match value {
        Some(Value::String(s)) => Some(split_tokens(&s, sep).into_iter().collect()),
        _ => None,
    }
}

/// Split `s` on `sep`; an empty separator splits into characters.
pub fn split_tokens(s: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return s.chars().map(String::from).collect();
    }
    s.split(sep).map(str::to_string).collect()
}

/// Structural equality with numeric normalisation.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
