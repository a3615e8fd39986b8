//! Grouping of sequences by the value found at a query path.
//!
//! Groups are returned in a `BTreeMap`, so key iteration is sorted and a
//! template rendering the same snapshot twice produces the same bytes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{kind_name, QueryError};
use crate::filter::split_tokens;
use crate::path::{deep_get, Navigable};

/// Entries grouped under their key, in input order within each group.
pub type Groups<'a, T> = BTreeMap<String, Vec<&'a T>>;

/// Group `entries` by the value at `path`.
///
/// Entries without a value at `path` are left out of every group.
pub fn group_by<'a, T: Navigable>(
    entries: &'a [T],
    path: &str,
) -> Result<Groups<'a, T>, QueryError> {
    grouped("group_by", entries, path, |key| vec![key])
}

/// Group `entries` under each `sep`-delimited token of the value at `path`.
///
/// An entry whose value is `"a,b"` lands in both the `a` and `b` groups.
pub fn group_by_multi<'a, T: Navigable>(
    entries: &'a [T],
    path: &str,
    sep: &str,
) -> Result<Groups<'a, T>, QueryError> {
    grouped("group_by_multi", entries, path, |key| {
        let mut tokens = split_tokens(&key, sep);
        tokens.sort();
        tokens.dedup();
        tokens
    })
}

/// The sorted set of keys [`group_by`] would produce.
pub fn group_by_keys<T: Navigable>(entries: &[T], path: &str) -> Result<Vec<String>, QueryError> {
    Ok(grouped("group_by_keys", entries, path, |key| vec![key])?
        .into_keys()
        .collect())
}

fn grouped<'a, T, F>(
    func: &'static str,
    entries: &'a [T],
    path: &str,
    keys_for: F,
) -> Result<Groups<'a, T>, QueryError>
where
    T: Navigable,
    F: Fn(String) -> Vec<String>,
{
    let mut groups: Groups<'a, T> = BTreeMap::new();
    for entry in entries {
        let Some(value) = deep_get(entry, path) else {
            continue;
        };
        for key in keys_for(group_key(func, path, value)?) {
            groups.entry(key).or_default().push(entry);
        }
    }
    Ok(groups)
}

fn group_key(func: &'static str, path: &str, value: Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(QueryError::NotAString {
            func,
            path: path.to_string(),
            found: kind_name(&other),
        }),
    }
}
