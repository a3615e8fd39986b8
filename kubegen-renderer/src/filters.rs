//! Tera filters backed by the query library, plus string helpers.
//!
//! Filters take their extra arguments by name, e.g.
//! `pods | where(path="metadata.namespace", value="default")`.

use std::collections::HashMap;

use kubegen_query as query;
use kubegen_query::{Groups, QueryError};
use tera::{Error, Result, Value};

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn arg<'a>(func: &str, args: &'a HashMap<String, Value>, name: &str) -> Result<&'a Value> {
    args.get(name)
        .ok_or_else(|| Error::msg(format!("{func}: missing argument '{name}'")))
}

pub(crate) fn str_arg<'a>(func: &str, args: &'a HashMap<String, Value>, name: &str) -> Result<&'a str> {
    arg(func, args, name)?
        .as_str()
        .ok_or_else(|| Error::msg(format!("{func}: argument '{name}' must be a string")))
}

pub(crate) fn usize_arg(func: &str, args: &HashMap<String, Value>, name: &str) -> Result<usize> {
    arg(func, args, name)?
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::msg(format!("{func}: argument '{name}' must be a non-negative integer")))
}

/// A list of strings; a single string is accepted as a one-element list.
pub(crate) fn strings_arg(func: &str, args: &HashMap<String, Value>, name: &str) -> Result<Vec<String>> {
    match arg(func, args, name)? {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::msg(format!("{func}: argument '{name}' must contain only strings"))
                })
            })
            .collect(),
        _ => Err(Error::msg(format!("{func}: argument '{name}' must be a list of strings"))),
    }
}

fn input_str<'a>(func: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::msg(format!("{func} filter expects a string")))
}

fn sequence<'a>(func: &'static str, value: &'a Value) -> Result<&'a [Value]> {
    query::sequence_arg(func, value).map_err(query_err)
}

pub(crate) fn query_err(err: QueryError) -> Error {
    Error::msg(err.to_string())
}

fn selected(items: Vec<&Value>) -> Value {
    Value::Array(items.into_iter().cloned().collect())
}

fn groups_value(groups: Groups<'_, Value>) -> Value {
    Value::Object(
        groups
            .into_iter()
            .map(|(key, members)| (key, selected(members)))
            .collect(),
    )
}

fn option_value(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

pub(crate) fn where_eq(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("where", value)?;
    let path = str_arg("where", args, "path")?;
    let cmp = arg("where", args, "value")?;
    Ok(selected(query::where_eq(items, path, cmp)))
}

pub(crate) fn where_exist(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("where_exist", value)?;
    let path = str_arg("where_exist", args, "path")?;
    Ok(selected(query::where_exist(items, path)))
}

pub(crate) fn where_not_exist(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("where_not_exist", value)?;
    let path = str_arg("where_not_exist", args, "path")?;
    Ok(selected(query::where_not_exist(items, path)))
}

pub(crate) fn where_any(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("where_any", value)?;
    let path = str_arg("where_any", args, "path")?;
    let sep = str_arg("where_any", args, "sep")?;
    let cmp = strings_arg("where_any", args, "values")?;
    Ok(selected(query::where_any(items, path, sep, &cmp)))
}

pub(crate) fn where_all(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("where_all", value)?;
    let path = str_arg("where_all", args, "path")?;
    let sep = str_arg("where_all", args, "sep")?;
    let cmp = strings_arg("where_all", args, "values")?;
    Ok(selected(query::where_all(items, path, sep, &cmp)))
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

pub(crate) fn group_by(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("group_by", value)?;
    let path = str_arg("group_by", args, "path")?;
    query::group_by(items, path).map(groups_value).map_err(query_err)
}

pub(crate) fn group_by_multi(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("group_by_multi", value)?;
    let path = str_arg("group_by_multi", args, "path")?;
    let sep = str_arg("group_by_multi", args, "sep")?;
    query::group_by_multi(items, path, sep)
        .map(groups_value)
        .map_err(query_err)
}

pub(crate) fn group_by_keys(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let items = sequence("group_by_keys", value)?;
    let path = str_arg("group_by_keys", args, "path")?;
    let keys = query::group_by_keys(items, path).map_err(query_err)?;
    Ok(Value::Array(keys.into_iter().map(Value::String).collect()))
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

pub(crate) fn first(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(option_value(query::first(value).map_err(query_err)?.cloned()))
}

pub(crate) fn last(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(option_value(query::last(value).map_err(query_err)?.cloned()))
}

pub(crate) fn keys(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let keys = query::keys(value).map_err(query_err)?;
    Ok(option_value(
        keys.map(|keys| Value::Array(keys.into_iter().map(Value::String).collect())),
    ))
}

pub(crate) fn values(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let values = query::values(value).map_err(query_err)?;
    Ok(option_value(values.map(Value::Array)))
}

pub(crate) fn slice(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let begin = usize_arg("slice", args, "begin")?;
    let end = usize_arg("slice", args, "end")?;
    query::slice(value, begin, end).map_err(query_err)
}

pub(crate) fn has_field(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let path = str_arg("has_field", args, "path")?;
    Ok(Value::Bool(query::has_field(value, path)))
}

pub(crate) fn deep_get(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let path = str_arg("deep_get", args, "path")?;
    Ok(option_value(query::deep_get(value, path)))
}

pub(crate) fn map_contains(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let key = str_arg("map_contains", args, "key")?;
    query::map_contains(value, key)
        .map(Value::Bool)
        .map_err(query_err)
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

pub(crate) fn is_ready(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::Bool(query::is_ready(value)))
}

pub(crate) fn all_ready(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::Bool(query::all_ready(sequence("all_ready", value)?)))
}

pub(crate) fn any_ready(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::Bool(query::any_ready(sequence("any_ready", value)?)))
}

pub(crate) fn ready_only(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(selected(query::ready_only(sequence("ready_only", value)?)))
}

// ---------------------------------------------------------------------------
// Strings and encoding
// ---------------------------------------------------------------------------

/// Compact single-line JSON.
pub(crate) fn json(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::String(serde_json::to_string(value).map_err(|e| Error::msg(e.to_string()))?))
}

pub(crate) fn has_prefix(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let s = input_str("has_prefix", value)?;
    let prefix = str_arg("has_prefix", args, "prefix")?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

pub(crate) fn has_suffix(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let s = input_str("has_suffix", value)?;
    let suffix = str_arg("has_suffix", args, "suffix")?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

pub(crate) fn str_contains(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let s = input_str("str_contains", value)?;
    let needle = str_arg("str_contains", args, "substr")?;
    Ok(Value::Bool(s.contains(needle)))
}

pub(crate) fn trim_prefix(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let s = input_str("trim_prefix", value)?;
    let prefix = str_arg("trim_prefix", args, "prefix")?;
    Ok(Value::String(s.strip_prefix(prefix).unwrap_or(s).to_string()))
}

pub(crate) fn trim_suffix(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let s = input_str("trim_suffix", value)?;
    let suffix = str_arg("trim_suffix", args, "suffix")?;
    Ok(Value::String(s.strip_suffix(suffix).unwrap_or(s).to_string()))
}
