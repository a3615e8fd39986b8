//! Tera global functions.
//!
//! Tera passes function arguments by name only, so list-shaped inputs are
//! taken as a single array argument, e.g. `combine(lists=[pods, services])`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubegen_core::PlatformOps;
use kubegen_query as query;
use serde_json::{json, Map};
use tera::{Error, Result, Value};

use crate::filters::{arg, query_err, str_arg, strings_arg};

fn list_arg<'a>(func: &str, args: &'a HashMap<String, Value>, name: &str) -> Result<&'a [Value]> {
    match arg(func, args, name)? {
        Value::Array(items) => Ok(items),
        _ => Err(Error::msg(format!("{func}: argument '{name}' must be a list"))),
    }
}

/// `combine(lists=[a, b, ...])`: concatenation of the given lists.
pub(crate) fn combine(args: &HashMap<String, Value>) -> Result<Value> {
    let lists = list_arg("combine", args, "lists")?;
    query::combine(lists).map(Value::Array).map_err(query_err)
}

/// `coalesce(values=[a, b, ...])`: the first non-null value.
pub(crate) fn coalesce(args: &HashMap<String, Value>) -> Result<Value> {
    let candidates = list_arg("coalesce", args, "values")?;
    Ok(query::coalesce(candidates).cloned().unwrap_or(Value::Null))
}

/// `dict(a=1, b=2)` or `dict(pairs=["key", value, ...])`.
pub(crate) fn dict(args: &HashMap<String, Value>) -> Result<Value> {
    let Some(Value::Array(pairs)) = args.get("pairs") else {
        return Ok(Value::Object(
            args.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ));
    };
    if pairs.len() % 2 != 0 {
        return Err(Error::msg("dict: pairs must hold an even number of elements"));
    }
    let mut map = Map::new();
    for pair in pairs.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::msg("dict: keys must be strings"))?;
        map.insert(key.to_string(), pair[1].clone());
    }
    Ok(Value::Object(map))
}

/// `when(condition=c, if_true=a, if_false=b)`.
pub(crate) fn when(args: &HashMap<String, Value>) -> Result<Value> {
    let condition = arg("when", args, "condition")?
        .as_bool()
        .ok_or_else(|| Error::msg("when: argument 'condition' must be a boolean"))?;
    let picked = if condition { "if_true" } else { "if_false" };
    Ok(args.get(picked).cloned().unwrap_or(Value::Null))
}

/// `intersect(a=[...], b=[...])`: sorted strings present in both.
pub(crate) fn intersect(args: &HashMap<String, Value>) -> Result<Value> {
    let left = strings_arg("intersect", args, "a")?;
    let right = strings_arg("intersect", args, "b")?;
    Ok(json!(query::intersect(&left, &right)))
}

/// `closest(values=[...], input=s)`: longest value contained in `input`.
pub(crate) fn closest(args: &HashMap<String, Value>) -> Result<Value> {
    let candidates = strings_arg("closest", args, "values")?;
    let input = str_arg("closest", args, "input")?;
    Ok(Value::String(query::closest(&candidates, input).to_string()))
}

/// `path_join(parts=[...])`.
pub(crate) fn path_join(args: &HashMap<String, Value>) -> Result<Value> {
    let parts = strings_arg("path_join", args, "parts")?;
    let joined: PathBuf = parts.iter().collect();
    Ok(Value::String(joined.to_string_lossy().into_owned()))
}

/// `dir(path=p)`: sorted entry names; an unreadable directory lists as
/// empty.
pub(crate) fn dir(args: &HashMap<String, Value>) -> Result<Value> {
    let path = str_arg("dir", args, "path")?;
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path, error = %err, "dir: unable to read directory");
            return Ok(json!([]));
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(json!(names))
}

/// `exists(path=p)`.
pub(crate) fn exists(args: &HashMap<String, Value>) -> Result<Value> {
    let path = str_arg("exists", args, "path")?;
    match fs::metadata(Path::new(path)) {
        Ok(_) => Ok(Value::Bool(true)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Value::Bool(false)),
        Err(err) => Err(Error::msg(format!("exists: {path}: {err}"))),
    }
}

pub(crate) fn parse_json(args: &HashMap<String, Value>) -> Result<Value> {
    let text = str_arg("parse_json", args, "text")?;
    serde_json::from_str(text).map_err(|e| Error::msg(format!("parse_json: {e}")))
}

/// Like `parse_json`, but null on failure.
pub(crate) fn parse_json_safe(args: &HashMap<String, Value>) -> Result<Value> {
    let text = str_arg("parse_json_safe", args, "text")?;
    Ok(serde_json::from_str(text).unwrap_or(Value::Null))
}

pub(crate) fn is_valid_json(args: &HashMap<String, Value>) -> Result<Value> {
    let text = str_arg("is_valid_json", args, "text")?;
    Ok(Value::Bool(serde_json::from_str::<Value>(text).is_ok()))
}

/// `parse_bool(text=s)`: accepts `1 t T TRUE true True` and
/// `0 f F FALSE false False`.
pub(crate) fn parse_bool(args: &HashMap<String, Value>) -> Result<Value> {
    let text = str_arg("parse_bool", args, "text")?;
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(Value::Bool(true)),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(Value::Bool(false)),
        other => Err(Error::msg(format!("parse_bool: invalid syntax '{other}'"))),
    }
}

/// `split_n(text=s, sep=",", n=2)`: at most `n` pieces; a negative `n`
/// means no limit and zero yields an empty list.
pub(crate) fn split_n(args: &HashMap<String, Value>) -> Result<Value> {
    let text = str_arg("split_n", args, "text")?;
    let sep = str_arg("split_n", args, "sep")?;
    let n = arg("split_n", args, "n")?
        .as_i64()
        .ok_or_else(|| Error::msg("split_n: argument 'n' must be an integer"))?;

    let pieces: Vec<&str> = match n {
        0 => Vec::new(),
        n if n < 0 => split_all(text, sep),
        n => {
            let limit = usize::try_from(n).unwrap_or(usize::MAX);
            if sep.is_empty() {
                let mut chars = split_all(text, sep);
                if chars.len() > limit {
                    let head_len: usize = chars[..limit - 1].iter().map(|c| c.len()).sum();
                    chars.truncate(limit - 1);
                    chars.push(&text[head_len..]);
                }
                chars
            } else {
                text.splitn(limit, sep).collect()
            }
        }
    };
    Ok(json!(pieces))
}

fn split_all<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(sep).collect()
    }
}

/// `shell(cmd=s)` runs `s` through the platform interpreter and returns
/// `{success, stdout, stderr}`.
pub(crate) fn shell(
    platform: Arc<dyn PlatformOps>,
) -> impl Fn(&HashMap<String, Value>) -> Result<Value> + Send + Sync {
    move |args: &HashMap<String, Value>| {
        let cmd = str_arg("shell", args, "cmd")?;
        tracing::debug!(cmd, "running template shell command");
        let result = match platform.run(cmd) {
            Ok(output) => json!({
                "success": output.success,
                "stdout": output.stdout,
                "stderr": output.stderr,
            }),
            Err(err) => json!({
                "success": false,
                "stdout": "",
                "stderr": err.to_string(),
            }),
        };
        Ok(result)
    }
}
