//! Type-agnostic accessors and small set helpers.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{kind_name, QueryError};
use crate::path::{deep_get, Navigable};

/// Borrow `value` as a sequence or report which function wanted one.
pub fn sequence_arg<'a>(func: &'static str, value: &'a Value) -> Result<&'a [Value], QueryError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(QueryError::NotASequence {
            func,
            found: kind_name(other),
        }),
    }
}

/// First element of a sequence; `None` for null or empty input.
pub fn first(input: &Value) -> Result<Option<&Value>, QueryError> {
    if input.is_null() {
        return Ok(None);
    }
    Ok(sequence_arg("first", input)?.first())
}

/// Last element of a sequence; `None` for null or empty input.
pub fn last(input: &Value) -> Result<Option<&Value>, QueryError> {
    if input.is_null() {
        return Ok(None);
    }
    Ok(sequence_arg("last", input)?.last())
}

/// Keys of a map in sorted order; `None` for null input.
pub fn keys(input: &Value) -> Result<Option<Vec<String>>, QueryError> {
    match input {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.keys().cloned().collect())),
        other => Err(QueryError::NotAMap {
            func: "keys",
            found: kind_name(other),
        }),
    }
}

/// Values of a map in key order; `None` for null input.
pub fn values(input: &Value) -> Result<Option<Vec<Value>>, QueryError> {
    match input {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.values().cloned().collect())),
        other => Err(QueryError::NotAMap {
            func: "values",
            found: kind_name(other),
        }),
    }
}

/// Half-open sub-sequence `[begin, end)`.
///
/// Null and empty sequences pass through unchanged whatever the bounds.
pub fn slice(input: &Value, begin: usize, end: usize) -> Result<Value, QueryError> {
    if input.is_null() {
        return Ok(Value::Null);
    }
    let items = sequence_arg("slice", input)?;
    if items.is_empty() {
        return Ok(input.clone());
    }
    if begin > end || end > items.len() {
        return Err(QueryError::OutOfRange {
            func: "slice",
            begin,
            end,
            len: items.len(),
        });
    }
    Ok(Value::Array(items[begin..end].to_vec()))
}

/// Concatenate sequences in argument order.
pub fn combine<'a, I>(sequences: I) -> Result<Vec<Value>, QueryError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut combined = Vec::new();
    for sequence in sequences {
        combined.extend_from_slice(sequence_arg("combine", sequence)?);
    }
    Ok(combined)
}

/// First non-null argument.
pub fn coalesce<'a, I>(candidates: I) -> Option<&'a Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    candidates.into_iter().find(|v| !v.is_null())
}

/// Strings present in both lists, sorted and without duplicates.
pub fn intersect(left: &[String], right: &[String]) -> Vec<String> {
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    left.iter()
        .filter(|s| right.contains(s.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Longest candidate that occurs as a substring of `input`.
///
/// Returns an empty string when nothing matches. Ties keep the earlier
/// candidate.
pub fn closest<'a>(candidates: &'a [String], input: &str) -> &'a str {
    let mut best = "";
    for candidate in candidates {
        if input.contains(candidate.as_str()) && candidate.len() > best.len() {
            best = candidate.as_str();
        }
    }
    best
}

pub fn has_field(item: &dyn Navigable, path: &str) -> bool {
    deep_get(item, path).is_some()
}

/// Whether `map` carries `key`, regardless of its value.
pub fn map_contains(map: &Value, key: &str) -> Result<bool, QueryError> {
    match map {
        Value::Null => Ok(false),
        Value::Object(map) => Ok(map.contains_key(key)),
        other => Err(QueryError::NotAMap {
            func: "map_contains",
            found: kind_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_and_last_of_null_or_empty_are_none() {
        assert_eq!(first(&Value::Null), Ok(None));
        assert_eq!(last(&json!([])), Ok(None));
        assert_eq!(first(&json!([1, 2])), Ok(Some(&json!(1))));
        assert_eq!(last(&json!([1, 2])), Ok(Some(&json!(2))));
    }

    #[test]
    fn first_of_a_map_is_a_type_mismatch() {
        let err = first(&json!({"a": 1})).expect_err("map");
        assert_eq!(err.to_string(), "must pass an array to 'first'; received a map");
    }

    #[test]
    fn keys_of_non_map_fail_descriptively() {
        let err = keys(&json!([1])).expect_err("array");
        assert!(err.to_string().starts_with("cannot call keys on a non-map value"));
        assert_eq!(keys(&Value::Null), Ok(None));
    }

    #[test]
    fn keys_and_values_follow_key_order() {
        let map = json!({"b": 2, "a": 1});
        assert_eq!(keys(&map), Ok(Some(strings(&["a", "b"]))));
        assert_eq!(values(&map), Ok(Some(vec![json!(1), json!(2)])));
    }

    #[test]
    fn slice_is_half_open() {
        assert_eq!(slice(&json!([1, 2, 3, 4]), 1, 3), Ok(json!([2, 3])));
        assert_eq!(slice(&json!([1, 2]), 2, 2), Ok(json!([])));
    }

    #[test]
    fn slice_rejects_bad_bounds() {
        assert!(slice(&json!([1, 2]), 0, 3).is_err());
        assert!(slice(&json!([1, 2]), 2, 1).is_err());
    }

    #[test]
    fn slice_passes_null_and_empty_through() {
        assert_eq!(slice(&Value::Null, 0, 5), Ok(Value::Null));
        assert_eq!(slice(&json!([]), 3, 5), Ok(json!([])));
    }

    #[test]
    fn combine_concatenates_in_order() {
        let a = json!([1, 2]);
        let b = json!([3]);
        assert_eq!(combine([&a, &b]), Ok(vec![json!(1), json!(2), json!(3)]));
        assert!(combine([&a, &json!("x")]).is_err());
    }

    #[test]
    fn coalesce_skips_nulls() {
        let candidates = [Value::Null, json!("x"), json!("y")];
        assert_eq!(coalesce(&candidates), Some(&json!("x")));
        assert_eq!(coalesce(&[Value::Null]), None);
    }

    #[test]
    fn intersect_is_sorted_and_unique() {
        let left = strings(&["c", "a", "c", "z"]);
        let right = strings(&["a", "c", "b"]);
        assert_eq!(intersect(&left, &right), ["a", "c"]);
    }

    #[test]
    fn closest_prefers_longest_contained_candidate() {
        let candidates = strings(&["example.com", "api.example.com", "other.org"]);
        assert_eq!(closest(&candidates, "v1.api.example.com"), "api.example.com");
        assert_eq!(closest(&candidates, "nothing"), "");
    }

    #[test]
    fn has_field_and_map_contains() {
        let doc = json!({"metadata": {"labels": {"app": ""}}});
        assert!(has_field(&doc, "metadata.labels.app"));
        assert!(!has_field(&doc, "metadata.annotations"));
        assert_eq!(map_contains(&doc["metadata"]["labels"], "app"), Ok(true));
        assert_eq!(map_contains(&Value::Null, "app"), Ok(false));
    }
}
