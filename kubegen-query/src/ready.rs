//! Readiness predicates over resources carrying `status.conditions`.

use serde_json::Value;

use crate::path::{deep_get, Navigable};

/// True when `status.conditions` holds a `Ready` condition whose status is
/// `"True"`.
pub fn is_ready(item: &dyn Navigable) -> bool {
    let Some(Value::Array(conditions)) = deep_get(item, "status.conditions") else {
        return false;
    };
    conditions.iter().any(|condition| {
        condition.get("type").and_then(Value::as_str) == Some("Ready")
            && condition.get("status").and_then(Value::as_str) == Some("True")
    })
}

/// True for an empty slice.
pub fn all_ready<T: Navigable>(items: &[T]) -> bool {
    items.iter().all(|item| is_ready(item))
}

/// False for an empty slice.
pub fn any_ready<T: Navigable>(items: &[T]) -> bool {
    items.iter().any(|item| is_ready(item))
}

pub fn ready_only<T: Navigable>(items: &[T]) -> Vec<&T> {
    items.iter().filter(|item| is_ready(*item)).collect()
}
