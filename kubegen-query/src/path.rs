//! Runtime-typed path navigation.
//!
//! Every value the query functions touch is viewed through [`Shape`], a tagged
//! variant over keyed maps, sequences, records, and scalars. One segment
//! resolver walks a dot-delimited [`QueryPath`] across any mix of those, so
//! the same query works on raw JSON and on typed snapshot records alike.
//!
//! Indirection (a `Box`, `Arc`, or `Option` around a navigable value) is
//! followed exactly once per step. A reference to a reference is not
//! descended into and resolves to "not found".

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Shape / Navigable / Record
// ---------------------------------------------------------------------------

/// A one-level view of a runtime value.
pub enum Shape<'a> {
    /// Missing or null.
    Absent,
    /// A keyed map; segments are key lookups.
    Map(&'a Map<String, Value>),
    /// A sequence; segments are non-negative decimal indices.
    Seq(&'a [Value]),
    /// A typed record; segments are field names.
    Record(&'a dyn Record),
    /// A leaf value. No further segments resolve against it.
    Scalar(&'a Value),
    /// A single level of indirection to another navigable value.
    Ref(&'a dyn Navigable),
}

/// Anything a [`QueryPath`] can be resolved against.
pub trait Navigable {
    fn shape(&self) -> Shape<'_>;
}

/// A typed value exposing named fields to path navigation.
///
/// Snapshot record types implement this so the query functions work on them
/// without each kind re-implementing filtering or grouping.
pub trait Record {
    /// Look up a field by name.
    fn field(&self, name: &str) -> Option<&dyn Navigable>;

    /// The record as a plain JSON value, used when a path ends on the record.
    fn to_value(&self) -> Value;
}

impl Navigable for Value {
    fn shape(&self) -> Shape<'_> {
        match self {
            Value::Null => Shape::Absent,
            Value::Object(map) => Shape::Map(map),
            Value::Array(items) => Shape::Seq(items),
            scalar => Shape::Scalar(scalar),
        }
    }
}

impl<T: Navigable> Navigable for Box<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Ref(self.as_ref())
    }
}

impl<T: Navigable> Navigable for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Ref(self.as_ref())
    }
}

impl<T: Navigable> Navigable for Option<T> {
    fn shape(&self) -> Shape<'_> {
        match self {
            Some(inner) => Shape::Ref(inner),
            None => Shape::Absent,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryPath
// ---------------------------------------------------------------------------

/// A dot-delimited address such as `metadata.labels.app` or `items.0.name`.
///
/// A single leading `.` is ignored. The empty path addresses the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryPath {
    segments: Vec<String>,
}

impl QueryPath {
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::default();
        }
        let trimmed = path.strip_prefix('.').unwrap_or(path);
        Self {
            segments: trimmed.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<&str> for QueryPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve `path` against `item`, borrowing the result.
///
/// Returns `None` for anything not found: absent values along the way,
/// unknown keys or fields, bad or out-of-range indices, segments left over
/// after a scalar, and doubly-indirect references.
pub fn lookup<'a>(item: &'a dyn Navigable, path: &QueryPath) -> Option<Shape<'a>> {
    let mut current = deref_once(item.shape())?;
    for segment in path.segments() {
        let next: Option<&'a dyn Navigable> = match current {
            Shape::Absent => return None,
            Shape::Map(map) => map.get(segment).map(|v| v as &dyn Navigable),
            Shape::Seq(items) => index(items, segment).map(|v| v as &dyn Navigable),
            Shape::Record(record) => record.field(segment),
            Shape::Scalar(value) => {
                tracing::debug!(segment = %segment, value = %value, "unable to index into a scalar");
                return None;
            }
            // deref_once never yields a reference
            Shape::Ref(_) => return None,
        };
        current = deref_once(next?.shape())?;
    }
    Some(current)
}

/// Resolve `path` against `item` and return an owned copy of the result.
///
/// ```
/// use kubegen_query::deep_get;
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": [10, 20, 30]}});
/// assert_eq!(deep_get(&doc, "a.b.1"), Some(json!(20)));
/// assert_eq!(deep_get(&doc, "a.c"), None);
/// ```
pub fn deep_get(item: &dyn Navigable, path: &str) -> Option<Value> {
    lookup(item, &QueryPath::parse(path)).and_then(materialize)
}

/// Owned JSON form of a resolved shape; `None` when absent.
pub fn materialize(shape: Shape<'_>) -> Option<Value> {
    match shape {
        Shape::Absent => None,
        Shape::Map(map) => Some(Value::Object(map.clone())),
        Shape::Seq(items) => Some(Value::Array(items.to_vec())),
        Shape::Record(record) => Some(record.to_value()),
        Shape::Scalar(value) => Some(value.clone()),
        Shape::Ref(inner) => deref_once(inner.shape()).and_then(materialize),
    }
}

fn deref_once(shape: Shape<'_>) -> Option<Shape<'_>> {
    match shape {
        Shape::Ref(inner) => match inner.shape() {
            Shape::Ref(_) => {
                tracing::debug!("unable to descend into a reference to a reference");
                None
            }
            resolved => Some(resolved),
        },
        other => Some(other),
    }
}

fn index<'a>(items: &'a [Value], segment: &str) -> Option<&'a Value> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        tracing::debug!(segment = %segment, "non-negative decimal number required for sequence index");
        return None;
    }
    let position = segment.parse::<usize>().unwrap_or(usize::MAX);
    let found = items.get(position);
    if found.is_none() {
        tracing::debug!(index = position, len = items.len(), "index out of bounds");
    }
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
