//! Error types for kubegen-query.

use serde_json::Value;
use thiserror::Error;

/// Type mismatches reported by the query functions.
///
/// Query functions never panic on unexpected shapes; they hand one of these
/// back as the secondary result and leave it to the caller (usually the
/// template engine) to decide whether it is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A sequence was required.
    #[error("must pass an array to '{func}'; received {found}")]
    NotASequence {
        func: &'static str,
        found: &'static str,
    },

    /// A keyed map was required.
    #[error("cannot call {func} on a non-map value (received {found})")]
    NotAMap {
        func: &'static str,
        found: &'static str,
    },

    /// The value at a path could not be used as a group key.
    #[error("{func}: value at '{path}' is {found}, expected a string")]
    NotAString {
        func: &'static str,
        path: String,
        found: &'static str,
    },

    /// A half-open range did not fit the input sequence.
    #[error("{func}: range [{begin}, {end}) out of bounds for length {len}")]
    OutOfRange {
        func: &'static str,
        begin: usize,
        end: usize,
        len: usize,
    },
}

/// Human-readable name of a JSON value's variant, used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}
