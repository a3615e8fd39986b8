//! Runtime-typed data queries for `kubegen` templates.
//!
//! - [`path`]: [`Shape`], [`Navigable`], [`Record`], [`QueryPath`], [`deep_get`]
//! - [`filter`]: `where_*` sequence filters
//! - [`group`]: `group_by*` partitioning
//! - [`access`]: accessors (`first`, `keys`, `slice`, ...) and set helpers
//! - [`ready`]: readiness predicates
//! - [`error`]: [`QueryError`]
//!
//! Every function here is pure. Shape mismatches come back as
//! [`QueryError`]; lookups that find nothing come back as `None`.

pub mod access;
pub mod error;
pub mod filter;
pub mod group;
pub mod path;
pub mod ready;

pub use access::{
    closest, coalesce, combine, first, has_field, intersect, keys, last, map_contains,
    sequence_arg, slice, values,
};
pub use error::QueryError;
pub use filter::{values_equal, where_all, where_any, where_eq, where_exist, where_not_exist};
pub use group::{group_by, group_by_keys, group_by_multi, Groups};
pub use path::{deep_get, lookup, materialize, Navigable, QueryPath, Record, Shape};
pub use ready::{all_ready, any_ready, is_ready, ready_only};
