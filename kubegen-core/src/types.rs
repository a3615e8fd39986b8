//! Domain types shared across the kubegen crates.
//!
//! A [`Snapshot`] is the full listing of every selected [`ResourceKind`],
//! rebuilt from scratch for each cycle and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kubegen_query::{Navigable, Record, Shape};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// ResourceKind / KindSelection
// ---------------------------------------------------------------------------

/// A resource kind that can be listed and watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pods,
    Services,
    Endpoints,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Pods,
        ResourceKind::Services,
        ResourceKind::Endpoints,
    ];

    /// Plural name used as the template key, the API path segment, and the
    /// directory source file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Services => "services",
            ResourceKind::Endpoints => "endpoints",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pods" | "pod" | "po" => Ok(ResourceKind::Pods),
            "services" | "service" | "svc" => Ok(ResourceKind::Services),
            "endpoints" | "endpoint" | "ep" => Ok(ResourceKind::Endpoints),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// The kinds a generator lists and watches, in stable kind order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSelection(Vec<ResourceKind>);

impl KindSelection {
    pub fn all() -> Self {
        Self(ResourceKind::ALL.to_vec())
    }

    /// Parse `--type` values. An empty list selects every kind.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(Self::all());
        }
        let mut kinds = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<ResourceKind>, _>>()?;
        kinds.sort();
        kinds.dedup();
        Ok(Self(kinds))
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.0
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.0.contains(&kind)
    }
}

impl Default for KindSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for KindSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

impl From<Vec<ResourceKind>> for KindSelection {
    fn from(mut kinds: Vec<ResourceKind>) -> Self {
        if kinds.is_empty() {
            return Self::all();
        }
        kinds.sort();
        kinds.dedup();
        Self(kinds)
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// One listed object: its kind plus the raw JSON object.
///
/// Field access goes straight to the top-level keys of the object, so a
/// query path such as `metadata.labels.app` resolves the same way it would on
/// the API server's JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub object: Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, object: Value) -> Self {
        Self { kind, object }
    }

    /// `metadata.name`, when present.
    pub fn name(&self) -> Option<&str> {
        self.object
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
    }
}

impl Record for Resource {
    fn field(&self, name: &str) -> Option<&dyn Navigable> {
        self.object.get(name).map(|v| v as &dyn Navigable)
    }

    fn to_value(&self) -> Value {
        self.object.clone()
    }
}

impl Navigable for Resource {
    fn shape(&self) -> Shape<'_> {
        Shape::Record(self)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.object.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time listing of every selected kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    listings: BTreeMap<ResourceKind, Vec<Resource>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ResourceKind, resources: Vec<Resource>) {
        self.listings.insert(kind, resources);
    }

    /// Resources of `kind`; empty when the kind was not selected.
    pub fn get(&self, kind: ResourceKind) -> &[Resource] {
        self.listings.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.listings.keys().copied()
    }

    /// `(kind, count)` per listed kind, for cycle summaries.
    pub fn counts(&self) -> Vec<(ResourceKind, usize)> {
        self.listings.iter().map(|(k, v)| (*k, v.len())).collect()
    }

    pub fn total(&self) -> usize {
        self.listings.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened to a watched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One input to the regeneration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    KindChanged(ResourceKind),
    TimerTick,
    ReloadSignal,
    ShutdownSignal,
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::KindChanged(kind) => write!(f, "{kind} changed"),
            ChangeEvent::TimerTick => f.write_str("timer tick"),
            ChangeEvent::ReloadSignal => f.write_str("reload signal"),
            ChangeEvent::ShutdownSignal => f.write_str("shutdown signal"),
        }
    }
}
