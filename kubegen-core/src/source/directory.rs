//! Directory-backed source: one listing file per kind.
//!
//! `<dir>/pods.json`, `<dir>/services.yaml`, `<dir>/endpoints.yml` and so on
//! hold either a bare list of objects or an object with an `items` list, the
//! same shape the API server returns. A kind with no file lists as empty.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;

use super::{ResourceSource, WatchPoll, WatchStream};
use crate::error::{io_err, SourceError};
use crate::types::{ChangeKind, Resource, ResourceKind};

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// A [`ResourceSource`] reading listings from files in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The first existing listing file for `kind`, in extension order.
    pub fn listing_path(&self, kind: ResourceKind) -> Option<PathBuf> {
        candidate_paths(&self.dir, kind).find(|path| path.is_file())
    }
}

fn candidate_paths(dir: &Path, kind: ResourceKind) -> impl Iterator<Item = PathBuf> + '_ {
    EXTENSIONS
        .iter()
        .map(move |ext| dir.join(format!("{kind}.{ext}")))
}

fn is_listing_file(path: &Path, kind: ResourceKind) -> bool {
    let stem_matches = path.file_stem().and_then(|s| s.to_str()) == Some(kind.as_str());
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));
    stem_matches && ext_matches
}

fn parse_listing(kind: ResourceKind, path: &Path, raw: &str) -> Result<Vec<Value>, SourceError> {
    let decode = |message: String| SourceError::Decode {
        kind,
        origin: path.display().to_string(),
        message,
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let document: Value = if is_json {
        serde_json::from_str(raw).map_err(|e| decode(e.to_string()))?
    } else {
        serde_yaml::from_str(raw).map_err(|e| decode(e.to_string()))?
    };

    match document {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(decode("expected a list or an object with an 'items' list".to_string())),
        },
        _ => Err(decode("expected a list or an object with an 'items' list".to_string())),
    }
}

impl ResourceSource for DirectorySource {
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, SourceError> {
        let Some(path) = self.listing_path(kind) else {
            tracing::debug!(kind = %kind, dir = %self.dir.display(), "no listing file, treating as empty");
            return Ok(Vec::new());
        };
        let raw = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(parse_listing(kind, &path, &raw)?
            .into_iter()
            .map(|object| Resource::new(kind, object))
            .collect())
    }

    fn watch(&self, kind: ResourceKind) -> Result<Box<dyn WatchStream>, SourceError> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(tx)?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        Ok(Box::new(DirectoryWatch {
            kind,
            rx,
            _watcher: watcher,
        }))
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

struct DirectoryWatch {
    kind: ResourceKind,
    rx: Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatch {
    fn classify(&self, event: &Event) -> Option<ChangeKind> {
        if !event.paths.iter().any(|p| is_listing_file(p, self.kind)) {
            return None;
        }
        match event.kind {
            EventKind::Create(_) => Some(ChangeKind::Added),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

impl WatchStream for DirectoryWatch {
    fn next_change(&mut self, poll: Duration) -> Result<WatchPoll, SourceError> {
        match self.rx.recv_timeout(poll) {
            Ok(Ok(event)) => Ok(self
                .classify(&event)
                .map(WatchPoll::Changed)
                .unwrap_or(WatchPoll::Idle)),
            Ok(Err(err)) => Err(SourceError::Notify(err)),
            Err(RecvTimeoutError::Timeout) => Ok(WatchPoll::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(WatchPoll::Closed),
        }
    }
}
