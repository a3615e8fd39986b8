//! Kubernetes API server adapter over plain HTTP.
//!
//! Lists come from `GET {host}/api/v1/{kind}`. Watches use the streaming form
//! of the same endpoint, which answers with one JSON event per line until the
//! server-side timeout closes the stream. Each watch resumes from the last
//! resource version seen for its kind, so a reconnect does not replay the
//! whole collection as fresh ADDED events.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{ResourceSource, WatchPoll, WatchStream};
use crate::error::SourceError;
use crate::types::{ChangeKind, Resource, ResourceKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LIST_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest a watch read blocks before the reader re-checks its stop flag.
const WATCH_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Server-side lifetime of one watch request.
const WATCH_TIMEOUT_SECS: u64 = 300;
const HTTP_GONE: u16 = 410;

/// A [`ResourceSource`] talking to an API server at a base URL, e.g. a local
/// `kubectl proxy` on `http://localhost:8001`.
#[derive(Debug, Clone)]
pub struct ApiServerSource {
    base: String,
    list_agent: ureq::Agent,
    watch_agent: ureq::Agent,
    versions: ResumeVersions,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Deserialize, Default)]
struct ObjectMeta {
    #[serde(rename = "resourceVersion")]
    resource_version: Option<String>,
}

#[derive(Deserialize)]
struct WatchEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Value,
}

/// Last resource version observed per kind, shared with the watch readers.
#[derive(Debug, Clone, Default)]
struct ResumeVersions(Arc<Mutex<HashMap<ResourceKind, String>>>);

impl ResumeVersions {
    fn locked(&self) -> MutexGuard<'_, HashMap<ResourceKind, String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, kind: ResourceKind) -> Option<String> {
        self.locked().get(&kind).cloned()
    }

    fn record(&self, kind: ResourceKind, version: String) {
        self.locked().insert(kind, version);
    }

    fn forget(&self, kind: ResourceKind) {
        self.locked().remove(&kind);
    }
}

impl ApiServerSource {
    pub fn new(host: &str) -> Self {
        let list_agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(LIST_TIMEOUT)
            .build();
        // No overall timeout on watches: the stream stays open between events.
        // The read timeout only bounds how long the reader ignores its stop flag.
        let watch_agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(WATCH_READ_TIMEOUT)
            .build();
        Self {
            base: host.trim_end_matches('/').to_string(),
            list_agent,
            watch_agent,
            versions: ResumeVersions::default(),
        }
    }

    pub fn list_url(&self, kind: ResourceKind) -> String {
        format!("{}/api/v1/{}", self.base, kind)
    }

    pub fn watch_url(&self, kind: ResourceKind, resource_version: &str) -> String {
        format!(
            "{}?watch=true&allowWatchBookmarks=true&resourceVersion={}&timeoutSeconds={}",
            self.list_url(kind),
            resource_version,
            WATCH_TIMEOUT_SECS
        )
    }

    /// The version a new watch on `kind` would resume from, if any.
    pub fn resume_version(&self, kind: ResourceKind) -> Option<String> {
        self.versions.get(kind)
    }

    /// List `kind` only to learn the collection's current resource version.
    fn relist_version(&self, kind: ResourceKind) -> Result<String, SourceError> {
        self.list(kind)?;
        self.versions.get(kind).ok_or_else(|| SourceError::WatchFailed {
            kind,
            message: "listing carried no resourceVersion to watch from".to_string(),
        })
    }

    fn open_watch(&self, kind: ResourceKind, version: &str) -> Result<ureq::Response, ureq::Error> {
        self.watch_agent.get(&self.watch_url(kind, version)).call()
    }
}

impl ResourceSource for ApiServerSource {
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, SourceError> {
        let url = self.list_url(kind);
        let response = self.list_agent.get(&url).call().map_err(|e| http_err(&url, e))?;
        let listing: ListResponse = response.into_json().map_err(|e| SourceError::Decode {
            kind,
            origin: url.clone(),
            message: e.to_string(),
        })?;
        if let Some(version) = listing.metadata.resource_version {
            self.versions.record(kind, version);
        }
        Ok(listing
            .items
            .into_iter()
            .map(|object| Resource::new(kind, object))
            .collect())
    }

    fn watch(&self, kind: ResourceKind) -> Result<Box<dyn WatchStream>, SourceError> {
        let mut version = match self.versions.get(kind) {
            Some(version) => version,
            None => self.relist_version(kind)?,
        };

        let mut pending = None;
        let response = match self.open_watch(kind, &version) {
            Ok(response) => response,
            Err(ureq::Error::Status(HTTP_GONE, _)) => {
                tracing::debug!(kind = %kind, version = %version, "resource version expired, relisting");
                self.versions.forget(kind);
                version = self.relist_version(kind)?;
                // Changes between the stale version and the relist are unknown.
                pending = Some(ChangeKind::Modified);
                self.open_watch(kind, &version)
                    .map_err(|e| http_err(&self.watch_url(kind, &version), e))?
            }
            Err(err) => return Err(http_err(&self.watch_url(kind, &version), err)),
        };

        let url = self.watch_url(kind, &version);
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let stop = Arc::clone(&stop);
            let versions = self.versions.clone();
            let body = BufReader::new(response.into_reader());
            let origin = url.clone();
            thread::Builder::new()
                .name(format!("watch-{kind}"))
                .spawn(move || read_events(kind, &origin, body, &tx, &stop, &versions))
                .map_err(|e| SourceError::Http {
                    url,
                    message: format!("failed to start watch reader: {e}"),
                })?
        };

        Ok(Box::new(ApiWatch {
            rx,
            pending,
            stop,
            reader: Some(reader),
        }))
    }

    fn describe(&self) -> String {
        format!("API server at {}", self.base)
    }
}

fn http_err(url: &str, err: ureq::Error) -> SourceError {
    let message = match err {
        ureq::Error::Status(code, response) => {
            format!("HTTP {code} {}", response.status_text())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    SourceError::Http {
        url: url.to_string(),
        message,
    }
}

/// One decoded line of a watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchUpdate {
    /// An object changed; carries the version to resume from.
    Changed(ChangeKind, Option<String>),
    /// A bookmark: the resume version moved without any change.
    Progress(String),
    /// The resume version is too old (410 Gone); relist before watching again.
    Expired,
}

fn resource_version(object: &Value) -> Option<String> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Decode one line of a watch stream.
///
/// Returns `None` for blank lines, bookmarks without a version and unknown
/// event types.
pub fn parse_watch_line(kind: ResourceKind, line: &str) -> Result<Option<WatchUpdate>, SourceError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event: WatchEvent = serde_json::from_str(line).map_err(|e| SourceError::Decode {
        kind,
        origin: "watch stream".to_string(),
        message: e.to_string(),
    })?;
    let version = resource_version(&event.object);
    let change = match event.kind.as_str() {
        "ADDED" => ChangeKind::Added,
        "MODIFIED" => ChangeKind::Modified,
        "DELETED" => ChangeKind::Deleted,
        "BOOKMARK" => return Ok(version.map(WatchUpdate::Progress)),
        "ERROR" => {
            let code = event.object.get("code").and_then(Value::as_u64);
            if code == Some(u64::from(HTTP_GONE)) {
                return Ok(Some(WatchUpdate::Expired));
            }
            let message = event
                .object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| event.object.to_string());
            return Err(SourceError::WatchFailed { kind, message });
        }
        other => {
            tracing::debug!(kind = %kind, event = other, "ignoring unknown watch event type");
            return Ok(None);
        }
    };
    Ok(Some(WatchUpdate::Changed(change, version)))
}

/// Body of the reader thread: forwards changes until the stream ends, an
/// error is reported, the receiver goes away, or `stop` is raised.
fn read_events(
    kind: ResourceKind,
    url: &str,
    mut body: impl BufRead,
    tx: &Sender<Result<ChangeKind, SourceError>>,
    stop: &AtomicBool,
    versions: &ResumeVersions,
) {
    // Kept across read timeouts so a line split by one is not lost.
    let mut line = Vec::new();
    while !stop.load(Ordering::SeqCst) {
        match body.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let update = parse_watch_line(kind, &String::from_utf8_lossy(&line));
                line.clear();
                let item = match update {
                    Ok(None) => continue,
                    Ok(Some(WatchUpdate::Progress(version))) => {
                        versions.record(kind, version);
                        continue;
                    }
                    Ok(Some(WatchUpdate::Changed(change, version))) => {
                        if let Some(version) = version {
                            versions.record(kind, version);
                        }
                        Ok(change)
                    }
                    Ok(Some(WatchUpdate::Expired)) => {
                        tracing::debug!(kind = %kind, "watch expired, next subscription relists");
                        versions.forget(kind);
                        let _ = tx.send(Ok(ChangeKind::Modified));
                        break;
                    }
                    Err(err) => Err(err),
                };
                let failed = item.is_err();
                if tx.send(item).is_err() || failed {
                    break;
                }
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(err) => {
                let _ = tx.send(Err(SourceError::Http {
                    url: url.to_string(),
                    message: err.to_string(),
                }));
                break;
            }
        }
    }
}

/// Dropping the stream stops the reader thread and waits for it, which
/// closes the connection.
struct ApiWatch {
    rx: Receiver<Result<ChangeKind, SourceError>>,
    pending: Option<ChangeKind>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl WatchStream for ApiWatch {
    fn next_change(&mut self, poll: Duration) -> Result<WatchPoll, SourceError> {
        if let Some(change) = self.pending.take() {
            return Ok(WatchPoll::Changed(change));
        }
        match self.rx.recv_timeout(poll) {
            Ok(item) => item.map(WatchPoll::Changed),
            Err(RecvTimeoutError::Timeout) => Ok(WatchPoll::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(WatchPoll::Closed),
        }
    }
}

impl Drop for ApiWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("watch reader thread panicked");
            }
        }
    }
}
