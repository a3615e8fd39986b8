//! Error types for kubegen-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ResourceKind;

/// Invalid configuration, reported before anything starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported resource type '{0}' (expected pods, services or endpoints)")]
    UnknownKind(String),

    #[error("invalid wait '{spec}': minimum is required")]
    MissingMinWait { spec: String },

    #[error("invalid wait '{spec}': max must be greater than or equal to min")]
    MaxBelowMin { spec: String },

    #[error("invalid duration '{input}': {reason}")]
    Duration { input: String, reason: &'static str },

    #[error("template path must not be empty")]
    EmptyTemplatePath,
}

/// Failures from a [`ResourceSource`](crate::source::ResourceSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure talking to the API server.
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// Response or file body could not be decoded.
    #[error("malformed {kind} listing from {origin}: {message}")]
    Decode {
        kind: ResourceKind,
        origin: String,
        message: String,
    },

    /// The server reported an error inside a watch stream.
    #[error("watch on {kind} reported an error: {message}")]
    WatchFailed { kind: ResourceKind, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// A snapshot could not be assembled; carries the kind that failed.
#[derive(Debug, Error)]
#[error("failed to list {kind}: {source}")]
pub struct SnapshotError {
    pub kind: ResourceKind,
    #[source]
    pub source: SourceError,
}

/// Convenience constructor for [`SourceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
