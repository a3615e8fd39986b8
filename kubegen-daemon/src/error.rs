use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the regeneration runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid configuration: {0}")]
    Config(#[from] kubegen_core::ConfigError),

    #[error(transparent)]
    Cycle(#[from] kubegen_sync::CycleError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },

    #[error("signal handler failed: {0}")]
    Signal(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        message: err.to_string(),
    }
}
