//! Error types for kubegen-sync.

use std::path::PathBuf;

use thiserror::Error;

use kubegen_core::SnapshotError;
use kubegen_renderer::RenderError;

use crate::hooks::HookStage;

/// Failures while publishing rendered output.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The target exists, differs, and replacing it was not allowed.
    #[error("output file already exists: {path}")]
    RefusedOverwrite { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`WriteError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.into(),
        source,
    }
}

/// A pre or post command that could not be run or exited non-zero.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{stage} command failed to start [{command}]: {source}")]
    Spawn {
        stage: HookStage,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} command [{command}] exited with {}: {output}", exit_label(.code))]
    Failed {
        stage: HookStage,
        command: String,
        code: Option<i32>,
        output: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// The first error that stopped a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("error rendering template: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("error writing output: {0}")]
    Write(#[from] WriteError),
}
