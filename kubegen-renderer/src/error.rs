//! Error types for kubegen-renderer.

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Parse or execution failure inside Tera, with the full cause chain
    /// flattened into `message`.
    #[error("template {template}: {message}")]
    Template { template: String, message: String },

    /// Filesystem error while reading the template file.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

/// Tera's top-level messages ("Failed to render ...") hide the cause; keep
/// every level.
pub(crate) fn tera_err(template: &str, err: tera::Error) -> RenderError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RenderError::Template {
        template: template.to_string(),
        message,
    }
}
