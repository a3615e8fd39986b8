//! # kubegen-renderer
//!
//! Tera-based template engine that turns a [`kubegen_core::Snapshot`] into
//! output bytes. Query helpers from `kubegen-query` are exposed to templates
//! as filters; the remaining helpers are global functions.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kubegen_core::{Environment, Snapshot, TemplateSource};
//! use kubegen_renderer::Renderer;
//!
//! let renderer = Renderer::new(
//!     TemplateSource::Inline("{{ services | length }}".into()),
//!     Arc::new(Environment::capture()),
//!     kubegen_core::platform::detect(),
//! );
//! let bytes = renderer.render(&Snapshot::new()).expect("render");
//! assert_eq!(bytes, b"0");
//! ```

pub mod context;
pub mod engine;
pub mod error;
mod filters;
mod functions;

pub use context::TemplateContext;
pub use engine::Renderer;
pub use error::RenderError;
