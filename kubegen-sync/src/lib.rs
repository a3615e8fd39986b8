//! # kubegen-sync
//!
//! Atomic output writer, pre/post command runner, and the per-cycle
//! [`Generator`] that ties snapshot, render, and publish together.

pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod writer;

pub use error::{CycleError, HookError, WriteError};
pub use hooks::{HookRunner, HookStage};
pub use pipeline::{CycleReport, Generator};
pub use writer::{OutputWriter, StagedOutput, WriteResult};
