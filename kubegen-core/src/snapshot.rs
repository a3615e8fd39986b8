//! Snapshot loading.

use std::time::Instant;

use crate::error::SnapshotError;
use crate::source::ResourceSource;
use crate::types::{KindSelection, Snapshot};

/// List every selected kind, in kind order, into a fresh [`Snapshot`].
///
/// The first failing kind aborts the load; no partial snapshot is returned.
pub fn load_snapshot(
    source: &dyn ResourceSource,
    selection: &KindSelection,
) -> Result<Snapshot, SnapshotError> {
    tracing::info!(source = %source.describe(), "refreshing state");
    let started = Instant::now();

    let mut snapshot = Snapshot::new();
    for &kind in selection.kinds() {
        let resources = source
            .list(kind)
            .map_err(|source| SnapshotError { kind, source })?;
        tracing::debug!(kind = %kind, count = resources.len(), "listed");
        snapshot.insert(kind, resources);
    }

    tracing::info!(
        total = snapshot.total(),
        duration_ms = started.elapsed().as_millis() as u64,
        "state refreshed"
    );
    Ok(snapshot)
}
