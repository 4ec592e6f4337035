//! Import handlers - diff preview and merge application.

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;
use shelf_engine::{
    apply_import, detect_diff, parse_snapshot, DiffResult, EntityStore, ImportSummary, Selection,
    Selections, SnapshotSummary,
};

/// Request body for applying an import.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    /// The snapshot document, validated before anything is written
    pub snapshot: Value,
    /// Per-difference choices; unlisted differences take their defaults
    #[serde(default)]
    pub selections: Vec<Selection>,
}

/// Classify `raw` against `user_id`'s live data without writing anything.
pub async fn handle_diff(store: &dyn EntityStore, user_id: &str, raw: &Value) -> Result<DiffResult> {
    let snapshot = parse_snapshot(raw)?;
    tracing::debug!(user_id, snapshot = ?SnapshotSummary::from(&snapshot), "diff requested");

    Ok(detect_diff(store, user_id, &snapshot).await?)
}

/// Validate the snapshot, then write the merge.
pub async fn handle_apply(
    store: &dyn EntityStore,
    user_id: &str,
    request: ApplyRequest,
) -> Result<ImportSummary> {
    let snapshot = parse_snapshot(&request.snapshot)?;
    let selections: Selections = request.selections.into_iter().collect();
    tracing::debug!(
        user_id,
        snapshot = ?SnapshotSummary::from(&snapshot),
        selections = selections.len(),
        "import requested"
    );

    Ok(apply_import(store, user_id, &snapshot, &selections).await?)
}
