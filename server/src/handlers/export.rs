//! Export handler - serializes one user's collection as a snapshot.

use crate::error::Result;
use chrono::Utc;
use shelf_engine::{EntityStore, LiveState, Snapshot};

/// Build the snapshot document for `user_id`.
pub async fn handle_export(store: &dyn EntityStore, user_id: &str) -> Result<Snapshot> {
    let live = LiveState::load(store, user_id).await?;
    let snapshot = Snapshot::from_live(&live, Utc::now());

    tracing::info!(
        user_id,
        books = snapshot.data.books.len(),
        locations = snapshot.data.locations.len(),
        ownerships = snapshot.data.ownerships.len(),
        "collection exported"
    );
    Ok(snapshot)
}
