//! Export endpoint route.

use axum::{extract::State, routing::get, Json, Router};
use shelf_engine::Snapshot;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::handle_export;
use crate::AppState;

/// Create export routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/export", get(export_handler))
}

/// GET /export - Download the caller's collection.
async fn export_handler(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Snapshot>> {
    let snapshot = handle_export(state.store.as_ref(), &auth.user_id).await?;
    Ok(Json(snapshot))
}
