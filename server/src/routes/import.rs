//! Import endpoint routes.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use shelf_engine::{DiffResult, ImportSummary};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_apply, handle_diff, ApplyRequest};
use crate::AppState;

/// Create import routes accepting bodies up to `max_body_bytes`.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/import/diff", post(diff_handler))
        .route("/import/apply", post(apply_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// POST /import/diff - Preview what importing a snapshot would change.
async fn diff_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<DiffResult>> {
    let Json(raw) = payload?;
    let result = handle_diff(state.store.as_ref(), &auth.user_id, &raw).await?;
    Ok(Json(result))
}

/// POST /import/apply - Write a snapshot with the caller's selections.
async fn apply_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: std::result::Result<Json<ApplyRequest>, JsonRejection>,
) -> Result<Json<ImportSummary>> {
    let Json(request) = payload?;
    let summary = handle_apply(state.store.as_ref(), &auth.user_id, request).await?;
    Ok(Json(summary))
}
