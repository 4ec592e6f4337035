//! HTTP route definitions.

mod export;
mod health;
mod import;

use crate::config::Config;
use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes(config: &Config) -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(export::routes())
        .merge(import::routes(config.max_import_bytes))
}
