pub mod auth;
pub mod calendar;
pub mod connections;
pub mod drafts;
pub mod schedule;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(calendar::routes())
        .merge(connections::routes())
        .merge(drafts::routes())
        .merge(schedule::routes())
}
