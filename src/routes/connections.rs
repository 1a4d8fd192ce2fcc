//! Connection registry endpoints (/connections/*)
//!
//! Read side of the registry plus connect/disconnect bookkeeping. The actual
//! OAuth handshakes live with the external platform adapters; this surface
//! only records their outcome.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::connections;
use crate::domain::platforms::Provider;
use crate::routes::auth::AuthUser;
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connections", get(list_connections).put(upsert_connection))
        .route(
            "/connections/{provider}",
            axum::routing::delete(delete_connection),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionResponse {
    provider: Provider,
    display_name: Option<String>,
    connected_at: DateTime<Utc>,
}

/// GET /connections - Providers the user has connected
async fn list_connections(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ConnectionResponse>>, ApiError> {
    let rows = connections::list_connections(&state.db, user_id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|c| ConnectionResponse {
                provider: c.provider,
                display_name: c.display_name,
                connected_at: c.connected_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct UpsertConnectionRequest {
    provider: Provider,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// PUT /connections - Record a provider as connected
async fn upsert_connection(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<UpsertConnectionRequest>,
) -> Result<StatusCode, ApiError> {
    connections::upsert_connection(
        &state.db,
        user_id,
        body.provider,
        body.display_name.as_deref(),
    )
    .await?;

    println!(
        "[connections] user {} connected {}",
        user_id, body.provider
    );

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /connections/:provider - Disconnect a provider
///
/// Does not touch existing posts; their next resolve sees the change.
async fn delete_connection(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(provider): Path<String>,
) -> Result<StatusCode, ApiError> {
    let provider = Provider::parse(&provider)
        .ok_or_else(|| ApiError::Validation(format!("unknown provider: {}", provider)))?;

    let deleted = connections::delete_connection(&state.db, user_id, provider).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
