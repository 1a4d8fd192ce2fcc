//! Draft endpoints (/drafts/*)
//!
//! Posting a draft fans out into one immediate publish attempt per selected
//! platform and consumes the draft. The attempts are ordinary scheduled posts
//! with `scheduled_at = now`, so the dispatch worker picks up the ready ones
//! on its next tick; unready ones park pending like any other post.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::drafts::{self, Draft};
use crate::domain::platforms::{self, PlatformTarget};
use crate::domain::schedule::queries as schedule_queries;
use crate::domain::schedule::{infer_media_kind, status_after_classification};
use crate::domain::connections;
use crate::routes::auth::AuthUser;
use crate::routes::schedule::ScheduledPostResponse;
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drafts", post(create_draft).get(list_drafts))
        .route("/drafts/{id}", axum::routing::delete(delete_draft))
        .route("/drafts/{id}/post", post(post_draft))
}

#[derive(Debug, Deserialize)]
struct CreateDraftRequest {
    caption: String,
    #[serde(rename = "mediaUrls", default)]
    media_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftResponse {
    id: i64,
    caption: String,
    media_urls: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<Draft> for DraftResponse {
    fn from(draft: Draft) -> Self {
        DraftResponse {
            id: draft.id,
            caption: draft.caption,
            media_urls: draft.media_urls,
            created_at: draft.created_at,
        }
    }
}

/// POST /drafts - Save generated content as a draft
async fn create_draft(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftResponse>), ApiError> {
    if body.caption.trim().is_empty() {
        return Err(ApiError::Validation("caption must not be empty".to_string()));
    }

    let draft =
        drafts::insert_draft(&state.db, user_id, body.caption.trim(), &body.media_urls).await?;

    Ok((StatusCode::CREATED, Json(draft.into())))
}

#[derive(Debug, Deserialize)]
struct ListDraftsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ListDraftsResponse {
    drafts: Vec<DraftResponse>,
    total: i64,
    #[serde(rename = "hasMore")]
    has_more: bool,
}

/// GET /drafts - List saved drafts
async fn list_drafts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListDraftsQuery>,
) -> Result<Json<ListDraftsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let total = drafts::count_drafts(&state.db, user_id).await?;
    let rows = drafts::list_drafts(&state.db, user_id, limit, offset).await?;
    let has_more = offset + (rows.len() as i64) < total;

    Ok(Json(ListDraftsResponse {
        drafts: rows.into_iter().map(Into::into).collect(),
        total,
        has_more,
    }))
}

/// DELETE /drafts/:id - Discard a draft
async fn delete_draft(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(draft_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = drafts::delete_draft(&state.db, draft_id, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PostDraftRequest {
    platforms: Vec<PlatformTarget>,
}

#[derive(Debug, Serialize)]
struct PostDraftResponse {
    attempts: Vec<ScheduledPostResponse>,
}

/// POST /drafts/:id/post - Consume a draft into immediate publish attempts
///
/// One attempt per selected platform. The draft is deleted once the attempts
/// exist - a pending or later-failing attempt does not resurrect it.
async fn post_draft(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(draft_id): Path<i64>,
    Json(body): Json<PostDraftRequest>,
) -> Result<Json<PostDraftResponse>, ApiError> {
    if body.platforms.is_empty() {
        return Err(ApiError::Validation(
            "at least one platform is required".to_string(),
        ));
    }

    let draft = drafts::get_draft(&state.db, draft_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let snapshot = connections::load_snapshot(&state.db, user_id)
        .await
        .map_err(|e| ApiError::Dependency(format!("connection registry: {}", e)))?;

    let (media_kind, media_url) = match draft.media_urls.first() {
        Some(url) => (
            Some(infer_media_kind(url).as_str().to_string()),
            Some(url.clone()),
        ),
        None => (None, None),
    };

    let now = Utc::now();
    let mut attempts = Vec::with_capacity(body.platforms.len());

    // All attempts plus the draft deletion land together or not at all, so a
    // mid-loop failure can't leave half the attempts persisted for a client
    // retry to duplicate
    let mut tx = state.db.begin().await?;

    for target in &body.platforms {
        let targets = std::slice::from_ref(target);
        let classification = platforms::classify(targets, &snapshot);
        let status = status_after_classification(targets, &classification.issues);

        let post = schedule_queries::insert_post(
            &mut *tx,
            user_id,
            &draft.caption,
            media_kind.as_deref(),
            media_url.as_deref(),
            targets,
            &classification.issues,
            Some(now),
            status,
        )
        .await?;

        attempts.push(ScheduledPostResponse::from(post));
    }

    // Consumed regardless of how the attempts classified
    drafts::delete_draft(&mut *tx, draft_id, user_id).await?;

    tx.commit().await?;

    println!(
        "[drafts] user {} posted draft {} across {} platforms",
        user_id,
        draft_id,
        attempts.len()
    );

    Ok(Json(PostDraftResponse { attempts }))
}
