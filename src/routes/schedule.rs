//! Scheduling endpoints (/schedule/*)
//!
//! The schedule service is the sole mutator of a post's status. Create,
//! update and resolve all run the same path: merge the requested fields,
//! classify the target list against a fresh connection snapshot, and let the
//! classification decide between `scheduled` and `scheduled_pending`. A post
//! that cannot be fully scheduled is never dropped - it is persisted pending
//! with per-provider reasons so the user can fix connections and resolve.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_CAPTION_LEN, MAX_PAGE_SIZE};
use crate::domain::platforms::{self, Classification, PlatformIssue, PlatformTarget};
use crate::domain::schedule::queries;
use crate::domain::schedule::{MediaKind, PostStatus, ScheduledPost, status_after_classification};
use crate::domain::connections;
use crate::routes::auth::AuthUser;
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schedule", post(create_post))
        .route("/schedule/pending", get(list_pending))
        .route(
            "/schedule/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/schedule/{id}/resolve", patch(resolve_post))
        .route("/schedule/{id}/duplicate", post(duplicate_post))
}

// ============================================================================
// DTOs
// ============================================================================

/// Single media attachment, `{"type": "image"|"video", "url": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct CreateScheduleRequest {
    caption: String,
    media: Option<MediaBody>,
    #[serde(default)]
    platforms: Vec<PlatformTarget>,
    #[serde(rename = "scheduledAt")]
    scheduled_at: Option<DateTime<Utc>>,
}

/// Distinguishes an absent field from an explicit null, so a PATCH can clear
/// a value and not just set one
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
struct UpdateScheduleRequest {
    caption: Option<String>,
    media: Option<MediaBody>,
    platforms: Option<Vec<PlatformTarget>>,
    /// Absent: keep the current date. `null`: clear it (the post drops off
    /// the calendar until re-scheduled).
    #[serde(
        rename = "scheduledAt",
        default,
        deserialize_with = "double_option"
    )]
    scheduled_at: Option<Option<DateTime<Utc>>>,
    /// Version token from the caller's last read; mismatch means a concurrent
    /// writer won and the caller gets a 409
    #[serde(rename = "expectedUpdatedAt")]
    expected_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    platforms: Vec<PlatformTarget>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPostResponse {
    pub id: i64,
    pub status: PostStatus,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaBody>,
    pub platforms: Vec<PlatformTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<PlatformIssue>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScheduledPost> for ScheduledPostResponse {
    fn from(post: ScheduledPost) -> Self {
        let media = match (&post.media_kind, &post.media_url) {
            (Some(kind), Some(url)) => Some(MediaBody {
                kind: kind.clone(),
                url: url.clone(),
            }),
            _ => None,
        };

        ScheduledPostResponse {
            id: post.id,
            status: post.status,
            caption: post.caption,
            media,
            platforms: post.platforms.0,
            issues: post.issues.0,
            scheduled_at: post.scheduled_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

// ============================================================================
// Validation and merge helpers
// ============================================================================

fn validate_caption(caption: &str) -> Result<String, ApiError> {
    let trimmed = caption.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("caption must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_CAPTION_LEN {
        return Err(ApiError::Validation(format!(
            "caption exceeds {} characters",
            MAX_CAPTION_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_media(media: &MediaBody) -> Result<(String, String), ApiError> {
    let kind = MediaKind::parse(&media.kind)
        .ok_or_else(|| ApiError::Validation(format!("unknown media type: {}", media.kind)))?;
    if media.url.trim().is_empty() {
        return Err(ApiError::Validation("media url must not be empty".to_string()));
    }
    Ok((kind.as_str().to_string(), media.url.clone()))
}

/// A post's mutable fields after merging a partial update
#[derive(Debug)]
struct MergedPost {
    caption: String,
    media_kind: Option<String>,
    media_url: Option<String>,
    targets: Vec<PlatformTarget>,
    scheduled_at: Option<DateTime<Utc>>,
    /// Re-classification is required when the target list was touched or the
    /// post was already pending. A stale `scheduled` must never survive a
    /// target change.
    needs_resolution: bool,
}

fn merge_update(current: &ScheduledPost, body: &UpdateScheduleRequest) -> Result<MergedPost, ApiError> {
    let caption = match &body.caption {
        Some(c) => validate_caption(c)?,
        None => current.caption.clone(),
    };

    let (media_kind, media_url) = match &body.media {
        Some(m) => {
            let (kind, url) = validate_media(m)?;
            (Some(kind), Some(url))
        }
        None => (current.media_kind.clone(), current.media_url.clone()),
    };

    let targets = body
        .platforms
        .clone()
        .unwrap_or_else(|| current.platforms.0.clone());

    let needs_resolution =
        body.platforms.is_some() || current.status == PostStatus::ScheduledPending;

    Ok(MergedPost {
        caption,
        media_kind,
        media_url,
        targets,
        scheduled_at: body.scheduled_at.unwrap_or(current.scheduled_at),
        needs_resolution,
    })
}

/// Classify a target list against a fresh connection snapshot. Registry
/// failures surface as Dependency errors - unreadiness never does.
async fn classify_targets(
    state: &AppState,
    user_id: i64,
    targets: &[PlatformTarget],
) -> Result<Classification, ApiError> {
    if targets.is_empty() {
        return Ok(Classification::default());
    }

    let snapshot = connections::load_snapshot(&state.db, user_id)
        .await
        .map_err(|e| ApiError::Dependency(format!("connection registry: {}", e)))?;

    Ok(platforms::classify(targets, &snapshot))
}

fn reject_uneditable(post: &ScheduledPost) -> Result<(), ApiError> {
    match post.status {
        PostStatus::Publishing => Err(ApiError::Conflict(
            "post is currently publishing".to_string(),
        )),
        status if status.is_terminal() => Err(ApiError::Conflict(format!(
            "post is already {}",
            status.as_str()
        ))),
        _ => Ok(()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /schedule - Create a scheduled post
///
/// An empty platform list is allowed: the post parks in `scheduled_pending`
/// with no issues so it is never lost for lack of a connected account.
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduledPostResponse>), ApiError> {
    let caption = validate_caption(&body.caption)?;
    let (media_kind, media_url) = match &body.media {
        Some(m) => {
            let (kind, url) = validate_media(m)?;
            (Some(kind), Some(url))
        }
        None => (None, None),
    };

    let classification = classify_targets(&state, user_id, &body.platforms).await?;
    let status = status_after_classification(&body.platforms, &classification.issues);

    let post = queries::insert_post(
        &state.db,
        user_id,
        &caption,
        media_kind.as_deref(),
        media_url.as_deref(),
        &body.platforms,
        &classification.issues,
        body.scheduled_at,
        status,
    )
    .await?;

    println!(
        "[schedule] user {} created post {} ({})",
        user_id,
        post.id,
        post.status.as_str()
    );

    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /schedule/:id - Fetch a single post
async fn get_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<ScheduledPostResponse>, ApiError> {
    let post = queries::get_post(&state.db, post_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(post.into()))
}

/// PATCH /schedule/:id - Merge partial fields and re-apply transition logic
async fn update_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    Json(body): Json<UpdateScheduleRequest>,
) -> Result<Json<ScheduledPostResponse>, ApiError> {
    let current = queries::get_post(&state.db, post_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    reject_uneditable(&current)?;

    let merged = merge_update(&current, &body)?;

    let (status, issues) = if merged.needs_resolution {
        let classification = classify_targets(&state, user_id, &merged.targets).await?;
        (
            status_after_classification(&merged.targets, &classification.issues),
            classification.issues,
        )
    } else {
        (current.status, current.issues.0.clone())
    };

    let updated = queries::update_post(
        &state.db,
        post_id,
        user_id,
        &merged.caption,
        merged.media_kind.as_deref(),
        merged.media_url.as_deref(),
        &merged.targets,
        &issues,
        merged.scheduled_at,
        status,
        body.expected_updated_at,
    )
    .await?;

    match updated {
        Some(post) => Ok(Json(post.into())),
        // Row existed a moment ago; a zero-row update means the version
        // check failed under us
        None => match queries::get_post(&state.db, post_id, user_id).await? {
            Some(_) => Err(ApiError::Conflict(
                "post was modified concurrently".to_string(),
            )),
            None => Err(ApiError::NotFound),
        },
    }
}

/// PATCH /schedule/:id/resolve - Replace the target list and re-classify
///
/// The explicit "user fixed connections, try again" entry point. Idempotent:
/// same targets and unchanged registry give the same status and issues.
async fn resolve_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ScheduledPostResponse>, ApiError> {
    let current = queries::get_post(&state.db, post_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    reject_uneditable(&current)?;

    let classification = classify_targets(&state, user_id, &body.platforms).await?;
    let status = status_after_classification(&body.platforms, &classification.issues);

    let updated = queries::update_post(
        &state.db,
        post_id,
        user_id,
        &current.caption,
        current.media_kind.as_deref(),
        current.media_url.as_deref(),
        &body.platforms,
        &classification.issues,
        current.scheduled_at,
        status,
        None,
    )
    .await?
    .ok_or(ApiError::NotFound)?;

    println!(
        "[schedule] user {} resolved post {} -> {}",
        user_id,
        post_id,
        updated.status.as_str()
    );

    Ok(Json(updated.into()))
}

/// POST /schedule/:id/duplicate - Copy content into a fresh post
///
/// Copies caption, media and targets only. The copy gets a new id, no publish
/// date, and starts pending so it goes through resolution before it can
/// schedule - never a blind re-schedule, and never `published`/`failed`.
/// Works regardless of the source's in-flight status.
async fn duplicate_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<ScheduledPostResponse>, ApiError> {
    let source = queries::get_post(&state.db, post_id, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let copy = queries::insert_post(
        &state.db,
        user_id,
        &source.caption,
        source.media_kind.as_deref(),
        source.media_url.as_deref(),
        &source.platforms.0,
        &[],
        None,
        PostStatus::ScheduledPending,
    )
    .await?;

    println!(
        "[schedule] user {} duplicated post {} -> {}",
        user_id, post_id, copy.id
    );

    Ok(Json(copy.into()))
}

/// DELETE /schedule/:id - Remove a post
///
/// Deleting while publishing does not retract already-dispatched work.
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = queries::delete_post(&state.db, post_id, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ListPendingQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ListPendingResponse {
    posts: Vec<ScheduledPostResponse>,
    total: i64,
    #[serde(rename = "hasMore")]
    has_more: bool,
}

/// GET /schedule/pending - Pending posts with no publish date
///
/// These never appear on the calendar; this is their listing.
async fn list_pending(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListPendingQuery>,
) -> Result<Json<ListPendingResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let total = queries::count_unscheduled_pending(&state.db, user_id).await?;
    let posts = queries::list_unscheduled_pending(&state.db, user_id, limit, offset).await?;
    let has_more = offset + (posts.len() as i64) < total;

    Ok(Json(ListPendingResponse {
        posts: posts.into_iter().map(Into::into).collect(),
        total,
        has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platforms::Provider;
    use chrono::TimeZone;
    use sqlx::types::Json as SqlJson;

    fn existing_post(status: PostStatus, providers: &[Provider]) -> ScheduledPost {
        let now = Utc::now();
        ScheduledPost {
            id: 7,
            user_id: 1,
            caption: "Sunset views".to_string(),
            media_kind: Some("image".to_string()),
            media_url: Some("https://cdn.example.com/sunset.jpg".to_string()),
            platforms: SqlJson(
                providers
                    .iter()
                    .map(|p| PlatformTarget {
                        provider: *p,
                        options: None,
                    })
                    .collect(),
            ),
            issues: SqlJson(vec![]),
            scheduled_at: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);
        let body = UpdateScheduleRequest {
            caption: Some("New caption".to_string()),
            ..Default::default()
        };

        let merged = merge_update(&current, &body).unwrap();

        assert_eq!(merged.caption, "New caption");
        assert_eq!(merged.media_url.as_deref(), Some("https://cdn.example.com/sunset.jpg"));
        assert_eq!(merged.targets, current.platforms.0);
    }

    #[test]
    fn test_caption_only_update_of_scheduled_post_skips_resolution() {
        let current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);
        let body = UpdateScheduleRequest {
            caption: Some("New caption".to_string()),
            ..Default::default()
        };

        assert!(!merge_update(&current, &body).unwrap().needs_resolution);
    }

    #[test]
    fn test_target_change_forces_resolution() {
        let current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);
        let body = UpdateScheduleRequest {
            platforms: Some(vec![PlatformTarget {
                provider: Provider::Facebook,
                options: None,
            }]),
            ..Default::default()
        };

        assert!(merge_update(&current, &body).unwrap().needs_resolution);
    }

    #[test]
    fn test_pending_post_always_re_resolves() {
        let current = existing_post(PostStatus::ScheduledPending, &[Provider::Instagram]);
        let body = UpdateScheduleRequest {
            caption: Some("New caption".to_string()),
            ..Default::default()
        };

        assert!(merge_update(&current, &body).unwrap().needs_resolution);
    }

    #[test]
    fn test_absent_publish_date_is_kept() {
        let mut current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);
        current.scheduled_at = Some(Utc::now());

        let body: UpdateScheduleRequest =
            serde_json::from_str(r#"{"caption": "New caption"}"#).unwrap();
        let merged = merge_update(&current, &body).unwrap();

        assert_eq!(merged.scheduled_at, current.scheduled_at);
    }

    #[test]
    fn test_explicit_null_clears_publish_date() {
        let mut current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);
        current.scheduled_at = Some(Utc::now());

        let body: UpdateScheduleRequest =
            serde_json::from_str(r#"{"scheduledAt": null}"#).unwrap();
        let merged = merge_update(&current, &body).unwrap();

        assert_eq!(merged.scheduled_at, None);
    }

    #[test]
    fn test_patch_sets_publish_date() {
        let current = existing_post(PostStatus::Scheduled, &[Provider::Instagram]);

        let body: UpdateScheduleRequest =
            serde_json::from_str(r#"{"scheduledAt": "2026-09-01T18:00:00Z"}"#).unwrap();
        let merged = merge_update(&current, &body).unwrap();

        assert_eq!(
            merged.scheduled_at,
            Some(Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_caption_rejected() {
        let current = existing_post(PostStatus::ScheduledPending, &[]);
        let body = UpdateScheduleRequest {
            caption: Some("   ".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            merge_update(&current, &body),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_publishing_and_terminal_posts_reject_edits() {
        for status in [PostStatus::Publishing, PostStatus::Published, PostStatus::Failed] {
            let post = existing_post(status, &[Provider::Instagram]);
            assert!(matches!(
                reject_uneditable(&post),
                Err(ApiError::Conflict(_))
            ));
        }
    }

    #[test]
    fn test_media_validation() {
        assert!(validate_media(&MediaBody {
            kind: "image".to_string(),
            url: "https://cdn.example.com/a.png".to_string(),
        })
        .is_ok());

        assert!(validate_media(&MediaBody {
            kind: "gif".to_string(),
            url: "https://cdn.example.com/a.gif".to_string(),
        })
        .is_err());
    }
}
