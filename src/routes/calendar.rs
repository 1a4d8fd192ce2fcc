//! Calendar endpoint - month view of scheduled posts

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::calendar;
use crate::domain::platforms::PlatformTarget;
use crate::domain::schedule::queries;
use crate::domain::schedule::{PostStatus, ScheduledPost};
use crate::routes::auth::AuthUser;
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/calendar", get(month_view))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    /// Month to project, `YYYY-MM`
    month: String,
    /// Viewer timezone as minutes east of UTC; defaults to UTC. The same
    /// offset buckets posts and bounds the month, so write and read agree on
    /// which day a post belongs to.
    #[serde(default)]
    tz_offset: i32,
}

/// Calendar item shape for one post
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarPost {
    id: i64,
    status: PostStatus,
    scheduled_at: DateTime<Utc>,
    platforms: Vec<PlatformTarget>,
    caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CalendarDay {
    /// Viewer-local date, `YYYY-MM-DD`
    date: String,
    posts: Vec<CalendarPost>,
}

fn calendar_post(post: ScheduledPost) -> Option<CalendarPost> {
    Some(CalendarPost {
        id: post.id,
        status: post.status,
        scheduled_at: post.scheduled_at?,
        platforms: post.platforms.0,
        caption: post.caption,
        media_url: post.media_url,
    })
}

/// GET /calendar?month=YYYY-MM&tz_offset=0 - Posts grouped by local date
async fn month_view(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let first_day = calendar::parse_month(&query.month)
        .ok_or_else(|| ApiError::Validation(format!("invalid month: {}", query.month)))?;
    let tz = calendar::viewer_offset(query.tz_offset)
        .ok_or_else(|| ApiError::Validation(format!("invalid tz_offset: {}", query.tz_offset)))?;

    let (from, until) = calendar::month_range_utc(first_day, tz);
    let posts = queries::list_in_range(&state.db, user_id, from, until).await?;

    let days = calendar::bucket_by_day(posts, tz)
        .into_iter()
        .map(|(date, posts)| CalendarDay {
            date: date.format("%Y-%m-%d").to_string(),
            posts: posts.into_iter().filter_map(calendar_post).collect(),
        })
        .collect();

    Ok(Json(days))
}
