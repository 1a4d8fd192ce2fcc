//! Scheduled post DB queries
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` and `&mut PgConnection` (transactions). `updated_at` doubles
//! as the optimistic-concurrency token: mutations can pass the value they last
//! read, and a zero-row update against an existing row means a concurrent
//! writer got there first.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, Postgres};

use crate::domain::platforms::{PlatformIssue, PlatformTarget};

use super::models::{PostStatus, ScheduledPost};

const POST_COLUMNS: &str = r#"
    id, user_id, caption, media_kind, media_url,
    COALESCE(platforms, '[]'::jsonb) as platforms,
    COALESCE(issues, '[]'::jsonb) as issues,
    scheduled_at, status, created_at, updated_at
"#;

/// Insert a new scheduled post and return the stored row
#[allow(clippy::too_many_arguments)]
pub async fn insert_post<'e, E>(
    executor: E,
    user_id: i64,
    caption: &str,
    media_kind: Option<&str>,
    media_url: Option<&str>,
    platforms: &[PlatformTarget],
    issues: &[PlatformIssue],
    scheduled_at: Option<DateTime<Utc>>,
    status: PostStatus,
) -> Result<ScheduledPost, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        INSERT INTO scheduled_posts
            (user_id, caption, media_kind, media_url, platforms, issues, scheduled_at, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(user_id)
        .bind(caption)
        .bind(media_kind)
        .bind(media_url)
        .bind(Json(platforms))
        .bind(Json(issues))
        .bind(scheduled_at)
        .bind(status)
        .fetch_one(executor)
        .await
}

/// Fetch a post by id, scoped to its owner
pub async fn get_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<Option<ScheduledPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM scheduled_posts WHERE id = $1 AND user_id = $2",
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Overwrite a post's mutable fields, stamping `updated_at`.
///
/// When `expected_updated_at` is provided the write only lands if the row has
/// not moved since that read; `None` back from an existing row means conflict.
#[allow(clippy::too_many_arguments)]
pub async fn update_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
    caption: &str,
    media_kind: Option<&str>,
    media_url: Option<&str>,
    platforms: &[PlatformTarget],
    issues: &[PlatformIssue],
    scheduled_at: Option<DateTime<Utc>>,
    status: PostStatus,
    expected_updated_at: Option<DateTime<Utc>>,
) -> Result<Option<ScheduledPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE scheduled_posts
        SET caption = $3, media_kind = $4, media_url = $5,
            platforms = $6, issues = $7, scheduled_at = $8, status = $9,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
          AND ($10::timestamptz IS NULL OR updated_at = $10)
        RETURNING {}
        "#,
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .bind(caption)
        .bind(media_kind)
        .bind(media_url)
        .bind(Json(platforms))
        .bind(Json(issues))
        .bind(scheduled_at)
        .bind(status)
        .bind(expected_updated_at)
        .fetch_optional(executor)
        .await
}

/// Delete a post. Returns false if the id is unknown for this user.
///
/// Deleting while a dispatch is in flight does not retract already-dispatched
/// work; the worker's terminal write is guarded and simply finds no row.
pub async fn delete_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM scheduled_posts WHERE id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// List posts whose `scheduled_at` falls in `[from, until)`, for the calendar
pub async fn list_in_range<'e, E>(
    executor: E,
    user_id: i64,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<ScheduledPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {}
        FROM scheduled_posts
        WHERE user_id = $1 AND scheduled_at >= $2 AND scheduled_at < $3
        ORDER BY scheduled_at ASC
        "#,
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(executor)
        .await
}

/// List pending posts that have no publish date yet. These are the posts the
/// calendar never shows.
pub async fn list_unscheduled_pending<'e, E>(
    executor: E,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ScheduledPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {}
        FROM scheduled_posts
        WHERE user_id = $1 AND status = 'scheduled_pending' AND scheduled_at IS NULL
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
}

pub async fn count_unscheduled_pending<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM scheduled_posts
        WHERE user_id = $1 AND status = 'scheduled_pending' AND scheduled_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Ids of fully-resolved posts whose publish time has arrived (all users)
pub async fn find_due_post_ids<'e, E>(
    executor: E,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM scheduled_posts
        WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= $1
        ORDER BY scheduled_at ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Atomically move a post from `scheduled` to `publishing`.
///
/// The status predicate is the double-dispatch guard: of two concurrent
/// claims, exactly one gets the row back.
pub async fn claim_for_publishing<'e, E>(
    executor: E,
    post_id: i64,
) -> Result<Option<ScheduledPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE scheduled_posts
        SET status = 'publishing', updated_at = NOW()
        WHERE id = $1 AND status = 'scheduled'
        RETURNING {}
        "#,
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_id)
        .fetch_optional(executor)
        .await
}

/// Record the terminal outcome of a dispatch. Only lands while the row is
/// still `publishing`, so a post deleted mid-flight is left alone.
pub async fn record_publish_outcome<'e, E>(
    executor: E,
    post_id: i64,
    status: PostStatus,
    issues: &[PlatformIssue],
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE scheduled_posts
        SET status = $2, issues = $3, updated_at = NOW()
        WHERE id = $1 AND status = 'publishing'
        "#,
    )
    .bind(post_id)
    .bind(status)
    .bind(Json(issues))
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
