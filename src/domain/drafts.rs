//! Draft domain - saved content that is not yet scheduled
//!
//! Drafts have a lifecycle separate from scheduled posts: created explicitly
//! from generated content, then consumed when the user posts them. Posting
//! fans out into one immediate publish attempt per selected platform and the
//! draft row is deleted regardless of how those attempts classify.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

/// A saved draft
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Draft {
    pub id: i64,
    pub user_id: i64,
    pub caption: String,
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_draft<'e, E>(
    executor: E,
    user_id: i64,
    caption: &str,
    media_urls: &[String],
) -> Result<Draft, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO drafts (user_id, caption, media_urls)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, caption, media_urls, created_at
        "#,
    )
    .bind(user_id)
    .bind(caption)
    .bind(media_urls)
    .fetch_one(executor)
    .await
}

pub async fn get_draft<'e, E>(
    executor: E,
    draft_id: i64,
    user_id: i64,
) -> Result<Option<Draft>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, user_id, caption, media_urls, created_at
        FROM drafts
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(draft_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_drafts<'e, E>(
    executor: E,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Draft>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, user_id, caption, media_urls, created_at
        FROM drafts
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count_drafts<'e, E>(executor: E, user_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM drafts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// Delete a draft. Returns false if the id is unknown for this user.
pub async fn delete_draft<'e, E>(
    executor: E,
    draft_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM drafts WHERE id = $1 AND user_id = $2")
        .bind(draft_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
