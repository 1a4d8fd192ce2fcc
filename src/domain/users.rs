//! User domain - DB queries for users

use sqlx::{Executor, Postgres};

#[derive(Debug, sqlx::FromRow)]
pub struct UserBasicInfo {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
}

/// Get basic user info by ID
pub async fn get_user_by_id<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<UserBasicInfo>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, email, display_name FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}
