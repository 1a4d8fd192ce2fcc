//! Connection registry - per-user set of authorized platforms
//!
//! The registry rows are written by the (external) OAuth flows; the scheduler
//! only reads a snapshot of them. Classification always runs against a fresh
//! snapshot because connection state can change between create and resolve.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use std::collections::HashSet;

use super::platforms::Provider;

/// A connected platform account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Connection {
    pub provider: Provider,
    pub display_name: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Point-in-time view of which providers a user has connected
#[derive(Debug, Clone, Default)]
pub struct ConnectionSnapshot {
    providers: HashSet<Provider>,
}

impl ConnectionSnapshot {
    pub fn from_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        ConnectionSnapshot {
            providers: providers.into_iter().collect(),
        }
    }

    pub fn is_connected(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }
}

/// Load the current connection snapshot for a user
pub async fn load_snapshot<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<ConnectionSnapshot, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(Provider,)> =
        sqlx::query_as("SELECT provider FROM platform_connections WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(executor)
            .await?;

    Ok(ConnectionSnapshot::from_providers(
        rows.into_iter().map(|(p,)| p),
    ))
}

/// List a user's connections with metadata (for the connections UI)
pub async fn list_connections<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<Connection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT provider, display_name, connected_at
        FROM platform_connections
        WHERE user_id = $1
        ORDER BY connected_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Record a provider as connected (idempotent upsert)
pub async fn upsert_connection<'e, E>(
    executor: E,
    user_id: i64,
    provider: Provider,
    display_name: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO platform_connections (user_id, provider, display_name, connected_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id, provider)
        DO UPDATE SET display_name = EXCLUDED.display_name
        "#,
    )
    .bind(user_id)
    .bind(provider)
    .bind(display_name)
    .execute(executor)
    .await?;

    Ok(())
}

/// Remove a provider connection. Returns false if it was not connected.
pub async fn delete_connection<'e, E>(
    executor: E,
    user_id: i64,
    provider: Provider,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "DELETE FROM platform_connections WHERE user_id = $1 AND provider = $2",
    )
    .bind(user_id)
    .bind(provider)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
