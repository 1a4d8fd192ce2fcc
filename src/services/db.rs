//! Database transaction utilities
//!
//! Domain functions accept sqlx's generic Executor trait, so they work with
//! both `&PgPool` and `&mut PgConnection` (transactions):
//!
//! ```ignore
//! pub async fn my_query<'e, E>(executor: E, id: i64) -> Result<MyType, sqlx::Error>
//! where
//!     E: Executor<'e, Database = Postgres>,
//! { ... }
//! ```
//!
//! Routes own transaction boundaries:
//!
//! ```ignore
//! let mut tx = state.db.begin().await?;
//! domain::do_something(&mut *tx, ...).await?;
//! domain::do_another_thing(&mut *tx, ...).await?;
//! tx.commit().await?;
//! ```

#[allow(unused_imports)]
pub use sqlx::{Executor, Postgres};
