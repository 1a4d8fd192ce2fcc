//! Domain layer - models and DB queries, grouped by entity

pub mod calendar;
pub mod connections;
pub mod drafts;
pub mod platforms;
pub mod schedule;
pub mod users;
