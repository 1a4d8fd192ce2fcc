//! Scheduled post domain - models and queries

pub mod models;
pub mod queries;

pub use models::*;
