pub mod cookies;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod session;
