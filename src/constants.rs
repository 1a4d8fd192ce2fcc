//! Application constants

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

/// Maximum caption length accepted on create/update (Instagram's limit,
/// the tightest of the supported platforms)
pub const MAX_CAPTION_LEN: usize = 2200;

/// Default poll interval for the dispatch loop in seconds
pub const DEFAULT_DISPATCH_POLL_SECS: u64 = 30;

/// Maximum number of due posts claimed per dispatch tick
pub const DISPATCH_BATCH_SIZE: i64 = 20;
