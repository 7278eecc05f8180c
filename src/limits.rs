//! Hard limits guarding the engine against oversized or runaway requests.

/// Longest bookable stay in nights.
pub const MAX_STAY_NIGHTS: i64 = 30;

/// Most rooms a single hold or booking may cover.
pub const MAX_ROOMS_PER_REQUEST: u32 = 20;

/// Longest accepted session identifier.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Search results per page; the total match count is reported alongside.
pub const SEARCH_PAGE_SIZE: usize = 10;

/// Longest accepted wire request line, in bytes.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Hold TTL when none is configured: 10 minutes.
pub const DEFAULT_HOLD_TTL_MS: i64 = 10 * 60 * 1000;

/// How long terminal holds stay queryable before the reaper prunes them.
pub const HOLD_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;
