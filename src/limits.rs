//! Hard limits on input sizes and store growth.

/// Longest stay a single reservation or block may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Widest window accepted by availability searches and calendar queries.
pub const MAX_QUERY_WINDOW_NIGHTS: i64 = 731;

/// Rooms are seeded reference data; this only guards against a bad config.
pub const MAX_ROOMS: usize = 10_000;

pub const MAX_ROOM_NAME_LEN: usize = 200;

pub const MAX_RESTRICTIONS_PER_ROOM: usize = 100_000;

/// Writes staged in one unit of work.
pub const MAX_TXN_WRITES: usize = 64;

pub const MAX_NAME_LEN: usize = 100;

/// RFC 5321 path limit.
pub const MAX_EMAIL_LEN: usize = 254;

pub const MAX_PHONE_LEN: usize = 32;

/// Dates outside this range are rejected by the store.
pub const MIN_VALID_YEAR: i32 = 1970;
pub const MAX_VALID_YEAR: i32 = 9999;
