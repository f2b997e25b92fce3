/// Validity window of a chat connect claim (10 minutes). A chat user is
/// considered online for the same window after a successful connect.
pub const CHAT_CLAIM_TTL_SECS: i64 = 60 * 10;

/// Validity window of a portal session token (1 day).
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24;
