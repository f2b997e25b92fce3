//! Small conversion helpers shared by the `row_to_*` mappers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Wrap a conversion failure for column `idx` into a rusqlite error so it
/// surfaces through `query_row`/`query_map` like any other row error.
pub(crate) fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Parse an RFC-3339 TEXT column into a UTC timestamp.
pub(crate) fn ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

/// Parse a nullable RFC-3339 TEXT column.
pub(crate) fn opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| ts(idx, s)).transpose()
}

/// Parse a UUID TEXT column.
pub(crate) fn uuid_col(idx: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| conversion_err(idx, e))
}

/// Parse a nullable UUID TEXT column.
pub(crate) fn opt_uuid_col(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    raw.map(|s| uuid_col(idx, s)).transpose()
}

#[derive(Debug)]
pub(crate) struct InvalidEnum(pub String);

impl std::fmt::Display for InvalidEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid enum value: {}", self.0)
    }
}

impl std::error::Error for InvalidEnum {}

/// Parse a TEXT column holding one of a domain enum's wire names.
pub(crate) fn enum_col<T>(
    idx: usize,
    raw: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| conversion_err(idx, InvalidEnum(raw)))
}
