//! Millisecond-precision UTC timestamps, the identifier format used for runs.
use time::{
    OffsetDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::ModelError;

const MILLIS_UTC: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Format an instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_millis(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    // The description only contains components every OffsetDateTime has.
    at.format(MILLIS_UTC).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Current time as a run identifier.
pub fn utc_now_millis() -> String {
    format_millis(OffsetDateTime::now_utc())
}

/// Parse an RFC 3339 timestamp and re-render it in the millisecond UTC form.
pub fn normalize_timestamp(value: &str) -> Result<String, ModelError> {
    let parsed = OffsetDateTime::parse(value.trim(), &Rfc3339).map_err(|e| {
        ModelError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(format_millis(parsed))
}
