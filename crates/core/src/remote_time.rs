//! Conversion of remote timestamps into the local [`Timestamp`] type.

use chrono::{DateTime, Utc};

use crate::types::Timestamp;

/// Parse an RFC 3339 timestamp reported by the remote fleet.
///
/// Returns `None` for blank input, unparseable input and the epoch-zero
/// sentinel (`1970-01-01T00:00:00Z`) the remote uses for "not ended yet".
pub fn parse_remote_timestamp(raw: Option<&str>) -> Option<Timestamp> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    if parsed.timestamp() <= 0 {
        return None;
    }
    Some(parsed)
}
