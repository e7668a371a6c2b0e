//! Date/time helpers
//!
//! Integrations receive UTC timestamps from the host and convert them to the
//! configured local zone for time-of-day decisions.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Zone used when the configuration does not name one
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Berlin;

/// Error for an unrecognised IANA zone name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown time zone: {0}")]
pub struct UnknownTimeZone(pub String);

/// Current time in UTC
pub fn utcnow() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an IANA zone name such as `Europe/Berlin`
pub fn parse_time_zone(name: &str) -> Result<Tz, UnknownTimeZone> {
    name.parse::<Tz>()
        .map_err(|_| UnknownTimeZone(name.to_string()))
}

/// Convert a UTC timestamp into the given zone
pub fn as_local(utc: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    utc.with_timezone(&tz)
}

/// Parse a compact `YYYYMMDDHHMMSS` wall-clock timestamp in `tz`.
///
/// Ambiguous wall-clock times (DST fold) resolve to the earlier instant.
pub fn parse_compact_local(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
