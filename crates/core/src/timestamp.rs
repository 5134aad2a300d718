//! Target point-in-time handling.
//!
//! The archive service addresses captures by a 14-digit UTC timestamp
//! (`yyyyMMddHHmmss`). [`ArchiveTimestamp`] is that value, truncated to whole
//! seconds, and [`TimestampCell`] is the process-wide "active" timestamp that
//! the admin interface can swap while requests are in flight.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::Error;

/// chrono layout of the 14-digit archive form.
pub const ARCHIVE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Layout shown in (and read back from) the admin form.
pub const FORM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Additional layouts accepted from browsers' `datetime-local` inputs.
const EXTRA_FORM_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A UTC instant at one-second resolution, as used in archive snapshot URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveTimestamp(DateTime<Utc>);

impl ArchiveTimestamp {
    /// The current time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Wrap a UTC instant, dropping sub-second precision.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parse either the 14-digit archive form or one of the admin form layouts.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();

        if trimmed.len() == 14 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return parse_digits(trimmed).ok_or_else(|| Error::InvalidTimestamp(trimmed.to_string()));
        }

        std::iter::once(FORM_FORMAT)
            .chain(EXTRA_FORM_FORMATS.iter().copied())
            .find_map(|layout| NaiveDateTime::parse_from_str(trimmed, layout).ok())
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .ok_or_else(|| Error::InvalidTimestamp(trimmed.to_string()))
    }

    /// Render in the admin form layout.
    pub fn to_form_value(&self) -> String {
        self.0.format(FORM_FORMAT).to_string()
    }
}

/// Split a validated 14-digit string into calendar fields.
fn parse_digits(digits: &str) -> Option<ArchiveTimestamp> {
    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u32>().ok();

    let year = i32::try_from(field(0..4)?).ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?.and_hms_opt(
        field(8..10)?,
        field(10..12)?,
        field(12..14)?,
    )?;

    Some(ArchiveTimestamp(naive.and_utc()))
}

impl fmt::Display for ArchiveTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ARCHIVE_FORMAT))
    }
}

impl FromStr for ArchiveTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ArchiveTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArchiveTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Accepts strings and bare integers; env-based config hands `20010101000000`
/// over as a number.
struct TimestampVisitor;

impl de::Visitor<'_> for TimestampVisitor {
    type Value = ArchiveTimestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a yyyyMMddHHmmss timestamp")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ArchiveTimestamp::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        self.visit_str(&v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        self.visit_str(&v.to_string())
    }
}

/// Shared, atomically swappable active timestamp.
///
/// Cloning yields another handle onto the same cell. Readers never block
/// writers; each `load` sees the most recent completed `store`.
#[derive(Clone, Debug)]
pub struct TimestampCell {
    inner: Arc<ArcSwap<ArchiveTimestamp>>,
}

impl TimestampCell {
    pub fn new(initial: ArchiveTimestamp) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(initial)) }
    }

    /// Current active timestamp.
    pub fn load(&self) -> ArchiveTimestamp {
        **self.inner.load()
    }

    /// Replace the active timestamp, returning the previous one.
    pub fn store(&self, timestamp: ArchiveTimestamp) -> ArchiveTimestamp {
        *self.inner.swap(Arc::new(timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archive_digits() {
        let ts = ArchiveTimestamp::parse("20010911123456").unwrap();
        assert_eq!(ts.to_string(), "20010911123456");
        assert_eq!(ts.to_form_value(), "2001-09-11 12:34:56");
    }

    #[test]
    fn test_afternoon_hours_use_24h_clock() {
        let ts = ArchiveTimestamp::parse("2005-06-07 18:00:00").unwrap();
        assert_eq!(ts.to_string(), "20050607180000");
    }

    #[test]
    fn test_parse_datetime_local_layouts() {
        assert_eq!(ArchiveTimestamp::parse("1999-12-31T23:59").unwrap().to_string(), "19991231235900");
        assert_eq!(ArchiveTimestamp::parse("1999-12-31T23:59:58").unwrap().to_string(), "19991231235958");
    }

    #[test]
    fn test_parse_rejects_invalid_calendar_values() {
        assert!(matches!(ArchiveTimestamp::parse("20011301000000"), Err(Error::InvalidTimestamp(_))));
        assert!(matches!(ArchiveTimestamp::parse("2001013100000"), Err(Error::InvalidTimestamp(_))));
        assert!(matches!(ArchiveTimestamp::parse("yesterday"), Err(Error::InvalidTimestamp(_))));
        assert!(matches!(ArchiveTimestamp::parse(""), Err(Error::InvalidTimestamp(_))));
    }

    #[test]
    fn test_now_has_whole_seconds() {
        assert_eq!(ArchiveTimestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_serde_uses_digit_form() {
        let ts = ArchiveTimestamp::parse("20100102030405").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"20100102030405\"");
        let back: ArchiveTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
        let from_number: ArchiveTimestamp = serde_json::from_str("20100102030405").unwrap();
        assert_eq!(from_number, ts);
    }

    #[test]
    fn test_cell_swap_visible_to_clones() {
        let first = ArchiveTimestamp::parse("20000101000000").unwrap();
        let second = ArchiveTimestamp::parse("20100101000000").unwrap();
        let cell = TimestampCell::new(first);
        let handle = cell.clone();

        let previous = handle.store(second);

        assert_eq!(previous, first);
        assert_eq!(cell.load(), second);
    }
}
