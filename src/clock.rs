//! Fixed-zone clock plus the timestamp and duration formats shared by the
//! config file, the authenticator and the rendered page.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};
use std::fmt;

/// Every timestamp in the system carries the configured offset.
pub type Timestamp = DateTime<FixedOffset>;

/// Wall clock pinned to a single configured UTC offset.
///
/// Activation, expiry comparison and display all go through the same clock
/// so windows cannot drift between the zone used to write a timestamp and
/// the zone used to compare against it.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Clock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn now(&self) -> Timestamp {
        Utc::now().with_timezone(&self.offset)
    }

    /// Re-express a parsed timestamp in the configured zone.
    pub fn localize(&self, ts: Timestamp) -> Timestamp {
        ts.with_timezone(&self.offset)
    }
}

/// Parse a UTC offset such as `+08:00`, `-0530`, `+8` or `Z`.
///
/// Used as a clap `value_parser`, hence the `String` error.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| format!("offset out of range: {raw:?}"));
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(format!("offset must start with '+' or '-': {raw:?}")),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };

    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid offset hours in {raw:?}"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid offset minutes in {raw:?}"))?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(format!("offset out of range: {raw:?}"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset out of range: {raw:?}"))
}

/// Serialize a timestamp for the config file. RFC 3339 with the offset and
/// any fractional seconds kept, so [`parse_timestamp`] gives back the exact
/// same instant.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub fn parse_timestamp(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim())
}

/// `YYYY-MM-DD HH:MM`, used for the expiry line on the page.
pub fn format_minutes(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// `YYYY-MM-DD HH:MM:SS`, used for the system time in the page footer.
pub fn format_seconds(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Time left in an activation window.
///
/// Displays as `HH:MM:SS` where the hour field absorbs whole days, so a
/// 30 hour window reads `30:00:00` instead of wrapping to `06:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Remaining(Duration);

impl Remaining {
    /// Negative spans clamp to zero.
    pub fn new(span: Duration) -> Self {
        Self(span.max(Duration::zero()))
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}
