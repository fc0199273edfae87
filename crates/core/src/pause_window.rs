//! Time-of-day blackout window during which no new dispatch happens.
//!
//! The window fails open: an unset or unparseable bound disables it
//! entirely instead of blocking every dispatch.

use chrono::NaiveTime;

/// Accepted bound formats, tried in order.
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// A configured blackout interval. Either bound may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseWindow {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl PauseWindow {
    pub fn new(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Self {
        Self { start, end }
    }

    /// Build a window from raw configuration strings such as `"23:00"`.
    ///
    /// Blank or malformed values become `None`.
    pub fn parse(start: &str, end: &str) -> Self {
        Self {
            start: parse_time_of_day(start),
            end: parse_time_of_day(end),
        }
    }

    /// Whether both bounds are set.
    pub fn is_configured(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Whether `now` falls inside the blackout.
    pub fn contains(&self, now: NaiveTime) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => in_blackout(now, start, end),
            _ => false,
        }
    }
}

impl std::fmt::Display for PauseWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                write!(f, "{}-{}", start.format("%H:%M"), end.format("%H:%M"))
            }
            _ => f.write_str("disabled"),
        }
    }
}

/// Core blackout predicate.
///
/// `[start, end)` when `start <= end`; otherwise the window wraps midnight
/// and covers `now >= start || now < end`. Equal bounds describe an empty
/// window.
pub fn in_blackout(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Parse an `HH:MM` or `HH:MM:SS` time of day.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}
