//! Time primitives for published slots.
//!
//! A [`Window`] is a day plus a start/end wall-clock time. Days are either a weekday
//! (`Mon`) or a calendar date (`2026-03-16`). Windows are always well formed: the
//! constructor and the deserializer both reject `start >= end`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::directory::ProviderId;
use crate::error::{EngineError, Result};

/// Stable identifier of a published slot. Never reused within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The day a slot falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Day {
    /// Recurs every week on this weekday.
    Weekday(Weekday),
    /// A single calendar date.
    Date(NaiveDate),
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Day::Weekday(weekday) => write!(f, "{}", weekday),
            Day::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for Day {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Day::Date(date));
        }
        trimmed
            .parse::<Weekday>()
            .map(Day::Weekday)
            .map_err(|_| EngineError::InvalidDay(s.to_string()))
    }
}

impl TryFrom<String> for Day {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Day> for String {
    fn from(day: Day) -> Self {
        day.to_string()
    }
}

/// Parse a wall-clock time written as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let trimmed = s.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| EngineError::InvalidTimeRange(format!("cannot parse time '{}'", s)))
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// A day plus a non-empty `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr", into = "WindowRepr")]
pub struct Window {
    day: Day,
    start: NaiveTime,
    end: NaiveTime,
}

impl Window {
    /// Build a window, rejecting `start >= end`.
    pub fn new(day: Day, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(EngineError::InvalidTimeRange(format!(
                "start {} must be before end {}",
                format_time(start),
                format_time(end)
            )));
        }
        Ok(Self { day, start, end })
    }

    pub fn day(&self) -> Day {
        self.day
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// True when `other` lies on the same day and within this window's bounds.
    ///
    /// This is the containment check used when a requester moves a booking: a
    /// sub-interval of a published slot is acceptable.
    pub fn contains(&self, other: &Window) -> bool {
        self.day == other.day && self.start <= other.start && self.end >= other.end
    }

    /// Minutes shared by two windows on the same day. Adjacent windows share none.
    pub fn overlap_minutes(&self, other: &Window) -> Option<i64> {
        if self.day != other.day || !(self.start < other.end && other.start < self.end) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Some((end - start).num_minutes())
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day,
            format_time(self.start),
            format_time(self.end)
        )
    }
}

/// Parses `"<day> <HH:MM>-<HH:MM>"`, e.g. `"Mon 09:00-10:00"` or `"2026-03-16 14:00-15:30"`.
impl FromStr for Window {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            EngineError::InvalidTimeRange(format!("expected '<day> HH:MM-HH:MM', got '{}'", s))
        };
        let (day, range) = s.trim().split_once(char::is_whitespace).ok_or_else(invalid)?;
        let (start, end) = range.trim().split_once('-').ok_or_else(invalid)?;
        Window::new(day.parse()?, parse_time(start)?, parse_time(end)?)
    }
}

#[derive(Serialize, Deserialize)]
struct WindowRepr {
    day: Day,
    start: String,
    end: String,
}

impl TryFrom<WindowRepr> for Window {
    type Error = EngineError;

    fn try_from(repr: WindowRepr) -> Result<Self> {
        Window::new(repr.day, parse_time(&repr.start)?, parse_time(&repr.end)?)
    }
}

impl From<Window> for WindowRepr {
    fn from(window: Window) -> Self {
        Self {
            day: window.day,
            start: format_time(window.start),
            end: format_time(window.end),
        }
    }
}

/// A published slot: a stable id plus its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub window: Window,
}

/// The (provider, day, start, end) tuple. At most one active booking may hold a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub provider: ProviderId,
    pub window: Window,
}

impl SlotKey {
    pub fn new(provider: ProviderId, window: Window) -> Self {
        Self { provider, window }
    }
}
