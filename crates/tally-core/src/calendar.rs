//! # Calendar Zone & Time Windows
//!
//! Every calendar question the engine asks ("which day is this instant on?",
//! "when does this month begin?") is answered in a single, explicitly chosen
//! [`CalendarZone`]. Instants themselves are always carried as UTC.
//!
//! A [`TimeWindow`] is resolved against a caller-supplied `now` into
//! half-open [`WindowBounds`]. Nothing in this module reads the wall clock.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::ParseError;

// =============================================================================
// CalendarZone
// =============================================================================

/// The zone in which calendar days, months and years are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CalendarZone {
    /// The host's local zone, including its daylight-saving rules.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Fixed offset east of UTC in seconds. Out-of-range offsets fall back to UTC.
    pub fn fixed_seconds(east: i32) -> Self {
        FixedOffset::east_opt(east).map_or_else(Self::utc, Self::Fixed)
    }

    /// The calendar day `instant` falls on in this zone.
    pub fn date_of(&self, instant: &DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => instant.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// The instant at which `date` begins in this zone.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self {
            Self::Local => first_existing_instant(&Local, midnight),
            Self::Fixed(offset) => first_existing_instant(offset, midnight),
        }
    }

    /// Parse an operator-supplied instant: RFC 3339, a bare `YYYY-MM-DD`
    /// (the start of that day in this zone) or integer epoch milliseconds.
    pub fn parse_instant(&self, input: &str) -> Result<DateTime<Utc>, ParseError> {
        let s = input.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Ok(instant.with_timezone(&Utc));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(self.start_of(date));
        }
        s.parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| ParseError::InvalidDate(input.to_string()))
    }

    /// Like [`CalendarZone::parse_instant`], but a bare `YYYY-MM-DD` names
    /// the last millisecond of that day, for inclusive upper bounds.
    pub fn parse_end_instant(&self, input: &str) -> Result<DateTime<Utc>, ParseError> {
        let s = input.trim();
        match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => date
                .succ_opt()
                .map(|next| self.start_of(next) - Duration::milliseconds(1))
                .ok_or_else(|| ParseError::InvalidDate(input.to_string())),
            Err(_) => self.parse_instant(input),
        }
    }
}

/// Local midnight can fall inside a daylight-saving gap; walk forward in
/// half-hour steps until the wall-clock time exists.
fn first_existing_instant<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut probe = naive;
    for _ in 0..6 {
        if let Some(instant) = tz.from_local_datetime(&probe).earliest() {
            return instant.with_timezone(&Utc);
        }
        probe += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&naive)
}

impl fmt::Display for CalendarZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for CalendarZone {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
            return Ok(Self::utc());
        }

        let invalid = || ParseError::InvalidZone(s.to_string());
        let (sign, rest) = match raw.as_bytes().first() {
            Some(b'+') => (1, &raw[1..]),
            Some(b'-') => (-1, &raw[1..]),
            _ => return Err(invalid()),
        };
        let digits = |part: &str| -> Result<u32, ParseError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
        let (hours, minutes) = (digits(hours)?, digits(minutes)?);
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }
        let seconds = (hours * 3600 + minutes * 60) as i32;
        FixedOffset::east_opt(sign * seconds)
            .map(Self::Fixed)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for CalendarZone {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarZone> for String {
    fn from(zone: CalendarZone) -> Self {
        zone.to_string()
    }
}

// =============================================================================
// CalendarMonth
// =============================================================================

/// A `(year, month)` pair; `month` is 1-based and always within `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl FromStr for CalendarMonth {
    type Err = ParseError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDate(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

// =============================================================================
// TimeWindow
// =============================================================================

/// A named rollup window anchored to a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Month,
    Year,
    Lifetime,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [Self::Day, Self::Month, Self::Year, Self::Lifetime];

    /// Resolve this window to `[start, end)` around `now`.
    ///
    /// `Lifetime` is always [`WindowBounds::UNBOUNDED`]. For the calendar
    /// windows an end that would overflow chrono's date range stays open.
    pub fn resolve(self, now: &DateTime<Utc>, zone: CalendarZone) -> WindowBounds {
        let today = zone.date_of(now);
        let (first, after) = match self {
            Self::Lifetime => return WindowBounds::UNBOUNDED,
            Self::Day => (Some(today), today.succ_opt()),
            Self::Month => {
                let month = CalendarMonth::containing(today);
                (month.first_day(), month.next().first_day())
            }
            Self::Year => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1),
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1),
            ),
        };
        WindowBounds {
            start: first.map(|d| zone.start_of(d)),
            end: after.map(|d| zone.start_of(d)),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
            Self::Lifetime => write!(f, "lifetime"),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "today" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "lifetime" | "all" => Ok(Self::Lifetime),
            _ => Err(ParseError::InvalidWindow(s.to_string())),
        }
    }
}

/// Half-open interval `[start, end)`; a missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowBounds {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowBounds {
    pub const UNBOUNDED: WindowBounds = WindowBounds {
        start: None,
        end: None,
    };

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    #[inline]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *instant >= s) && self.end.map_or(true, |e| *instant < e)
    }
}
