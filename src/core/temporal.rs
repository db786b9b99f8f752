//! Precision-aware temporal types
//!
//! Date, Time and DateTime values carry the precision they were written
//! with; comparison is partial (two values that differ only in fields one of
//! them does not carry compare as unknown) and DateTime additionally tracks
//! whether the literal carried a timezone offset.

use std::cmp::Ordering;
use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::quantity::CalendarUnit;

/// Precision levels for temporal values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemporalPrecision {
    /// Year precision (YYYY)
    Year,
    /// Month precision (YYYY-MM)
    Month,
    /// Day precision (YYYY-MM-DD)
    Day,
    /// Hour precision (…THH)
    Hour,
    /// Minute precision (…THH:MM)
    Minute,
    /// Second precision (…THH:MM:SS)
    Second,
    /// Millisecond precision (…THH:MM:SS.sss)
    Millisecond,
}

impl TemporalPrecision {
    /// The unit name used by `precision()` and the duration functions
    pub fn unit_name(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }

    /// Significant-digit count of a Date at this precision (4, 6 or 8)
    pub fn date_digits(&self) -> i64 {
        match self {
            Self::Year => 4,
            Self::Month => 6,
            _ => 8,
        }
    }

    /// Significant-digit count of a DateTime at this precision
    pub fn date_time_digits(&self) -> i64 {
        match self {
            Self::Year => 4,
            Self::Month => 6,
            Self::Day => 8,
            Self::Hour => 10,
            Self::Minute => 12,
            Self::Second => 14,
            Self::Millisecond => 17,
        }
    }

    /// Significant-digit count of a Time at this precision (2, 4, 6 or 9)
    pub fn time_digits(&self) -> i64 {
        match self {
            Self::Hour => 2,
            Self::Minute => 4,
            Self::Second => 6,
            _ => 9,
        }
    }

    fn from_date_digits(digits: i64) -> Option<Self> {
        match digits {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            _ => None,
        }
    }

    fn from_date_time_digits(digits: i64) -> Option<Self> {
        match digits {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            10 => Some(Self::Hour),
            12 => Some(Self::Minute),
            14 => Some(Self::Second),
            17 => Some(Self::Millisecond),
            _ => None,
        }
    }

    fn from_time_digits(digits: i64) -> Option<Self> {
        match digits {
            2 => Some(Self::Hour),
            4 => Some(Self::Minute),
            6 => Some(Self::Second),
            9 => Some(Self::Millisecond),
            _ => None,
        }
    }
}

impl fmt::Display for TemporalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit_name())
    }
}

/// Compare two component sequences at their shared precision.
///
/// A difference inside the shared prefix yields an ordering; agreement over
/// the shared prefix with differing lengths is unknown (`None`); full
/// agreement at equal length is `Equal`.
fn partial_compare_components(left: &[i64], right: &[i64]) -> Option<Ordering> {
    let shared = left.len().min(right.len());
    for i in 0..shared {
        match left[i].cmp(&right[i]) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    if left.len() == right.len() {
        Some(Ordering::Equal)
    } else {
        None
    }
}

fn truncate_decimal(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or(0)
}

/// Add whole months with end-of-month clamping (Jan 31 + 1 month → Feb 28/29).
fn add_months_clamped(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new((-months) as u32))
    }
}

/// A date with precision tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDate {
    /// The date value; unspecified fields default to their minimum
    pub date: NaiveDate,
    /// The precision of this date
    pub precision: TemporalPrecision,
}

impl PrecisionDate {
    /// Create a new precision date
    pub fn new(date: NaiveDate, precision: TemporalPrecision) -> Self {
        Self { date, precision }
    }

    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD` with automatic precision detection
    pub fn parse(s: &str) -> Option<Self> {
        match s.len() {
            4 => {
                let year = s.parse::<i32>().ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1)
                    .map(|d| Self::new(d, TemporalPrecision::Year))
            }
            7 => {
                let (year, month) = s.split_once('-')?;
                let year = year.parse::<i32>().ok()?;
                let month = month.parse::<u32>().ok()?;
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(|d| Self::new(d, TemporalPrecision::Month))
            }
            10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| Self::new(d, TemporalPrecision::Day)),
            _ => None,
        }
    }

    fn components(&self) -> Vec<i64> {
        let mut parts = vec![self.date.year() as i64];
        if self.precision >= TemporalPrecision::Month {
            parts.push(self.date.month() as i64);
        }
        if self.precision >= TemporalPrecision::Day {
            parts.push(self.date.day() as i64);
        }
        parts
    }

    /// Partial-precision comparison (see module docs)
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        partial_compare_components(&self.components(), &other.components())
    }

    /// Add a calendar quantity. Fractional year/month/week/day values are
    /// truncated; units finer than a day are converted to whole days first.
    /// Returns `None` on arithmetic overflow.
    pub fn add_quantity(&self, value: Decimal, unit: CalendarUnit) -> Option<Self> {
        let date = match unit {
            CalendarUnit::Year => add_months_clamped(self.date, truncate_decimal(value) * 12)?,
            CalendarUnit::Month => add_months_clamped(self.date, truncate_decimal(value))?,
            CalendarUnit::Week => self
                .date
                .checked_add_signed(Duration::days(truncate_decimal(value) * 7))?,
            CalendarUnit::Day => self
                .date
                .checked_add_signed(Duration::days(truncate_decimal(value)))?,
            CalendarUnit::Hour | CalendarUnit::Minute | CalendarUnit::Second
            | CalendarUnit::Millisecond => {
                let days = truncate_decimal(value * unit.millisecond_factor())
                    / CalendarUnit::Day.millisecond_factor().to_i64().unwrap_or(1);
                self.date.checked_add_signed(Duration::days(days))?
            }
        };
        Some(Self::new(date, self.precision))
    }

    /// Lower bound of the interval this partial date denotes, at the
    /// precision implied by `digits` (4, 6 or 8). Empty for other digit
    /// counts or when the value is already finer than the target.
    pub fn low_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_date_digits(digits)?;
        if target < self.precision {
            return None;
        }
        // Unspecified fields already sit at their minimum.
        Some(Self::new(self.date, target))
    }

    /// Upper bound counterpart of [`low_boundary`](Self::low_boundary)
    pub fn high_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_date_digits(digits)?;
        if target < self.precision {
            return None;
        }
        let date = match self.precision {
            TemporalPrecision::Year => NaiveDate::from_ymd_opt(self.date.year(), 12, 31)?,
            TemporalPrecision::Month => last_day_of_month(self.date.year(), self.date.month())?,
            _ => self.date,
        };
        // Coarser targets than the value keep the value's own fields.
        let date = match target {
            TemporalPrecision::Year if self.precision == TemporalPrecision::Year => date,
            TemporalPrecision::Month if self.precision <= TemporalPrecision::Month => {
                if self.precision == TemporalPrecision::Year {
                    NaiveDate::from_ymd_opt(self.date.year(), 12, 1)?
                } else {
                    self.date
                }
            }
            _ => date,
        };
        Some(Self::new(date, target))
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.checked_sub_signed(Duration::days(1)))
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            _ => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// A time-of-day with precision tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionTime {
    /// The time value
    pub time: NaiveTime,
    /// The precision of this time
    pub precision: TemporalPrecision,
}

impl PrecisionTime {
    /// Create a new precision time
    pub fn new(time: NaiveTime, precision: TemporalPrecision) -> Self {
        Self { time, precision }
    }

    /// Parse `HH[:MM[:SS[.fff]]]`, ignoring a trailing timezone offset if the
    /// literal carries one (System.Time has no timezone).
    pub fn parse(s: &str) -> Option<Self> {
        let s = strip_offset(s);
        if s.len() == 2 {
            // A bare hour is not a complete time for chrono's parser.
            return s
                .parse::<u32>()
                .ok()
                .and_then(|h| NaiveTime::from_hms_opt(h, 0, 0))
                .map(|t| Self::new(t, TemporalPrecision::Hour));
        }
        let (time_part, precision) = match s.len() {
            5 => (NaiveTime::parse_from_str(s, "%H:%M"), TemporalPrecision::Minute),
            8 => (NaiveTime::parse_from_str(s, "%H:%M:%S"), TemporalPrecision::Second),
            _ if s.len() > 9 && s.as_bytes().get(8) == Some(&b'.') => (
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f"),
                TemporalPrecision::Millisecond,
            ),
            _ => return None,
        };
        time_part.ok().map(|t| Self::new(t, precision))
    }

    fn components(&self) -> Vec<i64> {
        let mut parts = vec![self.time.hour() as i64];
        if self.precision >= TemporalPrecision::Minute {
            parts.push(self.time.minute() as i64);
        }
        if self.precision >= TemporalPrecision::Second {
            parts.push(self.time.second() as i64);
        }
        if self.precision >= TemporalPrecision::Millisecond {
            parts.push((self.time.nanosecond() / 1_000_000) as i64);
        }
        parts
    }

    /// Partial-precision comparison (see module docs)
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        partial_compare_components(&self.components(), &other.components())
    }

    /// Add a calendar quantity, wrapping modulo 24 hours. Year/month/week/day
    /// units leave the time unchanged.
    pub fn add_quantity(&self, value: Decimal, unit: CalendarUnit) -> Option<Self> {
        let millis = match unit {
            CalendarUnit::Year | CalendarUnit::Month | CalendarUnit::Week | CalendarUnit::Day => {
                return Some(*self);
            }
            _ => truncate_decimal(value * unit.millisecond_factor()),
        };
        let (time, _wrapped_days) = self
            .time
            .overflowing_add_signed(Duration::milliseconds(millis));
        Some(Self::new(time, self.precision))
    }

    /// Lower bound at the precision implied by `digits` (2, 4, 6 or 9)
    pub fn low_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_time_digits(digits)?;
        if target < self.precision {
            return None;
        }
        Some(Self::new(self.time, target))
    }

    /// Upper bound counterpart of [`low_boundary`](Self::low_boundary)
    pub fn high_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_time_digits(digits)?;
        if target < self.precision {
            return None;
        }
        let (h, m, s, ms) = (
            self.time.hour(),
            self.time.minute(),
            self.time.second(),
            self.time.nanosecond() / 1_000_000,
        );
        let time = match self.precision {
            TemporalPrecision::Hour => NaiveTime::from_hms_milli_opt(h, 59, 59, 999)?,
            TemporalPrecision::Minute => NaiveTime::from_hms_milli_opt(h, m, 59, 999)?,
            TemporalPrecision::Second => NaiveTime::from_hms_milli_opt(h, m, s, 999)?,
            _ => NaiveTime::from_hms_milli_opt(h, m, s, ms)?,
        };
        Some(Self::new(time, target))
    }
}

fn strip_offset(s: &str) -> &str {
    if let Some(stripped) = s.strip_suffix('Z') {
        return stripped;
    }
    // An offset sign can only appear after the hour field.
    if s.len() > 2 {
        if let Some(pos) = s[2..].find(['+', '-']) {
            return &s[..pos + 2];
        }
    }
    s
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Hour => write!(f, "{}", self.time.format("%H")),
            TemporalPrecision::Minute => write!(f, "{}", self.time.format("%H:%M")),
            TemporalPrecision::Second => write!(f, "{}", self.time.format("%H:%M:%S")),
            _ => write!(f, "{}", self.time.format("%H:%M:%S%.3f")),
        }
    }
}

/// A datetime with precision tracking and an explicit has-timezone flag.
///
/// Values without an offset in their literal ("floating" datetimes) are
/// stored at offset zero with `has_timezone == false`; they are not
/// comparable against zoned datetimes once a time component is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDateTime {
    /// The datetime value (offset zero when floating)
    pub datetime: DateTime<FixedOffset>,
    /// The precision of this datetime
    pub precision: TemporalPrecision,
    /// Whether the literal carried an explicit timezone offset
    pub has_timezone: bool,
}

impl PrecisionDateTime {
    /// Create a new precision datetime
    pub fn new(
        datetime: DateTime<FixedOffset>,
        precision: TemporalPrecision,
        has_timezone: bool,
    ) -> Self {
        Self {
            datetime,
            precision,
            has_timezone,
        }
    }

    /// Parse `YYYY[-MM[-DD[Thh[:mm[:ss[.fff]]]][TZ]]]` with automatic
    /// precision detection. `Z` is normalized to +00:00.
    pub fn parse(s: &str) -> Option<Self> {
        let (date_part, rest) = match s.find('T') {
            Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
            None => (s, None),
        };
        let date = PrecisionDate::parse(date_part)?;

        let Some(rest) = rest else {
            let naive = date.date.and_hms_opt(0, 0, 0)?;
            let datetime = FixedOffset::east_opt(0)?.from_local_datetime(&naive).single()?;
            return Some(Self::new(datetime, date.precision, false));
        };
        if date.precision != TemporalPrecision::Day {
            return None;
        }

        let (time_str, offset) = split_time_and_offset(rest)?;
        let time = if time_str.is_empty() {
            PrecisionTime::new(NaiveTime::from_hms_opt(0, 0, 0)?, TemporalPrecision::Day)
        } else {
            PrecisionTime::parse(time_str)?
        };
        let naive = NaiveDateTime::new(date.date, time.time);
        let (offset, has_timezone) = match offset {
            Some(off) => (off, true),
            None => (FixedOffset::east_opt(0)?, false),
        };
        let datetime = offset.from_local_datetime(&naive).single()?;
        let precision = if time_str.is_empty() {
            TemporalPrecision::Day
        } else {
            time.precision
        };
        Some(Self::new(datetime, precision, has_timezone))
    }

    /// The date component, preserving coarse precision
    pub fn date(&self) -> PrecisionDate {
        let precision = match self.precision {
            TemporalPrecision::Year => TemporalPrecision::Year,
            TemporalPrecision::Month => TemporalPrecision::Month,
            _ => TemporalPrecision::Day,
        };
        PrecisionDate::new(self.datetime.date_naive(), precision)
    }

    /// The time component, if this value has one
    pub fn time(&self) -> Option<PrecisionTime> {
        if self.precision < TemporalPrecision::Hour {
            return None;
        }
        Some(PrecisionTime::new(self.datetime.time(), self.precision))
    }

    fn components(&self) -> Vec<i64> {
        let dt = if self.has_timezone {
            self.datetime.with_timezone(&FixedOffset::east_opt(0).expect("zero offset"))
        } else {
            self.datetime
        };
        let mut parts = vec![dt.year() as i64];
        let levels = [
            (TemporalPrecision::Month, dt.month() as i64),
            (TemporalPrecision::Day, dt.day() as i64),
            (TemporalPrecision::Hour, dt.hour() as i64),
            (TemporalPrecision::Minute, dt.minute() as i64),
            (TemporalPrecision::Second, dt.second() as i64),
            (
                TemporalPrecision::Millisecond,
                (dt.nanosecond() / 1_000_000) as i64,
            ),
        ];
        for (level, component) in levels {
            if self.precision >= level {
                parts.push(component);
            }
        }
        parts
    }

    /// Partial-precision comparison. Unknown when one side carries a time
    /// component with a timezone and the other floats.
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        let self_timed = self.precision >= TemporalPrecision::Hour;
        let other_timed = other.precision >= TemporalPrecision::Hour;
        if (self_timed || other_timed) && self.has_timezone != other.has_timezone {
            return None;
        }
        partial_compare_components(&self.components(), &other.components())
    }

    /// Add a calendar quantity. Year/month/week/day use calendar arithmetic
    /// with end-of-month clamping; finer units add wall-clock durations and
    /// accept fractional seconds/milliseconds.
    pub fn add_quantity(&self, value: Decimal, unit: CalendarUnit) -> Option<Self> {
        let datetime = match unit {
            CalendarUnit::Year | CalendarUnit::Month | CalendarUnit::Week | CalendarUnit::Day => {
                let months = match unit {
                    CalendarUnit::Year => Some(truncate_decimal(value) * 12),
                    CalendarUnit::Month => Some(truncate_decimal(value)),
                    _ => None,
                };
                let date = match months {
                    Some(m) => add_months_clamped(self.datetime.date_naive(), m)?,
                    None => {
                        let days = match unit {
                            CalendarUnit::Week => truncate_decimal(value) * 7,
                            _ => truncate_decimal(value),
                        };
                        self.datetime
                            .date_naive()
                            .checked_add_signed(Duration::days(days))?
                    }
                };
                let naive = NaiveDateTime::new(date, self.datetime.time());
                self.datetime.offset().from_local_datetime(&naive).single()?
            }
            _ => {
                let millis = truncate_decimal(value * unit.millisecond_factor());
                self.datetime
                    .checked_add_signed(Duration::milliseconds(millis))?
            }
        };
        Some(Self::new(datetime, self.precision, self.has_timezone))
    }

    /// Lower bound at the precision implied by `digits`. For floating values
    /// with a time component the bound is stamped with offset +14:00, the
    /// earliest possible instant.
    pub fn low_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_date_time_digits(digits)?;
        if target < self.precision {
            return None;
        }
        self.boundary(target, true)
    }

    /// Upper bound counterpart; floating values are stamped −12:00.
    pub fn high_boundary(&self, digits: i64) -> Option<Self> {
        let target = TemporalPrecision::from_date_time_digits(digits)?;
        if target < self.precision {
            return None;
        }
        self.boundary(target, false)
    }

    fn boundary(&self, target: TemporalPrecision, low: bool) -> Option<Self> {
        let date = self.date();
        let date = if low {
            date.low_boundary(TemporalPrecision::Day.date_digits())
                .unwrap_or(date)
        } else {
            date.high_boundary(TemporalPrecision::Day.date_digits())
                .unwrap_or(date)
        };
        let time = match self.time() {
            Some(t) => {
                if low {
                    t.low_boundary(TemporalPrecision::Millisecond.time_digits())?
                } else {
                    t.high_boundary(TemporalPrecision::Millisecond.time_digits())?
                }
            }
            None => {
                let t = if low {
                    NaiveTime::from_hms_opt(0, 0, 0)?
                } else {
                    NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
                };
                PrecisionTime::new(t, TemporalPrecision::Millisecond)
            }
        };
        let offset = if self.has_timezone {
            *self.datetime.offset()
        } else if target >= TemporalPrecision::Hour {
            // Earliest (+14:00) and latest (−12:00) real-world offsets.
            if low {
                FixedOffset::east_opt(14 * 3600)?
            } else {
                FixedOffset::west_opt(12 * 3600)?
            }
        } else {
            FixedOffset::east_opt(0)?
        };
        let naive = NaiveDateTime::new(date.date, time.time);
        let datetime = offset.from_local_datetime(&naive).single()?;
        let has_timezone = self.has_timezone || target >= TemporalPrecision::Hour;
        Some(Self::new(datetime, target, has_timezone))
    }
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.datetime.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.datetime.format("%Y-%m")),
            TemporalPrecision::Day => write!(f, "{}", self.datetime.format("%Y-%m-%d")),
            _ => {
                let body = match self.precision {
                    TemporalPrecision::Hour => self.datetime.format("%Y-%m-%dT%H").to_string(),
                    TemporalPrecision::Minute => {
                        self.datetime.format("%Y-%m-%dT%H:%M").to_string()
                    }
                    TemporalPrecision::Second => {
                        self.datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
                    }
                    _ => self.datetime.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
                };
                if self.has_timezone {
                    write!(f, "{body}{}", self.datetime.format("%:z"))
                } else {
                    f.write_str(&body)
                }
            }
        }
    }
}

fn split_time_and_offset(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(stripped) = s.strip_suffix('Z') {
        return Some((stripped, FixedOffset::east_opt(0)));
    }
    if s.len() >= 6 {
        let tail = &s[s.len() - 6..];
        let sign = tail.as_bytes()[0];
        if (sign == b'+' || sign == b'-') && tail.as_bytes()[3] == b':' {
            let hours: i32 = tail[1..3].parse().ok()?;
            let minutes: i32 = tail[4..6].parse().ok()?;
            let seconds = hours * 3600 + minutes * 60;
            let offset = if sign == b'+' {
                FixedOffset::east_opt(seconds)?
            } else {
                FixedOffset::west_opt(seconds)?
            };
            return Some((&s[..s.len() - 6], Some(offset)));
        }
    }
    Some((s, None))
}

/// Level of precision a duration unit needs on both operands
fn required_precision(unit: CalendarUnit) -> TemporalPrecision {
    match unit {
        CalendarUnit::Year => TemporalPrecision::Year,
        CalendarUnit::Month => TemporalPrecision::Month,
        CalendarUnit::Week | CalendarUnit::Day => TemporalPrecision::Day,
        CalendarUnit::Hour => TemporalPrecision::Hour,
        CalendarUnit::Minute => TemporalPrecision::Minute,
        CalendarUnit::Second => TemporalPrecision::Second,
        CalendarUnit::Millisecond => TemporalPrecision::Millisecond,
    }
}

/// Count whole calendar units elapsed between two datetimes: a year only
/// counts once the end's month/day (and time) have reached the start's.
pub fn duration_between(
    start: &PrecisionDateTime,
    end: &PrecisionDateTime,
    unit: CalendarUnit,
) -> Option<i64> {
    let needed = required_precision(unit);
    if start.precision < needed || end.precision < needed {
        return None;
    }
    if start.has_timezone != end.has_timezone {
        return None;
    }
    let (a, b) = (start.datetime, end.datetime);
    if b < a {
        return duration_between(end, start, unit).map(|n| -n);
    }
    let value = match unit {
        CalendarUnit::Year | CalendarUnit::Month => {
            let months =
                (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64);
            // Partial final unit: back off one if the end has not reached the
            // start's position inside the unit.
            let whole = if (b.day(), b.time()) < (a.day(), a.time()) {
                months - 1
            } else {
                months
            };
            match unit {
                CalendarUnit::Year => whole / 12,
                _ => whole,
            }
        }
        CalendarUnit::Week => (b - a).num_days() / 7,
        CalendarUnit::Day => (b - a).num_days(),
        CalendarUnit::Hour => (b - a).num_hours(),
        CalendarUnit::Minute => (b - a).num_minutes(),
        CalendarUnit::Second => (b - a).num_seconds(),
        CalendarUnit::Millisecond => (b - a).num_milliseconds(),
    };
    Some(value)
}

/// Count boundary crossings at the given precision: year crossings ignore
/// month and day, hour crossings ignore minutes, and so on. Weeks follow the
/// CQL convention of whole-day difference divided by seven.
pub fn difference_between(
    start: &PrecisionDateTime,
    end: &PrecisionDateTime,
    unit: CalendarUnit,
) -> Option<i64> {
    let needed = required_precision(unit);
    if start.precision < needed || end.precision < needed {
        return None;
    }
    if start.has_timezone != end.has_timezone {
        return None;
    }
    let (a, b) = (start.datetime, end.datetime);
    let value = match unit {
        CalendarUnit::Year => b.year() as i64 - a.year() as i64,
        CalendarUnit::Month => {
            (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64)
        }
        CalendarUnit::Week => (b.date_naive() - a.date_naive()).num_days() / 7,
        CalendarUnit::Day => (b.date_naive() - a.date_naive()).num_days(),
        CalendarUnit::Hour => {
            let trunc = |d: DateTime<FixedOffset>| d.with_minute(0).and_then(|d| d.with_second(0)).and_then(|d| d.with_nanosecond(0));
            (trunc(b)? - trunc(a)?).num_hours()
        }
        CalendarUnit::Minute => {
            let trunc = |d: DateTime<FixedOffset>| d.with_second(0).and_then(|d| d.with_nanosecond(0));
            (trunc(b)? - trunc(a)?).num_minutes()
        }
        CalendarUnit::Second => {
            let trunc = |d: DateTime<FixedOffset>| d.with_nanosecond(0);
            (trunc(b)? - trunc(a)?).num_seconds()
        }
        CalendarUnit::Millisecond => (b - a).num_milliseconds(),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(s: &str) -> PrecisionDate {
        PrecisionDate::parse(s).unwrap()
    }

    fn datetime(s: &str) -> PrecisionDateTime {
        PrecisionDateTime::parse(s).unwrap()
    }

    #[test]
    fn date_parsing_detects_precision() {
        assert_eq!(date("2023").precision, TemporalPrecision::Year);
        assert_eq!(date("2023-12").precision, TemporalPrecision::Month);
        assert_eq!(date("2023-12-25").precision, TemporalPrecision::Day);
        assert!(PrecisionDate::parse("2023-13").is_none());
    }

    #[test]
    fn datetime_parsing_tracks_timezone() {
        let floating = datetime("2023-06-15T10:30");
        assert!(!floating.has_timezone);
        assert_eq!(floating.precision, TemporalPrecision::Minute);

        let zoned = datetime("2023-06-15T10:30:00+02:00");
        assert!(zoned.has_timezone);
        assert_eq!(zoned.precision, TemporalPrecision::Second);

        let utc = datetime("2023-06-15T10:30:00Z");
        assert!(utc.has_timezone);
        assert_eq!(utc.datetime.offset().local_minus_utc(), 0);
    }

    #[test]
    fn partial_comparison_yields_unknown_across_precisions() {
        assert_eq!(date("2020").partial_compare(&date("2020-05")), None);
        assert_eq!(
            date("2020").partial_compare(&date("2021")),
            Some(Ordering::Less)
        );
        assert_eq!(
            date("2020-05-10").partial_compare(&date("2020-05-10")),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn timezone_mismatch_is_not_comparable() {
        let zoned = datetime("2023-06-15T10:30:00Z");
        let floating = datetime("2023-06-15T10:30:00");
        assert_eq!(zoned.partial_compare(&floating), None);
        // Date-only values compare fine regardless of the flag.
        let a = datetime("2023-06-15");
        let b = datetime("2023-06-16T00:00:00Z");
        assert_eq!(a.partial_compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn zoned_comparison_normalizes() {
        let utc = datetime("2023-06-15T12:00:00Z");
        let offset = datetime("2023-06-15T14:00:00+02:00");
        assert_eq!(utc.partial_compare(&offset), Some(Ordering::Equal));
    }

    #[test]
    fn month_addition_clamps_to_month_end() {
        let d = date("2020-01-31");
        let added = d.add_quantity(Decimal::ONE, CalendarUnit::Month).unwrap();
        assert_eq!(added.to_string(), "2020-02-29");

        let not_leap = date("2021-01-31")
            .add_quantity(Decimal::ONE, CalendarUnit::Month)
            .unwrap();
        assert_eq!(not_leap.to_string(), "2021-02-28");
    }

    #[test]
    fn fractional_calendar_units_truncate() {
        let d = date("2020-01-01");
        let added = d
            .add_quantity(Decimal::new(25, 1), CalendarUnit::Month) // 2.5 months
            .unwrap();
        assert_eq!(added.to_string(), "2020-03-01");
    }

    #[test]
    fn time_arithmetic_wraps() {
        let t = PrecisionTime::parse("23:30").unwrap();
        let added = t.add_quantity(Decimal::ONE, CalendarUnit::Hour).unwrap();
        assert_eq!(added.to_string(), "00:30");
    }

    #[test]
    fn date_boundaries_span_the_year() {
        let y = date("2014");
        assert_eq!(y.low_boundary(8).unwrap().to_string(), "2014-01-01");
        assert_eq!(y.high_boundary(8).unwrap().to_string(), "2014-12-31");
        assert!(y.low_boundary(5).is_none());
        // Already finer than the target precision.
        assert!(date("2014-05-10").low_boundary(4).is_none());
    }

    #[test]
    fn floating_datetime_boundaries_get_extreme_offsets() {
        let dt = datetime("2014-01-01T10");
        let low = dt.low_boundary(17).unwrap();
        let high = dt.high_boundary(17).unwrap();
        assert_eq!(low.datetime.offset().local_minus_utc(), 14 * 3600);
        assert_eq!(high.datetime.offset().local_minus_utc(), -12 * 3600);
        assert_eq!(low.to_string(), "2014-01-01T10:00:00.000+14:00");
        assert_eq!(high.to_string(), "2014-01-01T10:59:59.999-12:00");
    }

    #[test]
    fn duration_counts_whole_units() {
        let start = datetime("2020-03-15");
        let end = datetime("2025-03-14");
        assert_eq!(
            duration_between(&start, &end, CalendarUnit::Year),
            Some(4)
        );
        let end_full = datetime("2025-03-15");
        assert_eq!(
            duration_between(&start, &end_full, CalendarUnit::Year),
            Some(5)
        );
    }

    #[test]
    fn difference_counts_boundary_crossings() {
        let start = datetime("2020-12-31");
        let end = datetime("2021-01-01");
        assert_eq!(
            difference_between(&start, &end, CalendarUnit::Year),
            Some(1)
        );
        assert_eq!(duration_between(&start, &end, CalendarUnit::Year), Some(0));
    }

    #[test]
    fn duration_requires_precision() {
        let start = datetime("2020");
        let end = datetime("2025-03-15");
        assert_eq!(duration_between(&start, &end, CalendarUnit::Month), None);
    }

    #[test]
    fn display_round_trips() {
        for literal in [
            "2023",
            "2023-12",
            "2023-12-25",
        ] {
            assert_eq!(date(literal).to_string(), literal);
        }
        assert_eq!(
            datetime("2023-06-15T10:30:00+02:00").to_string(),
            "2023-06-15T10:30:00+02:00"
        );
        assert_eq!(datetime("2023-06-15T10:30").to_string(), "2023-06-15T10:30");
    }
}
