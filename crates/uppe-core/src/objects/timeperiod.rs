//! Time periods: weekly ranges, dated exceptions and exclusions.
//!
//! Ranges are stored as minutes from midnight, half-open, so `00:00-24:00`
//! covers the whole day. Exceptions are grouped by category and checked in
//! category order before the weekday schedule; the first exception whose date
//! range covers the day replaces that day's weekly ranges.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Month, NaiveDate, NaiveDateTime, Timelike, Weekday};
use thiserror::Error;

use super::{Keyed, Link};

const MINUTES_PER_DAY: u32 = 24 * 60;

const WEEKDAY_NAMES: [&str; 7] =
    ["sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday"];

/// Errors raised while parsing time period definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimePeriodError {
    #[error("invalid time range '{0}'")]
    InvalidRange(String),

    #[error("overlapping time ranges {first} and {second}")]
    Overlap { first: TimeRange, second: TimeRange },

    #[error("invalid date range '{0}'")]
    InvalidDateRange(String),
}

/// Minutes-from-midnight range, start inclusive and end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    pub const ALL_DAY: TimeRange = TimeRange { start: 0, end: MINUTES_PER_DAY };

    pub fn new(start: u32, end: u32) -> Result<Self, TimePeriodError> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(TimePeriodError::InvalidRange(format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, minute: u32) -> bool {
        minute >= self.start && minute < self.end
    }

    /// Parse a comma-separated list, sorted, rejecting overlaps
    pub fn parse_list(input: &str) -> Result<Vec<TimeRange>, TimePeriodError> {
        let mut ranges = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<TimeRange>, _>>()?;
        ranges.sort();
        for pair in ranges.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(TimePeriodError::Overlap { first: pair[0], second: pair[1] });
            }
        }
        Ok(ranges)
    }
}

fn parse_clock(input: &str) -> Option<u32> {
    let (hours, minutes) = input.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if minutes >= 60 || hours > 24 {
        return None;
    }
    Some(hours * 60 + minutes)
}

impl FromStr for TimeRange {
    type Err = TimePeriodError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TimePeriodError::InvalidRange(input.to_string());
        let (start, end) = input.split_once('-').ok_or_else(invalid)?;
        let start = parse_clock(start).ok_or_else(invalid)?;
        let end = parse_clock(end).ok_or_else(invalid)?;
        TimeRange::new(start, end).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

fn write_ranges(f: &mut fmt::Formatter<'_>, ranges: &[TimeRange]) -> fmt::Result {
    for (i, range) in ranges.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{range}")?;
    }
    Ok(())
}

/// Exception categories in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCategory {
    CalendarDate = 0,
    MonthDate = 1,
    MonthDay = 2,
    MonthWeekDay = 3,
    WeekDay = 4,
}

/// The date part of an exception
///
/// Day numbers and weekday offsets may be negative to count back from the
/// end of the month (`-1` is the last day or last occurrence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRange {
    /// `2024-12-24 - 2024-12-26`
    CalendarDate { start: NaiveDate, end: NaiveDate },
    /// `july 10 - august 5`
    MonthDate { start_month: u32, start_day: i32, end_month: u32, end_day: i32 },
    /// `day 1 - 15`
    MonthDay { start_day: i32, end_day: i32 },
    /// `monday 1 september - friday -1 september`
    MonthWeekDay {
        start_month: u32,
        start_weekday: Weekday,
        start_offset: i32,
        end_month: u32,
        end_weekday: Weekday,
        end_offset: i32,
    },
    /// `monday 2 - thursday 3`
    WeekDay { start_weekday: Weekday, start_offset: i32, end_weekday: Weekday, end_offset: i32 },
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn month_day(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    if day < 0 {
        let day = last.day() as i32 + day + 1;
        if day < 1 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day as u32)
    } else {
        let day = (day.max(1) as u32).min(last.day());
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, offset: i32) -> Option<NaiveDate> {
    if offset < 0 {
        let last = last_day_of_month(year, month)?;
        let back = (7 + last.weekday().num_days_from_sunday() - weekday.num_days_from_sunday()) % 7;
        let day = last.day() as i32 - back as i32 - 7 * (-offset - 1);
        if day < 1 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day as u32)
    } else {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let ahead = (7 + weekday.num_days_from_sunday() - first.weekday().num_days_from_sunday()) % 7;
        let day = 1 + ahead + 7 * (offset.max(1) as u32 - 1);
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl DateRange {
    pub fn category(&self) -> ExceptionCategory {
        match self {
            DateRange::CalendarDate { .. } => ExceptionCategory::CalendarDate,
            DateRange::MonthDate { .. } => ExceptionCategory::MonthDate,
            DateRange::MonthDay { .. } => ExceptionCategory::MonthDay,
            DateRange::MonthWeekDay { .. } => ExceptionCategory::MonthWeekDay,
            DateRange::WeekDay { .. } => ExceptionCategory::WeekDay,
        }
    }

    /// Concrete start and end dates of the occurrence that could cover `date`
    fn bounds(&self, date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let year = date.year();
        match *self {
            DateRange::CalendarDate { start, end } => Some((start, end)),
            DateRange::MonthDate { start_month, start_day, end_month, end_day } => {
                yearly_bounds(date, |y| month_day(y, start_month, start_day), |y| {
                    month_day(y, end_month, end_day)
                })
            }
            DateRange::MonthDay { start_day, end_day } => Some((
                month_day(year, date.month(), start_day)?,
                month_day(year, date.month(), end_day)?,
            )),
            DateRange::MonthWeekDay {
                start_month,
                start_weekday,
                start_offset,
                end_month,
                end_weekday,
                end_offset,
            } => yearly_bounds(
                date,
                |y| nth_weekday(y, start_month, start_weekday, start_offset),
                |y| nth_weekday(y, end_month, end_weekday, end_offset),
            ),
            DateRange::WeekDay { start_weekday, start_offset, end_weekday, end_offset } => Some((
                nth_weekday(year, date.month(), start_weekday, start_offset)?,
                nth_weekday(year, date.month(), end_weekday, end_offset)?,
            )),
        }
    }
}

/// Bounds for yearly ranges, handling ranges that wrap past new year
fn yearly_bounds(
    date: NaiveDate,
    start: impl Fn(i32) -> Option<NaiveDate>,
    end: impl Fn(i32) -> Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let year = date.year();
    let (this_start, this_end) = (start(year)?, end(year)?);
    if this_start <= this_end {
        return Some((this_start, this_end));
    }
    if date >= this_start {
        Some((this_start, end(year + 1)?))
    } else {
        Some((start(year - 1)?, this_end))
    }
}

fn month_name(month: u32) -> String {
    Month::try_from(month as u8)
        .map(|m| m.name().to_lowercase())
        .unwrap_or_else(|_| month.to_string())
}

fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[weekday.num_days_from_sunday() as usize]
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::CalendarDate { start, end } if start == end => {
                write!(f, "{}", start.format("%Y-%m-%d"))
            }
            DateRange::CalendarDate { start, end } => {
                write!(f, "{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            DateRange::MonthDate { start_month, start_day, end_month, end_day } => write!(
                f,
                "{} {} - {} {}",
                month_name(*start_month),
                start_day,
                month_name(*end_month),
                end_day
            ),
            DateRange::MonthDay { start_day, end_day } if start_day == end_day => {
                write!(f, "day {start_day}")
            }
            DateRange::MonthDay { start_day, end_day } => {
                write!(f, "day {start_day} - {end_day}")
            }
            DateRange::MonthWeekDay {
                start_month,
                start_weekday,
                start_offset,
                end_month,
                end_weekday,
                end_offset,
            } => write!(
                f,
                "{} {} {} - {} {} {}",
                weekday_name(*start_weekday),
                start_offset,
                month_name(*start_month),
                weekday_name(*end_weekday),
                end_offset,
                month_name(*end_month)
            ),
            DateRange::WeekDay { start_weekday, start_offset, end_weekday, end_offset } => write!(
                f,
                "{} {} - {} {}",
                weekday_name(*start_weekday),
                start_offset,
                weekday_name(*end_weekday),
                end_offset
            ),
        }
    }
}

/// One side of a date range, before pairing
enum DatePoint {
    Calendar(NaiveDate),
    Day(i32),
    Month(u32, i32),
    MonthWeekDay(Weekday, i32, u32),
    WeekDay(Weekday, i32),
    Number(i32),
}

fn parse_point(input: &str) -> Option<DatePoint> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.as_slice() {
        [date] => {
            if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                return Some(DatePoint::Calendar(date));
            }
            date.parse().ok().map(DatePoint::Number)
        }
        ["day", n] => n.parse().ok().map(DatePoint::Day),
        [name, n] => {
            let n: i32 = n.parse().ok()?;
            if let Ok(month) = name.parse::<Month>() {
                return Some(DatePoint::Month(month.number_from_month(), n));
            }
            name.parse::<Weekday>().ok().map(|wd| DatePoint::WeekDay(wd, n))
        }
        [name, n, month] => {
            let weekday = name.parse::<Weekday>().ok()?;
            let month = month.parse::<Month>().ok()?;
            Some(DatePoint::MonthWeekDay(weekday, n.parse().ok()?, month.number_from_month()))
        }
        _ => None,
    }
}

impl FromStr for DateRange {
    type Err = TimePeriodError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TimePeriodError::InvalidDateRange(input.to_string());
        let lowered = input.trim().to_lowercase();
        let (start, end) = match lowered.split_once(" - ") {
            Some((start, end)) => (start, Some(end)),
            None => (lowered.as_str(), None),
        };
        let start = parse_point(start).ok_or_else(invalid)?;
        let end = match end {
            Some(end) => Some(parse_point(end).ok_or_else(invalid)?),
            None => None,
        };

        use DatePoint as P;
        let range = match (start, end) {
            (P::Calendar(start), None) => DateRange::CalendarDate { start, end: start },
            (P::Calendar(start), Some(P::Calendar(end))) => DateRange::CalendarDate { start, end },
            (P::Day(start_day), None) => DateRange::MonthDay { start_day, end_day: start_day },
            (P::Day(start_day), Some(P::Number(end_day) | P::Day(end_day))) => {
                DateRange::MonthDay { start_day, end_day }
            }
            (P::Month(month, day), None) => DateRange::MonthDate {
                start_month: month,
                start_day: day,
                end_month: month,
                end_day: day,
            },
            (P::Month(start_month, start_day), Some(P::Number(end_day))) => {
                DateRange::MonthDate { start_month, start_day, end_month: start_month, end_day }
            }
            (P::Month(start_month, start_day), Some(P::Month(end_month, end_day))) => {
                DateRange::MonthDate { start_month, start_day, end_month, end_day }
            }
            (P::MonthWeekDay(weekday, offset, month), None) => DateRange::MonthWeekDay {
                start_month: month,
                start_weekday: weekday,
                start_offset: offset,
                end_month: month,
                end_weekday: weekday,
                end_offset: offset,
            },
            (
                P::MonthWeekDay(start_weekday, start_offset, start_month),
                Some(P::MonthWeekDay(end_weekday, end_offset, end_month)),
            ) => DateRange::MonthWeekDay {
                start_month,
                start_weekday,
                start_offset,
                end_month,
                end_weekday,
                end_offset,
            },
            (P::WeekDay(weekday, offset), None) => DateRange::WeekDay {
                start_weekday: weekday,
                start_offset: offset,
                end_weekday: weekday,
                end_offset: offset,
            },
            (P::WeekDay(start_weekday, start_offset), Some(P::WeekDay(end_weekday, end_offset))) => {
                DateRange::WeekDay { start_weekday, start_offset, end_weekday, end_offset }
            }
            _ => return Err(invalid()),
        };
        Ok(range)
    }
}

/// A dated override of the weekly schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub range: DateRange,
    /// Only every Nth day of the range matches; 0 or 1 means every day
    pub skip_interval: u32,
    pub times: Vec<TimeRange>,
}

impl Exception {
    /// Whether this exception governs `date`
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        let Some((start, end)) = self.range.bounds(date) else {
            return false;
        };
        if date < start || date > end {
            return false;
        }
        if self.skip_interval > 1 {
            let days = (date - start).num_days();
            return days % i64::from(self.skip_interval) == 0;
        }
        true
    }
}

/// Parses `<date range> [/ <skip>] <time ranges>`
impl FromStr for Exception {
    type Err = TimePeriodError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TimePeriodError::InvalidDateRange(input.to_string());
        let colon = input.find(':').ok_or_else(invalid)?;
        let split = input[..colon].rfind(char::is_whitespace).ok_or_else(invalid)?;
        let (dates, times) = input.split_at(split);

        let (dates, skip_interval) = match dates.split_once('/') {
            Some((dates, skip)) => (dates, skip.trim().parse().map_err(|_| invalid())?),
            None => (dates, 0),
        };
        Ok(Self {
            range: dates.parse()?,
            skip_interval,
            times: TimeRange::parse_list(times)?,
        })
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.range)?;
        if self.skip_interval > 1 {
            write!(f, " / {}", self.skip_interval)?;
        }
        write!(f, "\t")?;
        write_ranges(f, &self.times)
    }
}

/// A named weekly schedule
#[derive(Debug, Clone)]
pub struct TimePeriod {
    pub name: String,
    pub alias: String,
    /// Ranges per weekday, Sunday first
    pub days: [Vec<TimeRange>; 7],
    /// Exceptions grouped by [`ExceptionCategory`]
    pub exceptions: [Vec<Exception>; 5],
    pub exclusions: Vec<Link<TimePeriod>>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            days: Default::default(),
            exceptions: Default::default(),
            exclusions: Vec::new(),
        }
    }

    /// Every minute of every day
    pub fn always(name: impl Into<String>) -> Self {
        let mut period = Self::new(name);
        for day in period.days.iter_mut() {
            day.push(TimeRange::ALL_DAY);
        }
        period
    }

    pub fn set_day(&mut self, day: Weekday, ranges: &str) -> Result<(), TimePeriodError> {
        self.days[day.num_days_from_sunday() as usize] = TimeRange::parse_list(ranges)?;
        Ok(())
    }

    pub fn with_day(mut self, day: Weekday, ranges: &str) -> Result<Self, TimePeriodError> {
        self.set_day(day, ranges)?;
        Ok(self)
    }

    pub fn add_exception(&mut self, exception: Exception) {
        self.exceptions[exception.range.category() as usize].push(exception);
    }

    pub fn with_exclusion(mut self, name: &str) -> Self {
        self.exclusions.push(Link::from(name));
        self
    }

    pub fn day_ranges(&self, day: Weekday) -> &[TimeRange] {
        &self.days[day.num_days_from_sunday() as usize]
    }

    /// Weekday names with their ranges, Sunday first, skipping empty days
    pub fn weekly(&self) -> impl Iterator<Item = (&'static str, &[TimeRange])> + '_ {
        WEEKDAY_NAMES
            .iter()
            .zip(self.days.iter())
            .filter(|(_, ranges)| !ranges.is_empty())
            .map(|(name, ranges)| (*name, ranges.as_slice()))
    }

    pub fn all_exceptions(&self) -> impl Iterator<Item = &Exception> + '_ {
        self.exceptions.iter().flatten()
    }

    /// Whether the period's own schedule covers `when`; exclusions are
    /// evaluated by the registry, which can follow the links
    pub fn includes(&self, when: NaiveDateTime) -> bool {
        let date = when.date();
        let minute = when.hour() * 60 + when.minute();
        if let Some(exception) = self.all_exceptions().find(|e| e.applies_on(date)) {
            return exception.times.iter().any(|r| r.contains(minute));
        }
        self.day_ranges(date.weekday()).iter().any(|r| r.contains(minute))
    }
}

impl Keyed for TimePeriod {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

/// Renders a range list the way definitions write it
pub struct RangeList<'a>(pub &'a [TimeRange]);

impl fmt::Display for RangeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ranges(f, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    fn workhours() -> TimePeriod {
        let mut period = TimePeriod::new("workhours");
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            period.set_day(day, "09:00-17:00").unwrap();
        }
        period
    }

    #[test]
    fn test_time_range_parsing() {
        let range: TimeRange = "09:30-17:00".parse().unwrap();
        assert_eq!(range, TimeRange { start: 570, end: 1020 });
        assert_eq!(range.to_string(), "09:30-17:00");
        assert!("17:00-09:00".parse::<TimeRange>().is_err());
        assert!("24:01-25:00".parse::<TimeRange>().is_err());
        assert_eq!("00:00-24:00".parse::<TimeRange>().unwrap(), TimeRange::ALL_DAY);
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let err = TimeRange::parse_list("09:00-12:00,11:00-13:00").unwrap_err();
        assert!(matches!(err, TimePeriodError::Overlap { .. }));

        let ok = TimeRange::parse_list("13:00-17:00, 09:00-12:00").unwrap();
        assert_eq!(ok[0].start, 540);
    }

    #[test]
    fn test_weekday_schedule_is_half_open() {
        let period = workhours();
        // 2024-03-04 is a Monday
        assert!(period.includes(at("2024-03-04", "09:00")));
        assert!(period.includes(at("2024-03-04", "16:59")));
        assert!(!period.includes(at("2024-03-04", "17:00")));
        assert!(!period.includes(at("2024-03-03", "12:00")));
    }

    #[test]
    fn test_calendar_exception_overrides_weekday() {
        let mut period = workhours();
        period.add_exception("2024-12-25 00:00-00:01".parse().unwrap());
        assert!(!period.includes(at("2024-12-25", "10:00")));
        assert!(period.includes(at("2024-12-24", "10:00")));
    }

    #[test]
    fn test_month_day_counts_back_from_end() {
        let mut period = TimePeriod::new("month-end");
        period.add_exception("day -1 00:00-24:00".parse().unwrap());
        assert!(period.includes(at("2024-02-29", "03:00")));
        assert!(!period.includes(at("2024-02-28", "03:00")));
    }

    #[test]
    fn test_nth_weekday_of_month() {
        let mut period = TimePeriod::new("patch-tuesday");
        period.add_exception("tuesday 2 00:00-24:00".parse().unwrap());
        // second Tuesday of March 2024 is the 12th
        assert!(period.includes(at("2024-03-12", "08:00")));
        assert!(!period.includes(at("2024-03-05", "08:00")));

        let mut thanksgiving = TimePeriod::new("thanksgiving");
        thanksgiving.add_exception("thursday -1 november 00:00-24:00".parse().unwrap());
        assert!(thanksgiving.includes(at("2024-11-28", "12:00")));
    }

    #[test]
    fn test_month_date_wrapping_new_year() {
        let mut period = TimePeriod::new("holidays");
        period.add_exception("december 20 - january 5 00:00-24:00".parse().unwrap());
        assert!(period.includes(at("2024-12-31", "12:00")));
        assert!(period.includes(at("2025-01-03", "12:00")));
        assert!(!period.includes(at("2025-01-06", "12:00")));
    }

    #[test]
    fn test_skip_interval() {
        let exception: Exception = "2024-01-01 - 2024-01-31 / 3 00:00-24:00".parse().unwrap();
        assert_eq!(exception.skip_interval, 3);
        assert!(exception.applies_on(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
        assert!(!exception.applies_on(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
    }

    #[test]
    fn test_exception_display() {
        let exception: Exception = "july 4 - july 5 10:00-12:00,13:00-14:00".parse().unwrap();
        assert_eq!(exception.to_string(), "july 4 - july 5\t10:00-12:00,13:00-14:00");
    }
}
