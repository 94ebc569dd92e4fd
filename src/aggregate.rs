use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{PaylensError, Result};
use crate::filter::Bounds;
use crate::models::{weekday_name, Transaction};

/// Width of a time-of-day slot in the weekday profile.
pub const SLOT_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Self::TenMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
    ];

    pub fn minutes(&self) -> u32 {
        match self {
            Self::TenMinutes => 10,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::TwoHours => 120,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TenMinutes => "10m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes() as i64)
    }

    /// Start of the right-open interval containing `ts`, anchored at midnight.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let width = self.minutes() * 60;
        let secs = ts.time().num_seconds_from_midnight();
        let start = NaiveTime::from_num_seconds_from_midnight_opt(secs - secs % width, 0)
            .unwrap_or(NaiveTime::MIN);
        ts.date().and_time(start)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interval {
    type Err = PaylensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "10m" | "10t" | "10min" => Ok(Self::TenMinutes),
            "15m" | "15t" | "15min" => Ok(Self::FifteenMinutes),
            "30m" | "30t" | "30min" => Ok(Self::ThirtyMinutes),
            "1h" | "60m" | "60min" => Ok(Self::OneHour),
            "2h" | "120m" | "120min" => Ok(Self::TwoHours),
            _ => Err(PaylensError::UnknownInterval(s.to_string())),
        }
    }
}

pub fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| PaylensError::UnknownWeekday(s.to_string()))
}

// ---------------------------------------------------------------------------
// Purchases over time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub start: NaiveDateTime,
    pub count: usize,
}

/// Count records per fixed-width interval. Every interval between the first
/// and last non-empty one is emitted, empty ones with a zero count.
pub fn purchases_over_time(records: &[&Transaction], interval: Interval) -> Vec<Bucket> {
    let mut counts: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for ts in records.iter().filter_map(|r| r.created_at) {
        *counts.entry(interval.floor(ts)).or_default() += 1;
    }
    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    let step = interval.duration();
    let mut buckets = Vec::new();
    let mut start = first;
    while start <= last {
        buckets.push(Bucket {
            start,
            count: counts.get(&start).copied().unwrap_or(0),
        });
        start += step;
    }
    buckets
}

// ---------------------------------------------------------------------------
// Weekday profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSlot {
    pub time: NaiveTime,
    pub count: usize,
    /// `count` divided by the profile's `days`.
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayProfile {
    pub weekday: &'static str,
    /// Occurrences of the weekday in the date span, or the number of dates
    /// with a matching record when no span is given.
    pub days: usize,
    pub slots: Vec<TimeSlot>,
}

impl WeekdayProfile {
    pub fn total(&self) -> usize {
        self.slots.iter().map(|s| s.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn floor_to_slot(t: NaiveTime) -> NaiveTime {
    let width = SLOT_MINUTES * 60;
    let secs = t.num_seconds_from_midnight();
    NaiveTime::from_num_seconds_from_midnight_opt(secs - secs % width, 0).unwrap_or(NaiveTime::MIN)
}

/// Number of dates in `span` falling on `weekday`.
pub fn weekday_occurrences(span: Bounds<NaiveDate>, weekday: Weekday) -> usize {
    if span.min > span.max {
        return 0;
    }
    let offset =
        (7 + weekday.num_days_from_monday() - span.min.weekday().num_days_from_monday()) % 7;
    let Some(first) = span.min.checked_add_signed(Duration::days(offset as i64)) else {
        return 0;
    };
    if first > span.max {
        return 0;
    }
    ((span.max - first).num_days() / 7) as usize + 1
}

/// Count records on `weekday` per 15-minute time-of-day slot, across all dates.
/// Averages divide by every occurrence of the weekday in `span`, so days
/// without a matching record count as zero.
pub fn weekday_profile(
    records: &[&Transaction],
    weekday: Weekday,
    span: Option<Bounds<NaiveDate>>,
) -> WeekdayProfile {
    let mut counts: BTreeMap<NaiveTime, usize> = BTreeMap::new();
    let mut dates = BTreeSet::new();
    for r in records.iter().filter(|r| r.weekday() == Some(weekday)) {
        let (Some(date), Some(time)) = (r.date, r.time) else {
            continue;
        };
        dates.insert(date);
        *counts.entry(floor_to_slot(time)).or_default() += 1;
    }
    let days = match span {
        Some(span) => weekday_occurrences(span, weekday).max(dates.len()),
        None => dates.len(),
    };
    let slots = counts
        .into_iter()
        .map(|(time, count)| TimeSlot {
            time,
            count,
            average: count as f64 / days.max(1) as f64,
        })
        .collect();
    WeekdayProfile {
        weekday: weekday_name(weekday),
        days,
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(at: &str) -> Transaction {
        let ts = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").ok();
        Transaction::new(ts, "Acme", "DHL", "Express", Some(1.0))
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_interval_parsing_accepts_aliases() {
        assert_eq!("10T".parse::<Interval>().unwrap(), Interval::TenMinutes);
        assert_eq!("15min".parse::<Interval>().unwrap(), Interval::FifteenMinutes);
        assert_eq!("1H".parse::<Interval>().unwrap(), Interval::OneHour);
        assert_eq!("2h".parse::<Interval>().unwrap(), Interval::TwoHours);
        assert!("3h".parse::<Interval>().is_err());
        assert_eq!(Interval::default(), Interval::OneHour);
    }

    #[test]
    fn test_floor_anchors_at_midnight() {
        let ts = NaiveDateTime::parse_from_str("2024-10-01 13:47", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(Interval::ThirtyMinutes.floor(ts).time(), t("13:30"));
        assert_eq!(Interval::TwoHours.floor(ts).time(), t("12:00"));
        assert_eq!(Interval::TenMinutes.floor(ts).time(), t("13:40"));
    }

    #[test]
    fn test_over_time_counts_every_record_once() {
        let rows = vec![
            txn("2024-10-01 09:05"),
            txn("2024-10-01 09:55"),
            txn("2024-10-01 11:20"),
            txn("2024-10-02 00:10"),
        ];
        let refs: Vec<&Transaction> = rows.iter().collect();
        for interval in Interval::ALL {
            let buckets = purchases_over_time(&refs, interval);
            let total: usize = buckets.iter().map(|b| b.count).sum();
            assert_eq!(total, rows.len(), "interval {interval}");
            assert!(buckets.windows(2).all(|w| w[0].start < w[1].start));
        }
    }

    #[test]
    fn test_over_time_fills_gaps_with_zero() {
        let rows = vec![
            txn("2024-10-01 10:05"),
            txn("2024-10-01 10:40"),
            txn("2024-10-01 12:10"),
        ];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let buckets = purchases_over_time(&refs, Interval::OneHour);
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 0, 1]);
        assert_eq!(buckets[1].start.time(), t("11:00"));
    }

    #[test]
    fn test_over_time_single_hour_has_one_bucket() {
        let rows = vec![txn("2024-10-01 10:05"), txn("2024-10-01 10:59")];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let buckets = purchases_over_time(&refs, Interval::OneHour);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 2);
    }

    #[test]
    fn test_over_time_skips_missing_timestamps() {
        let rows = vec![txn("garbage"), txn("2024-10-01 10:05")];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let buckets = purchases_over_time(&refs, Interval::FifteenMinutes);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 1);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(purchases_over_time(&[], Interval::OneHour).is_empty());
        let profile = weekday_profile(&[], Weekday::Mon, None);
        assert!(profile.is_empty());
        assert_eq!(profile.days, 0);
    }

    #[test]
    fn test_weekday_profile_groups_by_time_of_day() {
        // 2024-10-07 and 2024-10-14 are Mondays, 2024-10-08 a Tuesday.
        let rows = vec![
            txn("2024-10-07 09:05"),
            txn("2024-10-07 09:14"),
            txn("2024-10-14 09:01"),
            txn("2024-10-14 17:45"),
            txn("2024-10-08 09:05"),
        ];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let profile = weekday_profile(&refs, Weekday::Mon, None);
        assert_eq!(profile.weekday, "Monday");
        assert_eq!(profile.days, 2);
        assert_eq!(profile.total(), 4);
        assert_eq!(profile.slots.len(), 2);
        assert_eq!(profile.slots[0].time, t("09:00"));
        assert_eq!(profile.slots[0].count, 3);
        assert_eq!(profile.slots[0].average, 1.5);
        assert_eq!(profile.slots[1].time, t("17:45"));
    }

    #[test]
    fn test_weekday_without_matches_is_empty() {
        let rows = vec![txn("2024-10-08 09:05")];
        let refs: Vec<&Transaction> = rows.iter().collect();
        assert!(weekday_profile(&refs, Weekday::Sat, None).is_empty());
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_weekday_occurrences() {
        let october = Bounds { min: day("2024-10-01"), max: day("2024-10-31") };
        assert_eq!(weekday_occurrences(october, Weekday::Mon), 4);
        assert_eq!(weekday_occurrences(october, Weekday::Tue), 5);
        assert_eq!(weekday_occurrences(october, Weekday::Thu), 5);
        assert_eq!(weekday_occurrences(october, Weekday::Fri), 4);
        let one_day = Bounds { min: day("2024-10-07"), max: day("2024-10-07") };
        assert_eq!(weekday_occurrences(one_day, Weekday::Mon), 1);
        assert_eq!(weekday_occurrences(one_day, Weekday::Sun), 0);
    }

    #[test]
    fn test_weekday_average_counts_days_without_matches() {
        // An hour filter left records on only two of October's four Mondays.
        let rows = vec![txn("2024-10-07 09:10"), txn("2024-10-21 09:20")];
        let refs: Vec<&Transaction> = rows.iter().collect();
        let october = Bounds { min: day("2024-10-01"), max: day("2024-10-31") };
        let profile = weekday_profile(&refs, Weekday::Mon, Some(october));
        assert_eq!(profile.days, 4);
        assert_eq!(profile.slots[0].count, 2);
        assert_eq!(profile.slots[0].average, 0.5);
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("fri").unwrap(), Weekday::Fri);
        assert!(parse_weekday("Funday").is_err());
    }
}
