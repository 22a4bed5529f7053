//! Activity aggregation over one user's log entries.
//!
//! Everything here is a pure function of the entry slice and an explicit
//! `today`, so results are deterministic and never touch the clock or the
//! database. Callers are responsible for scoping `entries` to a single user.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::types::LogEntry;

/// Trailing window lengths for the chart series.
pub const DAILY_WINDOW: u32 = 30;
pub const WEEKLY_WINDOW: u32 = 8;
pub const MONTHLY_WINDOW: u32 = 6;

/// Number of tags shown on the dashboard doughnut.
pub const DASHBOARD_TOP_TAGS: usize = 5;

/// Sum of `duration` over all entries, in minutes.
pub fn total_duration(entries: &[LogEntry]) -> u64 {
    entries.iter().map(|e| u64::from(e.duration)).sum()
}

/// Number of distinct calendar days with at least one entry.
pub fn active_days(entries: &[LogEntry]) -> usize {
    entries.iter().map(|e| e.date).collect::<BTreeSet<_>>().len()
}

/// Consecutive active days ending at `today`, or at yesterday if nothing has
/// been logged yet today. A most recent entry older than yesterday means the
/// streak is broken. Entries dated after `today` are ignored.
pub fn current_streak(entries: &[LogEntry], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|e| e.date)
        .filter(|d| *d <= today)
        .collect();

    let mut newest_first = days.iter().rev().copied();
    let Some(latest) = newest_first.next() else {
        return 0;
    };
    if (today - latest).num_days() > 1 {
        return 0;
    }

    let mut streak = 1;
    let mut newer = latest;
    for older in newest_first {
        if (newer - older).num_days() != 1 {
            break;
        }
        streak += 1;
        newer = older;
    }
    streak
}

/// How a tag is credited for each entry it appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMetric {
    /// +1 per entry.
    Count,
    /// +entry duration (minutes) per entry.
    Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub value: u64,
}

/// Tags ranked by `metric`, highest first, at most `limit` of them.
///
/// Ties keep the order in which the tags were first seen in `entries`.
/// Entries without tags simply contribute nothing.
pub fn rank_tags(entries: &[LogEntry], metric: TagMetric, limit: usize) -> Vec<TagCount> {
    let mut ranked: Vec<TagCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let credit = match metric {
            TagMetric::Count => 1,
            TagMetric::Duration => u64::from(entry.duration),
        };
        for tag in &entry.tags {
            let i = *index.entry(tag.as_str()).or_insert_with(|| {
                ranked.push(TagCount {
                    tag: tag.clone(),
                    value: 0,
                });
                ranked.len() - 1
            });
            ranked[i].value += credit;
        }
    }

    // sort_by is stable: equal values stay in first-seen order
    ranked.sort_by(|a, b| b.value.cmp(&a.value));
    ranked.truncate(limit);
    ranked
}

/// Number of distinct tags across all entries.
pub fn distinct_tags(entries: &[LogEntry]) -> usize {
    entries
        .iter()
        .flat_map(|e| e.tags.iter().map(String::as_str))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Calendar period used to bucket durations for charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    /// ISO week, keyed by its Monday.
    Week,
    /// Calendar month.
    Month,
}

impl Period {
    /// First day of the period containing `date`.
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Period::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Start of the period `n` periods before the one starting at `start`.
    fn back(self, start: NaiveDate, n: u32) -> NaiveDate {
        match self {
            Period::Day => start - Duration::days(i64::from(n)),
            Period::Week => start - Duration::weeks(i64::from(n)),
            Period::Month => start.checked_sub_months(Months::new(n)).unwrap_or(NaiveDate::MIN),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Period::Day | Period::Week => start.format("%Y-%m-%d").to_string(),
            Period::Month => start.format("%Y-%m").to_string(),
        }
    }

    /// Default trailing window for the dashboard charts.
    pub fn default_window(self) -> u32 {
        match self {
            Period::Day => DAILY_WINDOW,
            Period::Week => WEEKLY_WINDOW,
            Period::Month => MONTHLY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    /// Minutes.
    pub duration: u64,
}

/// Gap-filled durations for the `window` periods ending with the one that
/// contains `today`, oldest first. Periods without entries are reported as 0.
pub fn series(entries: &[LogEntry], period: Period, window: u32, today: NaiveDate) -> Vec<SeriesPoint> {
    if window == 0 {
        return Vec::new();
    }
    let current = period.start_of(today);
    let first = period.back(current, window - 1);

    let mut sums: BTreeMap<NaiveDate, u64> = (0..window)
        .map(|k| (period.back(current, window - 1 - k), 0))
        .collect();
    for entry in entries {
        let key = period.start_of(entry.date);
        if key < first || key > current {
            continue;
        }
        if let Some(sum) = sums.get_mut(&key) {
            *sum += u64::from(entry.duration);
        }
    }

    sums.into_iter()
        .map(|(start, duration)| SeriesPoint {
            label: period.label(start),
            duration,
        })
        .collect()
}

/// Every active date with its summed duration, oldest first. Not windowed
/// and not gap-filled.
pub fn daily_totals(entries: &[LogEntry]) -> Vec<SeriesPoint> {
    let mut sums: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for entry in entries {
        *sums.entry(entry.date).or_default() += u64::from(entry.duration);
    }
    sums.into_iter()
        .map(|(date, duration)| SeriesPoint {
            label: Period::Day.label(date),
            duration,
        })
        .collect()
}

/// Headline numbers for the stats page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub total_minutes: u64,
    pub active_days: usize,
    pub streak: u32,
}

pub fn summarize(entries: &[LogEntry], today: NaiveDate) -> ActivitySummary {
    ActivitySummary {
        total_minutes: total_duration(entries),
        active_days: active_days(entries),
        streak: current_streak(entries, today),
    }
}

/// Parallel label/value arrays, the shape chart widgets consume directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

impl From<Vec<SeriesPoint>> for ChartSeries {
    fn from(points: Vec<SeriesPoint>) -> Self {
        let (labels, data) = points.into_iter().map(|p| (p.label, p.duration)).unzip();
        Self { labels, data }
    }
}

impl From<Vec<TagCount>> for ChartSeries {
    fn from(tags: Vec<TagCount>) -> Self {
        let (labels, data) = tags.into_iter().map(|t| (t.tag, t.value)).unzip();
        Self { labels, data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Rounded to one decimal place.
    pub total_hours: f64,
    pub total_logs: usize,
    /// Mean minutes per entry, rounded; 0 when there are no entries.
    pub avg_duration: u64,
    pub total_tags: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub daily: ChartSeries,
    pub weekly: ChartSeries,
    pub monthly: ChartSeries,
    /// Top tags weighted by duration.
    pub tags: ChartSeries,
}

pub fn dashboard(entries: &[LogEntry], today: NaiveDate) -> Dashboard {
    let total = total_duration(entries);
    let avg_duration = if entries.is_empty() {
        0
    } else {
        (total as f64 / entries.len() as f64).round() as u64
    };
    let stats = DashboardStats {
        total_hours: (total as f64 / 60.0 * 10.0).round() / 10.0,
        total_logs: entries.len(),
        avg_duration,
        total_tags: distinct_tags(entries),
    };

    let chart = |period: Period| ChartSeries::from(series(entries, period, period.default_window(), today));

    Dashboard {
        stats,
        daily: chart(Period::Day),
        weekly: chart(Period::Week),
        monthly: chart(Period::Month),
        tags: rank_tags(entries, TagMetric::Duration, DASHBOARD_TOP_TAGS).into(),
    }
}
