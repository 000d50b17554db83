//! Time windows used by the scorer.
//!
//! The analysis looks at a fixed horizon starting at "now". Inside it, each
//! day contributes a waking-hours interval (07:00-23:00 by default) used for
//! density, and each night contributes a sleep interval (22:00-08:00) used
//! for sleep opportunity.

use crate::calendar::types::CalendarEvent;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Events at least this long are treated as all-day entries.
pub const ALL_DAY_THRESHOLD_HOURS: i64 = 20;

/// Longest window, in days, that an analysis or a calendar fetch may span.
pub const MAX_WINDOW_DAYS: u32 = 90;

/// `start` moved `days` ahead, with `days` capped at [`MAX_WINDOW_DAYS`].
/// Saturates at the last representable timestamp.
pub fn days_after(start: NaiveDateTime, days: u32) -> NaiveDateTime {
    start
        .checked_add_signed(Duration::days(i64::from(days.min(MAX_WINDOW_DAYS))))
        .unwrap_or(NaiveDateTime::MAX)
}

/// A half-open `[start, end)` span of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        if self.end > self.start {
            self.end - self.start
        } else {
            Duration::zero()
        }
    }

    pub fn hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Intersection with another span, if non-empty.
    pub fn intersect(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<Interval> {
        let s = self.start.max(start);
        let e = self.end.min(end);
        (e > s).then(|| Interval::new(s, e))
    }

    pub fn overlap(&self, start: NaiveDateTime, end: NaiveDateTime) -> Duration {
        self.intersect(start, end)
            .map(|i| i.duration())
            .unwrap_or_else(Duration::zero)
    }
}

/// Daily window considered available for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WakingHours {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 23,
        }
    }
}

impl WakingHours {
    pub fn hours_per_day(&self) -> u32 {
        self.end_hour.saturating_sub(self.start_hour)
    }

    /// The waking interval of `date`.
    pub fn on(&self, date: NaiveDate) -> Interval {
        Interval::new(at_hour(date, self.start_hour), at_hour(date, self.end_hour))
    }

    pub fn contains_time(&self, ts: NaiveDateTime) -> bool {
        self.on(ts.date()).contains(ts)
    }
}

/// Nightly window considered available for sleep, spanning midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for SleepWindow {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 8,
        }
    }
}

impl SleepWindow {
    /// The night starting on the evening of `date`.
    pub fn after(&self, date: NaiveDate) -> Interval {
        let start = at_hour(date, self.start_hour);
        let end_date = if self.end_hour <= self.start_hour {
            date.succ_opt().unwrap_or(date)
        } else {
            date
        };
        Interval::new(start, at_hour(end_date, self.end_hour))
    }
}

/// The analysis horizon `[start, start + days)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    days: u32,
}

impl AnalysisWindow {
    /// Window of `days` days from `start`, at most [`MAX_WINDOW_DAYS`].
    pub fn new(start: NaiveDateTime, days: u32) -> Self {
        let days = days.min(MAX_WINDOW_DAYS);
        Self {
            start,
            end: days_after(start, days),
            days,
        }
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Calendar dates touched by the window.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let last = self.end.date();
        let mut dates = Vec::new();
        let mut date = self.start.date();
        while date <= last {
            dates.push(date);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        dates
    }

    /// Waking intervals of each day, clipped to the window.
    pub fn waking_intervals(&self, waking: &WakingHours) -> Vec<Interval> {
        self.dates()
            .into_iter()
            .filter_map(|d| waking.on(d).intersect(self.start, self.end))
            .collect()
    }

    /// One sleep interval per night, starting with the evening of the first day.
    pub fn nights(&self, sleep: &SleepWindow) -> Vec<Interval> {
        let mut nights = Vec::with_capacity(self.days as usize);
        let mut date = self.start.date();
        for _ in 0..self.days {
            nights.push(sleep.after(date));
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        nights
    }
}

/// Hours of `interval` covered by events.
///
/// Overlaps are summed (not unioned). Events of [`ALL_DAY_THRESHOLD_HOURS`]
/// or longer occupy the whole interval when they touch it. Malformed events
/// are ignored.
pub fn covered_hours(events: &[CalendarEvent], interval: &Interval) -> f64 {
    events
        .iter()
        .filter(|e| !e.is_malformed())
        .map(|e| {
            let overlap = interval.overlap(e.start, e.end);
            if overlap > Duration::zero() && is_all_day(e) {
                interval.hours()
            } else {
                overlap.num_seconds() as f64 / 3600.0
            }
        })
        .sum()
}

/// Longest span of `interval` not covered by any event, in hours.
pub fn longest_free_gap(events: &[CalendarEvent], interval: &Interval) -> f64 {
    let mut busy: Vec<Interval> = events
        .iter()
        .filter(|e| !e.is_malformed() && !is_all_day(e))
        .filter_map(|e| interval.intersect(e.start, e.end))
        .collect();
    busy.sort_by_key(|i| i.start);

    let mut longest = Duration::zero();
    let mut cursor = interval.start;
    for span in busy {
        if span.start > cursor {
            longest = longest.max(span.start - cursor);
        }
        cursor = cursor.max(span.end);
    }
    if interval.end > cursor {
        longest = longest.max(interval.end - cursor);
    }

    longest.num_seconds() as f64 / 3600.0
}

/// Whether an event is long enough to count as an all-day entry.
pub fn is_all_day(event: &CalendarEvent) -> bool {
    event.duration() >= Duration::hours(ALL_DAY_THRESHOLD_HOURS)
}

fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    if hour >= 24 {
        let next = date.succ_opt().unwrap_or(date);
        return next.and_time(NaiveTime::MIN);
    }
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn event(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent::new(id, id, start, end)
    }

    #[test]
    fn test_window_contains() {
        let window = AnalysisWindow::new(at(4, 8, 0), 7);
        assert!(window.contains(at(4, 8, 0)));
        assert!(window.contains(at(10, 23, 0)));
        assert!(!window.contains(at(11, 8, 0)));
        assert!(!window.contains(at(4, 7, 59)));
    }

    #[test]
    fn test_huge_horizon_is_capped() {
        let window = AnalysisWindow::new(at(4, 8, 0), u32::MAX);
        assert_eq!(window.days(), MAX_WINDOW_DAYS);
        assert_eq!(window.end, at(4, 8, 0) + chrono::Duration::days(90));
        assert_eq!(window.nights(&SleepWindow::default()).len(), 90);
        assert_eq!(window.dates().len(), 91);

        let last = NaiveDateTime::MAX - chrono::Duration::days(1);
        assert_eq!(days_after(last, 30), NaiveDateTime::MAX);
    }

    #[test]
    fn test_waking_hours_total_is_a_full_week() {
        let waking = WakingHours::default();

        let midnight = AnalysisWindow::new(at(4, 0, 0), 7);
        let total: f64 = midnight.waking_intervals(&waking).iter().map(|i| i.hours()).sum();
        assert!((total - 112.0).abs() < 1e-9);

        // Starting mid-afternoon splits the first and last day.
        let afternoon = AnalysisWindow::new(at(4, 15, 0), 7);
        let total: f64 = afternoon.waking_intervals(&waking).iter().map(|i| i.hours()).sum();
        assert!((total - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_window_spans_midnight() {
        let night = SleepWindow::default().after(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(night.start, at(4, 22, 0));
        assert_eq!(night.end, at(5, 8, 0));
        assert!((night.hours() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_covered_hours_all_day_fills_interval() {
        let day = WakingHours::default().on(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let events = vec![
            event("meeting", at(9, 0, 0), at(9, 0, 0)),
            event("class", at(4, 9, 0), at(4, 11, 0)),
            event("holiday", at(4, 0, 0), at(5, 0, 0)),
        ];
        // Malformed meeting ignored, holiday fills all 16 hours, class adds 2.
        assert!((covered_hours(&events, &day) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_longest_free_gap() {
        let night = SleepWindow::default().after(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert!((longest_free_gap(&[], &night) - 10.0).abs() < 1e-9);

        let events = vec![
            event("late", at(4, 21, 0), at(5, 0, 30)),
            event("early", at(5, 6, 0), at(5, 7, 0)),
        ];
        // Free: 00:30-06:00 (5.5h) and 07:00-08:00 (1h).
        assert!((longest_free_gap(&events, &night) - 5.5).abs() < 1e-9);
    }
}
