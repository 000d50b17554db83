//! Stress factor computation and scoring.
//!
//! Factors are derived from timing only (when events happen, how long they
//! last, when tasks are due). The weighted score combines three sub-factors:
//!
//! | Sub-factor | Weight | Source |
//! |------------|--------|--------|
//! | calendar   | 0.4    | waking-hours density + event count |
//! | task       | 0.3    | overdue + pending high-priority tasks |
//! | sleep      | 0.3    | overnight free time below 8 hours |

use crate::calendar::normalize::wall_clock;
use crate::calendar::types::{CalendarEvent, Task};
use crate::core::window::{
    covered_hours, is_all_day, longest_free_gap, AnalysisWindow, SleepWindow, WakingHours,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Sleep hours at which the sleep sub-factor reaches zero.
pub const RESTED_SLEEP_HOURS: f64 = 8.0;

const CALENDAR_WEIGHT: f64 = 0.4;
const TASK_WEIGHT: f64 = 0.3;
const SLEEP_WEIGHT: f64 = 0.3;

/// Scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub waking_hours: WakingHours,
    pub sleep_window: SleepWindow,
    /// Days ahead of now covered by the analysis
    pub horizon_days: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            waking_hours: WakingHours::default(),
            sleep_window: SleepWindow::default(),
            horizon_days: 7,
        }
    }
}

/// Raw statistics derived from events and tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressFactors {
    pub events_next_7_days: usize,
    pub overdue_tasks: usize,
    /// Incomplete high-priority tasks that are not overdue yet
    pub high_priority_tasks: usize,
    /// Fraction of waking hours scheduled (0-1)
    pub calendar_density: f64,
    pub sleep_hours_available: f64,
    /// Mean gap between consecutive daytime events, in minutes
    pub average_break_length: f64,
    pub sleep_quality_message: String,
}

impl Default for StressFactors {
    fn default() -> Self {
        Self {
            events_next_7_days: 0,
            overdue_tasks: 0,
            high_priority_tasks: 0,
            calendar_density: 0.0,
            sleep_hours_available: RESTED_SLEEP_HOURS,
            average_break_length: 0.0,
            sleep_quality_message: sleep_quality_message(RESTED_SLEEP_HOURS).to_string(),
        }
    }
}

/// Categorical risk derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// `0..=40` low, `41..=60` medium, `61..=80` high, above critical.
    pub fn from_score(total: u8) -> Self {
        match total {
            0..=40 => RiskTier::Low,
            41..=60 => RiskTier::Medium,
            61..=80 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted stress score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScore {
    pub total_score: u8,
    pub calendar_factor: f64,
    pub task_factor: f64,
    pub sleep_factor: f64,
    pub risk_level: RiskTier,
    #[serde(with = "wall_clock")]
    pub timestamp: NaiveDateTime,
}

/// Derives [`StressFactors`] and [`StressScore`] from calendar and task data.
#[derive(Debug, Clone, Default)]
pub struct StressScorer {
    config: ScoringConfig,
}

impl StressScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Compute all factors for the horizon starting at `now`.
    pub fn compute_factors(
        &self,
        events: &[CalendarEvent],
        tasks: &[Task],
        now: NaiveDateTime,
    ) -> StressFactors {
        let window = AnalysisWindow::new(now, self.config.horizon_days);

        let events_next_7_days = events.iter().filter(|e| window.contains(e.start)).count();
        let overdue_tasks = tasks.iter().filter(|t| t.is_overdue(now)).count();
        let high_priority_tasks = tasks
            .iter()
            .filter(|t| t.is_pending_high_priority(now))
            .count();

        let calendar_density = self.calendar_density(events, &window);
        let sleep_hours_available = self.sleep_opportunity(events, &window);
        let average_break_length = self.average_break_length(events, &window);

        tracing::debug!(
            events_next_7_days,
            overdue_tasks,
            high_priority_tasks,
            calendar_density,
            sleep_hours_available,
            average_break_length,
            "Computed stress factors"
        );

        StressFactors {
            events_next_7_days,
            overdue_tasks,
            high_priority_tasks,
            calendar_density,
            sleep_hours_available,
            average_break_length,
            sleep_quality_message: sleep_quality_message(sleep_hours_available).to_string(),
        }
    }

    /// Combine factors into the weighted score.
    pub fn compute_score(&self, factors: &StressFactors, computed_at: NaiveDateTime) -> StressScore {
        let calendar = calendar_factor(factors.calendar_density, factors.events_next_7_days);
        let task = task_factor(factors.overdue_tasks, factors.high_priority_tasks);
        let sleep = sleep_factor(factors.sleep_hours_available);
        let total_score = combine(calendar, task, sleep);

        StressScore {
            total_score,
            calendar_factor: calendar,
            task_factor: task,
            sleep_factor: sleep,
            risk_level: RiskTier::from_score(total_score),
            timestamp: computed_at,
        }
    }

    /// Density of a single day's waking window, used to spot packed days.
    pub fn day_density(&self, events: &[CalendarEvent], date: NaiveDate) -> f64 {
        let day = self.config.waking_hours.on(date);
        let hours = day.hours();
        if hours <= 0.0 {
            return 0.0;
        }
        (covered_hours(events, &day) / hours).clamp(0.0, 1.0)
    }

    fn calendar_density(&self, events: &[CalendarEvent], window: &AnalysisWindow) -> f64 {
        let days = window.waking_intervals(&self.config.waking_hours);
        let available: f64 = days.iter().map(|d| d.hours()).sum();
        if available <= 0.0 {
            return 0.0;
        }
        let scheduled: f64 = days.iter().map(|d| covered_hours(events, d)).sum();
        (scheduled / available).clamp(0.0, 1.0)
    }

    /// Mean over nights of the longest uninterrupted stretch in the sleep window.
    fn sleep_opportunity(&self, events: &[CalendarEvent], window: &AnalysisWindow) -> f64 {
        let per_night: Vec<f64> = window
            .nights(&self.config.sleep_window)
            .iter()
            .map(|night| longest_free_gap(events, night))
            .collect();
        if per_night.is_empty() {
            return RESTED_SLEEP_HOURS;
        }
        per_night.iter().mean().max(0.0)
    }

    fn average_break_length(&self, events: &[CalendarEvent], window: &AnalysisWindow) -> f64 {
        let mut daytime: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| !e.is_malformed() && !is_all_day(e))
            .filter(|e| window.contains(e.start))
            .filter(|e| self.config.waking_hours.contains_time(e.start))
            .collect();
        daytime.sort_by_key(|e| e.start);

        // Gaps run from the latest end seen so far that day.
        let mut gaps: Vec<f64> = Vec::new();
        let mut busy_until: Option<(NaiveDate, NaiveDateTime)> = None;
        for event in daytime {
            let day = event.start.date();
            busy_until = match busy_until {
                Some((current, end)) if current == day => {
                    if event.start > end {
                        gaps.push((event.start - end).num_seconds() as f64 / 60.0);
                    }
                    Some((day, end.max(event.end)))
                }
                _ => Some((day, event.end)),
            };
        }

        if gaps.is_empty() {
            0.0
        } else {
            gaps.iter().mean()
        }
    }
}

/// Ids of events whose end does not come after their start.
pub fn malformed_event_ids(events: &[CalendarEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.is_malformed())
        .map(|e| e.id.clone())
        .collect()
}

/// Calendar sub-factor: grows with density and event count, capped at 100.
pub fn calendar_factor(density: f64, events: usize) -> f64 {
    (density.clamp(0.0, 1.0) * 100.0 * 0.6 + events as f64 * 2.0).clamp(0.0, 100.0)
}

/// Task sub-factor: 10 per overdue task, 5 per pending high-priority task.
pub fn task_factor(overdue: usize, high_priority: usize) -> f64 {
    (overdue as f64 * 10.0 + high_priority as f64 * 5.0).min(100.0)
}

/// Sleep sub-factor: linear from 100 at zero hours to 0 at eight hours.
pub fn sleep_factor(sleep_hours: f64) -> f64 {
    let deficit = ((RESTED_SLEEP_HOURS - sleep_hours) / RESTED_SLEEP_HOURS).max(0.0);
    (100.0 * deficit).clamp(0.0, 100.0)
}

/// Weighted total, rounded and clipped to `0..=100`.
pub fn combine(calendar: f64, task: f64, sleep: f64) -> u8 {
    let raw = calendar * CALENDAR_WEIGHT + task * TASK_WEIGHT + sleep * SLEEP_WEIGHT;
    raw.round().clamp(0.0, 100.0) as u8
}

/// Human-readable context for the available sleep.
pub fn sleep_quality_message(sleep_hours: f64) -> &'static str {
    if sleep_hours >= 8.0 {
        "Excellent - meeting the recommended 7-9 hours for optimal performance"
    } else if sleep_hours >= 7.0 {
        "Good - within the recommended range for young adults"
    } else if sleep_hours >= 6.0 {
        "Insufficient - below the 7-hour minimum, may impact performance"
    } else if sleep_hours >= 4.0 {
        "Severely deprived - cognitive effects similar to prolonged sleep deprivation"
    } else {
        "Critical - major health and academic risk, seek support"
    }
}
