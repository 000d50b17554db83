//! Merging events from the selected calendar sources.
//!
//! The aggregator asks a [`CalendarProvider`] for each selected source, keeps
//! events that start inside the analysis window, drops duplicates by event id
//! and returns them ordered by start time. A disconnected provider (or one
//! where every selected source fails) yields the demo dataset instead of an
//! empty calendar.

use crate::calendar::selection::CalendarSelection;
use crate::calendar::types::{CalendarEvent, CalendarSource, Priority, Task};
use crate::core::window::{days_after, MAX_WINDOW_DAYS};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default number of days fetched ahead of now.
pub const DEFAULT_DAYS_AHEAD: u32 = 7;

/// Largest accepted number of days fetched ahead of now.
pub const MAX_DAYS_AHEAD: u32 = MAX_WINDOW_DAYS;

/// Connection state reported by a calendar provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    AuthExpired,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Errors a calendar provider can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    NotConnected,
    UnknownSource(String),
    Source { source_id: String, message: String },
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::NotConnected => write!(f, "Calendar provider is not connected"),
            CalendarError::UnknownSource(id) => write!(f, "Unknown calendar source '{id}'"),
            CalendarError::Source { source_id, message } => {
                write!(f, "Calendar source '{source_id}' failed: {message}")
            }
        }
    }
}

impl std::error::Error for CalendarError {}

/// A raw calendar backend (Google Calendar, a file, ...).
///
/// Credentials and transport belong to the implementation; the aggregator
/// only uses the connection status to decide between live and demo data.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// List the calendars available to the user.
    async fn list_sources(&self) -> Result<Vec<CalendarSource>, CalendarError>;

    /// Fetch events of one source whose start lies in `[start, end)`.
    async fn fetch_events(
        &self,
        source_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Current connection/authentication state.
    fn connection_status(&self) -> ConnectionStatus;
}

/// Where the aggregated events came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Live,
    Demo,
}

/// Result of aggregating the selected calendars.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedCalendar {
    pub events: Vec<CalendarEvent>,
    pub origin: DataOrigin,
    /// Selected sources that failed to load
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_sources: Vec<String>,
}

/// Merges selected calendar sources into one ordered event list.
#[derive(Debug, Clone)]
pub struct CalendarAggregator {
    days_ahead: u32,
}

impl CalendarAggregator {
    /// Aggregator fetching `days_ahead` days, capped at [`MAX_DAYS_AHEAD`].
    pub fn new(days_ahead: u32) -> Self {
        Self {
            days_ahead: days_ahead.min(MAX_DAYS_AHEAD),
        }
    }

    pub fn days_ahead(&self) -> u32 {
        self.days_ahead
    }

    /// Fetch every selected source from `provider` and merge the results.
    pub async fn collect(
        &self,
        provider: &dyn CalendarProvider,
        selection: &CalendarSelection,
        now: NaiveDateTime,
    ) -> AggregatedCalendar {
        let status = provider.connection_status();
        if !status.is_connected() {
            tracing::info!(?status, "Calendar not connected, using demo dataset");
            return demo_calendar(now, self.days_ahead);
        }

        let window_end = days_after(now, self.days_ahead);
        let mut by_source = BTreeMap::new();
        let mut failed_sources = Vec::new();

        for source_id in selection.ids() {
            match provider.fetch_events(source_id, now, window_end).await {
                Ok(events) => {
                    tracing::debug!(source_id, count = events.len(), "Fetched calendar source");
                    by_source.insert(source_id.to_string(), events);
                }
                Err(e) => {
                    tracing::warn!(source_id, "Skipping calendar source: {}", e);
                    failed_sources.push(source_id.to_string());
                }
            }
        }

        if by_source.is_empty() {
            tracing::warn!("All selected calendars failed, using demo dataset");
            let mut demo = demo_calendar(now, self.days_ahead);
            demo.failed_sources = failed_sources;
            return demo;
        }

        AggregatedCalendar {
            events: merge(&by_source, selection, now, self.days_ahead),
            origin: DataOrigin::Live,
            failed_sources,
        }
    }
}

impl Default for CalendarAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_DAYS_AHEAD)
    }
}

/// Merge per-source event lists.
///
/// Only sources in `selection` contribute. Events starting outside
/// `[now, now + window_days)` are dropped (`window_days` is capped at
/// [`MAX_DAYS_AHEAD`]), the first occurrence of an event id
/// wins (sources are visited in id order), and the result is sorted by start
/// time then id.
pub fn merge(
    events_by_source: &BTreeMap<String, Vec<CalendarEvent>>,
    selection: &CalendarSelection,
    now: NaiveDateTime,
    window_days: u32,
) -> Vec<CalendarEvent> {
    let window_end = days_after(now, window_days);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<CalendarEvent> = Vec::new();

    for (source_id, events) in events_by_source {
        if !selection.contains(source_id) {
            continue;
        }
        for event in events {
            if event.start < now || event.start >= window_end {
                continue;
            }
            if seen.insert(event.id.as_str()) {
                merged.push(event.clone());
            }
        }
    }

    merged.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    merged
}

/// Fixed demonstration calendar relative to `now`.
pub fn demo_events(now: NaiveDateTime) -> Vec<CalendarEvent> {
    vec![
        CalendarEvent::new(
            "demo-1",
            "CS 101 Lecture",
            now + Duration::hours(2),
            now + Duration::hours(3),
        )
        .with_description("Data Structures"),
        CalendarEvent::new(
            "demo-2",
            "Group Project Meeting",
            now + Duration::days(1) + Duration::hours(10),
            now + Duration::days(1) + Duration::hours(11) + Duration::minutes(30),
        )
        .with_description("Final project discussion"),
        CalendarEvent::new(
            "demo-3",
            "Midterm Exam - Algorithms",
            now + Duration::days(3) + Duration::hours(14),
            now + Duration::days(3) + Duration::hours(16),
        )
        .with_description("Chapters 1-5"),
    ]
}

/// Fixed demonstration task list relative to `now`.
pub fn demo_tasks(now: NaiveDateTime) -> Vec<Task> {
    vec![
        Task::new("demo-task-1", "Complete Math Homework", Priority::High)
            .with_description("Chapter 5 problems 1-20")
            .due(now + Duration::days(2)),
        Task::new("demo-task-2", "Study for Midterm", Priority::High)
            .with_description("Review lecture notes and practice problems")
            .due(now + Duration::days(3)),
        Task::new("demo-task-3", "Submit Lab Report", Priority::High)
            .with_description("Physics lab on Newton's laws")
            .due(now - Duration::days(1)),
        Task::new("demo-task-4", "Read Chapter 6", Priority::Medium)
            .with_description("History textbook reading")
            .due(now + Duration::days(5)),
    ]
}

fn demo_calendar(now: NaiveDateTime, days_ahead: u32) -> AggregatedCalendar {
    let window_end = days_after(now, days_ahead);
    AggregatedCalendar {
        events: demo_events(now)
            .into_iter()
            .filter(|e| e.start < window_end)
            .collect(),
        origin: DataOrigin::Demo,
        failed_sources: Vec::new(),
    }
}
