//! Calendar and task types consumed by the analysis.
//!
//! All timestamps are normalized wall-clock readings (see [`super::normalize`]).

use crate::calendar::normalize::{wall_clock, wall_clock_opt};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A scheduled calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(alias = "summary")]
    pub title: String,
    #[serde(with = "wall_clock")]
    pub start: NaiveDateTime,
    #[serde(with = "wall_clock")]
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// An event whose end does not come after its start.
    pub fn is_malformed(&self) -> bool {
        self.start >= self.end
    }

    /// Duration of the event, zero for malformed events.
    pub fn duration(&self) -> Duration {
        if self.is_malformed() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// An outstanding (or completed) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "wall_clock_opt")]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            priority,
            completed: false,
        }
    }

    pub fn due(mut self, due_date: NaiveDateTime) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Incomplete and due before `now`. Tasks without a due date are never overdue.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due_date.map(|due| due < now).unwrap_or(false)
    }

    /// Incomplete, high priority and not already overdue.
    pub fn is_pending_high_priority(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.priority == Priority::High && !self.is_overdue(now)
    }
}

/// A calendar a user can select for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: String,
    #[serde(alias = "summary")]
    pub display_name: String,
    #[serde(default = "default_color", alias = "backgroundColor")]
    pub color: String,
    #[serde(default)]
    pub primary: bool,
}

fn default_color() -> String {
    "#000000".to_string()
}

impl CalendarSource {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            color: default_color(),
            primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_malformed_event() {
        let ok = CalendarEvent::new("a", "Standup", at(4, 9), at(4, 10));
        let bad = CalendarEvent::new("b", "Broken", at(4, 10), at(4, 9));
        let empty = CalendarEvent::new("c", "Instant", at(4, 10), at(4, 10));

        assert!(!ok.is_malformed());
        assert!(bad.is_malformed());
        assert!(empty.is_malformed());
        assert_eq!(bad.duration(), Duration::zero());
        assert_eq!(ok.duration(), Duration::hours(1));
    }

    #[test]
    fn test_task_overdue_and_pending() {
        let now = at(5, 12);
        let overdue = Task::new("1", "Lab report", Priority::High).due(at(4, 12));
        let upcoming = Task::new("2", "Essay", Priority::High).due(at(7, 12));
        let undated = Task::new("3", "Reading", Priority::High);
        let done = Task::new("4", "Quiz", Priority::High).due(at(4, 12)).completed();

        assert!(overdue.is_overdue(now));
        assert!(!overdue.is_pending_high_priority(now));
        assert!(upcoming.is_pending_high_priority(now));
        assert!(!undated.is_overdue(now));
        assert!(undated.is_pending_high_priority(now));
        assert!(!done.is_overdue(now));
        assert!(!done.is_pending_high_priority(now));
    }

    #[test]
    fn test_event_deserializes_with_offset_and_alias() {
        let json = r#"{
            "id": "evt-1",
            "summary": "CS 101 Lecture",
            "start": "2024-03-04T09:00:00-08:00",
            "end": "2024-03-04T10:00:00-08:00"
        }"#;
        let event: CalendarEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.title, "CS 101 Lecture");
        assert_eq!(event.start, at(4, 9));
        assert_eq!(event.end, at(4, 10));
        assert!(event.description.is_none());
    }

    #[test]
    fn test_task_defaults() {
        let task: Task = serde_json::from_str(r#"{"id": "t", "title": "Read"}"#).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_calendar_source_google_shape() {
        let json = r##"{"id": "primary", "summary": "Me", "backgroundColor": "#9fe1e7", "primary": true}"##;
        let source: CalendarSource = serde_json::from_str(json).unwrap();
        assert_eq!(source.display_name, "Me");
        assert_eq!(source.color, "#9fe1e7");
        assert!(source.primary);
    }
}
