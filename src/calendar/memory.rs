//! In-memory calendar provider.
//!
//! Backs the CLI (events loaded from a JSON file), the server when no live
//! backend is configured, and tests.

use crate::calendar::aggregator::{CalendarError, CalendarProvider, ConnectionStatus};
use crate::calendar::types::{CalendarEvent, CalendarSource};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One calendar and its events, as found in an input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarFeed {
    pub source: CalendarSource,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

/// A provider serving a fixed set of calendars from memory.
#[derive(Debug, Clone)]
pub struct StaticCalendarProvider {
    sources: Vec<CalendarSource>,
    events: BTreeMap<String, Vec<CalendarEvent>>,
    failing: HashSet<String>,
    status: ConnectionStatus,
}

impl StaticCalendarProvider {
    /// An empty, connected provider.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            events: BTreeMap::new(),
            failing: HashSet::new(),
            status: ConnectionStatus::Connected,
        }
    }

    /// A provider that reports no connection (demo data is used instead).
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            ..Self::new()
        }
    }

    /// Build a connected provider from input-file feeds.
    pub fn from_feeds(feeds: Vec<CalendarFeed>) -> Self {
        feeds
            .into_iter()
            .fold(Self::new(), |provider, feed| {
                provider.with_source(feed.source, feed.events)
            })
    }

    pub fn with_source(mut self, source: CalendarSource, events: Vec<CalendarEvent>) -> Self {
        self.events.insert(source.id.clone(), events);
        self.sources.retain(|s| s.id != source.id);
        self.sources.push(source);
        self
    }

    /// Make fetches for `source_id` fail.
    pub fn failing(mut self, source_id: impl Into<String>) -> Self {
        self.failing.insert(source_id.into());
        self
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }

    /// Id of the primary source, or of the first one.
    pub fn primary_source_id(&self) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.primary)
            .or_else(|| self.sources.first())
            .map(|s| s.id.as_str())
    }
}

impl Default for StaticCalendarProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarProvider for StaticCalendarProvider {
    async fn list_sources(&self) -> Result<Vec<CalendarSource>, CalendarError> {
        if !self.status.is_connected() {
            return Err(CalendarError::NotConnected);
        }
        Ok(self.sources.clone())
    }

    async fn fetch_events(
        &self,
        source_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        if !self.status.is_connected() {
            return Err(CalendarError::NotConnected);
        }
        if self.failing.contains(source_id) {
            return Err(CalendarError::Source {
                source_id: source_id.to_string(),
                message: "simulated failure".to_string(),
            });
        }

        let events = self
            .events
            .get(source_id)
            .ok_or_else(|| CalendarError::UnknownSource(source_id.to_string()))?;

        Ok(events
            .iter()
            .filter(|e| e.start >= start && e.start < end)
            .cloned()
            .collect())
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_bounds_and_unknown_source() {
        let provider = StaticCalendarProvider::new().with_source(
            CalendarSource::new("work", "Work").primary(),
            vec![
                CalendarEvent::new("a", "Early", at(6), at(7)),
                CalendarEvent::new("b", "Inside", at(10), at(11)),
            ],
        );

        let events = provider
            .fetch_events("work", at(8), at(8) + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "b");

        let missing = provider.fetch_events("nope", at(8), at(20)).await;
        assert_eq!(missing, Err(CalendarError::UnknownSource("nope".to_string())));
        assert_eq!(provider.primary_source_id(), Some("work"));
    }

    #[tokio::test]
    async fn test_disconnected_lists_nothing() {
        let provider = StaticCalendarProvider::disconnected();
        assert_eq!(
            provider.list_sources().await,
            Err(CalendarError::NotConnected)
        );
    }

    #[test]
    fn test_from_feeds_json() {
        let json = r#"[
            {"source": {"id": "primary", "display_name": "Me", "primary": true},
             "events": [{"id": "e1", "title": "Gym", "start": "2024-03-04T07:00:00", "end": "2024-03-04T08:00:00"}]}
        ]"#;
        let feeds: Vec<CalendarFeed> = serde_json::from_str(json).unwrap();
        let provider = StaticCalendarProvider::from_feeds(feeds);
        assert_eq!(provider.primary_source_id(), Some("primary"));
        assert!(provider.connection_status().is_connected());
    }
}
