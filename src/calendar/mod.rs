//! Calendar input for the analysis.
//!
//! This module contains:
//! - Timestamp normalization to offset-free wall-clock readings
//! - Event, task and calendar-source types
//! - The non-empty calendar selection
//! - The aggregator merging selected sources (with a demo fallback)

pub mod aggregator;
pub mod memory;
pub mod normalize;
pub mod selection;
pub mod types;

// Re-export commonly used types
pub use aggregator::{
    demo_events, demo_tasks, merge, AggregatedCalendar, CalendarAggregator, CalendarError,
    CalendarProvider, ConnectionStatus, DataOrigin, DEFAULT_DAYS_AHEAD,
    MAX_DAYS_AHEAD,
};
pub use memory::{CalendarFeed, StaticCalendarProvider};
pub use normalize::{normalize, now_wall_clock, parse_timestamp, NormalizeError};
pub use selection::{CalendarSelection, SelectionError, PRIMARY_CALENDAR};
pub use types::{CalendarEvent, CalendarSource, Priority, Task};
