//! Calendar selection: which sources feed the aggregator.
//!
//! A selection is never empty. Attempts to clear it are rejected here, at the
//! update boundary, so nothing downstream has to handle "no calendars".

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Source id used when the user has not chosen anything yet.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Errors raised when updating a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    Empty,
    BlankId,
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::Empty => write!(f, "At least one calendar must be selected"),
            SelectionError::BlankId => write!(f, "Calendar ids must not be blank"),
        }
    }
}

impl std::error::Error for SelectionError {}

/// A non-empty set of selected calendar source ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSelection {
    calendar_ids: BTreeSet<String>,
}

impl CalendarSelection {
    /// Build a selection, rejecting empty input and blank ids.
    pub fn new<I, S>(ids: I) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut calendar_ids = BTreeSet::new();
        for id in ids {
            let id = id.into();
            let id = id.trim();
            if id.is_empty() {
                return Err(SelectionError::BlankId);
            }
            calendar_ids.insert(id.to_string());
        }

        if calendar_ids.is_empty() {
            return Err(SelectionError::Empty);
        }

        Ok(Self { calendar_ids })
    }

    /// Parse a comma-separated list of ids.
    pub fn from_csv(s: &str) -> Result<Self, SelectionError> {
        Self::new(s.split(',').map(str::trim).filter(|id| !id.is_empty()))
    }

    /// Replace the selection. On error the current selection is kept.
    pub fn update<I, S>(&mut self, ids: I) -> Result<(), SelectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self = Self::new(ids)?;
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.calendar_ids.contains(id)
    }

    /// Selected ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.calendar_ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.calendar_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendar_ids.is_empty()
    }
}

impl Default for CalendarSelection {
    fn default() -> Self {
        Self {
            calendar_ids: BTreeSet::from([PRIMARY_CALENDAR.to_string()]),
        }
    }
}

impl<'de> Deserialize<'de> for CalendarSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            calendar_ids: Vec<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        CalendarSelection::new(raw.calendar_ids).map_err(serde::de::Error::custom)
    }
}
