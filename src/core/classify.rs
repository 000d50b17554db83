//! Keyword-based event stress classification.

use crate::calendar::types::CalendarEvent;
use serde::{Deserialize, Serialize};

const HIGH_STRESS_KEYWORDS: &[&str] = &[
    "exam",
    "test",
    "quiz",
    "midterm",
    "final",
    "interview",
    "presentation",
    "deadline",
    "meeting",
    "review",
    "assessment",
    "evaluation",
    "project due",
    "submission",
    "defense",
    "thesis",
    "dissertation",
    "lab",
    "homework",
];

const RECREATIONAL_KEYWORDS: &[&str] = &[
    "gym",
    "workout",
    "exercise",
    "yoga",
    "meditation",
    "break",
    "lunch",
    "dinner",
    "coffee",
    "social",
    "party",
    "game",
    "movie",
    "concert",
    "sports",
    "club",
    "relax",
    "hobby",
    "fun",
    "hang out",
    "chill",
];

/// Stress label of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStress {
    HighStress,
    Neutral,
    Recreational,
}

/// Label an event from its title and description. High stress wins over
/// recreational when both match.
pub fn classify_event(event: &CalendarEvent) -> EventStress {
    let text = format!(
        "{} {}",
        event.title,
        event.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    if HIGH_STRESS_KEYWORDS.iter().any(|k| text.contains(k)) {
        EventStress::HighStress
    } else if RECREATIONAL_KEYWORDS.iter().any(|k| text.contains(k)) {
        EventStress::Recreational
    } else {
        EventStress::Neutral
    }
}

/// Counts of each label over a set of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressMix {
    pub high_stress: usize,
    pub neutral: usize,
    pub recreational: usize,
}

impl StressMix {
    pub fn of<'e>(events: impl IntoIterator<Item = &'e CalendarEvent>) -> Self {
        events.into_iter().fold(Self::default(), |mut mix, e| {
            match classify_event(e) {
                EventStress::HighStress => mix.high_stress += 1,
                EventStress::Neutral => mix.neutral += 1,
                EventStress::Recreational => mix.recreational += 1,
            }
            mix
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(title: &str, description: Option<&str>) -> CalendarEvent {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut e = CalendarEvent::new("e", title, start, start + chrono::Duration::hours(1));
        e.description = description.map(str::to_string);
        e
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            classify_event(&event("Midterm Exam - Algorithms", None)),
            EventStress::HighStress
        );
        assert_eq!(
            classify_event(&event("Coffee with Sam", None)),
            EventStress::Recreational
        );
        assert_eq!(classify_event(&event("Commute", None)), EventStress::Neutral);
    }

    #[test]
    fn test_high_stress_wins_and_description_counts() {
        assert_eq!(
            classify_event(&event("Lunch", Some("prep for interview"))),
            EventStress::HighStress
        );
    }

    #[test]
    fn test_mix_counts() {
        let events = vec![
            event("Yoga", None),
            event("Thesis review", None),
            event("Errands", None),
        ];
        let mix = StressMix::of(&events);
        assert_eq!(mix.high_stress, 1);
        assert_eq!(mix.recreational, 1);
        assert_eq!(mix.neutral, 1);
    }
}
