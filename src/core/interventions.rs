//! Deterministic intervention generation.
//!
//! Candidates are synthesized per triggered stressor, scored, ranked by
//! impact/effort ratio and trimmed to a small set that never mentions the
//! same event or task twice.

use crate::calendar::types::{CalendarEvent, Task};
use crate::core::stress::{ScoringConfig, StressFactors, StressScore, StressScorer};
use crate::core::window::{is_all_day, AnalysisWindow};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Id of the suggestion returned when nothing else qualifies.
pub const MAINTAIN_BALANCE_ID: &str = "int-maintain-balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Reschedule,
    Delegate,
    BreakDown,
    MicroBreak,
}

impl InterventionType {
    /// Heuristic effort of acting on a suggestion of this type (0-100).
    pub fn effort(&self) -> f64 {
        match self {
            InterventionType::MicroBreak => 10.0,
            InterventionType::Reschedule => 25.0,
            InterventionType::BreakDown => 35.0,
            InterventionType::Delegate => 50.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::Reschedule => "reschedule",
            InterventionType::Delegate => "delegate",
            InterventionType::BreakDown => "break_down",
            InterventionType::MicroBreak => "micro_break",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// A suggested action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub priority: InterventionPriority,
    pub title: String,
    pub description: String,
    pub impact_score: f64,
    pub effort_score: f64,
    /// Event or task the suggestion is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl Intervention {
    /// Impact per unit of effort, used for ranking.
    pub fn roi(&self) -> f64 {
        self.impact_score / self.effort_score.max(1.0)
    }

    /// The low-priority suggestion used when no stressor is triggered.
    pub fn maintain_balance() -> Self {
        Self {
            id: MAINTAIN_BALANCE_ID.to_string(),
            kind: InterventionType::MicroBreak,
            priority: InterventionPriority::Low,
            title: "Maintain your current balance".to_string(),
            description: "Your schedule looks sustainable. Keep protecting short breaks \
                          and regular sleep to stay ahead of stress."
                .to_string(),
            impact_score: 10.0,
            effort_score: InterventionType::MicroBreak.effort(),
            target_id: None,
        }
    }
}

/// What to return when no candidate qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    #[default]
    DefaultSuggestion,
    Empty,
}

/// Generator thresholds and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Title keywords marking an event as easy to move
    pub low_commitment_keywords: Vec<String>,
    /// Day density from which low-commitment events are worth moving
    pub reschedule_density_threshold: f64,
    /// Overall density above which a micro-break is suggested
    pub micro_break_density_threshold: f64,
    /// Sleep hours below which late events are worth moving
    pub sleep_protection_hours: f64,
    pub delegate_cap: usize,
    pub break_down_horizon_days: u32,
    pub max_interventions: usize,
    pub empty_policy: EmptyPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            low_commitment_keywords: [
                "coffee",
                "chat",
                "catch up",
                "optional",
                "lunch",
                "social",
                "networking",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            reschedule_density_threshold: 0.6,
            micro_break_density_threshold: 0.7,
            sleep_protection_hours: 6.0,
            delegate_cap: 3,
            break_down_horizon_days: 2,
            max_interventions: 5,
            empty_policy: EmptyPolicy::DefaultSuggestion,
        }
    }
}

/// Synthesizes and ranks interventions.
#[derive(Debug, Clone, Default)]
pub struct InterventionGenerator {
    config: GeneratorConfig,
    scorer: StressScorer,
}

impl InterventionGenerator {
    pub fn new(config: GeneratorConfig, scoring: ScoringConfig) -> Self {
        Self {
            config,
            scorer: StressScorer::new(scoring),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Ranked interventions for the given inputs.
    pub fn generate(
        &self,
        events: &[CalendarEvent],
        tasks: &[Task],
        factors: &StressFactors,
        score: &StressScore,
        now: NaiveDateTime,
    ) -> Vec<Intervention> {
        let candidates = self.candidates(events, tasks, factors, score, now);
        let candidate_count = candidates.len();
        let selected = select(rank(candidates), self.config.max_interventions);

        tracing::debug!(
            candidates = candidate_count,
            selected = selected.len(),
            "Generated interventions"
        );

        if selected.is_empty() && self.config.empty_policy == EmptyPolicy::DefaultSuggestion {
            return vec![Intervention::maintain_balance()];
        }
        selected
    }

    /// Unranked candidates in synthesis order.
    pub fn candidates(
        &self,
        events: &[CalendarEvent],
        tasks: &[Task],
        factors: &StressFactors,
        score: &StressScore,
        now: NaiveDateTime,
    ) -> Vec<Intervention> {
        let window = AnalysisWindow::new(now, self.scorer.config().horizon_days);
        let upcoming: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| !e.is_malformed() && window.contains(e.start))
            .collect();

        let mut out = Vec::new();
        self.protect_sleep(&upcoming, &window, factors, score, &mut out);
        self.reschedule_low_commitment(events, &upcoming, factors, &mut out);
        self.delegate(tasks, score, now, &mut out);
        self.break_down(tasks, score, now, &mut out);
        self.micro_break(factors, &mut out);
        out
    }

    fn protect_sleep(
        &self,
        upcoming: &[&CalendarEvent],
        window: &AnalysisWindow,
        factors: &StressFactors,
        score: &StressScore,
        out: &mut Vec<Intervention>,
    ) {
        if factors.sleep_hours_available >= self.config.sleep_protection_hours {
            return;
        }
        let nights = window.nights(&self.scorer.config().sleep_window);
        let priority = if factors.sleep_hours_available < 4.0 {
            InterventionPriority::Critical
        } else {
            InterventionPriority::High
        };

        for event in upcoming.iter().filter(|e| !is_all_day(e)) {
            if !nights.iter().any(|n| n.intersect(event.start, event.end).is_some()) {
                continue;
            }
            out.push(Intervention {
                id: format!("protect-sleep-{}", event.id),
                kind: InterventionType::Reschedule,
                priority,
                title: format!("Move '{}' out of sleep hours", shorten(&event.title, 25)),
                description: format!(
                    "'{}' on {} cuts into your night. You average {:.1} hours of sleep \
                     opportunity; moving it to daytime protects recovery.",
                    event.title,
                    event.start.format("%A at %I:%M%p"),
                    factors.sleep_hours_available
                ),
                impact_score: clip(0.6 * score.sleep_factor),
                effort_score: InterventionType::Reschedule.effort(),
                target_id: Some(event.id.clone()),
            });
        }
    }

    fn reschedule_low_commitment(
        &self,
        events: &[CalendarEvent],
        upcoming: &[&CalendarEvent],
        factors: &StressFactors,
        out: &mut Vec<Intervention>,
    ) {
        for event in upcoming {
            let title = event.title.to_lowercase();
            if !self
                .config
                .low_commitment_keywords
                .iter()
                .any(|k| title.contains(&k.to_lowercase()))
            {
                continue;
            }

            let day_density = self.scorer.day_density(events, event.start.date());
            if day_density < self.config.reschedule_density_threshold {
                continue;
            }

            out.push(Intervention {
                id: format!("reschedule-{}", event.id),
                kind: InterventionType::Reschedule,
                priority: if day_density >= 0.8 {
                    InterventionPriority::High
                } else {
                    InterventionPriority::Medium
                },
                title: format!("Reschedule '{}'", shorten(&event.title, 25)),
                description: format!(
                    "Move '{}' from {} to a lighter day. That day is {:.0}% booked \
                     during a week with {} events.",
                    event.title,
                    event.start.format("%A at %I:%M%p"),
                    day_density * 100.0,
                    factors.events_next_7_days
                ),
                impact_score: clip(20.0 + 50.0 * day_density),
                effort_score: InterventionType::Reschedule.effort(),
                target_id: Some(event.id.clone()),
            });
        }
    }

    fn delegate(
        &self,
        tasks: &[Task],
        score: &StressScore,
        now: NaiveDateTime,
        out: &mut Vec<Intervention>,
    ) {
        let mut pending: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.is_pending_high_priority(now))
            .collect();
        // Soonest due first, undated last.
        pending.sort_by_key(|t| (t.due_date.is_none(), t.due_date));

        for task in pending.into_iter().take(self.config.delegate_cap) {
            out.push(Intervention {
                id: format!("delegate-{}", task.id),
                kind: InterventionType::Delegate,
                priority: InterventionPriority::High,
                title: format!("Delegate or share: {}", shorten(&task.title, 30)),
                description: format!(
                    "'{}' is high priority. Ask a teammate, TA or study partner to take \
                     part of it so it stops competing with everything else.",
                    task.title
                ),
                impact_score: clip(30.0 + 0.5 * score.task_factor),
                effort_score: InterventionType::Delegate.effort(),
                target_id: Some(task.id.clone()),
            });
        }
    }

    fn break_down(
        &self,
        tasks: &[Task],
        score: &StressScore,
        now: NaiveDateTime,
        out: &mut Vec<Intervention>,
    ) {
        let horizon = Duration::days(i64::from(self.config.break_down_horizon_days));
        if horizon <= Duration::zero() {
            return;
        }

        for task in tasks.iter().filter(|t| t.is_pending_high_priority(now)) {
            let Some(due) = task.due_date else {
                continue;
            };
            let remaining = due - now;
            if remaining > horizon {
                continue;
            }
            let urgency = (1.0 - remaining.num_seconds() as f64 / horizon.num_seconds() as f64)
                .clamp(0.0, 1.0);

            out.push(Intervention {
                id: format!("break-down-{}", task.id),
                kind: InterventionType::BreakDown,
                priority: InterventionPriority::High,
                title: format!("Break down: {}", shorten(&task.title, 30)),
                description: format!(
                    "'{}' is due {}. Split it into 3-4 smaller subtasks with \
                     mini-deadlines and start with the first one today.",
                    task.title,
                    due.format("%A at %I:%M%p")
                ),
                impact_score: clip(25.0 + 0.4 * score.task_factor + 10.0 * urgency),
                effort_score: InterventionType::BreakDown.effort(),
                target_id: Some(task.id.clone()),
            });
        }
    }

    fn micro_break(&self, factors: &StressFactors, out: &mut Vec<Intervention>) {
        let threshold = self.config.micro_break_density_threshold;
        if factors.calendar_density <= threshold {
            return;
        }
        let headroom = (1.0 - threshold).max(f64::EPSILON);
        out.push(Intervention {
            id: "micro-break".to_string(),
            kind: InterventionType::MicroBreak,
            priority: InterventionPriority::Medium,
            title: "Add 10-minute breaks between commitments".to_string(),
            description: format!(
                "Your waking hours are {:.0}% booked. Insert short walks or stretch \
                 breaks between back-to-back events.",
                factors.calendar_density * 100.0
            ),
            impact_score: clip(15.0 + 40.0 * (factors.calendar_density - threshold) / headroom),
            effort_score: InterventionType::MicroBreak.effort(),
            target_id: None,
        });
    }
}

/// Order by impact/effort ratio, then impact, keeping synthesis order on ties.
pub fn rank(mut candidates: Vec<Intervention>) -> Vec<Intervention> {
    candidates.sort_by(|a, b| {
        b.roi()
            .total_cmp(&a.roi())
            .then_with(|| b.impact_score.total_cmp(&a.impact_score))
    });
    candidates
}

/// Take up to `max` ranked candidates, skipping repeated targets.
pub fn select(ranked: Vec<Intervention>, max: usize) -> Vec<Intervention> {
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|i| match &i.target_id {
            Some(target) => seen.insert(target.clone()),
            None => true,
        })
        .take(max)
        .collect()
}

/// Truncate to at most `max` characters.
pub(crate) fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn clip(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::types::Priority;
    use crate::core::stress::RiskTier;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(day: i64, hour: u32) -> NaiveDateTime {
        (now().date() + Duration::days(day))
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn score(task_factor: f64, sleep_factor: f64) -> StressScore {
        StressScore {
            total_score: 50,
            calendar_factor: 50.0,
            task_factor,
            sleep_factor,
            risk_level: RiskTier::Medium,
            timestamp: now(),
        }
    }

    fn candidate(id: &str, impact: f64, effort: f64, target: Option<&str>) -> Intervention {
        Intervention {
            id: id.to_string(),
            kind: InterventionType::Reschedule,
            priority: InterventionPriority::Medium,
            title: id.to_string(),
            description: String::new(),
            impact_score: impact,
            effort_score: effort,
            target_id: target.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_inputs_yield_default_suggestion() {
        let generator = InterventionGenerator::default();
        let out = generator.generate(&[], &[], &StressFactors::default(), &score(0.0, 0.0), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, MAINTAIN_BALANCE_ID);
        assert_eq!(out[0].priority, InterventionPriority::Low);
    }

    #[test]
    fn test_empty_policy_empty() {
        let generator = InterventionGenerator::new(
            GeneratorConfig {
                empty_policy: EmptyPolicy::Empty,
                ..Default::default()
            },
            ScoringConfig::default(),
        );
        let out = generator.generate(&[], &[], &StressFactors::default(), &score(0.0, 0.0), now());
        assert!(out.is_empty());
    }

    #[test]
    fn test_rank_by_ratio_regardless_of_order() {
        let high = candidate("high", 30.0, 10.0, None);
        let low = candidate("low", 60.0, 50.0, None);

        let ranked = rank(vec![low.clone(), high.clone()]);
        assert_eq!(ranked[0].id, "high");
        let ranked = rank(vec![high, low]);
        assert_eq!(ranked[0].id, "high");
    }

    #[test]
    fn test_rank_ties() {
        let ranked = rank(vec![
            candidate("a", 20.0, 10.0, None),
            candidate("b", 40.0, 20.0, None),
            candidate("c", 20.0, 10.0, None),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_select_caps_and_dedupes_targets() {
        let ranked = vec![
            candidate("a", 90.0, 10.0, Some("evt-1")),
            candidate("b", 80.0, 10.0, Some("evt-1")),
            candidate("c", 70.0, 10.0, Some("task-1")),
            candidate("d", 60.0, 10.0, None),
            candidate("e", 50.0, 10.0, Some("evt-2")),
            candidate("f", 40.0, 10.0, Some("evt-3")),
            candidate("g", 30.0, 10.0, Some("evt-4")),
        ];
        let ids: Vec<String> = select(ranked, 5).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_micro_break_above_threshold() {
        let generator = InterventionGenerator::default();
        let factors = StressFactors {
            calendar_density: 0.9,
            ..Default::default()
        };
        let out = generator.generate(&[], &[], &factors, &score(0.0, 0.0), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InterventionType::MicroBreak);
        assert!((out[0].impact_score - (15.0 + 40.0 * 0.2 / 0.3)).abs() < 1e-9);

        let calm = StressFactors {
            calendar_density: 0.7,
            ..Default::default()
        };
        let out = generator.candidates(&[], &[], &calm, &score(0.0, 0.0), now());
        assert!(out.is_empty());
    }

    #[test]
    fn test_reschedule_low_commitment_on_busy_day() {
        let generator = InterventionGenerator::default();
        let events = vec![
            CalendarEvent::new("lecture", "Lecture", at(1, 8), at(1, 16)),
            CalendarEvent::new("lab", "Lab", at(1, 16), at(1, 18)),
            CalendarEvent::new("coffee", "Coffee chat", at(1, 18), at(1, 19)),
            // Same keyword on a quiet day is left alone.
            CalendarEvent::new("lunch", "Lunch", at(3, 12), at(3, 13)),
        ];
        let out = generator.candidates(&events, &[], &StressFactors::default(), &score(0.0, 0.0), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "reschedule-coffee");
        assert_eq!(out[0].target_id.as_deref(), Some("coffee"));
        // 11 of 16 waking hours booked.
        assert!((out[0].impact_score - (20.0 + 50.0 * 11.0 / 16.0)).abs() < 1e-9);
    }

    #[test]
    fn test_delegate_and_break_down() {
        let generator = InterventionGenerator::default();
        let tasks = vec![
            Task::new("t1", "Essay", Priority::High).due(at(1, 12)),
            Task::new("t2", "Reading", Priority::High).due(at(6, 12)),
            Task::new("t3", "Slides", Priority::High),
            Task::new("t4", "Poster", Priority::High).due(at(5, 12)),
            Task::new("t5", "Chores", Priority::Low).due(at(1, 12)),
            Task::new("t6", "Old", Priority::High).due(now() - Duration::days(1)),
            Task::new("t7", "Done", Priority::High).due(at(1, 12)).completed(),
        ];
        let out = generator.candidates(&[], &tasks, &StressFactors::default(), &score(20.0, 0.0), now());

        let delegated: Vec<&str> = out
            .iter()
            .filter(|i| i.kind == InterventionType::Delegate)
            .filter_map(|i| i.target_id.as_deref())
            .collect();
        assert_eq!(delegated, vec!["t1", "t4", "t2"]);

        let broken: Vec<&Intervention> = out
            .iter()
            .filter(|i| i.kind == InterventionType::BreakDown)
            .collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].target_id.as_deref(), Some("t1"));
        // 36h of a 48h horizon left.
        assert!((broken[0].impact_score - (25.0 + 8.0 + 2.5)).abs() < 1e-9);

        let ranked = generator.generate(&[], &tasks, &StressFactors::default(), &score(20.0, 0.0), now());
        let mut targets = HashSet::new();
        for i in &ranked {
            if let Some(t) = &i.target_id {
                assert!(targets.insert(t.clone()), "duplicate target {t}");
            }
        }
        assert!(ranked.len() <= 5);
    }

    #[test]
    fn test_sleep_protection() {
        let generator = InterventionGenerator::default();
        let events = vec![
            CalendarEvent::new("late", "Study group", at(0, 21), at(1, 1)),
            CalendarEvent::new("noon", "Class", at(1, 12), at(1, 13)),
        ];
        let factors = StressFactors {
            sleep_hours_available: 4.0,
            ..Default::default()
        };
        let out = generator.candidates(&events, &[], &factors, &score(0.0, 50.0), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "protect-sleep-late");
        assert_eq!(out[0].impact_score, 30.0);
        assert_eq!(out[0].priority, InterventionPriority::High);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Intervention::maintain_balance()).unwrap();
        assert_eq!(json["type"], "micro_break");
        assert_eq!(json["priority"], "low");
        assert!(json.get("target_id").is_none());
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("abcdef", 3), "abc...");
        assert_eq!(shorten("ééééé", 2), "éé...");
    }
}
