//! Generation context: what the prediction producers see.
//!
//! The external service only receives a [`BoundedContext`], a digest of the
//! first few events and tasks with text fields truncated, plus the computed
//! metrics.

use crate::calendar::types::{CalendarEvent, Task};
use crate::core::classify::StressMix;
use crate::core::interventions::{shorten, Intervention};
use crate::core::stress::{StressFactors, StressScore};
use crate::core::window::AnalysisWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Everything a producer needs for one analysis.
#[derive(Debug, Clone, Copy)]
pub struct PredictionContext<'a> {
    pub events: &'a [CalendarEvent],
    pub tasks: &'a [Task],
    pub factors: &'a StressFactors,
    pub score: &'a StressScore,
    /// Output of the deterministic generator
    pub interventions: &'a [Intervention],
    /// Horizon the factors were computed over, starting at "now"
    pub window: AnalysisWindow,
}

impl<'a> PredictionContext<'a> {
    pub fn now(&self) -> NaiveDateTime {
        self.window.start
    }

    /// Well-formed events starting inside the window, earliest first.
    pub fn upcoming_events(&self) -> Vec<&'a CalendarEvent> {
        let mut upcoming: Vec<&'a CalendarEvent> = self
            .events
            .iter()
            .filter(|e| !e.is_malformed() && self.window.contains(e.start))
            .collect();
        upcoming.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        upcoming
    }
}

/// Size limits applied before anything leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    pub max_events: usize,
    pub max_tasks: usize,
    pub max_text_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_events: 10,
            max_tasks: 10,
            max_text_chars: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDigest {
    pub title: String,
    pub when: String,
    pub day_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDigest {
    pub title: String,
    pub priority: String,
    pub due: String,
    pub completed: bool,
}

/// Truncated view of a [`PredictionContext`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundedContext {
    pub total_events: usize,
    pub total_tasks: usize,
    pub events: Vec<EventDigest>,
    pub tasks: Vec<TaskDigest>,
    pub events_next_7_days: usize,
    pub calendar_density_pct: f64,
    pub sleep_hours_available: f64,
    pub overdue_tasks: usize,
    pub high_priority_tasks: usize,
    pub total_score: u8,
    pub risk_level: String,
    pub stress_mix: StressMix,
}

impl BoundedContext {
    pub fn from_context(ctx: &PredictionContext<'_>, limits: &ContextLimits) -> Self {
        let max_text = limits.max_text_chars;
        let upcoming = ctx.upcoming_events();

        let events = upcoming
            .iter()
            .take(limits.max_events)
            .map(|e| EventDigest {
                title: shorten(&e.title, max_text),
                when: e.start.format("%a %I:%M%p").to_string(),
                day_label: day_label(ctx.now(), e.start),
                description: e.description.as_deref().map(|d| shorten(d, max_text)),
            })
            .collect();

        let tasks = ctx
            .tasks
            .iter()
            .take(limits.max_tasks)
            .map(|t| TaskDigest {
                title: shorten(&t.title, max_text),
                priority: t.priority.as_str().to_uppercase(),
                due: t
                    .due_date
                    .map(|d| d.format("%a %b %d").to_string())
                    .unwrap_or_else(|| "No deadline".to_string()),
                completed: t.completed,
            })
            .collect();

        Self {
            total_events: upcoming.len(),
            total_tasks: ctx.tasks.len(),
            events,
            tasks,
            events_next_7_days: ctx.factors.events_next_7_days,
            calendar_density_pct: ctx.factors.calendar_density * 100.0,
            sleep_hours_available: ctx.factors.sleep_hours_available,
            overdue_tasks: ctx.factors.overdue_tasks,
            high_priority_tasks: ctx.factors.high_priority_tasks,
            total_score: ctx.score.total_score,
            risk_level: ctx.score.risk_level.to_string(),
            stress_mix: StressMix::of(upcoming.iter().copied()),
        }
    }
}

/// System instruction sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are an expert in student mental health and burnout \
prevention. Provide specific, data-driven insights and reply with JSON only.";

/// Render the user prompt for a bounded context.
pub fn render_prompt(ctx: &BoundedContext, prediction_count: usize, max_interventions: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Upcoming events ({} total):", ctx.total_events);
    if ctx.events.is_empty() {
        let _ = writeln!(out, "  - No upcoming events");
    }
    for e in &ctx.events {
        let _ = writeln!(out, "  - {} ({}, {})", e.title, e.day_label, e.when);
    }

    let _ = writeln!(out, "\nCurrent tasks ({} total):", ctx.total_tasks);
    if ctx.tasks.is_empty() {
        let _ = writeln!(out, "  - No tasks");
    }
    for t in &ctx.tasks {
        let status = if t.completed { " (done)" } else { "" };
        let _ = writeln!(out, "  - [{}] {} - Due: {}{}", t.priority, t.title, t.due, status);
    }

    let _ = writeln!(out, "\nKey metrics:");
    let _ = writeln!(out, "- Stress score: {} ({})", ctx.total_score, ctx.risk_level);
    let _ = writeln!(out, "- Events in next 7 days: {}", ctx.events_next_7_days);
    let _ = writeln!(
        out,
        "- Calendar density: {:.1}% of waking hours scheduled",
        ctx.calendar_density_pct
    );
    let _ = writeln!(out, "- Sleep opportunity: {:.1} hours", ctx.sleep_hours_available);
    let _ = writeln!(out, "- Overdue tasks: {}", ctx.overdue_tasks);
    let _ = writeln!(out, "- High priority pending tasks: {}", ctx.high_priority_tasks);
    let _ = writeln!(
        out,
        "- Event mix: {} high-stress, {} neutral, {} recreational",
        ctx.stress_mix.high_stress, ctx.stress_mix.neutral, ctx.stress_mix.recreational
    );

    let _ = write!(
        out,
        "\nProvide exactly {prediction_count} specific predictions about burnout risk that \
         reference events and tasks by name, and between 1 and {max_interventions} \
         interventions.\n\
         Return JSON: {{\"predictions\": [\"...\"], \"interventions\": [{{\"type\": \
         \"reschedule|delegate|break_down|micro_break\", \"priority\": \
         \"low|medium|high|critical\", \"title\": \"...\", \"description\": \"...\", \
         \"impact_score\": 0-100, \"effort_score\": 0-100}}]}}"
    );

    out
}

fn day_label(now: NaiveDateTime, start: NaiveDateTime) -> String {
    match (start.date() - now.date()).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        d if d < 0 => "Past".to_string(),
        d => format!("in {d} days"),
    }
}
