//! Deterministic predictions used whenever the external service is not.

use crate::core::assessment::PredictionSource;
use crate::core::classify::StressMix;
use crate::prediction::context::PredictionContext;
use crate::prediction::strategy::{PredictionOutput, PredictionProducer, Production};
use async_trait::async_trait;

const OVERDUE_THRESHOLD: usize = 3;
const DENSITY_THRESHOLD: f64 = 0.7;
const SLEEP_THRESHOLD_HOURS: f64 = 6.0;
const EVENT_LOAD_THRESHOLD: usize = 20;

/// Templated narrative plus the deterministic generator's interventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackStrategy;

impl FallbackStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Narrative predictions derived from thresholds on the factors.
    pub fn predictions(&self, ctx: &PredictionContext<'_>) -> Vec<String> {
        let factors = ctx.factors;
        let mut predictions = Vec::new();

        if factors.overdue_tasks > OVERDUE_THRESHOLD {
            predictions.push(format!(
                "{} overdue tasks suggest difficulty keeping up with deadlines; \
                 prioritization will matter more than extra hours this week",
                factors.overdue_tasks
            ));
        }
        if factors.calendar_density > DENSITY_THRESHOLD {
            predictions.push(format!(
                "Calendar density of {:.0}% leaves little room for breaks and recovery",
                factors.calendar_density * 100.0
            ));
        }
        if factors.sleep_hours_available < SLEEP_THRESHOLD_HOURS {
            predictions.push(format!(
                "Sleep deficit detected: about {:.1} hours available per night may impact \
                 cognitive performance",
                factors.sleep_hours_available
            ));
        }
        if factors.events_next_7_days > EVENT_LOAD_THRESHOLD {
            predictions.push(format!(
                "{} events in the coming week may lead to meeting fatigue",
                factors.events_next_7_days
            ));
        }
        if predictions.is_empty() {
            predictions.push(
                "Current workload appears manageable with proper time management".to_string(),
            );
        }

        let upcoming = ctx.upcoming_events();
        let mix = StressMix::of(upcoming.iter().copied());
        if mix.high_stress > 0 {
            let recovery = if mix.recreational == 0 {
                "with no recreational time scheduled"
            } else {
                "so keep the recreational blocks you have"
            };
            predictions.push(format!(
                "{} of your {} upcoming events are high-stakes, {}",
                mix.high_stress,
                upcoming.len(),
                recovery
            ));
        }

        predictions
    }
}

#[async_trait]
impl PredictionProducer for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn source(&self) -> PredictionSource {
        PredictionSource::Fallback
    }

    async fn produce(&self, ctx: &PredictionContext<'_>) -> Production {
        Production::local(PredictionOutput {
            predictions: self.predictions(ctx),
            interventions: ctx.interventions.to_vec(),
        })
    }
}
