//! Burnout assessment assembly.

use crate::core::interventions::Intervention;
use crate::core::stress::{StressFactors, StressScore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scores above this get a comparison against a typical week.
pub const COMPARISON_THRESHOLD: u8 = 70;

/// Where the predictions and interventions of an assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    External,
    Fallback,
}

/// Result of one analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnoutAssessment {
    pub analysis_id: Uuid,
    pub stress_score: StressScore,
    pub factors: StressFactors,
    pub predictions: Vec<String>,
    pub interventions: Vec<Intervention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_comparison: Option<String>,
    /// Events ignored because they end before they start
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed_event_ids: Vec<String>,
    pub prediction_source: PredictionSource,
}

/// Builder for [`BurnoutAssessment`].
#[derive(Debug, Clone)]
pub struct AssessmentBuilder {
    analysis_id: Uuid,
    baseline_weekly_events: f64,
    malformed_event_ids: Vec<String>,
}

impl AssessmentBuilder {
    pub fn new(baseline_weekly_events: f64) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            baseline_weekly_events,
            malformed_event_ids: Vec::new(),
        }
    }

    pub fn with_analysis_id(mut self, analysis_id: Uuid) -> Self {
        self.analysis_id = analysis_id;
        self
    }

    pub fn with_malformed_events(mut self, ids: Vec<String>) -> Self {
        self.malformed_event_ids = ids;
        self
    }

    pub fn analysis_id(&self) -> Uuid {
        self.analysis_id
    }

    pub fn build(
        self,
        stress_score: StressScore,
        factors: StressFactors,
        predictions: Vec<String>,
        interventions: Vec<Intervention>,
        prediction_source: PredictionSource,
    ) -> BurnoutAssessment {
        let historical_comparison =
            historical_comparison(&stress_score, &factors, self.baseline_weekly_events);

        BurnoutAssessment {
            analysis_id: self.analysis_id,
            stress_score,
            factors,
            predictions,
            interventions,
            historical_comparison,
            malformed_event_ids: self.malformed_event_ids,
            prediction_source,
        }
    }
}

/// Compare this week's load to a typical one when the score is high.
pub fn historical_comparison(
    score: &StressScore,
    factors: &StressFactors,
    baseline_weekly_events: f64,
) -> Option<String> {
    if score.total_score <= COMPARISON_THRESHOLD || baseline_weekly_events <= 0.0 {
        return None;
    }

    let ratio = factors.events_next_7_days as f64 / baseline_weekly_events;
    if ratio > 1.0 {
        Some(format!(
            "You're {:.1}x busier than a typical week ({} events vs. {:.0} typical)",
            ratio, factors.events_next_7_days, baseline_weekly_events
        ))
    } else {
        Some(format!(
            "Your event count ({}) is close to a typical week ({:.0}); deadlines and lost \
             sleep are driving most of the pressure",
            factors.events_next_7_days, baseline_weekly_events
        ))
    }
}
