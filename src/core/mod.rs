//! Core analysis for Burnout Sentinel.
//!
//! This module contains:
//! - Analysis windows (waking hours, nights, interval coverage)
//! - Stress factor computation and weighted scoring
//! - Keyword-based event classification
//! - Deterministic intervention generation and ranking
//! - Assessment assembly

pub mod assessment;
pub mod classify;
pub mod interventions;
pub mod stress;
pub mod window;

// Re-export commonly used types
pub use assessment::{AssessmentBuilder, BurnoutAssessment, PredictionSource};
pub use classify::{classify_event, EventStress, StressMix};
pub use interventions::{
    EmptyPolicy, GeneratorConfig, Intervention, InterventionGenerator, InterventionPriority,
    InterventionType,
};
pub use stress::{RiskTier, ScoringConfig, StressFactors, StressScore, StressScorer};
pub use window::{AnalysisWindow, SleepWindow, WakingHours, MAX_WINDOW_DAYS};
