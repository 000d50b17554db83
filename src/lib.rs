//! Burnout Sentinel - burnout-risk scoring from calendar and task data.
//!
//! This library turns a student's upcoming calendar events and task list into
//! a stress score, a risk tier, short narrative predictions and a ranked list
//! of interventions.
//!
//! # Guarantees
//!
//! - **Always an answer**: an analysis never fails; a broken or missing
//!   generative service ends in deterministic predictions
//! - **Bounded scores**: every factor and the total lie in 0-100
//! - **Nothing stored**: events and tasks live for one analysis call only
//! - **Small prompts**: the generative service only sees a truncated digest
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Burnout Sentinel                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐        │
//! │  │  Calendar   │──▶│   Stress    │──▶│  Interventions   │        │
//! │  │ Aggregator  │   │   Scorer    │   │ (rank by ratio)  │        │
//! │  └─────────────┘   └─────────────┘   └──────────────────┘        │
//! │         ▲                 │                   │                  │
//! │   selection               ▼                   ▼                  │
//! │  ┌─────────────┐   ┌──────────────────────────────────┐          │
//! │  │Transparency │◀──│ Prediction adapter               │          │
//! │  │    Log      │   │ external (retry) │ deterministic │          │
//! │  └─────────────┘   └──────────────────────────────────┘          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use burnout_sentinel::{AnalysisRequest, Analyzer, Config};
//! use burnout_sentinel::calendar::{demo_events, demo_tasks, now_wall_clock};
//!
//! # async fn example() {
//! let config = Config::default();
//! let analyzer = Analyzer::deterministic(&config);
//!
//! let now = now_wall_clock(None);
//! let request = AnalysisRequest::new(demo_events(now), demo_tasks(now));
//! let assessment = analyzer.analyze(&request, now).await;
//!
//! println!("{} ({})", assessment.stress_score.total_score, assessment.stress_score.risk_level);
//! # }
//! ```

pub mod analyzer;
pub mod calendar;
pub mod config;
pub mod core;
pub mod logging;
pub mod prediction;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use analyzer::{AnalysisRequest, Analyzer};
pub use calendar::{CalendarAggregator, CalendarEvent, CalendarSelection, Priority, Task};
pub use config::{Config, ConfigError};
pub use core::{
    BurnoutAssessment, Intervention, InterventionType, RiskTier, StressFactors, StressScore,
    StressScorer,
};
pub use prediction::{PredictionAdapter, PredictionOutcome};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
