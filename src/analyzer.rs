//! The analysis entrypoint: events and tasks in, burnout assessment out.

use crate::calendar::types::{CalendarEvent, Task};
use crate::config::Config;
use crate::core::assessment::{AssessmentBuilder, BurnoutAssessment};
use crate::core::interventions::InterventionGenerator;
use crate::core::stress::{malformed_event_ids, StressScorer};
use crate::core::window::AnalysisWindow;
use crate::prediction::client::{GenerationError, GenerativeService};
use crate::prediction::context::PredictionContext;
use crate::prediction::retry::{Sleeper, TokioSleeper};
use crate::prediction::strategy::{ExternalStrategy, PredictionAdapter};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Input of one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl AnalysisRequest {
    pub fn new(events: Vec<CalendarEvent>, tasks: Vec<Task>) -> Self {
        Self { events, tasks }
    }
}

/// Runs scoring, intervention generation and prediction for a request.
pub struct Analyzer {
    scorer: StressScorer,
    generator: InterventionGenerator,
    adapter: PredictionAdapter,
    baseline_weekly_events: f64,
    log: SharedTransparencyLog,
}

impl Analyzer {
    /// An analyzer that never calls out.
    pub fn deterministic(config: &Config) -> Self {
        Self::with_adapter(config, PredictionAdapter::deterministic())
    }

    /// An analyzer using `service` for predictions.
    pub fn with_service(
        config: &Config,
        service: Arc<dyn GenerativeService>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let external = ExternalStrategy::new(service, sleeper, config.prediction.clone());
        Self::with_adapter(config, PredictionAdapter::with_external(external))
    }

    /// Build from configuration. The HTTP client is only created when the
    /// `generative` feature is on, `offline` is false and a key is present.
    pub fn from_config(config: &Config, offline: bool) -> Result<Self, GenerationError> {
        if offline || !config.generative.is_configured() {
            return Ok(Self::deterministic(config));
        }

        Ok(match http_service(config)? {
            Some(service) => Self::with_service(config, service, Arc::new(TokioSleeper)),
            None => Self::deterministic(config),
        })
    }

    fn with_adapter(config: &Config, adapter: PredictionAdapter) -> Self {
        Self {
            scorer: StressScorer::new(config.scoring.clone()),
            generator: InterventionGenerator::new(
                config.interventions.clone(),
                config.scoring.clone(),
            ),
            adapter,
            baseline_weekly_events: config.baseline_weekly_events,
            log: create_shared_log(),
        }
    }

    /// Share counters with another component (e.g. the server's health route).
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.log = log;
        self
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.log
    }

    /// Whether predictions may come from the external service.
    pub fn external_enabled(&self) -> bool {
        self.adapter.external_enabled()
    }

    /// Analyze `request` as of `now`. Never fails: external problems end in
    /// the deterministic fallback.
    pub async fn analyze(&self, request: &AnalysisRequest, now: NaiveDateTime) -> BurnoutAssessment {
        let malformed = malformed_event_ids(&request.events);
        let malformed_count = malformed.len();
        let builder =
            AssessmentBuilder::new(self.baseline_weekly_events).with_malformed_events(malformed);
        let span = tracing::info_span!("analysis", id = %builder.analysis_id());

        async move {
            let events = &request.events;
            let tasks = &request.tasks;

            let factors = self.scorer.compute_factors(events, tasks, now);
            let score = self.scorer.compute_score(&factors, now);
            let interventions = self
                .generator
                .generate(events, tasks, &factors, &score, now);

            let ctx = PredictionContext {
                events,
                tasks,
                factors: &factors,
                score: &score,
                interventions: &interventions,
                window: AnalysisWindow::new(now, self.scorer.config().horizon_days),
            };
            let outcome = self.adapter.generate(&ctx).await;

            self.log.record_analysis(&outcome, malformed_count);

            let assessment = builder.build(
                score,
                factors,
                outcome.output.predictions,
                outcome.output.interventions,
                outcome.source,
            );

            if malformed_count > 0 {
                tracing::warn!(
                    count = malformed_count,
                    "Ignored events that end before they start"
                );
            }
            tracing::info!(
                total_score = assessment.stress_score.total_score,
                risk_level = %assessment.stress_score.risk_level,
                interventions = assessment.interventions.len(),
                source = ?assessment.prediction_source,
                "Analysis complete"
            );

            assessment
        }
        .instrument(span)
        .await
    }
}

#[cfg(feature = "generative")]
fn http_service(config: &Config) -> Result<Option<Arc<dyn GenerativeService>>, GenerationError> {
    let client = crate::prediction::client::HttpGenerativeClient::new(config.generative.clone())?;
    Ok(Some(Arc::new(client)))
}

#[cfg(not(feature = "generative"))]
fn http_service(_config: &Config) -> Result<Option<Arc<dyn GenerativeService>>, GenerationError> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::types::Priority;
    use crate::core::assessment::PredictionSource;
    use crate::core::stress::RiskTier;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_request() {
        let analyzer = Analyzer::deterministic(&Config::default());
        let assessment = analyzer.analyze(&AnalysisRequest::default(), now()).await;

        assert_eq!(assessment.stress_score.total_score, 0);
        assert_eq!(assessment.stress_score.risk_level, RiskTier::Low);
        assert_eq!(assessment.prediction_source, PredictionSource::Fallback);
        assert_eq!(assessment.interventions.len(), 1);
        assert_eq!(analyzer.transparency().stats().analyses, 1);
        assert_eq!(analyzer.transparency().stats().disabled, 1);
    }

    #[tokio::test]
    async fn test_malformed_events_are_reported() {
        let analyzer = Analyzer::deterministic(&Config::default());
        let request = AnalysisRequest::new(
            vec![CalendarEvent::new(
                "backwards",
                "Broken sync",
                now() + Duration::hours(10),
                now() + Duration::hours(9),
            )],
            vec![Task::new("t1", "Essay", Priority::High).due(now() - Duration::days(1))],
        );

        let assessment = analyzer.analyze(&request, now()).await;
        assert_eq!(assessment.malformed_event_ids, vec!["backwards"]);
        assert_eq!(assessment.factors.calendar_density, 0.0);
        assert_eq!(assessment.factors.events_next_7_days, 1);
        assert_eq!(assessment.stress_score.total_score, 4);
        assert_eq!(analyzer.transparency().stats().malformed_events, 1);
    }

    #[test]
    fn test_offline_is_deterministic() {
        let config = Config {
            generative: Config::default().generative.with_api_key("sk-test"),
            ..Default::default()
        };
        let analyzer = Analyzer::from_config(&config, true).unwrap();
        assert!(!analyzer.external_enabled());
    }
}
