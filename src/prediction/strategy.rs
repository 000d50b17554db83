//! Prediction producers and the adapter choosing between them.
//!
//! [`ExternalStrategy`] asks the generative service and drives the retry
//! state machine; [`FallbackStrategy`] is deterministic. The adapter picks
//! one per call from the capability flag and falls back whenever the
//! external attempt ends in `FallenBack`.

use crate::core::assessment::PredictionSource;
use crate::core::interventions::{rank, select, Intervention};
use crate::prediction::client::{GenerationRequest, GenerativeService};
use crate::prediction::context::{
    render_prompt, BoundedContext, ContextLimits, PredictionContext, SYSTEM_PROMPT,
};
use crate::prediction::fallback::FallbackStrategy;
use crate::prediction::retry::{
    AttemptEvent, AttemptState, FallbackReason, RetryPolicy, Sleeper,
};
use crate::prediction::schema::{parse_reply, SchemaRules, ValidatedReply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Predictions and interventions for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionOutput {
    pub predictions: Vec<String>,
    pub interventions: Vec<Intervention>,
}

/// What one producer returned, with the trace of any external calls.
#[derive(Debug, Clone)]
pub struct Production {
    /// `None` when the producer gave up
    pub output: Option<PredictionOutput>,
    pub final_state: AttemptState,
    pub calls: u32,
    pub waits: Vec<Duration>,
}

impl Production {
    /// A result produced without calling anything.
    pub fn local(output: PredictionOutput) -> Self {
        Self {
            output: Some(output),
            final_state: AttemptState::FallenBack(FallbackReason::Disabled),
            calls: 0,
            waits: Vec::new(),
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match (self.final_state, &self.output) {
            (AttemptState::FallenBack(reason), _) => Some(reason),
            (_, None) => Some(FallbackReason::SchemaMismatch),
            _ => None,
        }
    }
}

/// Contract shared by the external and fallback producers.
#[async_trait]
pub trait PredictionProducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Origin recorded on assessments built from this producer's output.
    fn source(&self) -> PredictionSource;

    async fn produce(&self, ctx: &PredictionContext<'_>) -> Production;
}

/// Prediction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub limits: ContextLimits,
    /// Exact number of predictions an external reply must carry
    pub prediction_count: usize,
    pub max_interventions: usize,
    /// Use interventions proposed by the service instead of the deterministic ones
    pub regenerate_interventions: bool,
    pub retry: RetryPolicy,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            limits: ContextLimits::default(),
            prediction_count: 3,
            max_interventions: 5,
            regenerate_interventions: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl PredictionConfig {
    pub fn schema_rules(&self) -> SchemaRules {
        SchemaRules {
            prediction_count: self.prediction_count,
            max_interventions: self.max_interventions,
        }
    }
}

/// Trace of one external attempt.
struct ExternalRun {
    state: AttemptState,
    calls: u32,
    waits: Vec<Duration>,
    reply: Option<ValidatedReply>,
}

/// Calls the generative service with retry/backoff on throttling.
pub struct ExternalStrategy {
    service: Arc<dyn GenerativeService>,
    sleeper: Arc<dyn Sleeper>,
    config: PredictionConfig,
}

impl ExternalStrategy {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        sleeper: Arc<dyn Sleeper>,
        config: PredictionConfig,
    ) -> Self {
        Self {
            service,
            sleeper,
            config,
        }
    }

    /// Capability flag of the underlying service.
    pub fn is_enabled(&self) -> bool {
        self.service.is_available()
    }

    pub fn request_for(&self, ctx: &PredictionContext<'_>) -> GenerationRequest {
        let bounded = BoundedContext::from_context(ctx, &self.config.limits);
        GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: render_prompt(
                &bounded,
                self.config.prediction_count,
                self.config.max_interventions,
            ),
        }
    }

    /// Drive the attempt state machine to a terminal state.
    async fn run(&self, ctx: &PredictionContext<'_>) -> ExternalRun {
        let policy = &self.config.retry;
        let rules = self.config.schema_rules();
        let enabled = self.is_enabled();

        let mut state = AttemptState::NotAttempted;
        let mut calls = 0;
        let mut waits = Vec::new();
        let mut reply = None;
        let mut request: Option<GenerationRequest> = None;

        while !state.is_terminal() {
            state = match state {
                AttemptState::NotAttempted => {
                    policy.next(state, AttemptEvent::Start { enabled })
                }
                AttemptState::Calling(retries) => {
                    calls += 1;
                    let req = request.get_or_insert_with(|| self.request_for(ctx));
                    match self.service.generate(req).await {
                        Ok(text) => match parse_reply(&text, &rules) {
                            Ok(valid) => {
                                reply = Some(valid);
                                policy.next(state, AttemptEvent::Succeeded)
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Generative reply rejected");
                                policy.next(state, AttemptEvent::Malformed)
                            }
                        },
                        Err(e) if e.is_retryable() => {
                            tracing::warn!(retries, "Generative service throttled");
                            policy.next(state, AttemptEvent::Throttled)
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Generative call failed");
                            policy.next(state, AttemptEvent::Failed)
                        }
                    }
                }
                AttemptState::Retrying(retry) => {
                    let delay = policy.delay_for(retry);
                    tracing::debug!(retry, delay_ms = delay.as_millis() as u64, "Backing off");
                    waits.push(delay);
                    self.sleeper.sleep(delay).await;
                    policy.next(state, AttemptEvent::BackoffElapsed)
                }
                terminal => terminal,
            };
        }

        ExternalRun {
            state,
            calls,
            waits,
            reply,
        }
    }

    fn output_from(&self, reply: ValidatedReply, ctx: &PredictionContext<'_>) -> PredictionOutput {
        let regenerate = self.config.regenerate_interventions && !reply.interventions.is_empty();
        let interventions = if regenerate {
            select(rank(reply.interventions), self.config.max_interventions)
        } else {
            ctx.interventions.to_vec()
        };
        PredictionOutput {
            predictions: reply.predictions,
            interventions,
        }
    }
}

#[async_trait]
impl PredictionProducer for ExternalStrategy {
    fn name(&self) -> &'static str {
        "external"
    }

    fn source(&self) -> PredictionSource {
        PredictionSource::External
    }

    async fn produce(&self, ctx: &PredictionContext<'_>) -> Production {
        let ExternalRun {
            state,
            calls,
            waits,
            reply,
        } = self.run(ctx).await;

        let output = match (state, reply) {
            (AttemptState::Succeeded, Some(reply)) => Some(self.output_from(reply, ctx)),
            _ => None,
        };
        Production {
            output,
            final_state: state,
            calls,
            waits,
        }
    }
}

/// Result of [`PredictionAdapter::generate`].
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub output: PredictionOutput,
    pub source: PredictionSource,
    pub final_state: AttemptState,
    pub calls: u32,
    pub waits: Vec<Duration>,
}

impl PredictionOutcome {
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self.final_state {
            AttemptState::FallenBack(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Always yields a complete result, preferring the external service.
pub struct PredictionAdapter {
    external: Option<ExternalStrategy>,
    fallback: FallbackStrategy,
}

impl PredictionAdapter {
    /// An adapter that only uses the deterministic path.
    pub fn deterministic() -> Self {
        Self {
            external: None,
            fallback: FallbackStrategy::new(),
        }
    }

    pub fn with_external(external: ExternalStrategy) -> Self {
        Self {
            external: Some(external),
            fallback: FallbackStrategy::new(),
        }
    }

    /// Capability predicate selecting the strategy.
    pub fn external_enabled(&self) -> bool {
        self.external
            .as_ref()
            .map(ExternalStrategy::is_enabled)
            .unwrap_or(false)
    }

    /// Producer picked for this call by the capability flag.
    fn producer(&self) -> &dyn PredictionProducer {
        match &self.external {
            Some(external) if external.is_enabled() => external,
            _ => &self.fallback,
        }
    }

    pub async fn generate(&self, ctx: &PredictionContext<'_>) -> PredictionOutcome {
        let producer = self.producer();
        let first = producer.produce(ctx).await;

        let reason = match first.fallback_reason() {
            Some(reason) => reason,
            None => {
                tracing::info!(
                    producer = producer.name(),
                    calls = first.calls,
                    "Predictions accepted"
                );
                return PredictionOutcome {
                    output: first.output.unwrap_or_default(),
                    source: producer.source(),
                    final_state: first.final_state,
                    calls: first.calls,
                    waits: first.waits,
                };
            }
        };

        let output = match first.output {
            // The deterministic producer reports `Disabled` with its output.
            Some(output) => output,
            None => {
                tracing::warn!(
                    %reason,
                    calls = first.calls,
                    "Falling back to deterministic predictions"
                );
                let fallback: &dyn PredictionProducer = &self.fallback;
                fallback.produce(ctx).await.output.unwrap_or_default()
            }
        };
        if reason == FallbackReason::Disabled {
            tracing::debug!("Using deterministic predictions");
        }

        PredictionOutcome {
            output,
            source: PredictionSource::Fallback,
            final_state: AttemptState::FallenBack(reason),
            calls: first.calls,
            waits: first.waits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interventions::InterventionType;
    use crate::core::stress::{StressFactors, StressScore, StressScorer};
    use crate::core::window::AnalysisWindow;
    use crate::prediction::client::{GenerationError, ScriptedService};
    use crate::prediction::retry::RecordingSleeper;
    use chrono::{NaiveDate, NaiveDateTime};

    const GOOD_REPLY: &str = r#"{"predictions": ["one", "two", "three"],
        "interventions": [{"type": "delegate", "priority": "high", "title": "Share the lab write-up",
        "description": "Split sections with your partner", "impact_score": 60, "effort_score": 30}]}"#;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    struct Fixture {
        factors: StressFactors,
        score: StressScore,
        interventions: Vec<Intervention>,
    }

    impl Fixture {
        fn new() -> Self {
            let factors = StressFactors::default();
            let score = StressScorer::default().compute_score(&factors, now());
            Self {
                factors,
                score,
                interventions: vec![Intervention::maintain_balance()],
            }
        }

        fn ctx(&self) -> PredictionContext<'_> {
            PredictionContext {
                events: &[],
                tasks: &[],
                factors: &self.factors,
                score: &self.score,
                interventions: &self.interventions,
                window: AnalysisWindow::new(now(), 7),
            }
        }
    }

    fn adapter(service: Arc<ScriptedService>, sleeper: Arc<RecordingSleeper>) -> PredictionAdapter {
        PredictionAdapter::with_external(ExternalStrategy::new(
            service,
            sleeper,
            PredictionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_three_throttles_then_success() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([
            Err(GenerationError::Throttled),
            Err(GenerationError::Throttled),
            Err(GenerationError::Throttled),
            Ok(GOOD_REPLY.to_string()),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = adapter(service.clone(), sleeper.clone())
            .generate(&fixture.ctx())
            .await;

        assert_eq!(outcome.source, PredictionSource::External);
        assert_eq!(outcome.final_state, AttemptState::Succeeded);
        assert_eq!(service.calls(), 4);
        let expected = vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ];
        assert_eq!(sleeper.waits(), expected);
        assert_eq!(outcome.waits, expected);
        assert_eq!(outcome.output.predictions, vec!["one", "two", "three"]);
        assert_eq!(outcome.output.interventions[0].kind, InterventionType::Delegate);
    }

    #[tokio::test]
    async fn test_persistent_throttling_falls_back() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([Err(GenerationError::Throttled)]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = adapter(service.clone(), sleeper.clone())
            .generate(&fixture.ctx())
            .await;

        assert_eq!(outcome.source, PredictionSource::Fallback);
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::RetriesExhausted));
        assert_eq!(service.calls(), 4);
        assert_eq!(sleeper.waits().len(), 3);
        assert_eq!(outcome.output.interventions, fixture.interventions);
    }

    #[tokio::test]
    async fn test_non_retryable_error_skips_backoff() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([Err(GenerationError::Server {
            status: 500,
            message: "boom".to_string(),
        })]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = adapter(service.clone(), sleeper.clone())
            .generate(&fixture.ctx())
            .await;

        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::NonRetryable));
        assert_eq!(service.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([Ok(
            r#"{"predictions": ["just one"]}"#.to_string()
        )]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = adapter(service.clone(), sleeper).generate(&fixture.ctx()).await;

        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::SchemaMismatch));
        assert_eq!(service.calls(), 1);
        assert_eq!(outcome.source, PredictionSource::Fallback);
    }

    #[tokio::test]
    async fn test_capability_flag_unset_is_deterministic() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::unavailable());
        let adapter = adapter(service.clone(), Arc::new(RecordingSleeper::new()));
        assert!(!adapter.external_enabled());

        let first = adapter.generate(&fixture.ctx()).await;
        let second = adapter.generate(&fixture.ctx()).await;

        assert_eq!(service.calls(), 0);
        assert_eq!(first.fallback_reason(), Some(FallbackReason::Disabled));
        assert_eq!(first.output, second.output);
    }

    #[tokio::test]
    async fn test_keeps_deterministic_interventions_when_not_regenerating() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([Ok(GOOD_REPLY.to_string())]));
        let config = PredictionConfig {
            regenerate_interventions: false,
            ..Default::default()
        };
        let strategy = ExternalStrategy::new(service, Arc::new(RecordingSleeper::new()), config);

        let production = strategy.produce(&fixture.ctx()).await;
        assert_eq!(production.final_state, AttemptState::Succeeded);
        assert_eq!(production.calls, 1);
        let output = production.output.unwrap();
        assert_eq!(output.predictions, vec!["one", "two", "three"]);
        assert_eq!(output.interventions, fixture.interventions);
        assert_eq!(strategy.name(), "external");
    }

    #[tokio::test]
    async fn test_failed_production_has_no_output() {
        let fixture = Fixture::new();
        let service = Arc::new(ScriptedService::new([Err(GenerationError::Server {
            status: 401,
            message: "bad key".to_string(),
        })]));
        let strategy = ExternalStrategy::new(
            service,
            Arc::new(RecordingSleeper::new()),
            PredictionConfig::default(),
        );

        let production = strategy.produce(&fixture.ctx()).await;
        assert!(production.output.is_none());
        assert_eq!(production.fallback_reason(), Some(FallbackReason::NonRetryable));
        assert_eq!(strategy.source(), PredictionSource::External);
    }
}
