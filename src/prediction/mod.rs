//! Narrative predictions, optionally from an external generative service.
//!
//! This module contains:
//! - The bounded context and prompt sent to the service
//! - The retry/backoff state machine for throttled calls
//! - Reply extraction and schema validation
//! - The external and deterministic producers, and the adapter picking one

pub mod client;
pub mod context;
pub mod fallback;
pub mod retry;
pub mod schema;
pub mod strategy;

// Re-export commonly used types
#[cfg(feature = "generative")]
pub use client::HttpGenerativeClient;
pub use client::{GenerationError, GenerationRequest, GenerativeConfig, GenerativeService};
#[cfg(any(test, feature = "test-util"))]
pub use client::ScriptedService;
pub use context::{BoundedContext, ContextLimits, PredictionContext};
pub use fallback::FallbackStrategy;
#[cfg(any(test, feature = "test-util"))]
pub use retry::RecordingSleeper;
pub use retry::{
    AttemptEvent, AttemptState, FallbackReason, RetryPolicy, Sleeper, TokioSleeper,
};
pub use schema::{extract_json, parse_reply, SchemaError, SchemaRules};
pub use strategy::{
    ExternalStrategy, PredictionAdapter, PredictionConfig, PredictionOutcome, PredictionOutput,
    PredictionProducer, Production,
};
