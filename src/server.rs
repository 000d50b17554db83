//! HTTP surface for Burnout Sentinel.
//!
//! This module provides an HTTP server that:
//! - Runs analyses via POST /api/stress/analyze
//! - Lists calendar sources and events from the configured provider
//! - Keeps a calendar selection per session (`x-session-id` header)
//!
//! # Architecture
//!
//! ```text
//! Web UI ──→ POST /api/stress/analyze ──→ Analyzer ──→ BurnoutAssessment
//!                     │ (no events)
//!                     ↓
//!        CalendarAggregator ←── session selection
//!                     ↓
//!             CalendarProvider
//! ```

use crate::analyzer::{AnalysisRequest, Analyzer};
use crate::calendar::aggregator::{
    demo_tasks, AggregatedCalendar, CalendarAggregator, CalendarError, CalendarProvider,
    ConnectionStatus, DataOrigin, MAX_DAYS_AHEAD,
};
use crate::calendar::normalize::now_wall_clock;
use crate::calendar::selection::CalendarSelection;
use crate::calendar::types::{CalendarEvent, CalendarSource, Task};
use crate::config::Config;
use crate::core::assessment::BurnoutAssessment;
use crate::transparency::{create_shared_log, SharedTransparencyLog, TransparencyStats};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// Header carrying the caller's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Session used when the header is missing.
const ANONYMOUS_SESSION: &str = "default";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Analysis configuration
    pub config: Config,
    /// Never call the generative service
    pub offline: bool,
}

impl ServerConfig {
    pub fn new(port: u16, config: Config) -> Self {
        Self {
            port,
            config,
            offline: false,
        }
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }
}

/// Shared server state
pub struct ServerState {
    analyzer: Analyzer,
    provider: Arc<dyn CalendarProvider>,
    aggregator: CalendarAggregator,
    /// Calendar selection per session
    sessions: RwLock<HashMap<String, CalendarSelection>>,
    default_selection: CalendarSelection,
    zone: Option<Tz>,
    log: SharedTransparencyLog,
}

impl ServerState {
    pub fn new(config: &ServerConfig, provider: Arc<dyn CalendarProvider>) -> anyhow::Result<Self> {
        let log = create_shared_log();
        let analyzer = Analyzer::from_config(&config.config, config.offline)?
            .with_transparency(log.clone());

        Ok(Self {
            analyzer,
            provider,
            aggregator: CalendarAggregator::new(config.config.days_ahead),
            sessions: RwLock::new(HashMap::new()),
            default_selection: config.config.default_selection.clone(),
            zone: config.config.zone()?,
            log,
        })
    }

    fn now(&self) -> NaiveDateTime {
        now_wall_clock(self.zone)
    }

    async fn selection_for(&self, session: &str) -> CalendarSelection {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_else(|| self.default_selection.clone())
    }
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub external_predictions: bool,
    pub stats: TransparencyStats,
}

/// Body of POST /api/stress/analyze. Omitted events are aggregated from the
/// session's selected calendars.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub events: Option<Vec<CalendarEvent>>,
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub assessment: BurnoutAssessment,
    /// Set when events were aggregated server side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_origin: Option<DataOrigin>,
}

#[derive(Serialize)]
pub struct SourcesResponse {
    pub status: ConnectionStatus,
    pub sources: Vec<CalendarSource>,
}

#[derive(Debug, Deserialize)]
pub struct SelectionUpdate {
    pub calendar_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub days_ahead: Option<u32>,
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        external_predictions: state.analyzer.external_enabled(),
        stats: state.log.stats(),
    })
}

/// POST /api/stress/analyze
async fn analyze(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let now = state.now();

    let (events, tasks, data_origin) = match body.events {
        Some(events) => (events, body.tasks.unwrap_or_default(), None),
        None => {
            let selection = state.selection_for(&session_id(&headers)).await;
            let aggregated = state
                .aggregator
                .collect(state.provider.as_ref(), &selection, now)
                .await;
            let tasks = match (body.tasks, aggregated.origin) {
                (Some(tasks), _) => tasks,
                (None, DataOrigin::Demo) => demo_tasks(now),
                (None, DataOrigin::Live) => Vec::new(),
            };
            (aggregated.events, tasks, Some(aggregated.origin))
        }
    };

    let request = AnalysisRequest::new(events, tasks);
    let assessment = state.analyzer.analyze(&request, now).await;

    Json(AnalyzeResponse {
        assessment,
        data_origin,
    })
}

/// GET /api/calendar/sources
async fn sources(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let status = state.provider.connection_status();
    match state.provider.list_sources().await {
        Ok(sources) => Ok(Json(SourcesResponse { status, sources })),
        Err(CalendarError::NotConnected) => Ok(Json(SourcesResponse {
            status,
            sources: Vec::new(),
        })),
        Err(e) => {
            tracing::error!("Failed to list calendar sources: {}", e);
            Err(api_error(StatusCode::BAD_GATEWAY, "CALENDAR_ERROR", e.to_string()))
        }
    }
}

/// GET /api/calendar/selection
async fn get_selection(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Json<CalendarSelection> {
    Json(state.selection_for(&session_id(&headers)).await)
}

/// PUT /api/calendar/selection
async fn put_selection(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<CalendarSelection>, ApiError> {
    let selection = CalendarSelection::new(update.calendar_ids).map_err(|e| {
        api_error(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_SELECTION", e.to_string())
    })?;

    let session = session_id(&headers);
    tracing::info!(session = %session, calendars = selection.len(), "Calendar selection updated");
    state
        .sessions
        .write()
        .await
        .insert(session, selection.clone());

    Ok(Json(selection))
}

/// GET /api/calendar/events
async fn events(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Json<AggregatedCalendar>, ApiError> {
    let aggregator = match query.days_ahead {
        None => state.aggregator.clone(),
        Some(days) if (1..=MAX_DAYS_AHEAD).contains(&days) => CalendarAggregator::new(days),
        Some(days) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_DAYS_AHEAD",
                format!("days_ahead must be between 1 and {MAX_DAYS_AHEAD}, got {days}"),
            ))
        }
    };

    let selection = state.selection_for(&session_id(&headers)).await;
    let aggregated = aggregator
        .collect(state.provider.as_ref(), &selection, state.now())
        .await;
    Ok(Json(aggregated))
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stress/analyze", post(analyze))
        .route("/api/calendar/sources", get(sources))
        .route(
            "/api/calendar/selection",
            get(get_selection).put(put_selection),
        )
        .route("/api/calendar/events", get(events))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://localhost:3000"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    HeaderValue::from_static("http://127.0.0.1:3000"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    provider: Arc<dyn CalendarProvider>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config, provider)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Burnout Sentinel listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
