//! Client for the external generative-text service.
//!
//! The service is reached through the [`GenerativeService`] trait. The HTTP
//! implementation speaks a Messages-style JSON API and is only compiled with
//! the `generative` feature.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

/// Environment variables checked (in order) for the API key.
pub const API_KEY_ENV_VARS: &[&str] = &["BURNOUT_SENTINEL_API_KEY", "ANTHROPIC_API_KEY"];

/// Generative service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    /// Full URL of the messages endpoint
    pub endpoint: String,
    pub model: String,
    /// Never written to disk; read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Per-request timeout
    #[serde(with = "crate::config::duration_serde")]
    pub timeout: Duration,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key: None,
            api_version: "2023-06-01".to_string(),
            max_tokens: 1000,
            temperature: 0.5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GenerativeConfig {
    /// Fill `api_key` from the environment if not already set.
    pub fn with_env_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_ENV_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty());
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Whether enough is configured to attempt a call.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
            && self
                .api_key
                .as_deref()
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false)
    }
}

/// Generative service error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The service asked us to slow down
    Throttled,
    /// Network/HTTP error
    Network(String),
    /// Service returned an error response
    Server { status: u16, message: String },
    /// Reply body could not be decoded
    Serialization(String),
    /// Client could not be built from its configuration
    NotConfigured(String),
}

impl GenerationError {
    /// Only throttling is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Throttled)
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Throttled => write!(f, "Generative service throttled the request"),
            GenerationError::Network(msg) => write!(f, "Generative network error: {msg}"),
            GenerationError::Server { status, message } => {
                write!(f, "Generative server error ({status}): {message}")
            }
            GenerationError::Serialization(msg) => {
                write!(f, "Generative serialization error: {msg}")
            }
            GenerationError::NotConfigured(msg) => {
                write!(f, "Generative service not configured: {msg}")
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// One prompt for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Something that turns a prompt into reply text.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Capability flag: whether calls may be attempted at all.
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedService;

#[cfg(any(test, feature = "test-util"))]
mod scripted {
    use super::{GenerationError, GenerationRequest, GenerativeService};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A service replaying canned results, then repeating the last one.
    #[derive(Debug)]
    pub struct ScriptedService {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        last: Mutex<Option<Result<String, GenerationError>>>,
        calls: AtomicUsize,
        available: bool,
    }

    impl ScriptedService {
        pub fn new(replies: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                available: true,
            }
        }

        /// A service whose capability flag is off.
        pub fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeService for ScriptedService {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
            let mut last = self
                .last
                .lock()
                .map_err(|e| GenerationError::Network(e.to_string()))?;
            match next {
                Some(reply) => {
                    *last = Some(reply.clone());
                    reply
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(GenerationError::Network("no scripted reply".to_string()))),
            }
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }
}

#[cfg(feature = "generative")]
pub use http::HttpGenerativeClient;

#[cfg(feature = "generative")]
mod http {
    use super::{GenerationError, GenerationRequest, GenerativeConfig, GenerativeService};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    struct MessagesRequest<'a> {
        model: &'a str,
        max_tokens: u32,
        temperature: f64,
        system: &'a str,
        messages: Vec<Message<'a>>,
    }

    #[derive(Debug, Serialize)]
    struct Message<'a> {
        role: &'static str,
        content: &'a str,
    }

    #[derive(Debug, Deserialize)]
    struct MessagesResponse {
        #[serde(default)]
        content: Vec<ContentBlock>,
    }

    #[derive(Debug, Deserialize)]
    struct ContentBlock {
        #[serde(default)]
        text: Option<String>,
    }

    /// HTTP client for a Messages-style endpoint.
    pub struct HttpGenerativeClient {
        config: GenerativeConfig,
        client: reqwest::Client,
    }

    impl HttpGenerativeClient {
        /// Create a new client.
        pub fn new(config: GenerativeConfig) -> Result<Self, GenerationError> {
            let client = reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| GenerationError::NotConfigured(e.to_string()))?;
            Ok(Self { config, client })
        }

        pub fn config(&self) -> &GenerativeConfig {
            &self.config
        }
    }

    #[async_trait]
    impl GenerativeService for HttpGenerativeClient {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let api_key = self
                .config
                .api_key
                .as_deref()
                .ok_or_else(|| GenerationError::NotConfigured("missing API key".to_string()))?;

            let body = MessagesRequest {
                model: &self.config.model,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                system: &request.system,
                messages: vec![Message {
                    role: "user",
                    content: &request.prompt,
                }],
            };

            let response = self
                .client
                .post(&self.config.endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", &self.config.api_version)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| GenerationError::Network(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(GenerationError::Throttled);
            }
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(GenerationError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            let reply: MessagesResponse = response
                .json()
                .await
                .map_err(|e| GenerationError::Serialization(e.to_string()))?;

            reply
                .content
                .into_iter()
                .find_map(|block| block.text)
                .ok_or_else(|| GenerationError::Serialization("reply has no text block".to_string()))
        }

        fn is_available(&self) -> bool {
            self.config.is_configured()
        }
    }
}
