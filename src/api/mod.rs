//! HTTP API server for the VidyaMitra gateway

pub mod chat;
pub mod content;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod tts;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::LlmClient;
use crate::Result;
use crate::voice::RemoteTts;

/// Shared state for API handlers
pub struct ApiState {
    pub llm: Arc<LlmClient>,
    /// Direct client for the upstream speech service
    pub tts: Arc<RemoteTts>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    llm: Arc<LlmClient>,
    tts: Arc<RemoteTts>,
    port: u16,
    rate_limit: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(llm: Arc<LlmClient>, tts: Arc<RemoteTts>, port: u16) -> Self {
        Self {
            llm,
            tts,
            port,
            rate_limit: None,
        }
    }

    /// Build from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = Arc::new(LlmClient::from_config(&config.llm)?);
        let tts = Arc::new(RemoteTts::upstream(
            config.voice.tts_upstream_url.clone(),
            config.voice.tts_timeout,
        )?);

        Ok(Self::new(llm, tts, config.api_server.port).rate_limit(config.api_server.rate_limit))
    }

    /// Requests per minute across all routes (`None` disables limiting)
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            llm: self.llm,
            tts: self.tts,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Port the server binds to
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Completion client shared by the AI routes
    #[must_use]
    pub fn llm(&self) -> &Arc<LlmClient> {
        &self.state.llm
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(tts::router(self.state.clone()))
            .merge(chat::router(self.state.clone()))
            .merge(content::router(self.state.clone()))
            .merge(health::status_router(self.state.clone()))
            .merge(health::router());

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // Browser frontends call from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.rate_limiter.is_some() {
            tracing::info!("rate limiting active");
        }
        if !self.state.llm.is_configured() {
            tracing::warn!("GROQ_API_KEY not set, AI routes will answer 503");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
