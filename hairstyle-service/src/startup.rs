//! Application startup and lifecycle management.

use crate::config::HairstyleConfig;
use crate::handlers::{analysis::detect_hairstyle, health::health_check, metrics::metrics_handler};
use crate::services::providers::gemini::{GeminiConfig, GeminiVisionProvider};
use crate::services::providers::VisionProvider;
use crate::services::HairstyleAnalyzer;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use service_core::retry::{Sleeper, TokioSleeper};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state. Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HairstyleConfig>,
    pub analyzer: Arc<HairstyleAnalyzer>,
}

impl AppState {
    pub fn new(
        config: HairstyleConfig,
        provider: Arc<dyn VisionProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let analyzer = HairstyleAnalyzer::new(&config, provider, sleeper);
        Self {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.upload.max_bytes;

    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/detect-hairstyle",
            post(detect_hairstyle).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/metrics", get(metrics_handler))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against the real Gemini API.
    pub async fn build(config: HairstyleConfig) -> Result<Self, AppError> {
        if config.gemini.api_key.expose_secret().is_empty() {
            tracing::warn!("GEMINI_API_KEY is not set; analysis requests will fail");
        }

        let provider = GeminiVisionProvider::new(GeminiConfig {
            api_key: config.gemini.api_key.clone(),
            model: config.gemini.model.clone(),
            api_base: config.gemini.api_base.clone(),
            timeout: config.gemini.timeout,
        })
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        tracing::info!(
            model = %config.gemini.model,
            max_attempts = config.retry.max_attempts(),
            base_delay_ms = config.retry.base_delay().as_millis() as u64,
            "Initialized Gemini vision provider"
        );

        Self::build_with_provider(config, Arc::new(provider), Arc::new(TokioSleeper)).await
    }

    /// Build the application with an explicit provider and sleeper.
    pub async fn build_with_provider(
        config: HairstyleConfig,
        provider: Arc<dyn VisionProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, AppError> {
        // port 0 = random port for testing
        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, provider, sleeper),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            port = self.port,
            "Hairstyle detection server listening on http://localhost:{}",
            self.port
        );

        axum::serve(self.listener, build_router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
