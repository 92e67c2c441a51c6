use hairstyle_service::config::HairstyleConfig;
use hairstyle_service::services::metrics;
use hairstyle_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = HairstyleConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "hairstyle-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    metrics::init_metrics().map_err(|e| {
        tracing::error!("Failed to register metrics: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
