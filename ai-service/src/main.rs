use ai_service::config::AiConfig;
use ai_service::startup::Application;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    init_tracing("ai-service", "info", otlp_endpoint.as_deref());
    init_metrics();

    let config = AiConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let app = Application::build(config)
        .await
        .map_err(|e| std::io::Error::other(format!("Startup error: {}", e)))?;

    app.run_until_stopped().await
}
