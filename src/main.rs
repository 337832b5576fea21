use std::sync::Arc;

use tokio::net::TcpListener;

use edubot_gateway::{
    AppConfig, GenerationPipeline, build_router, config::load_dotenv, telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        upstream = %config.upstream_url,
        backend = ?config.backend_url.as_ref().map(|url| url.as_str()),
        timeout_secs = config.upstream_timeout.as_secs(),
        retry_budget = config.retry_budget,
        "configuring generation pipeline"
    );

    let pipeline = Arc::new(GenerationPipeline::from_config(&config)?);
    let router = build_router(pipeline);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "EduBot API server ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
