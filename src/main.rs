use anyhow::Context;
use pixmill::config::Config;
use pixmill::handlers::AppState;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixmill=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let addr = config.addr.clone();
    info!(
        batch_concurrency = config.batch_concurrency,
        max_request_mb = config.max_request_bytes / (1024 * 1024),
        "configuration loaded"
    );

    let app = pixmill::app(Arc::new(AppState::new(config)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("pixmill server running on http://{}", addr);
    info!("API documentation: http://{}/info", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
