use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinnx::config::{AppConfig, DEFAULT_CONFIG_PATH};
use clinnx::lifecycle::Startup;
use clinnx::model::handle::ModelHandle;
use clinnx::model::{loader, AssertionClassifier};
use clinnx::server::routes::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load(DEFAULT_CONFIG_PATH)?;

    loader::init_ort()?;

    // Load the model once at startup; a failure here aborts the
    // process rather than serving a half-initialized API.
    let startup = Startup::new();
    let handle = startup.initialize_with(|| ModelHandle::load(&config.model))?;
    let model_info = handle.info();
    info!(model = %model_info.name, device = %model_info.device, "model loaded");

    let app = create_router(handle);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
