use std::sync::Arc;

use tokio::net::TcpListener;

use textgen_service::{AppConfig, ModelRegistry, build_router, logging::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        weights = %config.weights_path.display(),
        vocab = %config.vocab_path.display(),
        config = %config.config_path.display(),
        "loading model artifacts"
    );

    let registry = Arc::new(ModelRegistry::initialize(config.as_ref())?);
    let router = build_router(config.clone(), registry);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}
