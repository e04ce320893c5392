//! HTTP service exposing `POST /classify`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use toxiguard::api::{self, AppState};
use toxiguard::classifier::ClassifierService;
use toxiguard::config::Config;
use toxiguard::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = logging::init(config.log_dir.as_deref(), "api");

    info!("🚀 Starting toxicity classification API...");

    let service = Arc::new(ClassifierService::new(config.model.clone()));
    // A failed warm-up is retried lazily on the first request
    if let Err(e) = service.warm_up().await {
        warn!("Model not loaded at startup: {e}");
    }

    let app = api::router(AppState::new(service));

    let listener = TcpListener::bind(config.api_addr).await?;
    info!("🌐 HTTP listening on http://{}", config.api_addr);
    info!("🛠 Classify at http://{}/classify", config.api_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
