use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use miliki_infra::{AppConfig, AppServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    miliki_observability::init();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let services = Arc::new(AppServices::from_config(config).await?);

    spawn_cache_sweeper(services.clone(), Duration::from_secs(60));

    let app = miliki_api::app::build_app(services);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically drop expired cache entries so idle keys do not accumulate.
fn spawn_cache_sweeper(services: Arc<AppServices>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = services.cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries purged");
            }
        }
    });
}
