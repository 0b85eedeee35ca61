use std::future::Future;
use std::sync::Arc;

use common_metrics::setup_metrics_routes;
use event_store::{ClickHouseStore, EventReader};
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::RecommendationCache;
use crate::config::Config;
use crate::content::{ContentMetadata, HttpContentClient};
use crate::recommender::Recommender;
use crate::router;
use crate::time::{SystemTime, TimeSource};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = ClickHouseStore::new(&config.clickhouse);
    let content = HttpContentClient::new(
        &config.content_api_url,
        config.content_tags_timeout_ms.0,
        config.content_search_timeout_ms.0,
    )?;

    serve_with(
        config,
        Arc::new(store),
        Arc::new(content),
        Arc::new(SystemTime {}),
        listener,
        shutdown,
    )
    .await
}

/// Runs the recommendation endpoint on the given sources until `shutdown`
/// resolves.
pub async fn serve_with<F>(
    config: Config,
    reader: Arc<dyn EventReader>,
    content: Arc<dyn ContentMetadata>,
    timesource: Arc<dyn TimeSource + Send + Sync>,
    listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cache = RecommendationCache::new(
        time::Duration::minutes(i64::from(config.reco_cache_ttl_minutes)),
        config.reco_cache_enabled,
        timesource,
    );
    let recommender = Arc::new(Recommender::new(reader, content, cache));

    let app = router::router(recommender, config.max_concurrent_requests);
    // Don't install metrics unless asked to, the recorder is process-global.
    let app = if config.export_prometheus {
        setup_metrics_routes(app)?
    } else {
        app
    };

    info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
