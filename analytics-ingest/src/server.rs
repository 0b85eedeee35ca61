use std::future::Future;
use std::sync::Arc;

use common_metrics::setup_metrics_routes;
use event_store::{ClickHouseStore, EventWriter};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::buffer::BatchBuffer;
use crate::config::Config;
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = ClickHouseStore::new(&config.clickhouse);
    // Not fatal: the schema is applied again before the first write.
    if let Err(err) = store.ensure_schema().await {
        warn!("event store not ready at startup: {}", err);
    }

    serve_with_writer(config, Arc::new(store), listener, shutdown).await
}

/// Runs the ingestion endpoint against any event writer until `shutdown`
/// resolves, then flushes whatever is still buffered.
pub async fn serve_with_writer<F>(
    config: Config,
    writer: Arc<dyn EventWriter>,
    listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let buffer = Arc::new(BatchBuffer::new(
        writer,
        config.batch_size,
        config.batch_interval_ms.0,
        config.dedup_window_max,
    ));
    let stop_flushing = CancellationToken::new();
    let flush_task = buffer.start(stop_flushing.clone());

    let app = router::router(buffer.clone(), config.max_concurrent_requests);
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

    // Let a write in progress settle before draining what is left.
    stop_flushing.cancel();
    if let Err(err) = flush_task.await {
        error!("flush task failed: {}", err);
    }
    buffer.drain().await;
    Ok(())
}
