use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use envconfig::Envconfig;
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use analytics_ingest::config::{Config, EnvMsDuration};
use analytics_ingest::server::serve_with_writer;
use event_store::test_utils::MemoryStore;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| {
    let mut config = Config::init_from_hashmap(&HashMap::new()).unwrap();
    config.export_prometheus = false;
    config.batch_interval_ms = EnvMsDuration(Duration::from_millis(50));
    config
});

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(MemoryStore::new());
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let writer = store.clone();
        let task = tokio::spawn(async move {
            serve_with_writer(config, writer, listener, async move {
                notify.notified().await
            })
            .await
        });
        ServerHandle {
            addr,
            store,
            shutdown,
            task: Some(task),
        }
    }

    pub async fn track(&self, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{:?}/v1/events", self.addr))
            .body(body.to_string())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    /// Polls the store until it holds `count` events or two seconds pass.
    pub async fn wait_for_rows(&self, count: usize) {
        for _ in 0..200 {
            if self.store.inserted().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Triggers a graceful shutdown and waits for the server to exit.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            task.await.unwrap().unwrap();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
