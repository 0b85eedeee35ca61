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

use event_store::test_utils::MemoryStore;
use reco_service::api::GetRecommendationsResponse;
use reco_service::config::Config;
use reco_service::content::HttpContentClient;
use reco_service::server::serve_with;
use reco_service::time::SystemTime;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| {
    let mut config = Config::init_from_hashmap(&HashMap::new()).unwrap();
    config.export_prometheus = false;
    config
});

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    /// Serves recommendations from `store` and from the content service
    /// reachable at `content_url`.
    pub async fn for_sources(store: Arc<MemoryStore>, content_url: &str) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        let content = HttpContentClient::new(
            content_url,
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();

        tokio::spawn(async move {
            serve_with(
                DEFAULT_CONFIG.clone(),
                store,
                Arc::new(content),
                Arc::new(SystemTime {}),
                listener,
                async move { notify.notified().await },
            )
            .await
        });
        ServerHandle { addr, shutdown }
    }

    pub async fn recommend(&self, body: Value) -> GetRecommendationsResponse {
        let response = reqwest::Client::new()
            .post(format!("http://{:?}/v1/recommendations", self.addr))
            .body(body.to_string())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("invalid response body")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
