use std::time::Duration;

use analytics_ingest::api::TrackEventResponse;
use analytics_ingest::config::EnvMsDuration;
use reqwest::StatusCode;
use serde_json::json;

use crate::common::*;

mod common;

const E1: &str = "0190f6a4-53b2-7d4e-9c5a-6a0b3f1e2d11";
const E2: &str = "0190f6a4-53b2-7d4e-9c5a-6a0b3f1e2d12";

fn view(event_id: &str) -> serde_json::Value {
    json!({
        "event_id": event_id,
        "ts": 1_717_243_200_000_i64,
        "user_id": "6c1f0b9e-1f0e-4c4b-8d55-2a4f4f0c9a10",
        "session_id": "s1",
        "event_name": "post_view",
        "route": "/feed",
        "entity_type": "post",
        "entity_id": "9a1f7c2e-3b4d-4e5f-8a6b-7c8d9e0f1a2b",
        "props_json": {"position": 3}
    })
}

#[tokio::test]
async fn replayed_event_is_stored_once() {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    for _ in 0..2 {
        let response = server.track(view(E1)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: TrackEventResponse = response.json().await.unwrap();
        assert_eq!(body, TrackEventResponse::accepted());
    }

    server.wait_for_rows(1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let inserted = server.store.inserted();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].event_id.as_deref(), Some(E1));
    assert_eq!(inserted[0].properties, r#"{"position":3}"#);
}

#[tokio::test]
async fn event_without_timestamp_is_not_accepted() {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let response = server
        .track(json!({"event_id": E1, "event_name": "post_view"}))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: TrackEventResponse = response.json().await.unwrap();
    assert!(!body.accepted);
    assert!(body.error.is_some());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(server.store.inserted().is_empty());
}

#[tokio::test]
async fn events_survive_store_outage_in_order() {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;
    server.store.set_fail_writes(true);

    server.track(view(E1)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    server.track(view(E2)).await;
    assert!(server.store.insert_calls() > 0);
    assert!(server.store.inserted().is_empty());

    server.store.set_fail_writes(false);
    server.wait_for_rows(2).await;

    let ids: Vec<_> = server
        .store
        .inserted()
        .into_iter()
        .map(|e| e.event_id.unwrap())
        .collect();
    assert_eq!(ids, vec![E1, E2]);
}

#[tokio::test]
async fn shutdown_flushes_buffered_events() {
    let mut config = DEFAULT_CONFIG.clone();
    config.batch_interval_ms = EnvMsDuration(Duration::from_secs(600));
    config.batch_size = 1;
    let server = ServerHandle::for_config(config).await;

    server.track(view(E1)).await;
    server.track(view(E2)).await;
    let store = server.store.clone();
    assert!(store.inserted().is_empty());

    server.stop().await;
    assert_eq!(store.inserted().len(), 2);
}
