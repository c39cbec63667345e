//! End-to-end test harness for StageRelay
//!
//! Spawns the emitter and relay routers on ephemeral local ports so tests can
//! drive the whole pipeline over real sockets.

use axum::Router;
use futures::StreamExt;
use stagerelay_core::RelayRecord;
use stagerelay_emitter::{EmitterConfig, EmitterState};
use stagerelay_observability::{HealthState, Metrics, health_router};
use stagerelay_relay::{HttpClientConfig, RelayState, UpstreamClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// A router served in the background
pub struct TestServer {
    pub addr: SocketAddr,
    pub metrics: Arc<Metrics>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Test server failed: {}", e);
        }
    });
    addr
}

/// Emitter with the built-in stages and no pause between them
pub async fn spawn_emitter(fault_rate: f64) -> TestServer {
    spawn_emitter_with(EmitterConfig::new(fault_rate, Duration::ZERO).unwrap()).await
}

pub async fn spawn_emitter_with(config: EmitterConfig) -> TestServer {
    let metrics = Arc::new(Metrics::new().unwrap());
    let app = stagerelay_emitter::router(EmitterState::new(config, metrics.clone()))
        .merge(health_router(HealthState::new(metrics.clone(), "emitter")));
    TestServer {
        addr: spawn(app).await,
        metrics,
    }
}

/// Relay forwarding to `upstream_url`
pub async fn spawn_relay(upstream_url: &str) -> TestServer {
    let metrics = Arc::new(Metrics::new().unwrap());
    let client = UpstreamClient::new(upstream_url, &HttpClientConfig::default()).unwrap();
    let app = stagerelay_relay::router(RelayState::new(client, metrics.clone()))
        .merge(health_router(HealthState::new(metrics.clone(), "relay")));
    TestServer {
        addr: spawn(app).await,
        metrics,
    }
}

/// POST `text` to the relay and collect every record of the session
pub async fn run_session(relay: &TestServer, text: &str) -> Vec<RelayRecord> {
    let response = reqwest::Client::new()
        .post(relay.url("/analysis"))
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "status {}", response.status());

    eventsource_stream::EventStream::new(response.bytes_stream())
        .map(|event| serde_json::from_str(&event.unwrap().data).unwrap())
        .collect()
        .await
}
