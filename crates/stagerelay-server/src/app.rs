//! Router assembly for each server role

use crate::config::ServerConfig;
use axum::Router;
use http::{HeaderValue, Method, header};
use stagerelay_emitter::EmitterState;
use stagerelay_observability::{HealthState, Metrics, health_router};
use stagerelay_relay::{RelayState, UpstreamClient};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Emitter role: `/analyze`, `/analyze/events` and the health endpoints
pub fn emitter_app(config: &ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Router> {
    let state = EmitterState::new(config.emitter_config()?, metrics.clone());

    Ok(stagerelay_emitter::router(state)
        .merge(health_router(HealthState::new(metrics, "emitter")))
        .layer(cors_layer(&config.emitter.cors_origin)?)
        .layer(TraceLayer::new_for_http()))
}

/// Relay role: `/analysis` and the health endpoints
pub fn relay_app(config: &ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Router> {
    let client = UpstreamClient::new(&config.relay.upstream_url, &config.http_client_config())?;
    let state = RelayState::new(client, metrics.clone());

    Ok(stagerelay_relay::router(state)
        .merge(health_router(HealthState::new(metrics, "relay")))
        .layer(cors_layer(&config.relay.cors_origin)?)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
