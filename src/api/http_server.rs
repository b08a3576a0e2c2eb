// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::parameters::parameters_handler;
use super::process_image::process_image_handler;
use crate::config::ServerConfig;
use crate::cooldown::CaptureGuard;
use crate::intake::MAX_IMAGE_SIZE;
use crate::pipeline::Pipeline;
use crate::version;

/// Request body cap. Base64 of a `MAX_IMAGE_SIZE` image fits with room to
/// spare, so oversize images are rejected by intake as `MALFORMED_INPUT`.
pub const MAX_REQUEST_BODY: usize = MAX_IMAGE_SIZE * 2;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub limiter: Arc<Semaphore>,
    pub cooldown: CaptureGuard,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: &ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            cooldown: CaptureGuard::new(Duration::from_secs(config.capture_cooldown_secs)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub backend_healthy: bool,
    pub policy: String,
    pub available_slots: usize,
    pub version: String,
    pub build_date: String,
    pub features: Vec<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Full pipeline
        .route("/process_image", post(process_image_handler))
        // Mapping only
        .route("/v1/parameters", post(parameters_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("API server listening on {}", addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("API server on {} stopped", addr);
    Ok(())
}

pub async fn start_server(pipeline: Pipeline, config: &ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind).await?;
    let state = AppState::new(pipeline, config);
    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend_healthy = state.pipeline.health_check().await;
    Json(HealthResponse {
        status: if backend_healthy { "healthy" } else { "degraded" }.to_string(),
        backend: state.pipeline.backend_name().to_string(),
        backend_healthy,
        policy: state.pipeline.policy().to_string(),
        available_slots: state.limiter.available_permits(),
        version: version::VERSION_NUMBER.to_string(),
        build_date: version::BUILD_DATE.to_string(),
        features: version::FEATURES.iter().map(|f| f.to_string()).collect(),
    })
}
