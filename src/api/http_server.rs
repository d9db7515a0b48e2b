// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::segment_image::segment_image_handler;
use crate::config::ServiceConfig;
use crate::version;
use crate::vision::model_manager::{SegmentationModelInfo, SegmentationModelManager};

/// Allowance for multipart boundaries, headers and option fields
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub segmentation_model_manager: Arc<RwLock<Option<Arc<SegmentationModelManager>>>>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(config: ServiceConfig, manager: SegmentationModelManager) -> Self {
        Self {
            segmentation_model_manager: Arc::new(RwLock::new(Some(Arc::new(manager)))),
            config: Arc::new(config),
        }
    }

    /// State with default configuration and no model loaded
    pub fn new_for_test() -> Self {
        Self {
            segmentation_model_manager: Arc::new(RwLock::new(None)),
            config: Arc::new(ServiceConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: Vec<SegmentationModelInfo>,
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_handler))
        .route("/segment-image", post(segment_image_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state.config.bind_address();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("⏹️  Shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let models = match state.segmentation_model_manager.read().await.as_ref() {
        Some(manager) => manager.list_models(),
        None => SegmentationModelManager::empty().list_models(),
    };

    let status = if models.iter().all(|m| m.available) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: version::VERSION_NUMBER.to_string(),
        models,
    })
}
