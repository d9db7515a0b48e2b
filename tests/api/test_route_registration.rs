// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration and health endpoint tests

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use mobilesam_segmentation::{
    api::http_server::{create_app, AppState, HealthResponse},
    vision::{MobileSamModel, SegmentationModelManager},
};
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::EmptyGenerator;

async fn get_health(state: AppState) -> HealthResponse {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = create_app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_degraded_without_model() {
    let health = get_health(AppState::new_for_test()).await;
    assert_eq!(health.status, "degraded");
    assert_eq!(health.models.len(), 1);
    assert!(!health.models[0].available);
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn test_health_healthy_with_model() {
    let state = AppState::new_for_test();
    let model = MobileSamModel::with_generator(Arc::new(EmptyGenerator));
    *state.segmentation_model_manager.write().await =
        Some(Arc::new(SegmentationModelManager::with_model(model)));

    let health = get_health(state).await;
    assert_eq!(health.status, "healthy");
    assert!(health.models[0].available);
}

#[tokio::test]
async fn test_segment_image_rejects_get() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/segment-image")
        .body(Body::empty())
        .unwrap();

    let response = create_app(AppState::new_for_test())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/segment")
        .body(Body::empty())
        .unwrap();

    let response = create_app(AppState::new_for_test())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
