// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Endpoint tests for POST /segment-image
//!
//! These tests verify that:
//! - Successful uploads return a PNG overlay
//! - Options are read from the query string and from form fields
//! - Every rejection path maps to the documented status and detail
//! - A missing model yields 503
//! - Transparent uploads are composited over an opaque base

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use mobilesam_segmentation::{
    api::http_server::{create_app, AppState},
    config::ServiceConfig,
    vision::{MaskGenerator, MobileSamModel, SegmentationModelManager},
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use crate::common::{
    multipart_body, png_fixture, EmptyGenerator, FailingGenerator, HalfMaskGenerator, Part,
};

/// Helper: AppState with the given generator behind the model
fn state_with_generator(generator: Arc<dyn MaskGenerator>) -> AppState {
    state_with_config(generator, ServiceConfig::default())
}

fn state_with_config(generator: Arc<dyn MaskGenerator>, config: ServiceConfig) -> AppState {
    let model = MobileSamModel::with_generator(generator);
    AppState::new(config, SegmentationModelManager::with_model(model))
}

async fn post_segment(state: AppState, uri: &str, parts: &[Part<'_>]) -> Response {
    let (content_type, body) = multipart_body(parts);
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();

    create_app(state).oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn png_dimensions(response: Response) -> (u32, u32) {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let image = image::load_from_memory(&bytes).expect("response should be a valid image");
    (image.width(), image.height())
}

#[tokio::test]
async fn test_segment_image_returns_png() {
    let png = png_fixture(128, 64);
    let response = post_segment(
        state_with_generator(Arc::new(HalfMaskGenerator)),
        "/segment-image",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    // use_retina defaults to true: original size
    assert_eq!(png_dimensions(response).await, (128, 64));
}

#[tokio::test]
async fn test_segment_image_without_retina_returns_resized() {
    let png = png_fixture(128, 64);
    let response = post_segment(
        state_with_generator(Arc::new(HalfMaskGenerator)),
        "/segment-image?input_size=64",
        &[
            Part::File {
                content_type: Some("image/png"),
                bytes: &png,
            },
            Part::Text {
                name: "use_retina",
                value: "false",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(png_dimensions(response).await, (64, 32));
}

#[tokio::test]
async fn test_form_field_overrides_query() {
    let png = png_fixture(100, 100);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image?input_size=64&use_retina=true",
        &[
            Part::Text {
                name: "use_retina",
                value: "off",
            },
            Part::File {
                content_type: Some("image/png"),
                bytes: &png,
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(png_dimensions(response).await, (64, 64));
}

#[tokio::test]
async fn test_segment_image_with_bbox() {
    let png = png_fixture(64, 64);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[
            Part::File {
                content_type: Some("image/png"),
                bytes: &png,
            },
            Part::Text {
                name: "bbox",
                value: "4,4,40,40",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_file_is_422() {
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[Part::Text {
            name: "input_size",
            value: "512",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["detail"], "file field is required");
    assert_eq!(json["field"], "file");
}

#[tokio::test]
async fn test_non_image_content_type_is_400() {
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[Part::File {
            content_type: Some("text/plain"),
            bytes: b"hello",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Invalid image file");
}

#[tokio::test]
async fn test_missing_content_type_is_400() {
    let png = png_fixture(8, 8);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[Part::File {
            content_type: None,
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Invalid image file");
}

#[tokio::test]
async fn test_undecodable_image_is_400() {
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: b"definitely not a png",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Error processing image");
}

#[tokio::test]
async fn test_invalid_bbox_is_400() {
    let png = png_fixture(16, 16);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image?bbox=1,2,3",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(
        json["detail"],
        "Invalid bbox parameter. Expected format: left,upper,right,lower"
    );
    assert_eq!(json["field"], "bbox");
}

#[tokio::test]
async fn test_input_size_out_of_range_is_400() {
    let png = png_fixture(16, 16);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image?input_size=4096",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["field"], "input_size");
}

#[tokio::test]
async fn test_invalid_boolean_is_400() {
    let png = png_fixture(16, 16);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image",
        &[
            Part::File {
                content_type: Some("image/png"),
                bytes: &png,
            },
            Part::Text {
                name: "better_quality",
                value: "sometimes",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["field"], "better_quality");
}

#[tokio::test]
async fn test_model_not_loaded_is_503() {
    let png = png_fixture(16, 16);
    let response = post_segment(
        AppState::new_for_test(),
        "/segment-image",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await["detail"],
        "Segmentation model not loaded"
    );
}

#[tokio::test]
async fn test_segmentation_failure_is_400() {
    let png = png_fixture(16, 16);
    let response = post_segment(
        state_with_generator(Arc::new(FailingGenerator)),
        "/segment-image",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Error processing image");
}

#[tokio::test]
async fn test_upload_over_limit_is_413() {
    let config = ServiceConfig {
        max_upload_bytes: 16,
        ..Default::default()
    };
    let png = png_fixture(64, 64);
    assert!(png.len() > 16);

    let response = post_segment(
        state_with_config(Arc::new(EmptyGenerator), config),
        "/segment-image",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_json_body_is_400() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/segment-image")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"file": "abc"}"#))
        .unwrap();

    let response = create_app(state_with_generator(Arc::new(EmptyGenerator)))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_duplicate_query_parameter_is_json_400() {
    let png = png_fixture(32, 32);
    let response = post_segment(
        state_with_generator(Arc::new(EmptyGenerator)),
        "/segment-image?input_size=64&input_size=128",
        &[Part::File {
            content_type: Some("image/png"),
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error_type"], "invalid_request");
    assert!(json["detail"].as_str().unwrap().contains("input_size"));
}

#[tokio::test]
async fn test_transparent_upload_is_composited_as_opaque() {
    let transparent = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 0]));
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(transparent)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

    let response = post_segment(
        state_with_generator(Arc::new(HalfMaskGenerator)),
        "/segment-image?input_size=32&use_retina=false",
        &[
            Part::File {
                content_type: Some("image/png"),
                bytes: &png,
            },
            Part::Text {
                name: "mask_random_color",
                value: "false",
            },
            Part::Text {
                name: "with_contours",
                value: "false",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let out = image::load_from_memory(&bytes).unwrap().to_rgb8();

    // Left half: red at alpha 120 over opaque blue
    let masked = out.get_pixel(4, 16);
    assert!((masked[0] as i32 - 120).abs() <= 2, "red was {}", masked[0]);
    assert!((masked[2] as i32 - 135).abs() <= 2, "blue was {}", masked[2]);
    // Right half keeps the flattened base color
    assert_eq!(*out.get_pixel(28, 16), image::Rgb([0, 0, 255]));
}
