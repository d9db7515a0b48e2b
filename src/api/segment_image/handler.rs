// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation endpoint handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use image::DynamicImage;
use axum_extra::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::request::SegmentImageRequest;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::image_utils::{
    decode_image_bytes_with_limit, encode_png, is_image_content_type, ImageError,
};

/// Detail for uploads that are not images
pub const INVALID_IMAGE_MESSAGE: &str = "Invalid image file";

/// Detail for uploads that cannot be decoded or segmented
pub const PROCESSING_ERROR_MESSAGE: &str = "Error processing image";

/// Detail when the model failed to load at startup
pub const MODEL_NOT_LOADED_MESSAGE: &str = "Segmentation model not loaded";

/// Uploaded file as read from the multipart body
struct Upload {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::InvalidRequest(e.body_text())
    }
}

/// POST /segment-image - Segment everything in an uploaded image
///
/// Accepts a `multipart/form-data` body with a `file` field and returns
/// the image with every generated mask overlaid, encoded as PNG.
///
/// # Options
/// Query parameters or multipart text fields (form fields win):
/// - `input_size`: longest side used for mask generation (32..=2048, default 1024)
/// - `better_quality`: Lanczos mask upscaling (default false)
/// - `with_contours`: outline each mask (default true)
/// - `use_retina`: return the composite at the upload's size (default true)
/// - `mask_random_color`: random color per mask (default true)
/// - `bbox`: `left,upper,right,lower` box drawn on the result
///
/// # Errors
/// - 400 Bad Request: not multipart, not an image, undecodable, bad options,
///   or segmentation failed
/// - 413 Payload Too Large: upload over the configured limit
/// - 422 Unprocessable Entity: no `file` field
/// - 503 Service Unavailable: model not loaded
pub async fn segment_image_handler(
    State(state): State<AppState>,
    query: Result<Query<SegmentImageRequest>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    segment_image(state, query, multipart)
        .instrument(info_span!("segment_image", %request_id))
        .await
}

async fn segment_image(
    state: AppState,
    query: Result<Query<SegmentImageRequest>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Query(mut request) = query.map_err(|rejection| {
        warn!("Invalid segmentation query: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;

    let mut multipart = multipart.map_err(|rejection| {
        warn!("Segmentation request is not multipart: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;

    // 1. Read the multipart body
    let mut upload: Option<Upload> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            upload = Some(Upload {
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            if !request.set_field(&name, value) {
                debug!("Ignoring unknown multipart field '{}'", name);
            }
        }
    }

    // 2. Validate the upload
    let upload = upload.ok_or_else(|| {
        warn!("Segmentation request without file field");
        ApiError::MissingField("file".to_string())
    })?;

    let is_image = upload
        .content_type
        .as_deref()
        .map(is_image_content_type)
        .unwrap_or(false);
    if !is_image {
        warn!(
            "Rejected upload with content type {:?}",
            upload.content_type
        );
        return Err(ApiError::InvalidRequest(INVALID_IMAGE_MESSAGE.to_string()));
    }

    // 3. Decode image
    let max_bytes = state.config.max_upload_bytes;
    let (image, image_info) =
        decode_image_bytes_with_limit(&upload.bytes, max_bytes).map_err(|e| {
            warn!("Failed to decode image: {}", e);
            match e {
                ImageError::TooLarge(size, max) => ApiError::PayloadTooLarge(format!(
                    "Image is {} bytes, maximum is {} bytes",
                    size, max
                )),
                _ => ApiError::InvalidRequest(PROCESSING_ERROR_MESSAGE.to_string()),
            }
        })?;

    debug!(
        "Decoded image: {}x{} {:?}, {} bytes",
        image_info.width, image_info.height, image_info.format, image_info.size_bytes
    );
    let image = DynamicImage::ImageRgb8(image.to_rgb8());

    // 4. Parse options
    let options = request.to_options().map_err(|e| {
        warn!("Segmentation options rejected: {}", e);
        e
    })?;

    // 5. Get model
    let model = {
        let manager_guard = state.segmentation_model_manager.read().await;
        manager_guard
            .as_ref()
            .and_then(|manager| manager.get_model())
            .ok_or_else(|| {
                warn!("Segmentation model not loaded");
                ApiError::ServiceUnavailable(MODEL_NOT_LOADED_MESSAGE.to_string())
            })?
    };

    // 6. Segment and encode on the blocking pool
    let png = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        let composite = model.segment_everything(&image, &options)?;
        Ok(encode_png(&composite)?)
    })
    .await
    .map_err(|e| {
        warn!("Segmentation task failed: {}", e);
        ApiError::InternalError("Segmentation task failed".to_string())
    })?
    .map_err(|e| {
        warn!("Segmentation failed: {:#}", e);
        ApiError::InvalidRequest(PROCESSING_ERROR_MESSAGE.to_string())
    })?;

    info!(
        "Segmentation complete: {}x{} upload, {} byte PNG",
        image_info.width,
        image_info.height,
        png.len()
    );

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
