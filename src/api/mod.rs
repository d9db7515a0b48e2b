// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod segment_image;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_app, start_server, AppState, HealthResponse};
pub use segment_image::{segment_image_handler, SegmentImageRequest};
