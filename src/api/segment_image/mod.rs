// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation API endpoint module
//!
//! Provides POST /segment-image for overlaying MobileSAM masks on an upload.

pub mod handler;
pub mod request;

pub use handler::segment_image_handler;
pub use request::SegmentImageRequest;
