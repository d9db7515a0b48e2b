// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module
//!
//! This module provides:
//! - MobileSAM automatic mask generation (ONNX, CUDA with CPU fallback)
//! - Mask overlay compositing
//! - Image decoding and PNG encoding

pub mod image_utils;
pub mod mobile_sam;
pub mod model_manager;
pub mod overlay;

pub use image_utils::{decode_image_bytes, detect_format, encode_png, ImageError, ImageInfo};
pub use mobile_sam::{
    Annotation, BoxPrompt, ExecutionDevice, Mask, MaskGenerator, MaskGeneratorConfig,
    MobileSamConfig, MobileSamModel, SegmentOptions,
};
pub use model_manager::{SegmentationModelInfo, SegmentationModelManager};
pub use overlay::{fast_process, fast_process_with_rng, OverlayOptions};
