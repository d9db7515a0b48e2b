// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

pub use config::ServiceConfig;
pub use vision::{
    fast_process, Annotation, Mask, MaskGenerator, MobileSamModel, OverlayOptions,
    SegmentOptions, SegmentationModelManager,
};
