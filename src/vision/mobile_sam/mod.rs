// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MobileSAM automatic mask generation
//!
//! ONNX image encoder and prompt decoder, grid-prompted mask generation,
//! and the model wrapper used by the HTTP endpoint.

pub mod decoder;
pub mod encoder;
pub mod generator;
pub mod mask;
pub mod model;
pub mod postprocess;
pub mod preprocessing;
pub mod session;

pub use decoder::{DecodedMasks, MobileSamDecoder};
pub use encoder::MobileSamEncoder;
pub use generator::{MaskGenerator, MaskGeneratorConfig, OnnxMaskGenerator};
pub use mask::{Annotation, Mask, MaskBox};
pub use model::{MobileSamConfig, MobileSamModel, SegmentOptions};
pub use session::ExecutionDevice;
pub use crate::vision::overlay::BoxPrompt;
