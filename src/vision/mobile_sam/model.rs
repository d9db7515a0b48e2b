// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MobileSAM model wrapper
//!
//! Ties the mask generator to the overlay compositor: resize the upload to
//! the requested input size, generate masks, composite them.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::decoder::MobileSamDecoder;
use super::encoder::MobileSamEncoder;
use super::generator::{MaskGenerator, MaskGeneratorConfig, OnnxMaskGenerator};
use super::preprocessing::SAM_INPUT_SIZE;
use super::session::ExecutionDevice;
use crate::vision::overlay::{fast_process, BoxPrompt, OverlayOptions};

/// Where the model files live and how to run them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileSamConfig {
    pub encoder_path: PathBuf,
    pub decoder_path: PathBuf,
    pub device: ExecutionDevice,
    pub intra_threads: usize,
    pub generator: MaskGeneratorConfig,
}

impl Default for MobileSamConfig {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from("./models/mobile_sam/mobile_sam_encoder.onnx"),
            decoder_path: PathBuf::from("./models/mobile_sam/mobile_sam_decoder.onnx"),
            device: ExecutionDevice::Auto,
            intra_threads: 4,
            generator: MaskGeneratorConfig::default(),
        }
    }
}

/// Per-request segmentation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Longest side of the image handed to the mask generator
    pub input_size: u32,
    pub better_quality: bool,
    pub with_contours: bool,
    /// Return the composite at the upload's original size
    pub use_retina: bool,
    pub mask_random_color: bool,
    /// Box in original image coordinates
    pub bbox: Option<BoxPrompt>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            input_size: SAM_INPUT_SIZE,
            better_quality: false,
            with_contours: true,
            use_retina: true,
            mask_random_color: true,
            bbox: None,
        }
    }
}

/// Loaded MobileSAM model
#[derive(Clone)]
pub struct MobileSamModel {
    generator: Arc<dyn MaskGenerator>,
    device: ExecutionDevice,
}

impl std::fmt::Debug for MobileSamModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileSamModel")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl MobileSamModel {
    /// Load the ONNX encoder and decoder
    ///
    /// # Errors
    /// Returns error if either model file is missing or cannot be loaded.
    pub fn load(config: &MobileSamConfig) -> Result<Self> {
        info!("🚀 Loading MobileSAM (device: {})", config.device);

        let encoder = MobileSamEncoder::new(&config.encoder_path, config.device, config.intra_threads)
            .with_context(|| format!("Failed to load encoder {}", config.encoder_path.display()))?;
        let decoder = MobileSamDecoder::new(&config.decoder_path, config.device, config.intra_threads)
            .with_context(|| format!("Failed to load decoder {}", config.decoder_path.display()))?;

        let device = encoder.device();
        let generator = OnnxMaskGenerator::new(encoder, decoder, config.generator.clone());

        info!("✅ MobileSAM ready ({})", device);

        Ok(Self {
            generator: Arc::new(generator),
            device,
        })
    }

    /// Wrap an arbitrary mask generator
    pub fn with_generator(generator: Arc<dyn MaskGenerator>) -> Self {
        Self {
            generator,
            device: ExecutionDevice::Cpu,
        }
    }

    pub fn device(&self) -> ExecutionDevice {
        self.device
    }

    /// Segment everything in `image` and return the mask overlay
    ///
    /// The image is resized so its longest side equals `input_size`, masks
    /// are generated on the resized image and composited onto it. With
    /// `use_retina` the composite is scaled back to the upload's size.
    pub fn segment_everything(
        &self,
        image: &DynamicImage,
        options: &SegmentOptions,
    ) -> Result<RgbImage> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot segment an empty image");
        }
        if options.input_size == 0 {
            anyhow::bail!("input_size must be positive");
        }

        let scale_factor = options.input_size as f64 / width.max(height) as f64;
        let new_w = ((width as f64 * scale_factor) as u32).max(1);
        let new_h = ((height as f64 * scale_factor) as u32).max(1);
        debug!(
            "Resizing {}x{} to {}x{} for mask generation",
            width, height, new_w, new_h
        );

        let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom);
        let annotations = self
            .generator
            .generate(&resized.to_rgb8())
            .context("Mask generation failed")?;

        let overlay_options = OverlayOptions {
            scale: (SAM_INPUT_SIZE / options.input_size).max(1),
            better_quality: options.better_quality,
            mask_random_color: options.mask_random_color,
            bbox: options.bbox.map(|b| b.scaled(scale_factor)),
            with_contours: options.with_contours,
            retina_size: options.use_retina.then_some((width, height)),
        };

        let composite = fast_process(&annotations, &resized, &overlay_options);

        info!(
            "Segmented {}x{} image: {} masks in {}ms",
            width,
            height,
            annotations.len(),
            start.elapsed().as_millis()
        );

        Ok(composite)
    }
}
