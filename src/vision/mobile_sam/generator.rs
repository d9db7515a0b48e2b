// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Automatic mask generation
//!
//! Prompts the decoder with a regular grid of points, keeps the confident
//! and stable masks, and removes duplicates with box NMS.

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::decoder::MobileSamDecoder;
use super::encoder::MobileSamEncoder;
use super::mask::{Annotation, Mask, MaskBox};
use super::postprocess::{build_point_grid, non_max_suppression, stability_score};
use super::preprocessing::preprocess_for_encoder;

/// Source of segment proposals for an image
///
/// Implemented by [`OnnxMaskGenerator`]; tests substitute their own.
pub trait MaskGenerator: Send + Sync {
    /// Propose masks at the resolution of `image`
    fn generate(&self, image: &RgbImage) -> Result<Vec<Annotation>>;
}

/// Tuning knobs for automatic mask generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskGeneratorConfig {
    pub points_per_side: usize,
    pub pred_iou_thresh: f32,
    pub stability_score_thresh: f32,
    pub stability_score_offset: f32,
    pub box_nms_thresh: f32,
    pub mask_threshold: f32,
    pub min_mask_region_area: usize,
}

impl Default for MaskGeneratorConfig {
    fn default() -> Self {
        Self {
            points_per_side: 32,
            pred_iou_thresh: 0.88,
            stability_score_thresh: 0.95,
            stability_score_offset: 1.0,
            box_nms_thresh: 0.7,
            mask_threshold: 0.0,
            min_mask_region_area: 0,
        }
    }
}

/// Candidate produced for one decoder output, before NMS
#[derive(Debug, Clone)]
pub struct Candidate {
    pub mask: Mask,
    pub bbox: MaskBox,
    pub predicted_iou: f32,
    pub stability_score: f32,
    pub point: [f32; 2],
}

impl MaskGeneratorConfig {
    /// Score and binarize one set of logits
    ///
    /// Returns `None` when the mask fails the IoU or stability filter, is
    /// empty, or is smaller than `min_mask_region_area`.
    pub fn filter_candidate(
        &self,
        logits: &[f32],
        width: u32,
        height: u32,
        predicted_iou: f32,
        point: [f32; 2],
    ) -> Option<Candidate> {
        if predicted_iou < self.pred_iou_thresh {
            return None;
        }

        let stability = stability_score(logits, self.mask_threshold, self.stability_score_offset);
        if stability < self.stability_score_thresh {
            return None;
        }

        let mask = Mask::from_logits(width, height, logits, self.mask_threshold)?;
        if mask.area() < self.min_mask_region_area.max(1) {
            return None;
        }
        let bbox = mask.bbox()?;

        Some(Candidate {
            mask,
            bbox,
            predicted_iou,
            stability_score: stability,
            point,
        })
    }

    /// Remove duplicates and order the survivors by area, largest first
    pub fn finalize(&self, candidates: Vec<Candidate>) -> Vec<Annotation> {
        let boxes: Vec<MaskBox> = candidates.iter().map(|c| c.bbox).collect();
        let scores: Vec<f32> = candidates.iter().map(|c| c.predicted_iou).collect();
        let keep = non_max_suppression(&boxes, &scores, self.box_nms_thresh);

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut annotations: Vec<Annotation> = keep
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .map(|c| Annotation::from_mask(c.mask, c.predicted_iou, c.stability_score, c.point))
            .collect();

        annotations.sort_by(|a, b| b.area.cmp(&a.area));
        annotations
    }
}

/// Mask generator backed by the ONNX encoder and decoder
#[derive(Debug, Clone)]
pub struct OnnxMaskGenerator {
    encoder: MobileSamEncoder,
    decoder: MobileSamDecoder,
    config: MaskGeneratorConfig,
}

impl OnnxMaskGenerator {
    pub fn new(
        encoder: MobileSamEncoder,
        decoder: MobileSamDecoder,
        config: MaskGeneratorConfig,
    ) -> Self {
        Self {
            encoder,
            decoder,
            config,
        }
    }
}

impl MaskGenerator for OnnxMaskGenerator {
    fn generate(&self, image: &RgbImage) -> Result<Vec<Annotation>> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot segment an empty image");
        }

        let tensor = preprocess_for_encoder(image);
        let embeddings = self
            .encoder
            .encode(&tensor)
            .context("Failed to encode image")?;

        let grid = build_point_grid(self.config.points_per_side);
        let mut candidates = Vec::new();

        for [gx, gy] in grid {
            let point = [gx * width as f32, gy * height as f32];
            let decoded = self
                .decoder
                .decode(&embeddings, point, width, height)
                .context("Failed to decode point prompt")?;

            for (logits, &iou) in decoded.logits.iter().zip(&decoded.iou_predictions) {
                if let Some(candidate) = self.config.filter_candidate(
                    logits,
                    decoded.width,
                    decoded.height,
                    iou,
                    point,
                ) {
                    candidates.push(candidate);
                }
            }
        }

        debug!("{} mask candidates before NMS", candidates.len());
        let annotations = self.config.finalize(candidates);

        info!(
            "Generated {} masks for {}x{} image in {}ms",
            annotations.len(),
            width,
            height,
            start.elapsed().as_millis()
        );

        Ok(annotations)
    }
}
