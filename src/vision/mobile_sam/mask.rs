// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Mask and annotation types produced by automatic mask generation

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Bounding box of the set pixels of a mask, in pixel coordinates
///
/// `right` and `lower` are exclusive, matching the convention of
/// a Python-style `getbbox()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskBox {
    pub left: u32,
    pub upper: u32,
    pub right: u32,
    pub lower: u32,
}

impl MaskBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.lower - self.upper
    }

    /// Convert to `[x, y, w, h]`
    pub fn to_xywh(&self) -> [u32; 4] {
        [self.left, self.upper, self.width(), self.height()]
    }
}

/// Binary segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<bool>, // Flattened row-major format
}

impl Mask {
    /// Create a new mask
    ///
    /// Returns `None` when `data` does not hold exactly `width * height` values.
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// All-zero mask
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// All-one mask
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![true; width as usize * height as usize],
        }
    }

    /// Build a mask by thresholding logits laid out row-major
    pub fn from_logits(width: u32, height: u32, logits: &[f32], threshold: f32) -> Option<Self> {
        Self::new(
            width,
            height,
            logits.iter().map(|&v| v > threshold).collect(),
        )
    }

    /// Get mask value at (x, y)
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Set mask value at (x, y); out of range coordinates are ignored
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            if let Some(slot) = self.data.get_mut(y as usize * self.width as usize + x as usize) {
                *slot = value;
            }
        }
    }

    /// Whether the mask has zero pixels in either dimension
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `data` holds exactly `width * height` values
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize
    }

    /// Number of set pixels
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// Bounding box of set pixels, `None` for an empty mask
    pub fn bbox(&self) -> Option<MaskBox> {
        let mut min_x = u32::MAX;
        let mut max_x = 0;
        let mut min_y = u32::MAX;
        let mut max_y = 0;
        let mut found = false;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    found = true;
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }

        found.then(|| MaskBox {
            left: min_x,
            upper: min_y,
            right: max_x + 1,
            lower: max_y + 1,
        })
    }

    /// Rasterize to an 8-bit gray image (set → 255, unset → 0)
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

/// One segment proposed by the mask generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Binary mask at the resolution of the image given to the generator
    pub segmentation: Mask,
    /// Number of set pixels
    pub area: usize,
    /// Box around the mask as `[x, y, w, h]`
    pub bbox: [u32; 4],
    /// IoU predicted by the decoder
    pub predicted_iou: f32,
    /// Stability of the mask under threshold changes
    pub stability_score: f32,
    /// Prompt point that produced this mask, in image coordinates
    pub point_coords: [f32; 2],
}

impl Annotation {
    /// Build an annotation from a mask, deriving area and box
    pub fn from_mask(
        segmentation: Mask,
        predicted_iou: f32,
        stability_score: f32,
        point_coords: [f32; 2],
    ) -> Self {
        let area = segmentation.area();
        let bbox = segmentation
            .bbox()
            .map(|b| b.to_xywh())
            .unwrap_or([0, 0, 0, 0]);
        Self {
            segmentation,
            area,
            bbox,
            predicted_iou,
            stability_score,
            point_coords,
        }
    }

    /// Annotation for a mask that did not come from a prompt (tests, fixtures)
    pub fn from_segmentation(segmentation: Mask) -> Self {
        Self::from_mask(segmentation, 1.0, 1.0, [0.0, 0.0])
    }
}
