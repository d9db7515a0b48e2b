// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Mask overlay compositing
//!
//! Renders generated masks as semi-transparent colored layers on top of the
//! source image, optionally outlining each mask and a user supplied box.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::mobile_sam::Annotation;

/// Alpha of a mask fill
pub const MASK_ALPHA: u8 = 120;

/// Fill used when random colors are disabled
pub const DEFAULT_MASK_COLOR: Rgba<u8> = Rgba([255, 0, 0, MASK_ALPHA]);

/// Outline drawn around each mask
pub const CONTOUR_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Outline drawn for the user box
pub const BOX_PROMPT_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Line width of both outlines
pub const OUTLINE_WIDTH: i64 = 2;

/// User supplied box, `left,upper,right,lower` in pixels (corners inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxPrompt {
    pub left: i64,
    pub upper: i64,
    pub right: i64,
    pub lower: i64,
}

impl BoxPrompt {
    pub fn new(left: i64, upper: i64, right: i64, lower: i64) -> Self {
        Self {
            left,
            upper,
            right,
            lower,
        }
    }

    /// Multiply every coordinate by `factor`, rounding to the nearest pixel
    pub fn scaled(&self, factor: f64) -> Self {
        let s = |v: i64| (v as f64 * factor).round() as i64;
        Self::new(s(self.left), s(self.upper), s(self.right), s(self.lower))
    }
}

/// Options for [`fast_process`]
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOptions {
    /// Integer factor applied to masks before they are fitted to the image
    pub scale: u32,
    /// Lanczos instead of nearest-neighbour when scaling masks
    pub better_quality: bool,
    /// Random color per mask instead of [`DEFAULT_MASK_COLOR`]
    pub mask_random_color: bool,
    /// Box drawn in [`BOX_PROMPT_COLOR`]
    pub bbox: Option<BoxPrompt>,
    /// Outline every mask in [`CONTOUR_COLOR`]
    pub with_contours: bool,
    /// Resize the final composite to this size
    pub retina_size: Option<(u32, u32)>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            scale: 1,
            better_quality: false,
            mask_random_color: true,
            bbox: None,
            with_contours: true,
            retina_size: None,
        }
    }
}

/// Composite `annotations` onto `image` using the thread-local RNG for colors
pub fn fast_process(
    annotations: &[Annotation],
    image: &DynamicImage,
    options: &OverlayOptions,
) -> RgbImage {
    fast_process_with_rng(annotations, image, options, &mut rand::thread_rng())
}

/// Composite `annotations` onto `image`, drawing colors from `rng`
pub fn fast_process_with_rng<R: Rng + ?Sized>(
    annotations: &[Annotation],
    image: &DynamicImage,
    options: &OverlayOptions,
    rng: &mut R,
) -> RgbImage {
    // The base is opaque whatever the upload's alpha
    let mut base = DynamicImage::ImageRgb8(image.to_rgb8()).to_rgba8();
    let (width, height) = base.dimensions();
    let mut overlay = RgbaImage::new(width, height);

    for annotation in annotations {
        let mask = &annotation.segmentation;
        if mask.is_degenerate() || !mask.is_well_formed() || width == 0 || height == 0 {
            continue;
        }

        let mut gray = mask.to_luma();

        if options.scale > 1 {
            let filter = if options.better_quality {
                FilterType::Lanczos3
            } else {
                FilterType::Nearest
            };
            gray = imageops::resize(
                &gray,
                mask.width.saturating_mul(options.scale),
                mask.height.saturating_mul(options.scale),
                filter,
            );
        }

        if gray.dimensions() != (width, height) {
            gray = imageops::resize(&gray, width, height, FilterType::Nearest);
        }

        let color = if options.mask_random_color {
            Rgba([rng.gen(), rng.gen(), rng.gen(), MASK_ALPHA])
        } else {
            DEFAULT_MASK_COLOR
        };

        paste_with_mask(&mut overlay, color, &gray);

        if options.with_contours {
            if let Some((left, upper, right, lower)) = nonzero_bbox(&gray) {
                draw_outline(
                    &mut overlay,
                    (left as i64, upper as i64, right as i64, lower as i64),
                    CONTOUR_COLOR,
                );
            }
        }
    }

    if let Some(b) = options.bbox {
        draw_outline(
            &mut overlay,
            (b.left, b.upper, b.right, b.lower),
            BOX_PROMPT_COLOR,
        );
    }

    imageops::overlay(&mut base, &overlay, 0, 0);
    let composite = DynamicImage::ImageRgba8(base).to_rgb8();

    match options.retina_size {
        Some((rw, rh)) if (rw, rh) != composite.dimensions() && rw > 0 && rh > 0 => {
            imageops::resize(&composite, rw, rh, FilterType::Lanczos3)
        }
        _ => composite,
    }
}

/// Blend `color` into `target` weighted by the mask value of each pixel
///
/// Every channel, alpha included, becomes `color * m + target * (1 - m)`.
fn paste_with_mask(target: &mut RgbaImage, color: Rgba<u8>, mask: &GrayImage) {
    for (x, y, m) in mask.enumerate_pixels() {
        let m = m[0] as u32;
        if m == 0 {
            continue;
        }
        let dst = target.get_pixel_mut(x, y);
        for c in 0..4 {
            dst[c] = ((color[c] as u32 * m + dst[c] as u32 * (255 - m) + 127) / 255) as u8;
        }
    }
}

/// Box around the non-zero pixels as `(left, upper, right, lower)`, right
/// and lower exclusive
fn nonzero_bbox(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x + 1, y + 1),
            Some((l, u, r, b)) => (l.min(x), u.min(y), r.max(x + 1), b.max(y + 1)),
        });
    }
    bounds
}

/// Rectangle outline between inclusive corners, drawn inward
///
/// Pixels outside the image are skipped.
fn draw_outline(target: &mut RgbaImage, corners: (i64, i64, i64, i64), color: Rgba<u8>) {
    let (x0, y0, x1, y1) = corners;
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));

    let max_x = target.width() as i64 - 1;
    let max_y = target.height() as i64 - 1;
    if max_x < 0 || max_y < 0 || x1 < 0 || y1 < 0 || x0 > max_x || y0 > max_y {
        return;
    }

    for y in y0.max(0)..=y1.min(max_y) {
        for x in x0.max(0)..=x1.min(max_x) {
            let on_edge = x < x0 + OUTLINE_WIDTH
                || x > x1 - OUTLINE_WIDTH
                || y < y0 + OUTLINE_WIDTH
                || y > y1 - OUTLINE_WIDTH;
            if on_edge {
                target.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
