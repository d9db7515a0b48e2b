// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the MobileSAM image encoder

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Side length of the square encoder input
pub const SAM_INPUT_SIZE: u32 = 1024;

/// Pixel mean used by SAM (0-255 scale)
pub const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];

/// Pixel std used by SAM (0-255 scale)
pub const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Output size when resizing so that the longest side equals `target`
///
/// Mirrors SAM's `ResizeLongestSide.get_preprocess_shape`: each side is
/// scaled and rounded, never below 1.
pub fn longest_side_shape(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f32;
    let scale = target as f32 / longest;
    let new_w = ((width as f32 * scale) + 0.5).floor() as u32;
    let new_h = ((height as f32 * scale) + 0.5).floor() as u32;
    (new_w.max(1), new_h.max(1))
}

/// Transform a point from image coordinates into the encoder frame
pub fn transform_point(point: [f32; 2], width: u32, height: u32) -> [f32; 2] {
    let (new_w, new_h) = longest_side_shape(width, height, SAM_INPUT_SIZE);
    [
        point[0] * (new_w as f32 / width.max(1) as f32),
        point[1] * (new_h as f32 / height.max(1) as f32),
    ]
}

/// Preprocess an image for the MobileSAM encoder
///
/// Steps:
/// 1. Resize so the longest side is 1024 (aspect ratio preserved)
/// 2. Normalize each channel with SAM's pixel mean/std
/// 3. Pad bottom/right with zeros to 1024x1024
/// 4. Convert to NCHW tensor format [1, 3, 1024, 1024]
pub fn preprocess_for_encoder(image: &RgbImage) -> Array4<f32> {
    let (new_w, new_h) = longest_side_shape(image.width(), image.height(), SAM_INPUT_SIZE);
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = SAM_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel[c] as f32 - PIXEL_MEAN[c]) / PIXEL_STD[c];
        }
    }

    tensor
}
