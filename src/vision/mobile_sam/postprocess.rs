// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Post-processing helpers for automatic mask generation
//!
//! - Point grid used as prompts
//! - Stability score of mask logits
//! - Box IoU and non-maximum suppression

use super::mask::MaskBox;

/// Generate an `n x n` grid of points at cell centres, normalized to [0, 1]
///
/// Points are ordered row by row (y outer, x inner).
pub fn build_point_grid(n_per_side: usize) -> Vec<[f32; 2]> {
    if n_per_side == 0 {
        return Vec::new();
    }

    let offset = 1.0 / (2.0 * n_per_side as f32);
    let step = if n_per_side > 1 {
        (1.0 - 2.0 * offset) / (n_per_side - 1) as f32
    } else {
        0.0
    };

    let mut points = Vec::with_capacity(n_per_side * n_per_side);
    for j in 0..n_per_side {
        for i in 0..n_per_side {
            points.push([offset + i as f32 * step, offset + j as f32 * step]);
        }
    }
    points
}

/// Stability score of a set of mask logits
///
/// Ratio between the areas of the mask binarized at `threshold + offset`
/// and at `threshold - offset`. An empty low-threshold mask scores 0.
pub fn stability_score(logits: &[f32], mask_threshold: f32, threshold_offset: f32) -> f32 {
    let high = mask_threshold + threshold_offset;
    let low = mask_threshold - threshold_offset;

    let (intersections, unions) = logits.iter().fold((0usize, 0usize), |(i, u), &v| {
        (i + usize::from(v > high), u + usize::from(v > low))
    });

    if unions == 0 {
        0.0
    } else {
        intersections as f32 / unions as f32
    }
}

/// IoU of two boxes with exclusive right/lower edges
pub fn box_iou(a: &MaskBox, b: &MaskBox) -> f32 {
    let ix1 = a.left.max(b.left);
    let iy1 = a.upper.max(b.upper);
    let ix2 = a.right.min(b.right);
    let iy2 = a.lower.min(b.lower);

    let inter = if ix2 > ix1 && iy2 > iy1 {
        (ix2 - ix1) as f64 * (iy2 - iy1) as f64
    } else {
        0.0
    };

    let area_a = a.width() as f64 * a.height() as f64;
    let area_b = b.width() as f64 * b.height() as f64;
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        (inter / union) as f32
    }
}

/// Greedy non-maximum suppression
///
/// Returns the indices of kept boxes, highest score first. A box is dropped
/// when its IoU with an already kept box is greater than `iou_threshold`.
pub fn non_max_suppression(boxes: &[MaskBox], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        let suppressed = keep
            .iter()
            .any(|&k| box_iou(&boxes[k], &boxes[idx]) > iou_threshold);
        if !suppressed {
            keep.push(idx);
        }
    }
    keep
}
