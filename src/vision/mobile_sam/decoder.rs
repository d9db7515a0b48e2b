// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MobileSAM prompt decoder
//!
//! Runs one point prompt against a precomputed image embedding and returns
//! the mask logits at the original image resolution together with the
//! predicted IoU of each mask.

use anyhow::{Context, Result};
use ndarray::{s, Array1, Array2, Array3, Array4, Ix4};
use ort::session::Session;
use ort::value::{TensorRef, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::transform_point;
use super::session::{build_session, ExecutionDevice};

/// Masks returned by one decoder call
#[derive(Debug, Clone)]
pub struct DecodedMasks {
    /// Row-major logits, one `width * height` buffer per mask
    pub logits: Vec<Vec<f32>>,
    /// Predicted IoU, aligned with `logits`
    pub iou_predictions: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

/// Borrow the image embedding as a session input without copying it
fn embedding_view(embeddings: &Array4<f32>) -> Result<TensorRef<'_, f32>> {
    TensorRef::from_array_view(embeddings).context("Failed to view image embeddings")
}

/// ONNX prompt decoder
#[derive(Clone)]
pub struct MobileSamDecoder {
    session: Arc<Mutex<Session>>,
    device: ExecutionDevice,
}

impl std::fmt::Debug for MobileSamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileSamDecoder")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl MobileSamDecoder {
    /// Load the decoder from an ONNX file
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading MobileSAM prompt decoder from {}", model_path.display());

        let (session, device) = build_session(model_path, device, intra_threads)
            .context("Failed to load MobileSAM prompt decoder")?;

        info!("✅ MobileSAM prompt decoder loaded ({})", device);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            device,
        })
    }

    /// Decode the masks for a single foreground point
    ///
    /// `point` is in the coordinates of the `width x height` image the
    /// embedding was computed from. In multimask mode (more than one output
    /// mask) the first, single-mask output is dropped. The embedding is
    /// handed to the session as a view, not copied.
    pub fn decode(
        &self,
        embeddings: &Array4<f32>,
        point: [f32; 2],
        width: u32,
        height: u32,
    ) -> Result<DecodedMasks> {
        let [px, py] = transform_point(point, width, height);

        // Point prompt plus the padding point SAM expects without a box prompt
        let point_coords = Array3::from_shape_vec((1, 2, 2), vec![px, py, 0.0, 0.0])
            .context("Failed to build point_coords")?;
        let point_labels = Array2::from_shape_vec((1, 2), vec![1.0f32, -1.0])
            .context("Failed to build point_labels")?;
        let mask_input = Array4::<f32>::zeros((1, 1, 256, 256));
        let has_mask_input = Array1::<f32>::from_vec(vec![0.0]);
        let orig_im_size = Array1::<f32>::from_vec(vec![height as f32, width as f32]);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("MobileSAM decoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                "image_embeddings" => embedding_view(embeddings)?,
                "point_coords" => Value::from_array(point_coords)?,
                "point_labels" => Value::from_array(point_labels)?,
                "mask_input" => Value::from_array(mask_input)?,
                "has_mask_input" => Value::from_array(has_mask_input)?,
                "orig_im_size" => Value::from_array(orig_im_size)?
            ])
            .context("Decoder inference failed")?;

        let masks = outputs["masks"]
            .try_extract_array::<f32>()
            .context("Failed to extract masks")?
            .into_dimensionality::<Ix4>()
            .context("Unexpected mask output rank")?;
        let ious = outputs["iou_predictions"]
            .try_extract_array::<f32>()
            .context("Failed to extract iou_predictions")?;

        let (_, num_masks, mask_h, mask_w) = masks.dim();
        debug!("Decoder produced {} masks of {}x{}", num_masks, mask_w, mask_h);

        let ious: Vec<f32> = ious.iter().copied().collect();
        if ious.len() < num_masks {
            anyhow::bail!(
                "Decoder returned {} IoU predictions for {} masks",
                ious.len(),
                num_masks
            );
        }

        let first = usize::from(num_masks > 1);
        let mut logits = Vec::with_capacity(num_masks - first);
        let mut iou_predictions = Vec::with_capacity(num_masks - first);
        for m in first..num_masks {
            logits.push(masks.slice(s![0, m, .., ..]).iter().copied().collect());
            iou_predictions.push(ious[m]);
        }

        Ok(DecodedMasks {
            logits,
            iou_predictions,
            width: mask_w as u32,
            height: mask_h as u32,
        })
    }
}
