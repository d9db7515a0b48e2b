// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MobileSAM image encoder
//!
//! Turns a preprocessed `[1, 3, 1024, 1024]` tensor into the
//! `[1, 256, 64, 64]` image embedding consumed by the prompt decoder.

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::SAM_INPUT_SIZE;
use super::session::{build_session, ExecutionDevice};

/// Shape of the image embedding produced by the encoder
pub const EMBEDDING_SHAPE: [usize; 4] = [1, 256, 64, 64];

/// ONNX image encoder
#[derive(Clone)]
pub struct MobileSamEncoder {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    device: ExecutionDevice,
}

impl std::fmt::Debug for MobileSamEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileSamEncoder")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl MobileSamEncoder {
    /// Load the encoder from an ONNX file
    ///
    /// # Errors
    /// Returns error if the file does not exist or ONNX Runtime cannot
    /// create a session for it.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading MobileSAM image encoder from {}", model_path.display());

        let (session, device) = build_session(model_path, device, intra_threads)
            .context("Failed to load MobileSAM image encoder")?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "image_embeddings".to_string());

        debug!(
            "MobileSAM encoder loaded - input: {}, output: {}",
            input_name, output_name
        );
        info!("✅ MobileSAM image encoder loaded ({})", device);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            device,
        })
    }

    /// Device the session runs on
    pub fn device(&self) -> ExecutionDevice {
        self.device
    }

    /// Compute the image embedding for a preprocessed tensor
    pub fn encode(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let size = SAM_INPUT_SIZE as usize;
        if input.shape() != [1, 3, size, size] {
            anyhow::bail!(
                "Invalid encoder input shape: {:?}, expected [1, 3, {}, {}]",
                input.shape(),
                size,
                size
            );
        }

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create encoder input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("MobileSAM encoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Encoder inference failed")?;

        let embeddings = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract image embeddings")?;

        debug!("Encoder output shape: {:?}", embeddings.shape());

        let embeddings = embeddings
            .to_owned()
            .into_shape_with_order(EMBEDDING_SHAPE)
            .context("Unexpected image embedding shape")?;

        Ok(embeddings)
    }
}
