// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation model manager
//!
//! Loads MobileSAM once at startup. A model that fails to load leaves the
//! service running without it; handlers then answer 503.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vision::mobile_sam::{MobileSamConfig, MobileSamModel};

/// Information about a managed model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationModelInfo {
    /// Model name
    pub name: String,
    /// Model type
    pub model_type: String,
    /// Whether the model is available
    pub available: bool,
    /// Execution device when loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Owner of the process-wide MobileSAM instance
#[derive(Debug, Clone, Default)]
pub struct SegmentationModelManager {
    model: Option<Arc<MobileSamModel>>,
}

impl SegmentationModelManager {
    /// Load MobileSAM with the given configuration
    ///
    /// Load failures are logged and produce a manager without a model.
    pub fn new(config: &MobileSamConfig) -> Self {
        let model = match MobileSamModel::load(config) {
            Ok(model) => {
                tracing::info!(
                    "✅ MobileSAM model loaded from {}",
                    config.encoder_path.display()
                );
                Some(Arc::new(model))
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to load MobileSAM model: {:#}", e);
                None
            }
        };

        Self { model }
    }

    /// Manager around an already constructed model
    pub fn with_model(model: MobileSamModel) -> Self {
        Self {
            model: Some(Arc::new(model)),
        }
    }

    /// Manager with no model loaded
    pub fn empty() -> Self {
        Self { model: None }
    }

    /// Get the segmentation model if available
    pub fn get_model(&self) -> Option<Arc<MobileSamModel>> {
        self.model.clone()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// List all managed models
    pub fn list_models(&self) -> Vec<SegmentationModelInfo> {
        vec![SegmentationModelInfo {
            name: "mobile_sam".to_string(),
            model_type: "segmentation".to_string(),
            available: self.model.is_some(),
            device: self.model.as_ref().map(|m| m.device().to_string()),
        }]
    }
}
