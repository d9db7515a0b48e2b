// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration loaded from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::mobile_sam::{ExecutionDevice, MaskGeneratorConfig, MobileSamConfig};

/// Configuration for the segmentation service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub host: String,
    /// Port the HTTP server listens on
    pub port: u16,
    /// MobileSAM model files and inference settings
    pub mobile_sam: MobileSamConfig,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let gen_defaults = &defaults.mobile_sam.generator;

        Self {
            host: lookup("API_HOST").unwrap_or(defaults.host.clone()),
            port: parse_var(lookup("API_PORT")).unwrap_or(defaults.port),
            mobile_sam: MobileSamConfig {
                encoder_path: lookup("MOBILE_SAM_ENCODER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.mobile_sam.encoder_path.clone()),
                decoder_path: lookup("MOBILE_SAM_DECODER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.mobile_sam.decoder_path.clone()),
                device: lookup("SAM_DEVICE")
                    .and_then(|v| v.parse::<ExecutionDevice>().ok())
                    .unwrap_or(defaults.mobile_sam.device),
                intra_threads: parse_var(lookup("SAM_INTRA_THREADS"))
                    .unwrap_or(defaults.mobile_sam.intra_threads),
                generator: MaskGeneratorConfig {
                    points_per_side: parse_var(lookup("SAM_POINTS_PER_SIDE"))
                        .unwrap_or(gen_defaults.points_per_side),
                    pred_iou_thresh: parse_var(lookup("SAM_PRED_IOU_THRESH"))
                        .unwrap_or(gen_defaults.pred_iou_thresh),
                    stability_score_thresh: parse_var(lookup("SAM_STABILITY_SCORE_THRESH"))
                        .unwrap_or(gen_defaults.stability_score_thresh),
                    box_nms_thresh: parse_var(lookup("SAM_BOX_NMS_THRESH"))
                        .unwrap_or(gen_defaults.box_nms_thresh),
                    ..gen_defaults.clone()
                },
            },
            max_upload_bytes: parse_var(lookup("MAX_UPLOAD_BYTES")).unwrap_or(defaults.max_upload_bytes),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("API host must not be empty".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        if self.mobile_sam.intra_threads == 0 {
            return Err("Intra-op thread count must be greater than 0".to_string());
        }

        let generator = &self.mobile_sam.generator;
        if generator.points_per_side == 0 {
            return Err("Points per side must be greater than 0".to_string());
        }
        for (name, value) in [
            ("Predicted IoU threshold", generator.pred_iou_thresh),
            ("Stability score threshold", generator.stability_score_thresh),
            ("Box NMS threshold", generator.box_nms_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be between 0 and 1, got {}", name, value));
            }
        }
        Ok(())
    }

    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mobile_sam: MobileSamConfig::default(),
            max_upload_bytes: MAX_IMAGE_SIZE,
        }
    }
}
