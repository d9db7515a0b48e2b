// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation request options and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::mobile_sam::{BoxPrompt, SegmentOptions};

/// Smallest accepted `input_size`
pub const MIN_INPUT_SIZE: u32 = 32;

/// Largest accepted `input_size`
pub const MAX_INPUT_SIZE: u32 = 2048;

/// Detail returned for a malformed `bbox`
pub const INVALID_BBOX_MESSAGE: &str =
    "Invalid bbox parameter. Expected format: left,upper,right,lower";

/// Raw segmentation options as sent by the client
///
/// Values arrive as strings from the query string or from multipart text
/// fields and are parsed by [`SegmentImageRequest::to_options`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentImageRequest {
    #[serde(default)]
    pub input_size: Option<String>,
    #[serde(default)]
    pub better_quality: Option<String>,
    #[serde(default)]
    pub with_contours: Option<String>,
    #[serde(default)]
    pub use_retina: Option<String>,
    #[serde(default)]
    pub mask_random_color: Option<String>,
    #[serde(default)]
    pub bbox: Option<String>,
}

impl SegmentImageRequest {
    /// Apply a multipart text field, overriding any query value
    ///
    /// Returns `false` for fields that are not segmentation options.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "input_size" => &mut self.input_size,
            "better_quality" => &mut self.better_quality,
            "with_contours" => &mut self.with_contours,
            "use_retina" => &mut self.use_retina,
            "mask_random_color" => &mut self.mask_random_color,
            "bbox" => &mut self.bbox,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Parse and validate into [`SegmentOptions`]
    pub fn to_options(&self) -> Result<SegmentOptions, ApiError> {
        let defaults = SegmentOptions::default();

        let input_size = match non_empty(&self.input_size) {
            Some(raw) => {
                let size: u32 = raw.parse().map_err(|_| ApiError::ValidationError {
                    field: "input_size".to_string(),
                    message: format!("input_size must be an integer, got '{}'", raw),
                })?;
                if !(MIN_INPUT_SIZE..=MAX_INPUT_SIZE).contains(&size) {
                    return Err(ApiError::ValidationError {
                        field: "input_size".to_string(),
                        message: format!(
                            "input_size must be between {} and {}, got {}",
                            MIN_INPUT_SIZE, MAX_INPUT_SIZE, size
                        ),
                    });
                }
                size
            }
            None => defaults.input_size,
        };

        Ok(SegmentOptions {
            input_size,
            better_quality: bool_option("better_quality", &self.better_quality, defaults.better_quality)?,
            with_contours: bool_option("with_contours", &self.with_contours, defaults.with_contours)?,
            use_retina: bool_option("use_retina", &self.use_retina, defaults.use_retina)?,
            mask_random_color: bool_option(
                "mask_random_color",
                &self.mask_random_color,
                defaults.mask_random_color,
            )?,
            bbox: match non_empty(&self.bbox) {
                Some(raw) => Some(parse_bbox(raw)?),
                None => None,
            },
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn bool_option(field: &str, value: &Option<String>, default: bool) -> Result<bool, ApiError> {
    match non_empty(value) {
        Some(raw) => parse_bool(raw).ok_or_else(|| ApiError::ValidationError {
            field: field.to_string(),
            message: format!("{} must be a boolean, got '{}'", field, raw),
        }),
        None => Ok(default),
    }
}

/// Parse a form-style boolean (`true/false/1/0/yes/no/on/off`)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `left,upper,right,lower` into a box
pub fn parse_bbox(raw: &str) -> Result<BoxPrompt, ApiError> {
    let invalid = || ApiError::ValidationError {
        field: "bbox".to_string(),
        message: INVALID_BBOX_MESSAGE.to_string(),
    };

    let coords = raw
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    match coords.as_slice() {
        [left, upper, right, lower] => Ok(BoxPrompt::new(*left, *upper, *right, *lower)),
        _ => Err(invalid()),
    }
}
