// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use mobilesam_segmentation::vision::{encode_png, Annotation, Mask, MaskGenerator};

pub const BOUNDARY: &str = "----mobilesam-test-boundary";

/// One multipart part
pub enum Part<'a> {
    File {
        content_type: Option<&'a str>,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Build a `multipart/form-data` body, returning the content type header and body
pub fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.png\"\r\n",
                );
                if let Some(ct) = content_type {
                    body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
                }
                body.extend_from_slice(b"\r\n");
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Solid color PNG
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(width, height, Rgb([40, 80, 120]))).unwrap()
}

/// Generator returning a single mask covering the left half of the image
pub struct HalfMaskGenerator;

impl MaskGenerator for HalfMaskGenerator {
    fn generate(&self, image: &RgbImage) -> anyhow::Result<Vec<Annotation>> {
        let (w, h) = image.dimensions();
        let mut mask = Mask::empty(w, h);
        for y in 0..h {
            for x in 0..w / 2 {
                mask.set(x, y, true);
            }
        }
        Ok(vec![Annotation::from_segmentation(mask)])
    }
}

/// Generator that never proposes anything
pub struct EmptyGenerator;

impl MaskGenerator for EmptyGenerator {
    fn generate(&self, _image: &RgbImage) -> anyhow::Result<Vec<Annotation>> {
        Ok(Vec::new())
    }
}

/// Generator that always fails
pub struct FailingGenerator;

impl MaskGenerator for FailingGenerator {
    fn generate(&self, _image: &RgbImage) -> anyhow::Result<Vec<Annotation>> {
        anyhow::bail!("inference backend unavailable")
    }
}
