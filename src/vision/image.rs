// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shrinking and encoding screenshots for the vision API

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use std::path::Path;
use tracing::debug;

use crate::Result;

/// Longest side sent to the API, in pixels
pub const MAX_DIMENSION: u32 = 1024;

/// JPEG quality used for the upload
pub const JPEG_QUALITY: u8 = 85;

/// An image ready to embed in a request
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

/// Decode, flatten to RGB, bound to 1024px and re-encode as base64 JPEG
pub fn prepare_image(path: &Path) -> Result<PreparedImage> {
    let img = image::open(path)?;

    let img = if img.color() == ColorType::Rgb8 {
        img
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    // Resize if too large; resize() keeps the aspect ratio
    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    img.write_with_encoder(encoder)?;

    let (width, height) = img.dimensions();
    debug!("Prepared {:?}: {}x{}, {} bytes", path.file_name(), width, height, buffer.len());

    Ok(PreparedImage {
        base64: general_purpose::STANDARD.encode(&buffer),
        width,
        height,
    })
}
