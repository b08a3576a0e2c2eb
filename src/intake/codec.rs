// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding, normalization and encoding for the pipeline

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

use crate::error::PipelineError;

/// Maximum image size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        PipelineError::malformed("image_data", err.to_string())
    }
}

/// Working resolution every input is normalized to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Strip an optional `data:image/...;base64,` prefix
pub fn strip_data_url(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    if trimmed.starts_with("data:") {
        if let Some(idx) = trimmed.find(";base64,") {
            return &trimmed[idx + ";base64,".len()..];
        }
    }
    trimmed
}

/// Decode base64 text into raw image bytes (no pixel decoding)
pub fn decode_base64_bytes(encoded: &str) -> Result<Vec<u8>, ImageError> {
    let body = strip_data_url(encoded);
    if body.is_empty() {
        return Err(ImageError::EmptyData);
    }
    let bytes = STANDARD.decode(body)?;
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }
    Ok(bytes)
}

/// Decode raw image bytes into pixels
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    let format = detect_format(bytes)?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),
        _ => Err(ImageError::UnsupportedFormat),
    }
}

pub fn format_to_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        _ => "bin",
    }
}

/// Convert to RGB8 at the working resolution
pub fn normalize(image: DynamicImage, resolution: Resolution) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.width() == resolution.width && rgb.height() == resolution.height {
        return rgb;
    }
    image::imageops::resize(&rgb, resolution.width, resolution.height, FilterType::Triangle)
}

/// Encode RGB pixels as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Encode RGB pixels as base64 PNG
pub fn encode_png_base64(image: &RgbImage) -> Result<String, ImageError> {
    Ok(STANDARD.encode(encode_png(image)?))
}
