// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image processing response types

use serde::{Deserialize, Serialize};

/// Response from POST /process_image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    /// Always "success"; failures use the error body
    pub status: String,
    pub strength: f64,
    pub guidance_scale: f64,
    pub seed: Option<u32>,
    pub effective_prompt: String,
    /// Backend that produced the image
    pub backend: String,
    pub processing_time_ms: u64,
    /// Whether the result reached the downstream channel
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
    /// Base64 PNG of the generated image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}
