// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image processing request types

use serde::{Deserialize, Serialize};

use crate::intake::RawRequestPayload;

fn default_return_image() -> bool {
    true
}

/// Request body for POST /process_image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImageRequest {
    /// `image_data`, `text`, `temperature`, `humidity`, `object`, `source_id`
    #[serde(flatten)]
    pub payload: RawRequestPayload,

    /// Include the generated image in the response body
    #[serde(default = "default_return_image")]
    pub return_image: bool,
}

impl ProcessImageRequest {
    /// Identity used by the capture cooldown
    pub fn source_key(&self) -> &str {
        self.payload
            .source_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("default")
    }
}
