// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image-generation backends behind a single async interface
//!
//! Two variants are provided: an in-process model (`LocalBackend`) and an
//! HTTP service (`RemoteBackend`). Both are selected by configuration.

pub mod local;
pub mod remote;
pub mod retry;

pub use local::{
    load_local_model, ColorGradeModel, Img2ImgModel, LocalBackend, COLOR_GRADE_MODEL_ID,
};
pub use remote::RemoteBackend;
pub use retry::{AttemptError, RetryPolicy};

use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::error::Result;
use crate::mapping::GenerationParameters;

/// Everything a backend receives for one generation
#[derive(Debug, Clone)]
pub struct BackendInvocation {
    pub image: Arc<RgbImage>,
    pub prompt: String,
    pub strength: f64,
    pub guidance_scale: f64,
    pub seed: Option<u32>,
}

impl BackendInvocation {
    pub fn new(image: Arc<RgbImage>, params: &GenerationParameters) -> Self {
        Self {
            image,
            prompt: params.effective_prompt.clone(),
            strength: params.strength,
            guidance_scale: params.guidance_scale,
            seed: params.seed,
        }
    }
}

/// The external image-generation capability
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Identifier used in logs and results
    fn name(&self) -> &str;

    /// Transform the input image; may block for tens of seconds
    async fn generate(&self, invocation: &BackendInvocation) -> Result<RgbImage>;

    async fn health_check(&self) -> bool;
}
