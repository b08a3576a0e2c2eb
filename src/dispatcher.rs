// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation Request Dispatcher
//!
//! Invokes the configured backend with mapped parameters and wraps the
//! output together with the exact parameters that produced it.

use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::backend::{BackendInvocation, ImageBackend};
use crate::error::Result;
use crate::intake::GenerationRequest;
use crate::mapping::GenerationParameters;

/// Output of one successful generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output_image: Arc<RgbImage>,
    pub parameters_used: GenerationParameters,
    pub backend: String,
    pub duration_ms: u64,
}

pub struct GenerationDispatcher {
    backend: Arc<dyn ImageBackend>,
}

impl GenerationDispatcher {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    /// Run the backend once. Local failures are not retried here; remote
    /// backends apply their own network-level retry.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        params: GenerationParameters,
    ) -> Result<GenerationResult> {
        params.validate()?;

        let invocation = BackendInvocation::new(Arc::new(request.image), &params);
        let start = Instant::now();

        let output = match self.backend.generate(&invocation).await {
            Ok(image) => image,
            Err(e) => {
                error!(
                    "Backend {} failed after {}ms: {}",
                    self.backend.name(),
                    start.elapsed().as_millis(),
                    e
                );
                return Err(e);
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Backend {} finished in {}ms (strength={:.3}, guidance_scale={:.3}, seed={:?})",
            self.backend.name(),
            duration_ms,
            params.strength,
            params.guidance_scale,
            params.seed
        );

        Ok(GenerationResult {
            output_image: Arc::new(output),
            parameters_used: params,
            backend: self.backend.name().to_string(),
            duration_ms,
        })
    }
}
