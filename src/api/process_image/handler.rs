// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image processing endpoint handler

use axum::{extract::State, Json};
use tracing::{debug, info, warn};

use super::request::ProcessImageRequest;
use super::response::ProcessImageResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::error::Stage;
use crate::intake::codec;

/// POST /process_image - Stylize a captured frame from readings and text
///
/// Pipeline:
/// 1. Enforce the per-source capture cooldown (429 if too soon); released
///    again when intake rejects the request
/// 2. Wait for a request slot (bounded concurrency)
/// 3. Run intake, mapping and generation (typed error on failure)
/// 4. Publish; a publish failure is reported in the body, not as an error
/// 5. Build and return ProcessImageResponse
pub async fn process_image_handler(
    State(state): State<AppState>,
    Json(request): Json<ProcessImageRequest>,
) -> Result<Json<ProcessImageResponse>, ApiError> {
    debug!(
        "process_image request: source={}, has_image={}, object={:?}",
        request.source_key(),
        request.payload.image_data.is_some(),
        request.payload.object
    );

    // 1. Cooldown gate
    if let Err(retry_after) = state.cooldown.try_acquire(request.source_key()) {
        warn!(
            "Capture from '{}' rejected: cooldown {}ms remaining",
            request.source_key(),
            retry_after.as_millis()
        );
        return Err(ApiError::CaptureCooldown { retry_after });
    }

    // 2. Concurrency slot
    let _permit = state
        .limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::ServiceUnavailable("server is shutting down".to_string()))?;

    // 3-4. Pipeline
    let return_image = request.return_image;
    let source = request.source_key().to_string();
    let outcome = match state.pipeline.process(request.payload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Rejected input is not a capture; it keeps no cooldown window
            if e.stage() == Stage::Intake {
                state.cooldown.release(&source);
            }
            return Err(e.into());
        }
    };

    // 5. Response
    let image_data = if return_image {
        let encoded = codec::encode_png_base64(&outcome.result.output_image)
            .map_err(|e| ApiError::InternalError(format!("cannot encode output image: {}", e)))?;
        Some(encoded)
    } else {
        None
    };

    let params = &outcome.result.parameters_used;
    info!(
        "process_image done: backend={}, {}ms, published={}",
        outcome.result.backend,
        outcome.result.duration_ms,
        outcome.published()
    );

    Ok(Json(ProcessImageResponse {
        status: "success".to_string(),
        strength: params.strength,
        guidance_scale: params.guidance_scale,
        seed: params.seed,
        effective_prompt: params.effective_prompt.clone(),
        backend: outcome.result.backend.clone(),
        processing_time_ms: outcome.result.duration_ms,
        published: outcome.published(),
        publish_error: outcome.publish.as_ref().err().map(|e| e.to_string()),
        image_data,
    }))
}
