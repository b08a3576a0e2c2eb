// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /v1/parameters - parameter preview without an image

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::mapping::GenerationParameters;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParametersRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub humidity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametersResponse {
    pub policy: String,
    #[serde(flatten)]
    pub parameters: GenerationParameters,
}

pub async fn parameters_handler(
    State(state): State<AppState>,
    Json(request): Json<ParametersRequest>,
) -> Result<Json<ParametersResponse>, ApiError> {
    debug!(
        "parameters request: temperature={:?}, humidity={:?}",
        request.temperature, request.humidity
    );

    let parameters = state.pipeline.preview_parameters(
        request.text.as_deref(),
        request.temperature.as_deref(),
        request.humidity.as_deref(),
    )?;

    Ok(Json(ParametersResponse {
        policy: state.pipeline.policy().to_string(),
        parameters,
    }))
}
