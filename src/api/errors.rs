// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub status: String,
    pub error_code: String,
    pub stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    CaptureCooldown { retry_after: Duration },
    ServiceUnavailable(String),
    InternalError(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::CaptureCooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_code, stage, message, details) = match self {
            ApiError::Pipeline(e) => {
                let mut details = HashMap::new();
                match e {
                    PipelineError::MalformedInput { field, .. } => {
                        details.insert("field".to_string(), serde_json::json!(field));
                    }
                    PipelineError::BackendUnavailable { attempts, .. } => {
                        details.insert("attempts".to_string(), serde_json::json!(attempts));
                    }
                    _ => {}
                }
                (
                    e.error_code(),
                    e.stage().as_str(),
                    e.to_string(),
                    (!details.is_empty()).then_some(details),
                )
            }
            ApiError::CaptureCooldown { retry_after } => {
                let mut details = HashMap::new();
                details.insert(
                    "retry_after_secs".to_string(),
                    serde_json::json!(retry_after.as_secs_f64().ceil() as u64),
                );
                (
                    "CAPTURE_COOLDOWN",
                    "intake",
                    "Capture cooldown active for this source".to_string(),
                    Some(details),
                )
            }
            ApiError::ServiceUnavailable(msg) => ("SERVICE_UNAVAILABLE", "server", msg.clone(), None),
            ApiError::InternalError(msg) => ("INTERNAL_ERROR", "server", msg.clone(), None),
        };

        ErrorResponse {
            status: "error".to_string(),
            error_code: error_code.to_string(),
            stage: stage.to_string(),
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();
        if status.is_server_error() {
            warn!("Request failed with {}: {}", status, body.message);
        }
        (status, Json(body)).into_response()
    }
}
