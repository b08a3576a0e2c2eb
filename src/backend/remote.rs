// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP img2img backend with bounded retry

use async_trait::async_trait;
use image::RgbImage;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::retry::{AttemptError, RetryPolicy};
use super::{BackendInvocation, ImageBackend};
use crate::error::{PipelineError, Result};
use crate::intake::codec;

pub const DEFAULT_OUTPUT_FIELD: &str = "output";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONTROLNET_MODEL: &str = "canny";
pub const CONTROLNET_CONDITIONING_SCALE: f64 = 1.0;

/// Client for a remote img2img service
pub struct RemoteBackend {
    client: Client,
    name: String,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    output_field: String,
    retry: RetryPolicy,
}

impl RemoteBackend {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {}", e)))?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(
            "Remote backend configured: endpoint={}, timeout={}s",
            endpoint,
            request_timeout.as_secs()
        );

        Ok(Self {
            client,
            name: format!("remote:{}", endpoint),
            endpoint,
            api_key: None,
            model: None,
            output_field: DEFAULT_OUTPUT_FIELD.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.is_empty());
        self
    }

    /// The response field holding the output reference (`output` or `processed_image_url`)
    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = field.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn request_body(&self, invocation: &BackendInvocation) -> Result<Value> {
        let init_image = codec::encode_png_base64(&invocation.image)?;

        let mut body = json!({
            "init_images": [init_image],
            "prompt": invocation.prompt,
            "controlnet_conditioning_scale": CONTROLNET_CONDITIONING_SCALE,
            "controlnet_model": CONTROLNET_MODEL,
            "strength": invocation.strength,
            "guidance_scale": invocation.guidance_scale,
        });
        if let Some(seed) = invocation.seed {
            body["seed"] = json!(seed);
        }
        if let Some(ref model) = self.model {
            body["model"] = json!(model);
        }
        Ok(body)
    }

    async fn attempt(&self, body: &Value) -> std::result::Result<RgbImage, AttemptError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error("backend", status, &text));
        }

        let payload: Value = serde_json::from_str(&text).map_err(|e| {
            AttemptError::Terminal(PipelineError::backend(format!(
                "backend returned non-JSON body: {}",
                e
            )))
        })?;
        let reference = extract_output(&payload, &self.output_field)?;

        let bytes = if is_url(&reference) {
            self.download(&reference).await?
        } else {
            codec::decode_base64_bytes(&reference).map_err(|e| {
                AttemptError::Terminal(PipelineError::backend(format!(
                    "output is neither a URL nor base64 image data: {}",
                    e
                )))
            })?
        };

        let image = codec::decode_image_bytes(&bytes).map_err(|e| {
            AttemptError::Terminal(PipelineError::backend(format!(
                "output image cannot be decoded: {}",
                e
            )))
        })?;
        Ok(image.to_rgb8())
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, AttemptError> {
        debug!("Downloading backend output from {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("output download", status, &text));
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageBackend for RemoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, invocation: &BackendInvocation) -> Result<RgbImage> {
        let body = self.request_body(invocation)?;
        let start = Instant::now();
        debug!("Remote generate POST {}", self.endpoint);

        let image = self
            .retry
            .run("remote generate", |_attempt| self.attempt(&body))
            .await?;

        info!(
            "Remote backend returned {}x{} in {}ms",
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );
        Ok(image)
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Remote backend health check failed: {}", e);
                false
            }
        }
    }
}

/// Pull the output reference out of a successful response.
///
/// Accepts a string or a non-empty array whose first element is a string.
pub fn extract_output(payload: &Value, field: &str) -> std::result::Result<String, AttemptError> {
    let missing = || {
        AttemptError::Terminal(PipelineError::MissingOutput {
            field: field.to_string(),
        })
    };

    let reference = match payload.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(missing)?,
        _ => return Err(missing()),
    };

    if reference.trim().is_empty() {
        return Err(missing());
    }
    Ok(reference)
}

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn transport_error(e: reqwest::Error) -> AttemptError {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection error"
    } else {
        "transport error"
    };
    AttemptError::Transient(format!("{}: {}", kind, e))
}

fn status_error(context: &str, status: StatusCode, body: &str) -> AttemptError {
    let message = format!("{} returned {}: {}", context, status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AttemptError::Transient(message)
    } else {
        AttemptError::Terminal(PipelineError::backend(message))
    }
}
