// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result Publisher
//!
//! Encodes a finished `GenerationResult` and hands it to a transport.
//! Publishing only borrows the result, so a failed delivery leaves it intact
//! for the caller to re-publish.

pub mod broadcast;
pub mod file;
pub mod http;

pub use broadcast::{BroadcastPublisher, PublishedMessage};
pub use file::FilePublisher;
pub use http::HttpPublisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::dispatcher::GenerationResult;
use crate::error::{PipelineError, Result};
use crate::intake::codec;

pub const DEFAULT_TOPIC: &str = "IC.embedded/LUGUAN/picture";
pub const DEFAULT_DESCRIPTION: &str = "Generated image from Stable Diffusion";

/// Wire payload delivered to the downstream channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPayload {
    /// PNG bytes, standard base64
    pub image_data: String,
    pub description: String,
}

impl PublishPayload {
    pub fn from_result(result: &GenerationResult, description: &str) -> Result<Self> {
        let image_data = codec::encode_png_base64(&result.output_image)?;
        Ok(Self {
            image_data,
            description: description.to_string(),
        })
    }
}

/// A transport or storage collaborator that accepts finished results
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(
        &self,
        topic: &str,
        payload: &PublishPayload,
        result: &GenerationResult,
    ) -> anyhow::Result<()>;
}

/// Discards results; used when no downstream channel is configured
pub struct NoopPublisher;

#[async_trait]
impl ResultPublisher for NoopPublisher {
    fn name(&self) -> &str {
        "none"
    }

    async fn deliver(
        &self,
        topic: &str,
        _payload: &PublishPayload,
        _result: &GenerationResult,
    ) -> anyhow::Result<()> {
        debug!("No publisher configured; dropping result for '{}'", topic);
        Ok(())
    }
}

/// Binds a transport to a topic and description
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn ResultPublisher>,
    topic: String,
    description: String,
}

impl Publisher {
    pub fn new(transport: Arc<dyn ResultPublisher>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopPublisher), DEFAULT_TOPIC)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Encode the result into its wire payload
    pub fn payload(&self, result: &GenerationResult) -> Result<PublishPayload> {
        PublishPayload::from_result(result, &self.description)
            .map_err(|e| PipelineError::publish(&self.topic, format!("encoding failed: {}", e)))
    }

    pub async fn publish(&self, result: &GenerationResult) -> Result<()> {
        let payload = self.payload(result)?;

        match self.transport.deliver(&self.topic, &payload, result).await {
            Ok(()) => {
                info!(
                    "Published result to '{}' via {} ({} base64 bytes)",
                    self.topic,
                    self.transport.name(),
                    payload.image_data.len()
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    "Publish to '{}' via {} failed: {:#}",
                    self.topic,
                    self.transport.name(),
                    e
                );
                Err(PipelineError::publish(&self.topic, format!("{:#}", e)))
            }
        }
    }
}
