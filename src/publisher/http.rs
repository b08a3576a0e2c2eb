// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Message-bus delivery through an HTTP bridge
//!
//! The bridge receives `POST {base_url}/{topic}` with the JSON payload and
//! forwards it to the bus topic of the same name.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{PublishPayload, ResultPublisher};
use crate::dispatcher::GenerationResult;

pub struct HttpPublisher {
    client: Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building publish HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("HTTP bus bridge configured: {}", base_url);
        Ok(Self { client, base_url })
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url, topic.trim_start_matches('/'))
    }
}

#[async_trait]
impl ResultPublisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(
        &self,
        topic: &str,
        payload: &PublishPayload,
        _result: &GenerationResult,
    ) -> anyhow::Result<()> {
        let url = self.topic_url(topic);
        debug!("Publish POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("bridge unreachable at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("bus bridge returned {}: {}", status, text));
        }
        Ok(())
    }
}
