// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process bus for local display subscribers

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{PublishPayload, ResultPublisher};
use crate::dispatcher::GenerationResult;

const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: PublishPayload,
}

pub struct BroadcastPublisher {
    sender: broadcast::Sender<PublishedMessage>,
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl ResultPublisher for BroadcastPublisher {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn deliver(
        &self,
        topic: &str,
        payload: &PublishPayload,
        _result: &GenerationResult,
    ) -> anyhow::Result<()> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        };
        self.sender
            .send(message)
            .map(|_| ())
            .map_err(|_| anyhow!("no subscriber is listening on '{}'", topic))
    }
}
