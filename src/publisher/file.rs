// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Storage collaborator: writes results and their metadata to a directory

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{PublishPayload, ResultPublisher};
use crate::dispatcher::GenerationResult;
use crate::intake::codec;
use crate::mapping::GenerationParameters;

/// Sidecar written next to each stored image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResultMetadata {
    pub id: Uuid,
    pub topic: String,
    pub description: String,
    pub image_file: String,
    pub parameters_used: GenerationParameters,
    pub backend: String,
    pub duration_ms: u64,
    pub stored_at: DateTime<Utc>,
}

pub struct FilePublisher {
    dir: PathBuf,
}

impl FilePublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<id>_output.png` and its sidecar. The image is removed again
    /// when the sidecar cannot be written.
    async fn store(
        &self,
        id: Uuid,
        topic: &str,
        payload: &PublishPayload,
        result: &GenerationResult,
    ) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let png = codec::decode_base64_bytes(&payload.image_data)
            .context("payload image_data is not valid base64")?;
        let image_file = format!("{}_output.png", id);
        let image_path = self.dir.join(&image_file);
        tokio::fs::write(&image_path, &png)
            .await
            .with_context(|| format!("writing {}", image_path.display()))?;

        let metadata = StoredResultMetadata {
            id,
            topic: topic.to_string(),
            description: payload.description.clone(),
            image_file,
            parameters_used: result.parameters_used.clone(),
            backend: result.backend.clone(),
            duration_ms: result.duration_ms,
            stored_at: Utc::now(),
        };
        let sidecar = self.dir.join(format!("{}_output.json", id));
        let written = match serde_json::to_vec_pretty(&metadata) {
            Ok(json) => tokio::fs::write(&sidecar, json)
                .await
                .with_context(|| format!("writing {}", sidecar.display())),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&image_path).await {
                warn!("Could not remove {}: {}", image_path.display(), cleanup);
            }
            return Err(e);
        }

        debug!("Stored result {} in {}", id, self.dir.display());
        Ok(())
    }
}

#[async_trait]
impl ResultPublisher for FilePublisher {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(
        &self,
        topic: &str,
        payload: &PublishPayload,
        result: &GenerationResult,
    ) -> anyhow::Result<()> {
        self.store(Uuid::new_v4(), topic, payload, result).await
    }
}
