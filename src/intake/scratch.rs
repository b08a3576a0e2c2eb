// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scoped working copy of a decoded input image
//!
//! The file lives exactly as long as the guard; dropping it removes the file
//! whether the request succeeded, failed to parse, or failed downstream.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub struct ScopedImageFile {
    file: NamedTempFile,
}

impl ScopedImageFile {
    /// Write `bytes` to a fresh `temp_input_*.<extension>` file inside `dir`
    pub fn create(dir: &Path, bytes: &[u8], extension: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            PipelineError::Config(format!("cannot create scratch dir {}: {}", dir.display(), e))
        })?;

        let suffix = format!(".{}", extension);
        let mut file = Builder::new()
            .prefix("temp_input_")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| PipelineError::Config(format!("cannot create scratch file: {}", e)))?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| PipelineError::Config(format!("cannot write scratch file: {}", e)))?;

        debug!("Scratch input written: {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}
