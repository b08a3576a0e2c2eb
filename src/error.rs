// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the environment-conditioned generation pipeline
//!
//! Every failure path maps to exactly one variant so callers can decide
//! between regenerating, re-publishing, or aborting:
//! - Intake errors (malformed image, unparsable readings)
//! - Configuration errors (unknown mapping policy, bad options)
//! - Backend errors (local invocation failure, remote retry exhaustion,
//!   remote response without an output reference)
//! - Publish errors (delivery failed after a successful generation)

use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Intake,
    Mapping,
    Generation,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Intake => "intake",
            Stage::Mapping => "mapping",
            Stage::Generation => "generation",
            Stage::Publish => "publish",
        }
    }
}

/// Errors produced by the generation pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Inbound payload failed validation before any generation work
    #[error("Malformed input in '{field}': {reason}")]
    MalformedInput { field: String, reason: String },

    /// Configured mapping policy name is not recognized
    #[error("Invalid mapping policy: '{0}'")]
    InvalidPolicy(String),

    /// Rescale requested over an empty source domain
    #[error("Invalid rescale range: old_min == old_max == {0}")]
    InvalidRange(f64),

    /// Configuration option missing or out of bounds
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image-generation backend raised during invocation
    #[error("Generation backend failed: {cause}")]
    GenerationBackend { cause: String },

    /// Remote backend exhausted its retry budget
    #[error("Backend unavailable after {attempts} attempt(s): {last_error}")]
    BackendUnavailable { attempts: u32, last_error: String },

    /// Remote backend answered successfully without the output reference
    #[error("Backend response is missing output field '{field}'")]
    MissingOutput { field: String },

    /// Delivery of a finished result failed; the result itself is intact
    #[error("Failed to publish to '{topic}': {cause}")]
    Publish { topic: String, cause: String },
}

impl PipelineError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(cause: impl std::fmt::Display) -> Self {
        PipelineError::GenerationBackend {
            cause: cause.to_string(),
        }
    }

    pub fn publish(topic: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        PipelineError::Publish {
            topic: topic.into(),
            cause: cause.to_string(),
        }
    }

    /// Stage that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MalformedInput { .. } => Stage::Intake,
            PipelineError::InvalidPolicy(_) | PipelineError::Config(_) => Stage::Config,
            PipelineError::InvalidRange(_) => Stage::Mapping,
            PipelineError::GenerationBackend { .. }
            | PipelineError::BackendUnavailable { .. }
            | PipelineError::MissingOutput { .. } => Stage::Generation,
            PipelineError::Publish { .. } => Stage::Publish,
        }
    }

    /// Get error code for logging and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput { .. } => "MALFORMED_INPUT",
            PipelineError::InvalidPolicy(_) => "INVALID_POLICY",
            PipelineError::InvalidRange(_) => "INVALID_RANGE",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::GenerationBackend { .. } => "GENERATION_BACKEND_ERROR",
            PipelineError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            PipelineError::MissingOutput { .. } => "MISSING_OUTPUT",
            PipelineError::Publish { .. } => "PUBLISH_ERROR",
        }
    }

    /// HTTP status class for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::MalformedInput { .. } | PipelineError::InvalidPolicy(_) => 400,
            PipelineError::InvalidRange(_)
            | PipelineError::Config(_)
            | PipelineError::GenerationBackend { .. } => 500,
            PipelineError::MissingOutput { .. } | PipelineError::Publish { .. } => 502,
            PipelineError::BackendUnavailable { .. } => 503,
        }
    }

    /// Whether the caller may reasonably retry the failed stage
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::BackendUnavailable { .. } | PipelineError::Publish { .. }
        )
    }

    /// Whether the error is the caller's fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
