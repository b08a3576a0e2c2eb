// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod backend;
pub mod cli;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod intake;
pub mod mapping;
pub mod pipeline;
pub mod publisher;
pub mod sensors;
pub mod version;

pub use backend::{BackendInvocation, ImageBackend, LocalBackend, RemoteBackend, RetryPolicy};
pub use config::PipelineConfig;
pub use cooldown::CaptureGuard;
pub use dispatcher::{GenerationDispatcher, GenerationResult};
pub use error::{PipelineError, Result, Stage};
pub use intake::{GenerationRequest, Intake, RawRequestPayload};
pub use mapping::{EnvironmentReadings, GenerationParameters, MappingPolicy, ParameterMapper};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use publisher::{PublishPayload, Publisher, ResultPublisher};
pub use sensors::{SensorReading, SensorSource};
