// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request pipeline: intake -> mapping -> generation -> publish
//!
//! Stages run strictly in that order for a single request. Collaborators
//! (backend, publisher, sensor) are injected; `from_config` wires the ones
//! named by a `PipelineConfig`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::{
    load_local_model, ImageBackend, LocalBackend, RemoteBackend, COLOR_GRADE_MODEL_ID,
};
use crate::config::{BackendKind, PipelineConfig, PublisherKind, SensorKind};
use crate::dispatcher::{GenerationDispatcher, GenerationResult};
use crate::error::{PipelineError, Result};
use crate::intake::{codec, Intake, RawRequestPayload, ScopedImageFile};
use crate::mapping::{GenerationParameters, MappingPolicy, ParameterMapper};
use crate::publisher::{FilePublisher, HttpPublisher, NoopPublisher, Publisher, ResultPublisher};
use crate::sensors::{FixedSensor, SensorSource, SimulatedSensor, ThermalZoneSensor};

/// Generation result plus the separate outcome of publishing it
#[derive(Debug)]
pub struct PipelineOutcome {
    pub result: GenerationResult,
    pub publish: Result<()>,
}

impl PipelineOutcome {
    pub fn published(&self) -> bool {
        self.publish.is_ok()
    }
}

pub struct Pipeline {
    intake: Intake,
    mapper: ParameterMapper,
    dispatcher: GenerationDispatcher,
    publisher: Publisher,
    sensor: Option<Arc<dyn SensorSource>>,
    scratch_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        intake: Intake,
        mapper: ParameterMapper,
        backend: Arc<dyn ImageBackend>,
        publisher: Publisher,
    ) -> Self {
        Self {
            intake,
            mapper,
            dispatcher: GenerationDispatcher::new(backend),
            publisher,
            sensor: None,
            scratch_dir: None,
        }
    }

    /// Live readings used when the request omits temperature or humidity
    pub fn with_sensor(mut self, sensor: Arc<dyn SensorSource>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Keep a scoped copy of each decoded input in `dir` while it is processed
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mapper = ParameterMapper::new(config.mapping_policy()?);
        let intake = Intake::new(config.image.resolution());
        let backend = build_backend(config)?;
        let publisher = build_publisher(config)?;

        let mut pipeline = Self::new(intake, mapper, backend, publisher);
        if let Some(sensor) = build_sensor(config) {
            pipeline = pipeline.with_sensor(sensor);
        }
        if let Some(ref dir) = config.server.scratch_dir {
            pipeline = pipeline.with_scratch_dir(dir.clone());
        }

        info!(
            "Pipeline ready: policy={}, backend={}, publisher={} -> '{}'",
            pipeline.policy(),
            pipeline.dispatcher.backend_name(),
            pipeline.publisher.transport_name(),
            pipeline.publisher.topic()
        );
        Ok(pipeline)
    }

    pub fn policy(&self) -> MappingPolicy {
        self.mapper.policy()
    }

    pub fn backend_name(&self) -> &str {
        self.dispatcher.backend_name()
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub async fn health_check(&self) -> bool {
        self.dispatcher.health_check().await
    }

    /// Run one request through every stage.
    ///
    /// Intake, mapping and generation failures return `Err`. A publish
    /// failure is reported in `PipelineOutcome::publish` next to the
    /// intact result.
    pub async fn process(&self, raw: RawRequestPayload) -> Result<PipelineOutcome> {
        info!(
            "Request received: prompt_len={}, temperature={}, humidity={}, object={:?}",
            raw.text.as_deref().map(str::len).unwrap_or(0),
            if raw.temperature.is_some() { "supplied" } else { "absent" },
            if raw.humidity.is_some() { "supplied" } else { "absent" },
            raw.object
        );

        let raw = self.fill_live_readings(raw).await;
        let request = self.intake.parse(raw)?;
        info!(
            "Parsed readings: temperature={}°C, humidity={}%",
            request.temperature_c, request.humidity_pct
        );

        let _scratch = match self.scratch_dir {
            Some(ref dir) => {
                let extension = codec::detect_format(&request.source_bytes)
                    .map(codec::format_to_extension)
                    .unwrap_or("img");
                Some(ScopedImageFile::create(dir, &request.source_bytes, extension)?)
            }
            None => None,
        };

        let params = self.mapper.map(&request.prompt_text, request.readings())?;
        info!(
            "Policy {}: strength={:.3}, guidance_scale={:.3}, seed={:?}, prompt='{}'",
            self.mapper.policy(),
            params.strength,
            params.guidance_scale,
            params.seed,
            params.effective_prompt
        );

        let result = self.dispatcher.generate(request, params).await?;

        let publish = self.publisher.publish(&result).await;
        if let Err(ref e) = publish {
            warn!("Generation succeeded but publish failed: {}", e);
        }

        Ok(PipelineOutcome { result, publish })
    }

    /// Deliver an already-produced result again without regenerating
    pub async fn republish(&self, result: &GenerationResult) -> Result<()> {
        self.publisher.publish(result).await
    }

    /// Map readings and text to parameters without an image or backend call
    pub fn preview_parameters(
        &self,
        text: Option<&str>,
        temperature: Option<&str>,
        humidity: Option<&str>,
    ) -> Result<GenerationParameters> {
        let fields = self.intake.parse_fields(text, temperature, humidity)?;
        self.mapper.map(&fields.prompt_text, fields.readings)
    }

    async fn fill_live_readings(&self, raw: RawRequestPayload) -> RawRequestPayload {
        let sensor = match self.sensor {
            Some(ref s) if raw.needs_readings() => s,
            _ => return raw,
        };
        match sensor.read().await {
            Ok(reading) => {
                debug!(
                    "Live reading from {}: {}°C, {}%",
                    sensor.name(),
                    reading.temperature_c,
                    reading.humidity_pct
                );
                raw.with_live_readings(&reading)
            }
            Err(e) => {
                warn!(
                    "Sensor {} unavailable, using default readings: {:#}",
                    sensor.name(),
                    e
                );
                raw
            }
        }
    }
}

pub fn build_backend(config: &PipelineConfig) -> Result<Arc<dyn ImageBackend>> {
    match config.backend {
        BackendKind::Local => {
            let model = load_local_model(&config.selected_model)?;
            Ok(Arc::new(LocalBackend::new(model)))
        }
        BackendKind::Remote => {
            let endpoint = config
                .remote
                .endpoint
                .as_deref()
                .ok_or_else(|| PipelineError::Config("remote.endpoint is not set".to_string()))?;
            let backend = RemoteBackend::new(endpoint, config.remote.request_timeout())?
                .with_api_key(config.remote.api_key.clone())
                .with_model(remote_model(config))
                .with_output_field(config.remote.output_field.clone())
                .with_retry(config.remote.retry_policy());
            Ok(Arc::new(backend))
        }
    }
}

/// Model name forwarded to a remote service; the built-in local id is never sent
fn remote_model(config: &PipelineConfig) -> Option<String> {
    let model = config.selected_model.trim();
    (!model.is_empty() && model != COLOR_GRADE_MODEL_ID).then(|| model.to_string())
}

pub fn build_publisher(config: &PipelineConfig) -> Result<Publisher> {
    let settings = &config.publisher;
    let transport: Arc<dyn ResultPublisher> = match settings.kind {
        PublisherKind::Http => {
            let url = settings
                .url
                .as_deref()
                .ok_or_else(|| PipelineError::Config("publisher.url is not set".to_string()))?;
            let http = HttpPublisher::new(url, Duration::from_secs(settings.timeout_secs))
                .map_err(|e| PipelineError::Config(format!("{:#}", e)))?;
            Arc::new(http)
        }
        PublisherKind::File => {
            let dir = settings.output_dir.clone().ok_or_else(|| {
                PipelineError::Config("publisher.output_dir is not set".to_string())
            })?;
            Arc::new(FilePublisher::new(dir))
        }
        PublisherKind::None => Arc::new(NoopPublisher),
    };
    Ok(Publisher::new(transport, settings.topic.clone()).with_description(settings.description.clone()))
}

pub fn build_sensor(config: &PipelineConfig) -> Option<Arc<dyn SensorSource>> {
    let settings = &config.sensor;
    match settings.kind {
        SensorKind::None => None,
        SensorKind::Fixed => Some(Arc::new(FixedSensor::new(
            settings.temperature_c,
            settings.humidity_pct,
        ))),
        SensorKind::Simulated => Some(Arc::new(SimulatedSensor::default())),
        SensorKind::Thermal => Some(Arc::new(ThermalZoneSensor::new(
            settings.thermal_path.clone(),
            settings.humidity_pct,
        ))),
    }
}
