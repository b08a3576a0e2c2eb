// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Full pipeline runs over stub collaborators

use mirror_gen_node::error::PipelineError;
use mirror_gen_node::intake::{Intake, RawRequestPayload, Resolution};
use mirror_gen_node::mapping::{derive_seed, EnvironmentReadings, MappingPolicy, ParameterMapper};
use mirror_gen_node::pipeline::Pipeline;
use mirror_gen_node::publisher::Publisher;
use mirror_gen_node::sensors::{FixedSensor, SensorReading, SensorSource};
use std::sync::Arc;

use super::common::{pipeline_with, sample_image_base64, FlakyPublisher, StubBackend, TEST_TOPIC};

fn payload(temperature: &str, humidity: &str) -> RawRequestPayload {
    RawRequestPayload::new(sample_image_base64())
        .with_text("a person at the mirror")
        .with_temperature(temperature)
        .with_humidity(humidity)
}

#[tokio::test]
async fn test_scenario_hot_humid_clamps_to_maximum() {
    let backend = Arc::new(StubBackend::default());
    let publisher = Arc::new(FlakyPublisher::default());
    let pipeline = pipeline_with(MappingPolicy::LinearMapping, backend.clone(), publisher.clone());

    let outcome = pipeline
        .process(payload("Temperature: 35°C", "Humidity: 90%"))
        .await
        .unwrap();

    let params = &outcome.result.parameters_used;
    assert_eq!(params.guidance_scale, 12.0);
    assert_eq!(params.strength, 0.9);
    assert_eq!(params.seed, None);
    assert!(outcome.published());
    assert_eq!(backend.calls(), 1);
    assert_eq!(publisher.calls(), 1);

    let delivered = publisher.delivered.lock().unwrap();
    assert_eq!(delivered[0].0, TEST_TOPIC);
}

#[tokio::test]
async fn test_scenario_cold_dry_clamps_to_minimum() {
    let backend = Arc::new(StubBackend::default());
    let pipeline = pipeline_with(
        MappingPolicy::LinearMapping,
        backend.clone(),
        Arc::new(FlakyPublisher::default()),
    );

    let outcome = pipeline
        .process(payload("Temperature: 15°C", "Humidity: 10%"))
        .await
        .unwrap();

    assert_eq!(outcome.result.parameters_used.guidance_scale, 5.0);
    assert_eq!(outcome.result.parameters_used.strength, 0.3);
}

#[tokio::test]
async fn test_scenario_bad_temperature_never_reaches_backend() {
    let backend = Arc::new(StubBackend::default());
    let publisher = Arc::new(FlakyPublisher::default());
    let pipeline = pipeline_with(MappingPolicy::LinearMapping, backend.clone(), publisher.clone());

    let err = pipeline
        .process(payload("bad data", "Humidity: 50%"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MalformedInput { ref field, .. } if field == "temperature"));
    assert!(err.is_client_error());
    assert_eq!(backend.calls(), 0);
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn test_scenario_publish_failure_keeps_result() {
    let backend = Arc::new(StubBackend::default());
    let publisher = Arc::new(FlakyPublisher::failing_first(1));
    let pipeline = pipeline_with(MappingPolicy::DeterministicSeed, backend.clone(), publisher.clone());

    let outcome = pipeline
        .process(payload("Temperature: 21.5°C", "Humidity: 45%"))
        .await
        .unwrap();

    assert!(!outcome.published());
    match outcome.publish {
        Err(PipelineError::Publish { ref topic, ref cause }) => {
            assert_eq!(topic, TEST_TOPIC);
            assert!(cause.contains("broker unreachable"));
        }
        ref other => panic!("unexpected publish outcome: {:?}", other),
    }

    let result = outcome.result;
    let before_params = result.parameters_used.clone();
    let before_image = result.output_image.as_ref().clone();
    assert_eq!(
        before_params.seed,
        Some(derive_seed(EnvironmentReadings::new(21.5, 45.0)))
    );

    // Publish-only retry: no regeneration
    pipeline.republish(&result).await.unwrap();
    assert_eq!(backend.calls(), 1);
    assert_eq!(publisher.calls(), 2);
    assert_eq!(result.parameters_used, before_params);
    assert_eq!(*result.output_image, before_image);
}

#[tokio::test]
async fn test_augmentation_prompt_reaches_backend() {
    let backend = Arc::new(StubBackend::default());
    let pipeline = pipeline_with(
        MappingPolicy::PromptAugmentation,
        backend.clone(),
        Arc::new(FlakyPublisher::default()),
    );

    let outcome = pipeline
        .process(RawRequestPayload::new(sample_image_base64()).with_temperature(
            "Temperature: 12°C  |  Humidity: 85%",
        ))
        .await
        .unwrap();

    let expected = "Default prompt, cold and frosty day, humid, misty atmosphere";
    assert_eq!(outcome.result.parameters_used.effective_prompt, expected);
    assert_eq!(backend.last.lock().unwrap().as_ref().unwrap().prompt, expected);
}

#[tokio::test]
async fn test_live_sensor_fills_missing_readings() {
    let backend = Arc::new(StubBackend::default());
    let pipeline = pipeline_with(
        MappingPolicy::LinearMapping,
        backend.clone(),
        Arc::new(FlakyPublisher::default()),
    )
    .with_sensor(Arc::new(FixedSensor::new(35.0, 10.0)));

    // Humidity supplied by the caller wins; temperature comes from the sensor
    let outcome = pipeline
        .process(RawRequestPayload::new(sample_image_base64()).with_humidity("Humidity: 90%"))
        .await
        .unwrap();
    assert_eq!(outcome.result.parameters_used.guidance_scale, 12.0);
    assert_eq!(outcome.result.parameters_used.strength, 0.9);
}

struct BrokenSensor;

#[async_trait::async_trait]
impl SensorSource for BrokenSensor {
    fn name(&self) -> &str {
        "broken"
    }

    async fn read(&self) -> anyhow::Result<SensorReading> {
        anyhow::bail!("i2c bus timeout")
    }
}

#[tokio::test]
async fn test_sensor_failure_falls_back_to_defaults() {
    let pipeline = pipeline_with(
        MappingPolicy::LinearMapping,
        Arc::new(StubBackend::default()),
        Arc::new(FlakyPublisher::default()),
    )
    .with_sensor(Arc::new(BrokenSensor));

    let outcome = pipeline
        .process(RawRequestPayload::new(sample_image_base64()))
        .await
        .unwrap();

    // Defaults: 25°C / 50%
    assert!((outcome.result.parameters_used.strength - 0.6).abs() < 1e-12);
    assert!((outcome.result.parameters_used.guidance_scale - 8.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_scratch_copy_removed_after_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();

    let ok = pipeline_with(
        MappingPolicy::LinearMapping,
        Arc::new(StubBackend::default()),
        Arc::new(FlakyPublisher::default()),
    )
    .with_scratch_dir(dir.path());
    ok.process(payload("Temperature: 20°C", "Humidity: 40%"))
        .await
        .unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let failing = Pipeline::new(
        Intake::new(Resolution::new(16, 16)),
        ParameterMapper::default(),
        Arc::new(StubBackend::failing("out of memory")),
        Publisher::noop(),
    )
    .with_scratch_dir(dir.path());
    let err = failing
        .process(payload("Temperature: 20°C", "Humidity: 40%"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::GenerationBackend { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
