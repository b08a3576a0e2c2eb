// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface over a stubbed pipeline

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{Rgb, RgbImage};
use mirror_gen_node::api::{build_router, AppState, ErrorResponse, ProcessImageResponse};
use mirror_gen_node::config::ServerConfig;
use mirror_gen_node::intake::{codec, MAX_IMAGE_SIZE};
use mirror_gen_node::mapping::MappingPolicy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use super::common::{pipeline_with, sample_image_base64, spawn_stub, FlakyPublisher, StubBackend};

async fn start(
    backend: Arc<StubBackend>,
    publisher: Arc<FlakyPublisher>,
    cooldown_secs: u64,
) -> SocketAddr {
    let pipeline = pipeline_with(MappingPolicy::LinearMapping, backend, publisher);
    let config = ServerConfig {
        capture_cooldown_secs: cooldown_secs,
        ..Default::default()
    };
    spawn_stub(build_router(AppState::new(pipeline, &config))).await
}

#[tokio::test]
async fn test_process_image_success() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 0).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({
            "image_data": sample_image_base64(),
            "text": "entryway",
            "temperature": "Temperature: 35°C",
            "humidity": "Humidity: 90%"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: ProcessImageResponse = response.json().await.unwrap();
    assert_eq!(body.status, "success");
    assert_eq!(body.strength, 0.9);
    assert_eq!(body.guidance_scale, 12.0);
    assert_eq!(body.effective_prompt, "entryway");
    assert!(body.published);
    assert!(body.publish_error.is_none());

    let bytes = codec::decode_base64_bytes(&body.image_data.unwrap()).unwrap();
    assert_eq!(codec::decode_image_bytes(&bytes).unwrap().width(), 64);
    assert_eq!(backend.calls(), 1);
}

/// Incompressible pixels so the PNG stays close to width * height * 3 bytes
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(7);
    let image = RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));
    codec::encode_png(&image).unwrap()
}

#[tokio::test]
async fn test_multi_megabyte_image_accepted() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 0).await;

    let png = noisy_png(1024, 1024);
    assert!(png.len() > 2 * 1024 * 1024 && png.len() < MAX_IMAGE_SIZE);

    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({ "image_data": STANDARD.encode(&png), "return_image": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_oversize_image_is_typed_400() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 0).await;

    let oversize = vec![0u8; MAX_IMAGE_SIZE + 512 * 1024];
    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({ "image_data": STANDARD.encode(&oversize) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error_code, "MALFORMED_INPUT");
    assert_eq!(body.details.unwrap()["field"], "image_data");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_temperature_is_400() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 0).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({ "image_data": sample_image_base64(), "temperature": "bad data" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error_code, "MALFORMED_INPUT");
    assert_eq!(body.stage, "intake");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_backend_failure_is_500() {
    let addr = start(
        Arc::new(StubBackend::failing("kernel panic")),
        Arc::new(FlakyPublisher::default()),
        0,
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({ "image_data": sample_image_base64() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error_code, "GENERATION_BACKEND_ERROR");
    assert_eq!(body.stage, "generation");
}

#[tokio::test]
async fn test_publish_failure_reported_in_success_body() {
    let addr = start(
        Arc::new(StubBackend::default()),
        Arc::new(FlakyPublisher::failing_first(1)),
        0,
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/process_image", addr))
        .json(&json!({ "image_data": sample_image_base64(), "return_image": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: ProcessImageResponse = response.json().await.unwrap();
    assert!(!body.published);
    assert!(body.publish_error.unwrap().contains("broker unreachable"));
    assert!(body.image_data.is_none());
}

#[tokio::test]
async fn test_capture_cooldown_rejects_repeat_source() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 60).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/process_image", addr);
    let body = json!({ "image_data": sample_image_base64(), "source_id": "mirror-1", "return_image": false });

    assert_eq!(client.post(&url).json(&body).send().await.unwrap().status(), 200);

    let second = client.post(&url).json(&body).send().await.unwrap();
    assert_eq!(second.status(), 429);
    let error: ErrorResponse = second.json().await.unwrap();
    assert_eq!(error.error_code, "CAPTURE_COOLDOWN");

    let other = json!({ "image_data": sample_image_base64(), "source_id": "mirror-2", "return_image": false });
    assert_eq!(client.post(&url).json(&other).send().await.unwrap().status(), 200);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_rejected_request_keeps_no_cooldown() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 60).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/process_image", addr);

    let malformed = json!({ "image_data": sample_image_base64(), "temperature": "bad data", "source_id": "mirror-1" });
    assert_eq!(client.post(&url).json(&malformed).send().await.unwrap().status(), 400);

    let valid = json!({ "image_data": sample_image_base64(), "source_id": "mirror-1", "return_image": false });
    assert_eq!(client.post(&url).json(&valid).send().await.unwrap().status(), 200);
    assert_eq!(client.post(&url).json(&valid).send().await.unwrap().status(), 429);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_parameters_endpoint() {
    let backend = Arc::new(StubBackend::default());
    let addr = start(backend.clone(), Arc::new(FlakyPublisher::default()), 0).await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/v1/parameters", addr))
        .json(&json!({ "temperature": "Temperature: 15°C", "humidity": "Humidity: 10%" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["policy"], "linear_mapping");
    assert_eq!(body["strength"], 0.3);
    assert_eq!(body["guidance_scale"], 5.0);
    assert!(body["effective_prompt"]
        .as_str()
        .unwrap()
        .starts_with("Default prompt"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start(
        Arc::new(StubBackend::default()),
        Arc::new(FlakyPublisher::default()),
        0,
    )
    .await;

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "stub");
    assert_eq!(body["policy"], "linear_mapping");
    assert_eq!(body["available_slots"], 4);
    assert_eq!(body["version"], mirror_gen_node::version::VERSION_NUMBER);
    assert_eq!(body["build_date"], mirror_gen_node::version::BUILD_DATE);
    let features = body["features"].as_array().unwrap();
    assert!(features.iter().any(|f| f == "linear-mapping"));
}
