// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Publisher transports and failure reporting

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{extract::Path, extract::State, routing::post, Json, Router};
use mirror_gen_node::dispatcher::GenerationResult;
use mirror_gen_node::error::PipelineError;
use mirror_gen_node::intake::codec;
use mirror_gen_node::mapping::GenerationParameters;
use mirror_gen_node::publisher::file::StoredResultMetadata;
use mirror_gen_node::publisher::{
    BroadcastPublisher, FilePublisher, HttpPublisher, PublishPayload, Publisher, ResultPublisher,
    DEFAULT_DESCRIPTION,
};
use mockall::mock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::common::{closed_port, sample_image, spawn_stub, TEST_TOPIC};

mock! {
    pub Transport {}

    #[async_trait]
    impl ResultPublisher for Transport {
        fn name(&self) -> &str;
        async fn deliver(
            &self,
            topic: &str,
            payload: &PublishPayload,
            result: &GenerationResult,
        ) -> anyhow::Result<()>;
    }
}

fn result() -> GenerationResult {
    GenerationResult {
        output_image: Arc::new(sample_image(6, 6)),
        parameters_used: GenerationParameters {
            strength: 0.9,
            guidance_scale: 12.0,
            seed: Some(1234),
            effective_prompt: "snowy porch".to_string(),
        },
        backend: "stub".to_string(),
        duration_ms: 42,
    }
}

#[tokio::test]
async fn test_transport_failure_becomes_publish_error() {
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock".to_string());
    transport
        .expect_deliver()
        .withf(|topic, payload, _| {
            topic.to_string() == TEST_TOPIC && payload.description == DEFAULT_DESCRIPTION
        })
        .times(1)
        .returning(|_, _, _| Err(anyhow!("broker down")));

    let publisher = Publisher::new(Arc::new(transport), TEST_TOPIC);
    let original = result();
    let err = publisher.publish(&original).await.unwrap_err();
    assert!(err.is_retryable());

    match err {
        PipelineError::Publish { topic, cause } => {
            assert_eq!(topic, TEST_TOPIC);
            assert!(cause.contains("broker down"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(original.parameters_used, result().parameters_used);
}

#[tokio::test]
async fn test_payload_decodes_to_output_image() {
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock".to_string());
    transport
        .expect_deliver()
        .withf(|_, payload, result| {
            let bytes = codec::decode_base64_bytes(&payload.image_data).unwrap();
            let decoded = codec::decode_image_bytes(&bytes).unwrap().to_rgb8();
            decoded == *result.output_image && payload.description == "frost mirror"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    Publisher::new(Arc::new(transport), TEST_TOPIC)
        .with_description("frost mirror")
        .publish(&result())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_file_publisher_writes_image_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = Publisher::new(Arc::new(FilePublisher::new(dir.path())), TEST_TOPIC);
    publisher.publish(&result()).await.unwrap();

    let mut pngs = Vec::new();
    let mut sidecars = Vec::new();
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.ends_with("_output.png") {
            pngs.push(path);
        } else if name.ends_with("_output.json") {
            sidecars.push(path);
        }
    }
    assert_eq!(pngs.len(), 1);
    assert_eq!(sidecars.len(), 1);

    let stored = image::open(&pngs[0]).unwrap().to_rgb8();
    assert_eq!(stored, sample_image(6, 6));

    let metadata: StoredResultMetadata =
        serde_json::from_slice(&std::fs::read(&sidecars[0]).unwrap()).unwrap();
    assert_eq!(metadata.topic, TEST_TOPIC);
    assert_eq!(metadata.parameters_used, result().parameters_used);
    assert_eq!(metadata.duration_ms, 42);
    assert_eq!(
        pngs[0].file_name().unwrap().to_string_lossy(),
        metadata.image_file
    );
}

#[tokio::test]
async fn test_broadcast_requires_subscriber() {
    let bus = Arc::new(BroadcastPublisher::default());
    let publisher = Publisher::new(bus.clone(), TEST_TOPIC);

    assert!(matches!(
        publisher.publish(&result()).await,
        Err(PipelineError::Publish { .. })
    ));

    let mut rx = bus.subscribe();
    publisher.publish(&result()).await.unwrap();
    let message = rx.recv().await.unwrap();
    assert_eq!(message.topic, TEST_TOPIC);
    assert_eq!(message.payload.description, DEFAULT_DESCRIPTION);
}

type Captured = Arc<Mutex<Vec<(String, PublishPayload)>>>;

#[tokio::test]
async fn test_http_publisher_posts_to_topic_path() {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route(
            "/publish/*topic",
            post(
                |State(captured): State<Captured>,
                 Path(topic): Path<String>,
                 Json(payload): Json<PublishPayload>| async move {
                    captured.lock().unwrap().push((topic, payload));
                    "queued"
                },
            ),
        )
        .with_state(captured.clone());
    let addr = spawn_stub(app).await;

    let http = HttpPublisher::new(&format!("http://{}/publish", addr), Duration::from_secs(2)).unwrap();
    Publisher::new(Arc::new(http), TEST_TOPIC)
        .publish(&result())
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, TEST_TOPIC);
    assert_eq!(captured[0].1.description, DEFAULT_DESCRIPTION);
}

#[tokio::test]
async fn test_http_publisher_unreachable_bridge() {
    let addr = closed_port().await;
    let http = HttpPublisher::new(&format!("http://{}", addr), Duration::from_secs(1)).unwrap();
    let err = Publisher::new(Arc::new(http), TEST_TOPIC)
        .publish(&result())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Publish { ref topic, .. } if topic == TEST_TOPIC));
}
