// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Intake parsing and input-image handling

use mirror_gen_node::error::PipelineError;
use mirror_gen_node::intake::{
    codec, parse_humidity, parse_temperature, Intake, RawRequestPayload, Resolution,
    ScopedImageFile, MAX_IMAGE_SIZE,
};
use mirror_gen_node::sensors::{format_humidity, format_temperature};
use rand::Rng;

use super::common::{sample_image, sample_image_base64};

fn assert_malformed(err: PipelineError, expected_field: &str) {
    match err {
        PipelineError::MalformedInput { field, .. } => assert_eq!(field, expected_field),
        other => panic!("expected MalformedInput({}), got {:?}", expected_field, other),
    }
}

#[test]
fn test_temperature_format_parse_round_trip() {
    let fixed = [0.0, 25.0, -4.5, 35.25, 0.1, 1234.5678, -0.001];
    for x in fixed {
        assert_eq!(parse_temperature(&format_temperature(x)).unwrap(), x);
    }

    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let x: f64 = rng.gen_range(-60.0..60.0);
        assert_eq!(parse_temperature(&format_temperature(x)).unwrap(), x);
    }
}

#[test]
fn test_humidity_format_parse_round_trip() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let x: f64 = rng.gen_range(0.0..100.0);
        assert_eq!(parse_humidity(&format_humidity(x)).unwrap(), x);
    }
}

#[test]
fn test_malformed_readings_always_rejected() {
    for bad in [
        "bad data",
        "",
        "25°C",
        "Temp: 25°C",
        "Temperature: °C",
        "Temperature: twenty°C",
        "Temperature: 25",
        "Humidity: 50%",
    ] {
        assert_malformed(parse_temperature(bad).unwrap_err(), "temperature");
    }
    for bad in ["bad data", "50%", "Humidity: fifty%", "Humidity: 50", "Temperature: 25°C"] {
        assert_malformed(parse_humidity(bad).unwrap_err(), "humidity");
    }
}

#[test]
fn test_parse_valid_request() {
    let intake = Intake::new(Resolution::new(32, 24));
    let raw = RawRequestPayload::new(sample_image_base64())
        .with_text("a mirror selfie")
        .with_temperature("Temperature: 31.5°C")
        .with_humidity("Humidity: 72%");

    let request = intake.parse(raw).unwrap();
    assert_eq!(request.prompt_text, "a mirror selfie");
    assert_eq!(request.temperature_c, 31.5);
    assert_eq!(request.humidity_pct, 72.0);
    assert_eq!(request.image.dimensions(), (32, 24));
    assert!(!request.source_bytes.is_empty());
}

#[test]
fn test_data_url_prefix_accepted() {
    let raw = RawRequestPayload::new(format!("data:image/png;base64,{}", sample_image_base64()));
    let request = Intake::default().parse(raw).unwrap();
    assert_eq!(request.image.dimensions(), (512, 512));
}

#[test]
fn test_bad_image_encodings_rejected() {
    let intake = Intake::default();
    for bad in ["", "!!!not-base64!!!", "aGVsbG8gd29ybGQ="] {
        let err = intake.parse(RawRequestPayload::new(bad)).unwrap_err();
        assert_malformed(err, "image_data");
    }
}

#[test]
fn test_oversize_image_rejected() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let huge = STANDARD.encode(vec![0u8; MAX_IMAGE_SIZE + 1]);
    let err = Intake::default().parse(RawRequestPayload::new(huge)).unwrap_err();
    assert_malformed(err, "image_data");
}

#[test]
fn test_request_json_defaults() {
    let raw: RawRequestPayload =
        serde_json::from_value(serde_json::json!({ "image_data": sample_image_base64() }))
            .unwrap();
    let request = Intake::default().parse(raw).unwrap();
    assert_eq!(request.prompt_text, "Default prompt");
    assert_eq!(request.temperature_c, 25.0);
    assert_eq!(request.humidity_pct, 50.0);
}

#[test]
fn test_scoped_file_cleanup_on_every_path() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = codec::encode_png(&sample_image(4, 4)).unwrap();

    // Success path
    let kept = {
        let scratch = ScopedImageFile::create(dir.path(), &bytes, "png").unwrap();
        let decoded = codec::decode_image_bytes(&std::fs::read(scratch.path()).unwrap()).unwrap();
        assert_eq!(decoded.width(), 4);
        scratch.path_buf()
    };
    assert!(!kept.exists());

    // Parse-failure path
    let failed: Result<(), PipelineError> = (|| {
        let _scratch = ScopedImageFile::create(dir.path(), b"junk", "png")?;
        codec::decode_image_bytes(b"junk")?;
        Ok(())
    })();
    assert!(failed.is_err());

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
