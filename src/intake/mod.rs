// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request Intake: raw inbound payload -> validated GenerationRequest
//!
//! Parsing is pure. Every malformed field is rejected here, before any
//! generation cost is incurred.

pub mod codec;
pub mod readings;
pub mod scratch;

pub use codec::{Resolution, MAX_IMAGE_SIZE};
pub use readings::{parse_humidity, parse_temperature};
pub use scratch::ScopedImageFile;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::mapping::EnvironmentReadings;
use crate::sensors::SensorReading;

pub const DEFAULT_PROMPT: &str = "Default prompt";
pub const DEFAULT_TEMPERATURE: &str = "Temperature: 25°C";
pub const DEFAULT_HUMIDITY: &str = "Humidity: 50%";

/// Inbound payload exactly as received from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRequestPayload {
    /// Transport-encoded (base64) image bytes
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub humidity: Option<String>,
    /// Detected-object label the capture was triggered by
    #[serde(default)]
    pub object: Option<String>,
    /// Caller identity used by the capture cooldown
    #[serde(default)]
    pub source_id: Option<String>,
}

impl RawRequestPayload {
    pub fn new(image_data: impl Into<String>) -> Self {
        Self {
            image_data: Some(image_data.into()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_temperature(mut self, temperature: impl Into<String>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }

    pub fn with_humidity(mut self, humidity: impl Into<String>) -> Self {
        self.humidity = Some(humidity.into());
        self
    }

    /// Fill readings the caller did not supply from a live sensor
    pub fn with_live_readings(mut self, reading: &SensorReading) -> Self {
        if self.temperature.is_none() {
            self.temperature = Some(reading.temperature_label());
        }
        let embedded_humidity = self
            .temperature
            .as_deref()
            .map(readings::has_humidity_marker)
            .unwrap_or(false);
        if self.humidity.is_none() && !embedded_humidity {
            self.humidity = Some(reading.humidity_label());
        }
        self
    }

    pub fn needs_readings(&self) -> bool {
        self.temperature.is_none() || self.humidity.is_none()
    }
}

/// A validated request, constructed once per inbound call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: RgbImage,
    pub prompt_text: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub object: Option<String>,
    /// Encoded bytes as received, kept for scratch copies and remote dispatch
    pub source_bytes: Vec<u8>,
}

impl GenerationRequest {
    pub fn readings(&self) -> EnvironmentReadings {
        EnvironmentReadings::new(self.temperature_c, self.humidity_pct)
    }
}

/// Readings and prompt resolved from the textual fields alone
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub prompt_text: String,
    pub readings: EnvironmentReadings,
}

/// Validates raw payloads at a fixed working resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct Intake {
    resolution: Resolution,
}

impl Intake {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Parse text, temperature and humidity, applying the documented defaults
    pub fn parse_fields(
        &self,
        text: Option<&str>,
        temperature: Option<&str>,
        humidity: Option<&str>,
    ) -> Result<ParsedFields> {
        let prompt_text = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_PROMPT.to_string(),
        };

        let raw_temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let temperature_c = parse_temperature(raw_temperature)?;

        // A combined display label in the temperature field also carries humidity
        let raw_humidity = match humidity {
            Some(h) => h,
            None if readings::has_humidity_marker(raw_temperature) => raw_temperature,
            None => DEFAULT_HUMIDITY,
        };
        let humidity_pct = parse_humidity(raw_humidity)?;

        Ok(ParsedFields {
            prompt_text,
            readings: EnvironmentReadings::new(temperature_c, humidity_pct),
        })
    }

    /// Validate a raw payload into a GenerationRequest
    pub fn parse(&self, raw: RawRequestPayload) -> Result<GenerationRequest> {
        let fields = self.parse_fields(
            raw.text.as_deref(),
            raw.temperature.as_deref(),
            raw.humidity.as_deref(),
        )?;

        let encoded = raw
            .image_data
            .as_deref()
            .ok_or_else(|| PipelineError::malformed("image_data", "no image data provided"))?;
        let source_bytes = codec::decode_base64_bytes(encoded)?;
        let decoded = codec::decode_image_bytes(&source_bytes)?;
        let image = codec::normalize(decoded, self.resolution);

        debug!(
            "Intake accepted: prompt_len={}, t={}°C, h={}%, image={}x{}, object={:?}",
            fields.prompt_text.len(),
            fields.readings.temperature_c,
            fields.readings.humidity_pct,
            image.width(),
            image.height(),
            raw.object
        );

        Ok(GenerationRequest {
            image,
            prompt_text: fields.prompt_text,
            temperature_c: fields.readings.temperature_c,
            humidity_pct: fields.readings.humidity_pct,
            object: raw.object,
            source_bytes,
        })
    }
}
