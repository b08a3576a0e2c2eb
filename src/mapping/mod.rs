// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Parameter Mapper: environmental readings + prompt -> generation parameters
//!
//! Pure functions only. The same readings under the same policy always yield
//! the same parameters.

pub mod policy;
pub mod rescale;

pub use policy::MappingPolicy;
pub use rescale::{rescale, rescale_span, Span};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Allowed strength values
pub const STRENGTH_RANGE: Span = Span::new(0.3, 0.9);
/// Allowed guidance scale values
pub const GUIDANCE_RANGE: Span = Span::new(5.0, 12.0);
/// Humidity domain rescaled onto strength
pub const HUMIDITY_DOMAIN: Span = Span::new(10.0, 90.0);
/// Temperature domain rescaled onto guidance scale
pub const TEMPERATURE_DOMAIN: Span = Span::new(15.0, 35.0);

/// Controls used by the fixed-control policies
pub const FIXED_STRENGTH: f64 = 0.75;
pub const FIXED_GUIDANCE_SCALE: f64 = 7.5;

const HOT_ABOVE_C: f64 = 30.0;
const COLD_BELOW_C: f64 = 15.0;
const HUMID_ABOVE_PCT: f64 = 70.0;
const DRY_BELOW_PCT: f64 = 30.0;

/// Temperature and humidity as parsed numbers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReadings {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

impl EnvironmentReadings {
    pub fn new(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

/// Parameters handed to the generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub strength: f64,
    pub guidance_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    pub effective_prompt: String,
}

impl GenerationParameters {
    /// Check the range invariants
    pub fn validate(&self) -> Result<()> {
        if !STRENGTH_RANGE.contains(self.strength) {
            return Err(PipelineError::Config(format!(
                "strength {} outside [{}, {}]",
                self.strength, STRENGTH_RANGE.min, STRENGTH_RANGE.max
            )));
        }
        if !GUIDANCE_RANGE.contains(self.guidance_scale) {
            return Err(PipelineError::Config(format!(
                "guidance_scale {} outside [{}, {}]",
                self.guidance_scale, GUIDANCE_RANGE.min, GUIDANCE_RANGE.max
            )));
        }
        Ok(())
    }
}

/// Maps readings to parameters under one configured policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterMapper {
    policy: MappingPolicy,
}

impl ParameterMapper {
    pub fn new(policy: MappingPolicy) -> Self {
        Self { policy }
    }

    /// Build a mapper from a configured policy name
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn policy(&self) -> MappingPolicy {
        self.policy
    }

    pub fn map(&self, prompt_text: &str, readings: EnvironmentReadings) -> Result<GenerationParameters> {
        let params = match self.policy {
            MappingPolicy::PromptAugmentation => GenerationParameters {
                strength: FIXED_STRENGTH,
                guidance_scale: FIXED_GUIDANCE_SCALE,
                seed: None,
                effective_prompt: augment_prompt(prompt_text, readings),
            },
            MappingPolicy::DeterministicSeed => GenerationParameters {
                strength: FIXED_STRENGTH,
                guidance_scale: FIXED_GUIDANCE_SCALE,
                seed: Some(derive_seed(readings)),
                effective_prompt: prompt_text.to_string(),
            },
            MappingPolicy::LinearMapping => GenerationParameters {
                strength: rescale_span(readings.humidity_pct, HUMIDITY_DOMAIN, STRENGTH_RANGE)?,
                guidance_scale: rescale_span(
                    readings.temperature_c,
                    TEMPERATURE_DOMAIN,
                    GUIDANCE_RANGE,
                )?,
                seed: None,
                effective_prompt: prompt_text.to_string(),
            },
        };

        debug!(
            "Mapped readings (t={}°C, h={}%) under {}: strength={:.3}, guidance_scale={:.3}, seed={:?}",
            readings.temperature_c,
            readings.humidity_pct,
            self.policy,
            params.strength,
            params.guidance_scale,
            params.seed
        );

        Ok(params)
    }
}

/// Weather clauses triggered by the readings, in a fixed order
pub fn weather_clauses(readings: EnvironmentReadings) -> Vec<&'static str> {
    let mut clauses = Vec::new();
    if readings.temperature_c > HOT_ABOVE_C {
        clauses.push("extremely hot day");
    } else if readings.temperature_c < COLD_BELOW_C {
        clauses.push("cold and frosty day");
    }
    if readings.humidity_pct > HUMID_ABOVE_PCT {
        clauses.push("humid, misty atmosphere");
    } else if readings.humidity_pct < DRY_BELOW_PCT {
        clauses.push("very dry air");
    }
    clauses
}

/// Prompt with weather clauses appended as comma-separated phrases
pub fn augment_prompt(prompt_text: &str, readings: EnvironmentReadings) -> String {
    let clauses = weather_clauses(readings);
    if clauses.is_empty() {
        return prompt_text.to_string();
    }
    let base = prompt_text.trim_end();
    if base.is_empty() {
        clauses.join(", ")
    } else {
        format!("{}, {}", base, clauses.join(", "))
    }
}

/// 32-bit seed from SHA-256 of `"{t:.1}_{h:.1}"` (first four bytes, big endian)
pub fn derive_seed(readings: EnvironmentReadings) -> u32 {
    let key = format!("{:.1}_{:.1}", readings.temperature_c, readings.humidity_pct);
    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
