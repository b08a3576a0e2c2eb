// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline configuration
//!
//! Sources, later overriding earlier: built-in defaults, an optional TOML
//! file, then environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::local::COLOR_GRADE_MODEL_ID;
use crate::backend::remote::DEFAULT_OUTPUT_FIELD;
use crate::backend::RetryPolicy;
use crate::error::{PipelineError, Result};
use crate::intake::Resolution;
use crate::mapping::MappingPolicy;
use crate::publisher::{DEFAULT_DESCRIPTION, DEFAULT_TOPIC};
use crate::sensors::DEFAULT_THERMAL_PATH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl FromStr for BackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(PipelineError::Config(format!(
                "unknown backend kind '{}'; expected local or remote",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Http,
    File,
    #[default]
    None,
}

impl FromStr for PublisherKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(PublisherKind::Http),
            "file" => Ok(PublisherKind::File),
            "none" | "" => Ok(PublisherKind::None),
            other => Err(PipelineError::Config(format!(
                "unknown publisher kind '{}'; expected http, file or none",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    None,
    Fixed,
    Simulated,
    Thermal,
}

impl FromStr for SensorKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(SensorKind::None),
            "fixed" => Ok(SensorKind::Fixed),
            "simulated" => Ok(SensorKind::Simulated),
            "thermal" => Ok(SensorKind::Thermal),
            other => Err(PipelineError::Config(format!(
                "unknown sensor kind '{}'; expected none, fixed, simulated or thermal",
                other
            ))),
        }
    }
}

/// Remote img2img service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// `output` or `processed_image_url`, depending on the service
    pub output_field: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            max_attempts: 3,
            retry_delay_ms: 2000,
            request_timeout_secs: 60,
            output_field: DEFAULT_OUTPUT_FIELD.to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let resolution = Resolution::default();
        Self {
            width: resolution.width,
            height: resolution.height,
        }
    }
}

impl ImageConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub kind: PublisherKind,
    pub topic: String,
    pub url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub description: String,
    pub timeout_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::None,
            topic: DEFAULT_TOPIC.to_string(),
            url: None,
            output_dir: None,
            description: DEFAULT_DESCRIPTION.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub thermal_path: PathBuf,
    /// Used by the fixed sensor
    pub temperature_c: f64,
    /// Used by the fixed sensor, and by the thermal sensor which has no humidity sensor
    pub humidity_pct: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::None,
            thermal_path: PathBuf::from(DEFAULT_THERMAL_PATH),
            temperature_c: 25.0,
            humidity_pct: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_concurrent_requests: usize,
    /// 0 disables the per-source capture cooldown
    pub capture_cooldown_secs: u64,
    /// Scratch directory for decoded input copies; no copy is kept when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            max_concurrent_requests: 4,
            capture_cooldown_secs: 0,
            scratch_dir: None,
        }
    }
}

/// Complete configuration for one pipeline process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend identifier; selects the in-process model for the local backend
    pub selected_model: String,
    /// Mapping policy name
    pub selected_approach: String,
    pub backend: BackendKind,
    pub remote: RemoteConfig,
    pub image: ImageConfig,
    pub publisher: PublisherConfig,
    pub sensor: SensorConfig,
    pub server: ServerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selected_model: COLOR_GRADE_MODEL_ID.to_string(),
            selected_approach: MappingPolicy::default().as_str().to_string(),
            backend: BackendKind::Local,
            remote: RemoteConfig::default(),
            image: ImageConfig::default(),
            publisher: PublisherConfig::default(),
            sensor: SensorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid TOML in {}: {}", path.display(), e)))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults, then the optional file, then the environment; validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                info!("Loading configuration from {}", p.display());
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate().map_err(PipelineError::Config)?;
        config.mapping_policy()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Override fields from `lookup`, keyed by environment variable name
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SELECTED_MODEL") {
            self.selected_model = v;
        }
        if let Some(v) = lookup("SELECTED_APPROACH") {
            self.selected_approach = v;
        }
        if let Some(v) = lookup("BACKEND_KIND") {
            self.backend = v.parse()?;
        }

        if let Some(v) = lookup("REMOTE_ENDPOINT") {
            self.remote.endpoint = Some(v);
        }
        if let Some(v) = lookup("REMOTE_API_KEY") {
            self.remote.api_key = Some(v);
        }
        set_parsed(&lookup, "REMOTE_MAX_ATTEMPTS", &mut self.remote.max_attempts);
        set_parsed(&lookup, "REMOTE_RETRY_DELAY_MS", &mut self.remote.retry_delay_ms);
        set_parsed(&lookup, "REMOTE_TIMEOUT_SECS", &mut self.remote.request_timeout_secs);
        if let Some(v) = lookup("REMOTE_OUTPUT_FIELD") {
            self.remote.output_field = v;
        }

        set_parsed(&lookup, "IMAGE_WIDTH", &mut self.image.width);
        set_parsed(&lookup, "IMAGE_HEIGHT", &mut self.image.height);

        if let Some(v) = lookup("PUBLISHER_KIND") {
            self.publisher.kind = v.parse()?;
        }
        if let Some(v) = lookup("PUBLISH_TOPIC") {
            self.publisher.topic = v;
        }
        if let Some(v) = lookup("PUBLISH_URL") {
            self.publisher.url = Some(v);
        }
        if let Some(v) = lookup("PUBLISH_DIR") {
            self.publisher.output_dir = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("SENSOR_KIND") {
            self.sensor.kind = v.parse()?;
        }
        if let Some(v) = lookup("THERMAL_PATH") {
            self.sensor.thermal_path = PathBuf::from(v);
        }

        if let Some(v) = lookup("API_BIND") {
            self.server.bind = v;
        }
        set_parsed(
            &lookup,
            "MAX_CONCURRENT_REQUESTS",
            &mut self.server.max_concurrent_requests,
        );
        set_parsed(
            &lookup,
            "CAPTURE_COOLDOWN_SECS",
            &mut self.server.capture_cooldown_secs,
        );
        if let Some(v) = lookup("SCRATCH_DIR") {
            self.server.scratch_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn mapping_policy(&self) -> Result<MappingPolicy> {
        self.selected_approach.parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.remote.max_attempts == 0 {
            return Err("remote.max_attempts must be greater than 0".to_string());
        }
        if self.backend == BackendKind::Remote {
            let endpoint = self
                .remote
                .endpoint
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| "remote backend requires remote.endpoint".to_string())?;
            validate_http_url("remote.endpoint", endpoint)?;
        }
        if self.remote.output_field.trim().is_empty() {
            return Err("remote.output_field must not be empty".to_string());
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(format!(
                "image resolution must be non-zero, got {}x{}",
                self.image.width, self.image.height
            ));
        }
        match self.publisher.kind {
            PublisherKind::Http => {
                let url = self
                    .publisher
                    .url
                    .as_deref()
                    .ok_or_else(|| "http publisher requires publisher.url".to_string())?;
                validate_http_url("publisher.url", url)?;
            }
            PublisherKind::File => {
                if self.publisher.output_dir.is_none() {
                    return Err("file publisher requires publisher.output_dir".to_string());
                }
            }
            PublisherKind::None => {}
        }
        if self.publisher.topic.trim().is_empty() {
            return Err("publisher.topic must not be empty".to_string());
        }
        if self.server.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn set_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}={}: not a valid value", key, raw),
        }
    }
}

fn validate_http_url(name: &str, raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("{} '{}' is invalid: {}", name, raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got '{}'", name, other)),
    }
}
