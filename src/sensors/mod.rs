// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sensor Reading Adapter: live or simulated temperature/humidity

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::mapping::EnvironmentReadings;

pub const DEFAULT_THERMAL_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// A single reading from an environmental sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub taken_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn now(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            taken_at: Utc::now(),
        }
    }

    pub fn readings(&self) -> EnvironmentReadings {
        EnvironmentReadings::new(self.temperature_c, self.humidity_pct)
    }

    /// Temperature in the display format accepted by intake
    pub fn temperature_label(&self) -> String {
        format_temperature(self.temperature_c)
    }

    /// Humidity in the display format accepted by intake
    pub fn humidity_label(&self) -> String {
        format_humidity(self.humidity_pct)
    }
}

pub fn format_temperature(temperature_c: f64) -> String {
    format!("Temperature: {}°C", temperature_c)
}

pub fn format_humidity(humidity_pct: f64) -> String {
    format!("Humidity: {}%", humidity_pct)
}

/// Source of current environmental readings
#[async_trait]
pub trait SensorSource: Send + Sync {
    fn name(&self) -> &str;
    async fn read(&self) -> Result<SensorReading>;
}

/// Always reports the same values
#[derive(Debug, Clone)]
pub struct FixedSensor {
    temperature_c: f64,
    humidity_pct: f64,
}

impl FixedSensor {
    pub fn new(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

#[async_trait]
impl SensorSource for FixedSensor {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn read(&self) -> Result<SensorReading> {
        Ok(SensorReading::now(self.temperature_c, self.humidity_pct))
    }
}

/// Uniformly random readings within the mapper's working domains
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temperature_range: (f64, f64),
    humidity_range: (f64, f64),
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            temperature_range: (15.0, 35.0),
            humidity_range: (10.0, 90.0),
        }
    }
}

impl SimulatedSensor {
    /// Bounds may be given in either order
    pub fn with_ranges(temperature_range: (f64, f64), humidity_range: (f64, f64)) -> Self {
        Self {
            temperature_range: ordered(temperature_range),
            humidity_range: ordered(humidity_range),
        }
    }
}

fn ordered((a, b): (f64, f64)) -> (f64, f64) {
    (a.min(b), a.max(b))
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn read(&self) -> Result<SensorReading> {
        let mut rng = rand::thread_rng();
        let t = rng.gen_range(self.temperature_range.0..=self.temperature_range.1);
        let h = rng.gen_range(self.humidity_range.0..=self.humidity_range.1);
        // One decimal, like the physical sensor
        Ok(SensorReading::now(
            (t * 10.0).round() / 10.0,
            (h * 10.0).round() / 10.0,
        ))
    }
}

/// Reads board temperature in millidegrees from a sysfs thermal zone.
///
/// The board has no humidity sensor, so humidity is a configured constant.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
    humidity_pct: f64,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>, humidity_pct: f64) -> Self {
        Self {
            path: path.into(),
            humidity_pct,
        }
    }

    pub fn parse_millidegrees(raw: &str) -> Result<f64> {
        let milli: i64 = raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid thermal zone value '{}': {}", raw.trim(), e))?;
        Ok(milli as f64 / 1000.0)
    }
}

#[async_trait]
impl SensorSource for ThermalZoneSensor {
    fn name(&self) -> &str {
        "thermal"
    }

    async fn read(&self) -> Result<SensorReading> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let temperature_c = Self::parse_millidegrees(&raw)?;
        Ok(SensorReading::now(temperature_c, self.humidity_pct))
    }
}
