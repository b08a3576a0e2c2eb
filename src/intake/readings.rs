// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Parsers for the loosely formatted sensor strings
//!
//! Accepted shapes are `"Temperature: <number>°C"` and `"Humidity: <number>%"`.
//! Markers are located anywhere in the string, so a combined display label
//! such as `"Temperature: 24.5°C  |  Humidity: 61%"` satisfies both parsers.

use crate::error::{PipelineError, Result};

pub const TEMPERATURE_MARKER: &str = "Temperature:";
pub const TEMPERATURE_TERMINATOR: char = '°';
pub const HUMIDITY_MARKER: &str = "Humidity:";
pub const HUMIDITY_TERMINATOR: char = '%';

pub fn parse_temperature(raw: &str) -> Result<f64> {
    parse_marked_number(raw, "temperature", TEMPERATURE_MARKER, TEMPERATURE_TERMINATOR)
}

pub fn parse_humidity(raw: &str) -> Result<f64> {
    parse_marked_number(raw, "humidity", HUMIDITY_MARKER, HUMIDITY_TERMINATOR)
}

/// Whether the string carries a humidity marker (combined display labels)
pub fn has_humidity_marker(raw: &str) -> bool {
    raw.contains(HUMIDITY_MARKER)
}

fn parse_marked_number(raw: &str, field: &str, marker: &str, terminator: char) -> Result<f64> {
    let trimmed = raw.trim();

    let start = trimmed.find(marker).ok_or_else(|| {
        PipelineError::malformed(
            field,
            format!("missing '{}' marker in '{}'", marker, trimmed),
        )
    })?;
    let rest = &trimmed[start + marker.len()..];

    let end = rest.find(terminator).ok_or_else(|| {
        PipelineError::malformed(
            field,
            format!("missing '{}' after value in '{}'", terminator, trimmed),
        )
    })?;
    let token = rest[..end].trim();

    if token.is_empty() {
        return Err(PipelineError::malformed(
            field,
            format!("no numeric value in '{}'", trimmed),
        ));
    }

    let value: f64 = token.parse().map_err(|_| {
        PipelineError::malformed(field, format!("'{}' is not a number", token))
    })?;

    if !value.is_finite() {
        return Err(PipelineError::malformed(
            field,
            format!("'{}' is not a finite number", token),
        ));
    }

    Ok(value)
}
