// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Linear rescale shared by every range-based mapping

use crate::error::{PipelineError, Result};

/// A closed numeric interval used as a rescale domain or range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into this span (works for descending spans too)
    pub fn clamp(&self, value: f64) -> f64 {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        value.max(lo).min(hi)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.clamp(value) == value
    }
}

/// Rescale `value` from `[old_min, old_max]` to `[new_min, new_max]`, clamped.
///
/// `out = new_min + (value - old_min) * (new_max - new_min) / (old_max - old_min)`
///
/// Values at or beyond the domain endpoints map exactly onto the range
/// endpoints. Fails when the domain is empty or any input is non-finite.
pub fn rescale(value: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> Result<f64> {
    if old_max == old_min {
        return Err(PipelineError::InvalidRange(old_min));
    }
    if ![value, old_min, old_max, new_min, new_max]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(PipelineError::malformed(
            "rescale",
            format!(
                "non-finite rescale input: value={}, domain=[{}, {}], range=[{}, {}]",
                value, old_min, old_max, new_min, new_max
            ),
        ));
    }

    // Position of the value inside the source domain; 0 at old_min, 1 at old_max
    let t = (value - old_min) / (old_max - old_min);
    if t <= 0.0 {
        return Ok(new_min);
    }
    if t >= 1.0 {
        return Ok(new_max);
    }

    let out = new_min + (value - old_min) * (new_max - new_min) / (old_max - old_min);
    Ok(Span::new(new_min, new_max).clamp(out))
}

/// Rescale between two spans
pub fn rescale_span(value: f64, domain: Span, range: Span) -> Result<f64> {
    rescale(value, domain.min, domain.max, range.min, range.max)
}
