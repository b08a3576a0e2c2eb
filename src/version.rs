// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the mirror generation node

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-14";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "prompt-augmentation",
    "deterministic-seed",
    "linear-mapping",
    "local-backend",
    "remote-backend-retry",
    "http-bridge-publish",
    "file-publish",
    "live-sensor-fallback",
    "capture-cooldown",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Mirror Gen Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
