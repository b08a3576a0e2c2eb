// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Selectable rule sets converting environmental readings into parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Mapping policy, chosen by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum MappingPolicy {
    /// Append descriptive weather clauses to the prompt; fixed controls
    PromptAugmentation,
    /// Derive a seed from the rounded readings; fixed controls
    DeterministicSeed,
    /// Rescale humidity to strength and temperature to guidance scale
    #[default]
    LinearMapping,
}

impl MappingPolicy {
    pub const ALL: [MappingPolicy; 3] = [
        MappingPolicy::PromptAugmentation,
        MappingPolicy::DeterministicSeed,
        MappingPolicy::LinearMapping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingPolicy::PromptAugmentation => "prompt_augmentation",
            MappingPolicy::DeterministicSeed => "deterministic_seed",
            MappingPolicy::LinearMapping => "linear_mapping",
        }
    }
}

impl fmt::Display for MappingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "prompt_augmentation" | "augmentation" | "a" => Ok(MappingPolicy::PromptAugmentation),
            "deterministic_seed" | "seed" | "b" => Ok(MappingPolicy::DeterministicSeed),
            "linear_mapping" | "linear" | "c" => Ok(MappingPolicy::LinearMapping),
            _ => Err(PipelineError::InvalidPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for MappingPolicy {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MappingPolicy> for String {
    fn from(policy: MappingPolicy) -> Self {
        policy.as_str().to_string()
    }
}
