// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-source capture cooldown (timestamp gate)

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Admits at most one capture per source within the cooldown window
#[derive(Clone)]
pub struct CaptureGuard {
    last_capture: Arc<RwLock<HashMap<String, Instant>>>,
    cooldown: Duration,
}

impl CaptureGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_capture: Arc::new(RwLock::new(HashMap::new())),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn is_enabled(&self) -> bool {
        !self.cooldown.is_zero()
    }

    /// Time left before `source_id` may capture again (does NOT record)
    pub fn remaining(&self, source_id: &str) -> Option<Duration> {
        if !self.is_enabled() {
            return None;
        }
        let now = Instant::now();
        let map = self.last_capture.read().unwrap_or_else(|p| p.into_inner());
        map.get(source_id).and_then(|&last| {
            let elapsed = now.duration_since(last);
            (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
        })
    }

    /// Check and record in one step. Returns the remaining wait on rejection.
    pub fn try_acquire(&self, source_id: &str) -> Result<(), Duration> {
        if !self.is_enabled() {
            return Ok(());
        }
        let now = Instant::now();
        let mut map = self.last_capture.write().unwrap_or_else(|p| p.into_inner());
        if let Some(&last) = map.get(source_id) {
            let elapsed = now.duration_since(last);
            if elapsed < self.cooldown {
                return Err(self.cooldown - elapsed);
            }
        }
        // Drop sources whose window has long passed while we hold the lock
        let cooldown = self.cooldown;
        map.retain(|_, &mut last| now.duration_since(last) < cooldown);
        map.insert(source_id.to_string(), now);
        Ok(())
    }

    /// Give back the window taken by `try_acquire` for a request that never
    /// became a capture
    pub fn release(&self, source_id: &str) {
        if !self.is_enabled() {
            return;
        }
        let mut map = self.last_capture.write().unwrap_or_else(|p| p.into_inner());
        map.remove(source_id);
    }
}
