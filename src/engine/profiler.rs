// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::engine::lock;

/// Invocation statistics of one stage, collected while profiling is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageStats {
    pub invocations: u64,
    pub failures: u64,
    pub total_latency: Duration,
    pub max_latency: Duration,
}

impl StageStats {
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.invocations == 0 {
            return None;
        }
        Some(self.total_latency / self.invocations as u32)
    }
}

pub(crate) struct Profiler {
    enabled: AtomicBool,
    stats: Vec<Mutex<StageStats>>,
}

impl Profiler {
    pub fn new(stage_count: usize) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            stats: (0..stage_count).map(|_| Mutex::new(StageStats::default())).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn record(&self, stage: usize, elapsed: Duration, failed: bool) {
        if !self.is_enabled() {
            return;
        }
        if let Some(slot) = self.stats.get(stage) {
            let mut stats = lock(slot);
            stats.invocations += 1;
            if failed {
                stats.failures += 1;
            }
            stats.total_latency += elapsed;
            stats.max_latency = stats.max_latency.max(elapsed);
        }
    }

    pub fn snapshot(&self, stage: usize) -> StageStats {
        self.stats.get(stage).map(|s| *lock(s)).unwrap_or_default()
    }
}
