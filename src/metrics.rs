//! Run metrics for the summarization pipeline

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters shared by captioning workers and oracle calls
#[derive(Default)]
pub struct PipelineMetrics {
    pub windows_processed: AtomicU64,
    pub frames_captioned: AtomicU64,
    pub caption_failures: AtomicU64,
    pub oracle_calls: AtomicU64,
    pub oracle_fallbacks: AtomicU64,
    pub refine_fallbacks: AtomicU64,
    pub total_oracle_latency_ms: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_window(&self) {
        self.windows_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_captioned(&self) {
        self.frames_captioned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_caption_failure(&self) {
        self.caption_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oracle_call(&self, latency_ms: u64) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
        self.total_oracle_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Window summary fell back to something other than a parsed `summary` key
    pub fn record_oracle_fallback(&self) {
        self.oracle_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refine_fallback(&self) {
        self.refine_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let calls = self.oracle_calls.load(Ordering::Relaxed);
        let latency = self.total_oracle_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            windows_processed: self.windows_processed.load(Ordering::Relaxed),
            frames_captioned: self.frames_captioned.load(Ordering::Relaxed),
            caption_failures: self.caption_failures.load(Ordering::Relaxed),
            oracle_calls: calls,
            oracle_fallbacks: self.oracle_fallbacks.load(Ordering::Relaxed),
            refine_fallbacks: self.refine_fallbacks.load(Ordering::Relaxed),
            avg_oracle_latency_ms: if calls > 0 { latency / calls } else { 0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub windows_processed: u64,
    pub frames_captioned: u64,
    pub caption_failures: u64,
    pub oracle_calls: u64,
    pub oracle_fallbacks: u64,
    pub refine_fallbacks: u64,
    pub avg_oracle_latency_ms: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
