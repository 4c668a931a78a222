//! End-to-end summarization of one processed video directory

use crate::caption::{caption_window, CaptionedFrame, Captioner};
use crate::error::{Result, SummarizerError};
use crate::extract::parse_window_response;
use crate::frames::{FrameIndex, PathResolver};
use crate::merge::{merge_summaries, WindowSummary};
use crate::metrics::{PipelineMetrics, Timer};
use crate::oracle::{window_prompt, Summarizer};
use crate::refine::{refine_all, refine_all_concurrent};
use crate::report::Report;
use crate::window::{build_windows, Window};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub window_size: f64,
    pub stride: f64,
    pub frames_per_window: usize,
    pub merge_gap: f64,
    pub timeout: Duration,
    pub refine: bool,
    /// Caption frames within a window and refine segments concurrently
    pub parallel: bool,
    /// Upper bound on refinement oracle calls in flight when `parallel` is set
    pub max_concurrent_refines: usize,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 20.0,
            stride: 10.0,
            frames_per_window: 3,
            merge_gap: 2.0,
            timeout: Duration::from_secs(60),
            refine: true,
            parallel: false,
            max_concurrent_refines: 2,
            output_dir: PathBuf::from("data").join("reports"),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SummarizerError::InvalidConfig(format!("{} must be a positive number, got {}", name, v)))
            }
        };
        positive("window_size", self.window_size)?;
        positive("stride", self.stride)?;

        if self.frames_per_window == 0 {
            return Err(SummarizerError::InvalidConfig("frames_per_window must be at least 1".to_string()));
        }
        if self.max_concurrent_refines == 0 {
            return Err(SummarizerError::InvalidConfig("max_concurrent_refines must be at least 1".to_string()));
        }
        if !(self.merge_gap.is_finite() && self.merge_gap >= 0.0) {
            return Err(SummarizerError::InvalidConfig(format!(
                "merge_gap must be non-negative, got {}",
                self.merge_gap
            )));
        }
        if self.timeout.is_zero() {
            return Err(SummarizerError::InvalidConfig("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Frames → windows → captions → window summaries → merge → refine → report
pub struct Pipeline {
    config: PipelineConfig,
    captioner: Arc<dyn Captioner>,
    summarizer: Arc<dyn Summarizer>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, captioner: Arc<dyn Captioner>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            config,
            captioner,
            summarizer,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Summarize a processed video directory and write its report.
    ///
    /// Input problems are reported before any oracle is called; oracle
    /// misbehaviour never fails the run.
    pub async fn run(&self, processed_dir: impl AsRef<Path>) -> Result<(Report, PathBuf)> {
        let processed_dir = processed_dir.as_ref();
        self.config.validate()?;
        let index = FrameIndex::load(processed_dir)?;

        let report = self.summarize_index(&index, PathResolver::for_index_dir(processed_dir)).await?;
        let path = report.write_to(&self.config.output_dir)?;

        info!("Run metrics: {:?}", self.metrics.snapshot());
        Ok((report, path))
    }

    /// Build the report for an already loaded frame index without writing it
    pub async fn summarize_index(&self, index: &FrameIndex, resolver: PathResolver) -> Result<Report> {
        self.config.validate()?;
        let cfg = &self.config;

        let windows = build_windows(&index.frames, cfg.window_size, cfg.stride);
        info!(
            "Built {} windows (window={}s stride={}s) from {} frames",
            windows.len(),
            cfg.window_size,
            cfg.stride,
            index.frames.len()
        );

        let resolver = Arc::new(resolver);
        let mut per_window = Vec::with_capacity(windows.len());
        for (i, window) in windows.into_iter().enumerate() {
            if window.is_empty() {
                debug!("[Window {}] {:.1}-{:.1}s has no frames", i, window.start, window.end);
            }
            let captions = self.caption(window.clone(), Arc::clone(&resolver)).await?;
            let summary = self.summarize_window(&window, captions).await;
            info!(
                "[Window {}] {:.1}-{:.1}s -> {} captions -> summary length {}",
                i,
                summary.start,
                summary.end,
                summary.evidence.len(),
                summary.summary.chars().count()
            );
            self.metrics.record_window();
            per_window.push(summary);
        }

        info!("Merging overlapping/adjacent windows");
        let merged = merge_summaries(per_window, cfg.merge_gap);

        let summaries = if !cfg.refine {
            merged
        } else if cfg.parallel {
            info!(
                "Refining {} merged segments, up to {} at a time",
                merged.len(),
                cfg.max_concurrent_refines
            );
            refine_all_concurrent(
                merged,
                Arc::clone(&self.summarizer),
                cfg.timeout,
                Arc::clone(&self.metrics),
                cfg.max_concurrent_refines,
            )
            .await
        } else {
            info!("Refining {} merged segments", merged.len());
            refine_all(merged, self.summarizer.as_ref(), cfg.timeout, &self.metrics).await
        };

        Ok(Report::new(index.video.clone(), summaries))
    }

    /// Captioning is blocking work, so it runs off the async workers
    async fn caption(&self, window: Window, resolver: Arc<PathResolver>) -> Result<Vec<CaptionedFrame>> {
        let captioner = Arc::clone(&self.captioner);
        let metrics = Arc::clone(&self.metrics);
        let frames_per_window = self.config.frames_per_window;
        let parallel = self.config.parallel;

        tokio::task::spawn_blocking(move || {
            caption_window(&window, frames_per_window, &resolver, captioner.as_ref(), parallel, &metrics)
        })
        .await
        .map_err(|e| SummarizerError::TaskFailed(format!("captioning: {}", e)))
    }

    async fn summarize_window(&self, window: &Window, captions: Vec<CaptionedFrame>) -> WindowSummary {
        let prompt = window_prompt(&captions);
        let timer = Timer::new();
        let raw = self.summarizer.summarize(&prompt, self.config.timeout).await;
        self.metrics.record_oracle_call(timer.elapsed_ms());

        let parsed = parse_window_response(&raw, &captions);
        if parsed.is_fallback() {
            warn!(
                "Window {:.1}-{:.1}s: oracle output unusable ({:?}); using fallback summary",
                window.start, window.end, parsed.source
            );
            self.metrics.record_oracle_fallback();
        }

        WindowSummary {
            start: window.start,
            end: window.end,
            summary: parsed.summary,
            evidence: captions,
            confidence: parsed.confidence,
        }
    }
}
