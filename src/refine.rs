//! Refinement pass: ask the oracle to compress each merged segment

use crate::extract::parse_refine_response;
use crate::merge::MergedSummary;
use crate::metrics::{PipelineMetrics, Timer};
use crate::oracle::{refine_prompt, Summarizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Refine one segment. Start, end and the full evidence list are kept; only
/// summary and confidence change. A response that doesn't parse leaves the
/// summary as is with confidence 0.0.
pub async fn refine_segment(
    segment: MergedSummary,
    summarizer: &dyn Summarizer,
    timeout: Duration,
    metrics: &PipelineMetrics,
) -> MergedSummary {
    let prompt = refine_prompt(&segment.evidence);
    let timer = Timer::new();
    let raw = summarizer.summarize(&prompt, timeout).await;
    metrics.record_oracle_call(timer.elapsed_ms());

    match parse_refine_response(&raw) {
        Some(refined) => {
            debug!("Refined {:.1}-{:.1}s (confidence {:.2})", segment.start, segment.end, refined.confidence);
            MergedSummary {
                summary: refined.summary.unwrap_or(segment.summary),
                confidence: refined.confidence,
                ..segment
            }
        }
        None => {
            warn!("Refinement of {:.1}-{:.1}s returned no usable JSON; keeping merged text", segment.start, segment.end);
            metrics.record_refine_fallback();
            MergedSummary { confidence: 0.0, ..segment }
        }
    }
}

/// Refine every segment, one at a time in order
pub async fn refine_all(
    segments: Vec<MergedSummary>,
    summarizer: &dyn Summarizer,
    timeout: Duration,
    metrics: &PipelineMetrics,
) -> Vec<MergedSummary> {
    let mut refined = Vec::with_capacity(segments.len());
    for segment in segments {
        refined.push(refine_segment(segment, summarizer, timeout, metrics).await);
    }
    refined
}

/// Refine segments concurrently with at most `max_concurrent` oracle calls in
/// flight; output keeps the input order.
pub async fn refine_all_concurrent(
    segments: Vec<MergedSummary>,
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
    metrics: Arc<PipelineMetrics>,
    max_concurrent: usize,
) -> Vec<MergedSummary> {
    let originals = segments.clone();
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    for (position, segment) in segments.into_iter().enumerate() {
        let summarizer = Arc::clone(&summarizer);
        let metrics = Arc::clone(&metrics);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (position, None);
            };
            (position, Some(refine_segment(segment, summarizer.as_ref(), timeout, &metrics).await))
        });
    }

    let mut slots: Vec<Option<MergedSummary>> = vec![None; originals.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, segment)) => slots[position] = segment,
            Err(e) => warn!("Refinement task failed: {}", e),
        }
    }

    // A task that panicked or never got a permit falls back like a failed refinement
    slots
        .into_iter()
        .zip(originals)
        .map(|(slot, original)| {
            slot.unwrap_or_else(|| {
                metrics.record_refine_fallback();
                MergedSummary { confidence: 0.0, ..original }
            })
        })
        .collect()
}
