//! Folding window summaries into coarser segments

use crate::caption::CaptionedFrame;
use serde::{Deserialize, Serialize};

/// Oracle summary of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub start: f64,
    pub end: f64,
    pub summary: String,
    pub evidence: Vec<CaptionedFrame>,
    pub confidence: f64,
}

/// One or more adjacent windows folded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSummary {
    pub start: f64,
    pub end: f64,
    pub summary: String,
    pub evidence: Vec<CaptionedFrame>,
    pub confidence: f64,
}

impl From<MergedSummary> for WindowSummary {
    fn from(m: MergedSummary) -> Self {
        Self {
            start: m.start,
            end: m.end,
            summary: m.summary,
            evidence: m.evidence,
            confidence: m.confidence,
        }
    }
}

struct Accumulator {
    start: f64,
    end: f64,
    summaries: Vec<String>,
    evidence: Vec<CaptionedFrame>,
    confidences: Vec<f64>,
}

impl Accumulator {
    fn open(w: WindowSummary) -> Self {
        Self {
            start: w.start,
            end: w.end,
            summaries: vec![w.summary],
            evidence: w.evidence,
            confidences: vec![w.confidence],
        }
    }

    fn accepts(&self, w: &WindowSummary, merge_gap: f64) -> bool {
        w.start <= self.end || w.start - self.end <= merge_gap
    }

    fn absorb(&mut self, w: WindowSummary) {
        self.end = self.end.max(w.end);
        self.summaries.push(w.summary);
        self.evidence.extend(w.evidence);
        self.confidences.push(w.confidence);
    }

    fn close(self) -> MergedSummary {
        let summary = self
            .summaries
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let confidence = self.confidences.iter().sum::<f64>() / self.confidences.len() as f64;
        MergedSummary {
            start: self.start,
            end: self.end,
            summary,
            evidence: self.evidence,
            confidence,
        }
    }
}

/// Merge windows that overlap or sit within `merge_gap` seconds of the
/// running segment.
///
/// Input is re-sorted by start (stably), so callers may pass it in any order.
/// Merged confidence is the mean of the constituent confidences.
pub fn merge_summaries(mut windows: Vec<WindowSummary>, merge_gap: f64) -> Vec<MergedSummary> {
    windows.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut iter = windows.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut acc = Accumulator::open(first);
    for w in iter {
        if acc.accepts(&w, merge_gap) {
            acc.absorb(w);
        } else {
            merged.push(acc.close());
            acc = Accumulator::open(w);
        }
    }
    merged.push(acc.close());
    merged
}
