//! Time windows over the frame sequence and per-window frame sampling

use crate::frames::Frame;
use tracing::warn;

/// A half-open interval `[start, end)` of video and the frames inside it
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
    pub frames: Vec<Frame>,
}

impl Window {
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Build windows of `window_size` seconds, advancing by `stride`, from 0.0 until
/// the window start passes the last frame timestamp.
///
/// `frames` must be ordered by timestamp. Windows with no frames are kept.
pub fn build_windows(frames: &[Frame], window_size: f64, stride: f64) -> Vec<Window> {
    let Some(last) = frames.last() else {
        return Vec::new();
    };
    if !(stride > 0.0) || !(window_size > 0.0) {
        warn!("Refusing to build windows with window_size={} stride={}", window_size, stride);
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut step: u64 = 0;
    loop {
        // Multiply rather than accumulate so starts don't drift
        let start = step as f64 * stride;
        if start > last.ts {
            break;
        }
        let end = start + window_size;
        let in_window = frames
            .iter()
            .filter(|f| f.ts >= start && f.ts < end)
            .cloned()
            .collect();
        windows.push(Window { start, end, frames: in_window });
        step += 1;
    }

    windows
}

/// Pick up to `frames_per_window` frames spread evenly across the window.
///
/// The first and last picks are the window's first and last frames; indices in
/// between are interpolated with ties rounded to even. Duplicates are possible.
pub fn sample_frames(window: &Window, frames_per_window: usize) -> Vec<&Frame> {
    let k = window.frames.len();
    let n = frames_per_window.min(k);
    match n {
        0 => Vec::new(),
        1 => vec![&window.frames[0]],
        _ => (0..n)
            .map(|i| {
                let pos = (i * (k - 1)) as f64 / (n - 1) as f64;
                &window.frames[pos.round_ties_even() as usize]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_at(ts: &[f64]) -> Vec<Frame> {
        ts.iter()
            .enumerate()
            .map(|(i, &ts)| Frame { index: i as u64, ts, path: format!("frame_{:04}.jpg", i) })
            .collect()
    }

    fn timestamps(w: &Window) -> Vec<f64> {
        w.frames.iter().map(|f| f.ts).collect()
    }

    #[test]
    fn test_empty_input_yields_no_windows() {
        assert!(build_windows(&[], 10.0, 5.0).is_empty());
    }

    #[test]
    fn test_tiled_windows() {
        let frames = frames_at(&[0.0, 5.0, 10.0, 15.0, 20.0, 25.0]);
        let windows = build_windows(&frames, 10.0, 10.0);

        assert_eq!(windows.len(), 3);
        assert_eq!((windows[0].start, windows[0].end), (0.0, 10.0));
        assert_eq!(timestamps(&windows[0]), vec![0.0, 5.0]);
        assert_eq!((windows[1].start, windows[1].end), (10.0, 20.0));
        assert_eq!(timestamps(&windows[1]), vec![10.0, 15.0]);
        assert_eq!((windows[2].start, windows[2].end), (20.0, 30.0));
        assert_eq!(timestamps(&windows[2]), vec![20.0, 25.0]);
    }

    #[test]
    fn test_overlapping_windows_are_ordered_and_constant_width() {
        let ts: Vec<f64> = (0..47).map(|i| i as f64 * 0.7).collect();
        let frames = frames_at(&ts);
        let windows = build_windows(&frames, 20.0, 10.0);

        assert!(!windows.is_empty());
        for pair in windows.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        for w in &windows {
            assert!((w.end - w.start - 20.0).abs() < 1e-9);
            assert!(w.frames.iter().all(|f| f.ts >= w.start && f.ts < w.end));
        }
        assert!(windows.last().unwrap().start <= frames.last().unwrap().ts);
    }

    #[test]
    fn test_windows_can_be_empty() {
        let frames = frames_at(&[0.0, 35.0]);
        let windows = build_windows(&frames, 10.0, 10.0);

        assert_eq!(windows.len(), 4);
        assert!(windows[1].is_empty());
        assert!(windows[2].is_empty());
        assert_eq!(timestamps(&windows[3]), vec![35.0]);
    }

    #[test]
    fn test_stride_larger_than_window_skips_frames() {
        let frames = frames_at(&[0.0, 5.0, 12.0]);
        let windows = build_windows(&frames, 4.0, 6.0);

        assert_eq!(windows.len(), 3);
        assert_eq!(timestamps(&windows[0]), vec![0.0]);
        assert!(windows[1].is_empty());
        assert_eq!(timestamps(&windows[2]), vec![12.0]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let frames = frames_at(&[0.0, 1.5, 3.0, 9.5, 12.25]);
        assert_eq!(build_windows(&frames, 5.0, 2.5), build_windows(&frames, 5.0, 2.5));
    }

    #[test]
    fn test_non_positive_stride_yields_nothing() {
        let frames = frames_at(&[0.0, 1.0]);
        assert!(build_windows(&frames, 5.0, 0.0).is_empty());
    }

    fn window_of(k: usize) -> Window {
        let ts: Vec<f64> = (0..k).map(|i| i as f64).collect();
        Window { start: 0.0, end: k as f64, frames: frames_at(&ts) }
    }

    #[test]
    fn test_sample_single_pick_is_first_frame() {
        let w = window_of(5);
        let picks = sample_frames(&w, 1);
        assert_eq!(picks, vec![&w.frames[0]]);
    }

    #[test]
    fn test_sample_spans_window() {
        let w = window_of(7);
        let picks = sample_frames(&w, 3);
        let indices: Vec<u64> = picks.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 3, 6]);
    }

    #[test]
    fn test_sample_ties_round_to_even() {
        let w = window_of(6);
        let indices: Vec<u64> = sample_frames(&w, 3).iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2, 5]);
    }

    #[test]
    fn test_sample_bounds_and_endpoints() {
        for k in 0..12 {
            let w = window_of(k);
            for n in 1..8 {
                let picks = sample_frames(&w, n);
                assert!(picks.len() <= n.min(k));
                if k >= 2 && n >= 2 {
                    assert_eq!(picks.first().unwrap().index, 0);
                    assert_eq!(picks.last().unwrap().index, (k - 1) as u64);
                }
            }
        }
    }

    #[test]
    fn test_sample_empty_window() {
        assert!(sample_frames(&window_of(0), 3).is_empty());
    }
}
