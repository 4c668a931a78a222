//! surveil_summarizer - windowed video summarization with local oracles
//!
//! Frames extracted by FFmpeg are grouped into overlapping time windows, a few
//! frames per window are captioned, each window's captions are summarized by a
//! local LLM, and adjacent window summaries are merged and refined into a
//! short JSON report. A small HTTP service stores free-text reports in SQLite.

pub mod caption;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod frames;
pub mod merge;
pub mod metrics;
pub mod oracle;
pub mod pipeline;
pub mod refine;
pub mod report;
pub mod server;
pub mod store;
pub mod video;
pub mod window;

pub use caption::{CaptionError, CaptionedFrame, Captioner, CommandCaptioner, MockCaptioner};
pub use error::{Result, SummarizerError};
pub use extract::{extract_first_json, parse_refine_response, parse_window_response, ParsedSummary, SummarySource};
pub use ffmpeg::{FfmpegCommand, FfmpegError};
pub use frames::{Frame, FrameIndex, PathResolver, Resolution};
pub use merge::{merge_summaries, MergedSummary, WindowSummary};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use oracle::{MockSummarizer, OllamaCli, Summarizer};
pub use pipeline::{Pipeline, PipelineConfig};
pub use report::Report;
pub use store::{ReportStore, StoredReport};
pub use video::{safe_name, ExtractConfig, FrameExtractor};
pub use window::{build_windows, sample_frames, Window};
