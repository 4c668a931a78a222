//! Captioning oracle boundary and per-window caption collection

use crate::frames::PathResolver;
use crate::metrics::PipelineMetrics;
use crate::window::{sample_frames, Window};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// A caption anchored to a video timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionedFrame {
    pub ts: f64,
    pub caption: String,
}

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Failed to read image {}: {reason}", path.display())]
    Image { path: PathBuf, reason: String },

    #[error("Captioner command failed: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a text caption for one frame image
pub trait Captioner: Send + Sync {
    fn caption(&self, image: &Path) -> Result<String, CaptionError>;
}

/// Runs an external captioning program with the image path as its last argument
/// and uses its trimmed stdout as the caption.
pub struct CommandCaptioner {
    program: String,
    args: Vec<String>,
}

impl CommandCaptioner {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a shell-style command line on whitespace: program first, then args
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }
}

impl Captioner for CommandCaptioner {
    fn caption(&self, image: &Path) -> Result<String, CaptionError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptionError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Development captioner: reads the image header and describes the frame
#[derive(Debug, Default, Clone, Copy)]
pub struct MockCaptioner;

impl Captioner for MockCaptioner {
    fn caption(&self, image: &Path) -> Result<String, CaptionError> {
        let (width, height) = image::image_dimensions(image).map_err(|e| CaptionError::Image {
            path: image.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("frame {} ({}x{})", name, width, height))
    }
}

/// Timestamp of the window frame whose stored file name matches `path`,
/// or the window midpoint when none does.
pub fn timestamp_for(window: &Window, path: &Path) -> f64 {
    let name = path.file_name();
    window
        .frames
        .iter()
        .find(|f| name.is_some() && Path::new(&f.path).file_name() == name)
        .map(|f| f.ts)
        .unwrap_or_else(|| window.midpoint())
}

/// Sample, resolve and caption the frames of one window.
///
/// A failed caption becomes an empty string so the window still yields output.
/// With `parallel` set, frames are captioned on the rayon pool; output order
/// always follows the sample order.
pub fn caption_window(
    window: &Window,
    frames_per_window: usize,
    resolver: &PathResolver,
    captioner: &dyn Captioner,
    parallel: bool,
    metrics: &PipelineMetrics,
) -> Vec<CaptionedFrame> {
    let paths: Vec<PathBuf> = sample_frames(window, frames_per_window)
        .into_iter()
        .map(|f| resolver.resolve(&f.path))
        .collect();

    let caption_one = |path: &PathBuf| {
        let caption = match captioner.caption(path) {
            Ok(text) => {
                debug!("Captioned {}: {}", path.display(), text);
                text
            }
            Err(e) => {
                warn!("Failed to caption {}: {}", path.display(), e);
                metrics.record_caption_failure();
                String::new()
            }
        };
        metrics.record_frame_captioned();
        CaptionedFrame { ts: timestamp_for(window, path), caption }
    };

    if parallel {
        paths.par_iter().map(caption_one).collect()
    } else {
        paths.iter().map(caption_one).collect()
    }
}
