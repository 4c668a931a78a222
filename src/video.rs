//! Frame extraction via FFmpeg

use crate::error::{Result, SummarizerError};
use crate::ffmpeg::FfmpegCommand;
use crate::frames::{Frame, FrameIndex};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ExtractConfig {
    /// Frames sampled per second of video
    pub fps: f64,
    /// Optional `(width, height)` rescale
    pub scale: Option<(u32, u32)>,
    pub max_frames: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            fps: 1.0,
            scale: None,
            max_frames: None,
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(SummarizerError::InvalidConfig(format!("fps must be positive, got {}", self.fps)));
        }
        if self.max_frames == Some(0) {
            return Err(SummarizerError::InvalidConfig("max_frames must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Directory-safe name for a video: file stem with spaces and dots replaced
pub fn safe_name(video: impl AsRef<Path>) -> String {
    video
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().replace([' ', '.'], "_"))
        .unwrap_or_else(|| "video".to_string())
}

fn frame_file_name(i: usize) -> String {
    format!("frame_{:04}.jpg", i)
}

/// Path as stored in the frame index: relative to the current directory when
/// the frame lives below it, absolute otherwise.
fn stored_path(path: &Path) -> String {
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    std::env::current_dir()
        .and_then(|cwd| cwd.canonicalize())
        .ok()
        .and_then(|cwd| absolute.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or(absolute)
        .to_string_lossy()
        .into_owned()
}

pub struct FrameExtractor {
    config: ExtractConfig,
}

impl FrameExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    fn filter(&self) -> String {
        match self.config.scale {
            Some((w, h)) => format!("fps={},scale={}:{}", self.config.fps, w, h),
            None => format!("fps={}", self.config.fps),
        }
    }

    /// Extract frames into `output_dir` and write its frame index
    pub fn extract(&self, video: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<FrameIndex> {
        self.config.validate()?;
        let video = video.as_ref();
        let output_dir = output_dir.as_ref();
        if !video.is_file() {
            return Err(SummarizerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("video file not found: {}", video.display()),
            )));
        }
        std::fs::create_dir_all(output_dir)?;

        let filter = self.filter();
        let mut cmd = FfmpegCommand::new()
            .overwrite()
            .input(video)
            .args(&["-vf", &filter, "-start_number", "0", "-q:v", "2", "-f", "image2"]);

        if let Some(max) = self.config.max_frames {
            cmd = cmd.args(&["-frames:v", &max.to_string()]);
        }

        cmd.output(output_dir.join("frame_%04d.jpg")).execute()?;

        let index = FrameIndex {
            video: video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            frames: self.collect_frames(output_dir),
        };
        let meta = index.save(output_dir)?;

        info!("Saved {} frames to {}", index.frames.len(), output_dir.display());
        info!("Metadata written to {}", meta.display());
        Ok(index)
    }

    /// Index the consecutive `frame_NNNN.jpg` files ffmpeg left in `output_dir`
    pub fn collect_frames(&self, output_dir: &Path) -> Vec<Frame> {
        let limit = self.config.max_frames.unwrap_or(usize::MAX);
        (0..limit)
            .map(|i| (i, output_dir.join(frame_file_name(i))))
            .take_while(|(_, path)| path.is_file())
            .map(|(i, path): (usize, PathBuf)| Frame {
                index: i as u64,
                ts: i as f64 / self.config.fps,
                path: stored_path(&path),
            })
            .collect()
    }
}
