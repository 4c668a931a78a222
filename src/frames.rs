//! Frame store: the frame-index artifact and stored-path resolution

use crate::error::{Result, SummarizerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the frame index inside a processed video directory
pub const FRAME_INDEX_FILE: &str = "metadata.json";

/// A single extracted frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: u64,
    pub ts: f64,
    pub path: String,
}

/// Frame-index artifact written by the extractor, ordered by `ts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameIndex {
    #[serde(default)]
    pub video: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

impl FrameIndex {
    /// Load `metadata.json` from a processed video directory
    pub fn load(processed_dir: impl AsRef<Path>) -> Result<Self> {
        let path = processed_dir.as_ref().join(FRAME_INDEX_FILE);
        if !path.is_file() {
            return Err(SummarizerError::FrameIndexNotFound(path));
        }

        let text = std::fs::read_to_string(&path)?;
        let index: FrameIndex = serde_json::from_str(&text)
            .map_err(|source| SummarizerError::InvalidFrameIndex { path: path.clone(), source })?;

        debug!("Loaded {} frames from {}", index.frames.len(), path.display());
        Ok(index)
    }

    pub fn save(&self, processed_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = processed_dir.as_ref().join(FRAME_INDEX_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// One way of turning a stored frame path into a readable location.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The path exactly as stored
    AsStored,
    /// The stored path joined onto the current process directory
    CurrentDir,
    /// The stored file name inside the given directory
    FileNameIn(PathBuf),
}

impl Resolution {
    fn candidate(&self, stored: &Path) -> Option<PathBuf> {
        match self {
            Resolution::AsStored => Some(stored.to_path_buf()),
            Resolution::CurrentDir => std::env::current_dir().ok().map(|cwd| cwd.join(stored)),
            Resolution::FileNameIn(dir) => stored.file_name().map(|name| dir.join(name)),
        }
    }

    /// Returns the candidate location when it exists on disk
    pub fn resolve(&self, stored: &Path) -> Option<PathBuf> {
        self.candidate(stored).filter(|p| p.is_file())
    }
}

/// Ordered list of resolution strategies tried in sequence
#[derive(Debug, Clone)]
pub struct PathResolver {
    strategies: Vec<Resolution>,
}

impl PathResolver {
    pub fn new(strategies: Vec<Resolution>) -> Self {
        Self { strategies }
    }

    /// Stored path, then current directory, then the frame-index directory
    pub fn for_index_dir(processed_dir: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Resolution::AsStored,
            Resolution::CurrentDir,
            Resolution::FileNameIn(processed_dir.into()),
        ])
    }

    /// First location found, or the stored path unchanged when none is
    pub fn resolve(&self, stored: &str) -> PathBuf {
        let stored = Path::new(stored);
        self.strategies
            .iter()
            .find_map(|s| s.resolve(stored))
            .unwrap_or_else(|| {
                debug!("No readable location for {}", stored.display());
                stored.to_path_buf()
            })
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(vec![Resolution::AsStored, Resolution::CurrentDir])
    }
}
