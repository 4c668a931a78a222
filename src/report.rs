//! Final report artifact

use crate::error::{Result, SummarizerError};
use crate::merge::MergedSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub video: String,
    pub generated_at: DateTime<Utc>,
    pub summaries: Vec<MergedSummary>,
}

impl Report {
    pub fn new(video: impl Into<String>, summaries: Vec<MergedSummary>) -> Self {
        Self {
            video: video.into(),
            generated_at: Utc::now(),
            summaries,
        }
    }

    /// `<video>_summaries.json`, with `video` standing in for an empty name
    pub fn file_name(&self) -> String {
        let stem = if self.video.is_empty() { "video" } else { self.video.as_str() };
        format!("{}_summaries.json", stem)
    }

    /// Write into `output_dir` through a temp file and rename, so a crash never
    /// leaves a truncated report behind.
    pub fn write_to(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        let path = output_dir.join(self.file_name());
        let write_err = |source: std::io::Error| SummarizerError::ReportWrite { path: path.clone(), source };

        std::fs::create_dir_all(output_dir).map_err(write_err)?;
        let json = serde_json::to_vec_pretty(self)?;

        let mut tmp = NamedTempFile::new_in(output_dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Saved {} summaries to {}", self.summaries.len(), path.display());
        Ok(path)
    }
}
