//! Summarization oracle boundary, prompt construction and the `ollama` CLI backend

use crate::caption::CaptionedFrame;
use crate::extract::{JSON_END, JSON_START};
use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Evidence lines included in a refinement prompt
pub const REFINE_EVIDENCE_LIMIT: usize = 12;

const SCHEMA_EXAMPLE: &str = r#"{"summary":"...","evidence":[{"ts":0.0,"text":"..."}],"confidence":0.0}"#;

/// Text-summarization capability.
///
/// Implementations never fail: timeouts, crashes and garbage all come back as
/// whatever raw text was produced, possibly empty.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str, timeout: Duration) -> String;
}

/// Calls `ollama run <model> <prompt>`.
///
/// The two streams are captured separately and returned as all of stdout
/// followed by all of stderr; writes are not interleaved in arrival order.
/// A non-zero exit is logged and its output returned like any other.
pub struct OllamaCli {
    program: String,
    model: String,
}

impl OllamaCli {
    pub fn new(model: impl Into<String>) -> Self {
        Self { program: "ollama".to_string(), model: model.into() }
    }

    /// Use a different executable than `ollama` on PATH
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Summarizer for OllamaCli {
    async fn summarize(&self, prompt: &str, timeout: Duration) -> String {
        let mut child = match Command::new(&self.program)
            .arg("run")
            .arg(&self.model)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {} run {}: {}", self.program, self.model, e);
                return String::new();
            }
        };

        let stdout_buf = SharedBuf::default();
        let stderr_buf = SharedBuf::default();
        let readers = [
            tokio::spawn(drain(child.stdout.take(), stdout_buf.clone())),
            tokio::spawn(drain(child.stderr.take(), stderr_buf.clone())),
        ];

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => warn!("{} run {} exited with {}", self.program, self.model, status),
            Ok(Err(e)) => warn!("Failed waiting on {}: {}", self.program, e),
            Err(_) => {
                warn!("{} run {} timed out after {:?}", self.program, self.model, timeout);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.program, e);
                }
            }
        }

        // Grandchildren may keep the pipes open; don't wait on them past the grace period
        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
                abort.abort();
            }
        }

        let mut output = stdout_buf.take();
        output.push_str(&stderr_buf.take());
        debug!("Oracle returned {} bytes", output.len());
        output
    }
}

/// How long pipe readers may run after the child exits or is killed
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn extend(&self, bytes: &[u8]) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    fn take(&self) -> String {
        match self.0.lock() {
            Ok(mut buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned(),
            Err(_) => String::new(),
        }
    }
}

/// Copy a pipe into `sink` chunk by chunk so partial output survives a kill
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, sink: SharedBuf) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.extend(&chunk[..n]),
            Err(e) => {
                debug!("Pipe read ended early: {}", e);
                break;
            }
        }
    }
}

/// Offline stand-in for a language model.
///
/// Answers any prompt with a marked JSON object describing the evidence lines
/// it was shown, so a whole run can be exercised without a model installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockSummarizer;

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, prompt: &str, _timeout: Duration) -> String {
        let evidence: Vec<(f64, &str)> = prompt.lines().filter_map(parse_evidence_line).collect();
        let summary = match (evidence.first(), evidence.last()) {
            (Some((first, _)), Some((last, _))) => format!(
                "{} sampled frames between {:.1}s and {:.1}s (demo summary).",
                evidence.len(),
                first,
                last
            ),
            _ => "No frames sampled (demo summary).".to_string(),
        };
        let body = json!({
            "summary": summary,
            "evidence": evidence.iter().map(|(ts, text)| json!({ "ts": ts, "text": text })).collect::<Vec<_>>(),
            "confidence": 0.5,
        });
        format!("{}{}{}", JSON_START, body, JSON_END)
    }
}

/// Inverse of `evidence_line`
fn parse_evidence_line(line: &str) -> Option<(f64, &str)> {
    let (ts, text) = line.strip_prefix("- [")?.split_once("s] ")?;
    Some((ts.parse().ok()?, text))
}

fn evidence_line(frame: &CaptionedFrame) -> String {
    format!("- [{:.1}s] {}", frame.ts, frame.caption)
}

/// Prompt asking for one JSON summary of a window's captions
pub fn window_prompt(captions: &[CaptionedFrame]) -> String {
    let mut lines = vec![
        "You are a JSON-only summarizer for short surveillance windows.".to_string(),
        "DO NOT output any explanations, reasoning, or commentary.".to_string(),
        format!(
            "Return EXACTLY one valid JSON object and nothing else, between the markers {} and {}.",
            JSON_START, JSON_END
        ),
        "The JSON must have keys: summary (string), evidence (list of {ts, text}), confidence (0.0-1.0).".to_string(),
        JSON_START.to_string(),
        SCHEMA_EXAMPLE.to_string(),
        JSON_END.to_string(),
        String::new(),
        "Now the frame captions follow:".to_string(),
    ];
    lines.extend(captions.iter().map(evidence_line));
    lines.join("\n")
}

/// Prompt asking for a 1-2 sentence rewrite of a merged segment
pub fn refine_prompt(evidence: &[CaptionedFrame]) -> String {
    let mut lines = vec![
        "You are a JSON-only concise summarizer. Do NOT output explanations.".to_string(),
        "Given the evidence (timestamps included), produce a single concise 1-2 sentence summary.".to_string(),
        format!(
            "Return EXACTLY one JSON object between {} and {} with keys: summary, evidence, confidence.",
            JSON_START, JSON_END
        ),
        JSON_START.to_string(),
        SCHEMA_EXAMPLE.to_string(),
        JSON_END.to_string(),
    ];
    lines.extend(evidence.iter().take(REFINE_EVIDENCE_LIMIT).map(evidence_line));
    lines.join("\n")
}
