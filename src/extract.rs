//! Recovering a JSON summary from free-form oracle output
//!
//! Oracle responses are supposed to carry exactly one JSON object between
//! `<JSON_START>` and `<JSON_END>`, but frequently don't. Extraction falls
//! through three tiers:
//!
//! 1. the trimmed text between the markers, when both are present and the
//!    interior is non-empty;
//! 2. the first balanced `{...}` found by depth-counted brace matching;
//! 3. nothing.
//!
//! Parsing never fails: every outcome maps to a summary plus a confidence,
//! with confidence 0.0 whenever the response could not be used as intended.

use crate::caption::CaptionedFrame;
use serde_json::Value;

pub const JSON_START: &str = "<JSON_START>";
pub const JSON_END: &str = "<JSON_END>";

/// Maximum characters kept when falling back to joined captions
pub const CAPTION_FALLBACK_CHARS: usize = 400;

/// Trimmed text between the first start marker and the next end marker
pub fn extract_between_markers(text: &str) -> Option<&str> {
    let start = text.find(JSON_START)? + JSON_START.len();
    let len = text[start..].find(JSON_END)?;
    Some(text[start..start + len].trim())
}

/// Best-effort JSON object text from raw oracle output
pub fn extract_first_json(text: &str) -> Option<&str> {
    if let Some(between) = extract_between_markers(text).filter(|s| !s.is_empty()) {
        return Some(between);
    }

    let open = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// How a window summary was obtained from the oracle output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    /// JSON object with a non-null `summary`
    Json,
    /// Valid JSON without a usable `summary`, rendered as text
    WrappedJson,
    /// Extracted text that wasn't valid JSON
    RawText,
    /// No JSON at all; captions joined instead
    Captions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub summary: String,
    pub confidence: f64,
    pub source: SummarySource,
}

impl ParsedSummary {
    pub fn is_fallback(&self) -> bool {
        self.source != SummarySource::Json
    }
}

/// Interpret a window summarization response.
pub fn parse_window_response(raw: &str, captions: &[CaptionedFrame]) -> ParsedSummary {
    let Some(json_text) = extract_first_json(raw) else {
        return ParsedSummary {
            summary: joined_captions(captions),
            confidence: 0.0,
            source: SummarySource::Captions,
        };
    };

    match serde_json::from_str::<Value>(json_text) {
        Ok(parsed) => match summary_of(&parsed) {
            Some(summary) => ParsedSummary {
                summary: value_text(summary),
                confidence: confidence_of(&parsed),
                source: SummarySource::Json,
            },
            None => ParsedSummary {
                summary: parsed.to_string(),
                confidence: confidence_of(&parsed),
                source: SummarySource::WrappedJson,
            },
        },
        Err(_) => ParsedSummary {
            summary: json_text.to_string(),
            confidence: 0.0,
            source: SummarySource::RawText,
        },
    }
}

/// Result of a refinement response that parsed as a JSON object
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedSummary {
    /// `None` when the object had no `summary` or it was `null`
    pub summary: Option<String>,
    pub confidence: f64,
}

/// Interpret a refinement response; `None` means the caller keeps its original.
pub fn parse_refine_response(raw: &str) -> Option<RefinedSummary> {
    let parsed: Value = serde_json::from_str(extract_first_json(raw)?).ok()?;
    if !parsed.is_object() {
        return None;
    }
    Some(RefinedSummary {
        summary: summary_of(&parsed).map(value_text),
        confidence: confidence_of(&parsed),
    })
}

fn joined_captions(captions: &[CaptionedFrame]) -> String {
    captions
        .iter()
        .map(|c| c.caption.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(CAPTION_FALLBACK_CHARS)
        .collect()
}

/// The `summary` value, treating an explicit `null` as absent
fn summary_of(value: &Value) -> Option<&Value> {
    value.get("summary").filter(|s| !s.is_null())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `confidence` of an object clamped into [0, 1]; 0.0 when absent or unusable
fn confidence_of(value: &Value) -> f64 {
    let raw = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0)).unwrap_or(0.0)
}
