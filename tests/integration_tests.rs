//! Integration tests for the summarization pipeline and the reports service

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surveil_summarizer::server::{router, AppState};
use surveil_summarizer::{
    CaptionError, Captioner, Frame, FrameIndex, MockCaptioner, MockSummarizer, Pipeline, PipelineConfig, Report,
    ReportStore, Summarizer, SummarizerError,
};
use tempfile::TempDir;
use tower::ServiceExt;

/// Captions a frame with its file name
struct NameCaptioner;

impl Captioner for NameCaptioner {
    fn caption(&self, image: &Path) -> Result<String, CaptionError> {
        Ok(format!("saw {}", image.file_name().unwrap().to_string_lossy()))
    }
}

/// Answers window prompts and refine prompts with canned JSON
#[derive(Default)]
struct ScriptedOracle {
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for ScriptedOracle {
    async fn summarize(&self, prompt: &str, _timeout: Duration) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lines = prompt.lines().filter(|l| l.starts_with("- [")).count();
        if prompt.contains("surveillance windows") {
            format!(
                "Sure! <JSON_START>{{\"summary\":\"{} frames of the gate\",\"evidence\":[],\"confidence\":0.8}}<JSON_END>",
                lines
            )
        } else {
            "thinking... {\"summary\":\"people pass the gate\",\"confidence\":0.6} done".to_string()
        }
    }
}

/// Never produces anything usable
struct SilentOracle;

#[async_trait]
impl Summarizer for SilentOracle {
    async fn summarize(&self, _prompt: &str, _timeout: Duration) -> String {
        String::new()
    }
}

fn write_index(dir: &Path, timestamps: &[f64]) {
    let index = FrameIndex {
        video: "gate.mp4".to_string(),
        frames: timestamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| Frame {
                index: i as u64,
                ts,
                path: format!("data/processed/gate/frame_{:04}.jpg", i),
            })
            .collect(),
    };
    index.save(dir).unwrap();
}

fn config(output: &TempDir) -> PipelineConfig {
    PipelineConfig {
        output_dir: output.path().to_path_buf(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let timestamps: Vec<f64> = (0..=40).map(|i| i as f64).collect();
    write_index(processed.path(), &timestamps);

    let oracle = Arc::new(ScriptedOracle::default());
    let pipeline = Pipeline::new(config(&output), Arc::new(NameCaptioner), oracle.clone());
    let (report, path) = pipeline.run(processed.path()).await.unwrap();

    // Windows start at 0, 10, 20, 30, 40 and all overlap: one segment
    assert_eq!(report.video, "gate.mp4");
    assert_eq!(report.summaries.len(), 1);
    let segment = &report.summaries[0];
    assert_eq!((segment.start, segment.end), (0.0, 60.0));
    assert_eq!(segment.summary, "people pass the gate");
    assert_eq!(segment.confidence, 0.6);
    assert_eq!(segment.evidence.len(), 3 + 3 + 3 + 3 + 1);
    assert_eq!(segment.evidence[0].caption, "saw frame_0000.jpg");
    assert_eq!(segment.evidence[2].ts, 19.0);

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 6);
    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.windows_processed, 5);
    assert_eq!(snapshot.frames_captioned, 13);
    assert_eq!(snapshot.oracle_fallbacks, 0);

    let written: Report = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written, report);
}

#[tokio::test]
async fn test_pipeline_without_refinement_keeps_merged_text() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0, 5.0, 10.0, 15.0, 60.0, 65.0]);

    let cfg = PipelineConfig { refine: false, parallel: true, ..config(&output) };
    let pipeline = Pipeline::new(cfg, Arc::new(NameCaptioner), Arc::new(ScriptedOracle::default()));
    let (report, _) = pipeline.run(processed.path()).await.unwrap();

    // Every window overlaps its predecessor, empty ones included
    assert_eq!(report.summaries.len(), 1);
    let segment = &report.summaries[0];
    assert!(segment.summary.starts_with("3 frames of the gate 2 frames of the gate"));
    assert!((segment.confidence - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_tiled_windows_with_gap_stay_separate() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0, 5.0, 10.0, 15.0, 20.0, 25.0]);

    let cfg = PipelineConfig { window_size: 10.0, stride: 13.0, merge_gap: 2.0, ..config(&output) };
    let pipeline = Pipeline::new(cfg, Arc::new(NameCaptioner), Arc::new(ScriptedOracle::default()));
    let (report, _) = pipeline.run(processed.path()).await.unwrap();

    let spans: Vec<(f64, f64)> = report.summaries.iter().map(|s| (s.start, s.end)).collect();
    assert_eq!(spans, vec![(0.0, 10.0), (13.0, 23.0)]);
}

#[tokio::test]
async fn test_silent_oracle_falls_back_to_captions() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0, 4.0, 8.0]);

    let pipeline = Pipeline::new(config(&output), Arc::new(NameCaptioner), Arc::new(SilentOracle));
    let (report, _) = pipeline.run(processed.path()).await.unwrap();

    assert_eq!(report.summaries.len(), 1);
    assert_eq!(
        report.summaries[0].summary,
        "saw frame_0000.jpg saw frame_0001.jpg saw frame_0002.jpg"
    );
    assert_eq!(report.summaries[0].confidence, 0.0);

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.oracle_fallbacks, 1);
    assert_eq!(snapshot.refine_fallbacks, 1);
}

#[tokio::test]
async fn test_mock_captioner_resolves_frames_in_index_dir() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0, 1.0]);
    for i in 0..2 {
        image::RgbImage::new(8, 6)
            .save(processed.path().join(format!("frame_{:04}.jpg", i)))
            .unwrap();
    }

    let pipeline = Pipeline::new(config(&output), Arc::new(MockCaptioner), Arc::new(SilentOracle));
    let (report, _) = pipeline.run(processed.path()).await.unwrap();

    let captions: Vec<&str> = report.summaries[0].evidence.iter().map(|e| e.caption.as_str()).collect();
    assert_eq!(captions, vec!["frame frame_0000.jpg (8x6)", "frame frame_0001.jpg (8x6)"]);
    assert_eq!(pipeline.metrics().snapshot().caption_failures, 0);
}

#[tokio::test]
async fn test_offline_run_with_mock_oracle() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0, 4.0, 8.0]);

    let cfg = PipelineConfig { parallel: true, ..config(&output) };
    let pipeline = Pipeline::new(cfg, Arc::new(NameCaptioner), Arc::new(MockSummarizer));
    let (report, _) = pipeline.run(processed.path()).await.unwrap();

    assert_eq!(report.summaries.len(), 1);
    assert_eq!(report.summaries[0].summary, "3 sampled frames between 0.0s and 8.0s (demo summary).");
    assert_eq!(report.summaries[0].confidence, 0.5);
    assert_eq!(pipeline.metrics().snapshot().oracle_fallbacks, 0);
}

#[tokio::test]
async fn test_missing_index_fails_before_oracle() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let oracle = Arc::new(ScriptedOracle::default());

    let pipeline = Pipeline::new(config(&output), Arc::new(NameCaptioner), oracle.clone());
    let err = pipeline.run(processed.path()).await.unwrap_err();

    assert!(matches!(err, SummarizerError::FrameIndexNotFound(_)));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_config_fails_before_oracle() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[0.0]);
    let oracle = Arc::new(ScriptedOracle::default());

    let cfg = PipelineConfig { stride: 0.0, ..config(&output) };
    let err = Pipeline::new(cfg, Arc::new(NameCaptioner), oracle.clone())
        .run(processed.path())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizerError::InvalidConfig(_)));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_frame_index_writes_empty_report() {
    let processed = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_index(processed.path(), &[]);

    let pipeline = Pipeline::new(config(&output), Arc::new(NameCaptioner), Arc::new(ScriptedOracle::default()));
    let (report, path) = pipeline.run(processed.path()).await.unwrap();

    assert!(report.summaries.is_empty());
    assert!(path.is_file());
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app() -> axum::Router {
    router(AppState { store: ReportStore::open_in_memory().await.unwrap() })
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["status"], "ok");
    assert!(payload["time"].is_string());
}

#[tokio::test]
async fn test_latest_report_when_empty() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/latest-report").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"id": null, "ts": null, "summary": null}));
}

#[tokio::test]
async fn test_reports_flow() {
    let app = app().await;
    let sample = "two people at north gate";

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reports")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "summary": sample }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert!(created["id"].is_i64());
    assert_eq!(created["summary"], sample);

    let response = app
        .oneshot(Request::builder().uri("/latest-report").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let latest = body_json(response).await;
    assert_eq!(latest["summary"], sample);
    assert_eq!(latest["id"], created["id"]);
    assert_eq!(latest["ts"], created["ts"]);
}

#[tokio::test]
async fn test_reports_rejects_missing_summary() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reports")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
