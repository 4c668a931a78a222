// surveil - frame extraction, windowed summarization and the reports service

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use surveil_summarizer::server::{router, AppState};
use surveil_summarizer::{
    safe_name, Captioner, CommandCaptioner, ExtractConfig, FrameExtractor, MockCaptioner, MockSummarizer,
    OllamaCli, Pipeline, PipelineConfig, ReportStore, Summarizer,
};

#[derive(Parser)]
#[command(name = "surveil", version, about = "Summarize surveillance video with local captioning and LLM oracles")]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Extract sampled frames into <out-root>/<video name>/ with a metadata.json index
    Extract {
        /// Input video file
        video: PathBuf,

        /// Frames per second to sample
        #[arg(long, default_value_t = 1.0)]
        fps: f64,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,

        #[arg(long, default_value = "data/processed")]
        out_root: PathBuf,
    },

    /// Caption, summarize, merge and refine a processed video directory
    Summarize {
        /// Path to data/processed/<video>
        processed_dir: PathBuf,

        /// Window size in seconds
        #[arg(long = "window", default_value_t = 20.0)]
        window_size: f64,

        /// Seconds between window starts
        #[arg(long, default_value_t = 10.0)]
        stride: f64,

        #[arg(long, default_value_t = 3)]
        frames_per_window: usize,

        /// Largest silent gap (seconds) still merged into one segment
        #[arg(long, default_value_t = 2.0)]
        merge_gap: f64,

        #[arg(long, default_value = "qwen3:8b")]
        ollama_model: String,

        /// Oracle timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// External captioning command; the image path is appended as the last argument
        #[arg(long, conflicts_with = "mock_captioner")]
        captioner_cmd: Option<String>,

        /// Describe frames from their image headers instead of a real model
        #[arg(long)]
        mock_captioner: bool,

        /// Answer prompts with canned demo summaries instead of running a model
        #[arg(long)]
        mock_oracle: bool,

        /// Skip the refinement pass over merged segments
        #[arg(long)]
        no_refine: bool,

        /// Caption frames and refine segments concurrently
        #[arg(long)]
        parallel: bool,

        /// Most refinement oracle calls in flight with --parallel
        #[arg(long, default_value_t = 2)]
        max_concurrent_refines: usize,

        #[arg(long, default_value = "data/reports")]
        output_dir: PathBuf,
    },

    /// Serve the reports HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// SQLite database file
        #[arg(long, env = "REPORTS_DB", default_value = "reports.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    match Args::parse().command {
        Cmd::Extract { video, fps, max_frames, out_root } => {
            let out_dir = out_root.join(safe_name(&video));
            let extractor = FrameExtractor::new(ExtractConfig { fps, scale: None, max_frames });
            let index = extractor
                .extract(&video, &out_dir)
                .with_context(|| format!("Failed to extract frames from {}", video.display()))?;
            info!("Extracted {} frames from {}", index.frames.len(), index.video);
        }

        Cmd::Summarize {
            processed_dir,
            window_size,
            stride,
            frames_per_window,
            merge_gap,
            ollama_model,
            timeout,
            captioner_cmd,
            mock_captioner,
            mock_oracle,
            no_refine,
            parallel,
            max_concurrent_refines,
            output_dir,
        } => {
            let captioner: Arc<dyn Captioner> = match (captioner_cmd, mock_captioner) {
                (Some(line), _) => match CommandCaptioner::from_command_line(&line) {
                    Some(c) => Arc::new(c),
                    None => bail!("--captioner-cmd is empty"),
                },
                (None, true) => Arc::new(MockCaptioner),
                (None, false) => bail!("Choose a captioner: --captioner-cmd <command> or --mock-captioner"),
            };

            let config = PipelineConfig {
                window_size,
                stride,
                frames_per_window,
                merge_gap,
                timeout: Duration::from_secs(timeout),
                refine: !no_refine,
                parallel,
                max_concurrent_refines,
                output_dir,
            };

            let summarizer: Arc<dyn Summarizer> = if mock_oracle {
                info!("🎬 Summarizing {} with the mock oracle", processed_dir.display());
                Arc::new(MockSummarizer)
            } else {
                let ollama = OllamaCli::new(ollama_model);
                info!("🎬 Summarizing {} with {}", processed_dir.display(), ollama.model());
                Arc::new(ollama)
            };
            let pipeline = Pipeline::new(config, captioner, summarizer);
            let (report, path) = pipeline
                .run(&processed_dir)
                .await
                .with_context(|| format!("Failed to summarize {}", processed_dir.display()))?;

            info!("   ✓ {} segments written to {}", report.summaries.len(), path.display());
        }

        Cmd::Serve { host, port, db } => {
            let store = ReportStore::open(&db)
                .await
                .with_context(|| format!("Failed to open report store {}", db.display()))?;

            let addr = SocketAddr::new(host.parse().context("Invalid host")?, port);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("📡 Serving reports API on {}", addr);

            let app = router(AppState { store: store.clone() });
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await;

            store.close().await;
            served.context("Server error")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
