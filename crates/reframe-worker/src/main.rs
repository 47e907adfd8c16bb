//! Reframe batch worker binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reframe_media::{check_ffmpeg, check_ffprobe, default_detector, FaceDetector};
use reframe_models::{BatchManifest, ClipStatus, RenderDevice};
use reframe_worker::{BatchRunner, WorkerConfig};

const DEFAULT_LOG_FILTER: &str = "info,reframe_media=debug,reframe_worker=debug";

/// Cut clips from a long-form video and reframe each one to 9:16.
#[derive(Debug, Parser)]
#[command(name = "reframe-worker", version, about)]
struct Cli {
    /// Batch manifest (JSON)
    manifest: PathBuf,

    /// Directory receiving rendered clips and the batch report
    #[arg(long, env = "REFRAME_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Encoder family: cpu, nvidia or amd
    #[arg(long, env = "REFRAME_RENDER_DEVICE")]
    render_device: Option<RenderDevice>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    info!("Starting reframe-worker");

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(device) = cli.render_device {
        config.render_device = device;
    }
    config.apply_ffmpeg_path();
    info!("Worker config: {:?}", config);

    check_ffmpeg()?;
    check_ffprobe()?;

    let json = tokio::fs::read_to_string(&cli.manifest)
        .await
        .with_context(|| format!("Failed to read manifest {}", cli.manifest.display()))?;
    let manifest = BatchManifest::from_json(&json)
        .with_context(|| format!("Invalid manifest {}", cli.manifest.display()))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, finishing the current clip");
            let _ = cancel_tx.send(true);
        }
    });

    let detector = default_detector();
    info!("Face detector: {}", detector.name());

    let runner = BatchRunner::new(config, detector, cancel_rx);
    let report = runner.run(&manifest).await?;

    info!(
        "Batch complete: {} rendered, {} passthrough, {} failed, {} skipped",
        report.count(ClipStatus::Rendered),
        report.count(ClipStatus::Passthrough),
        report.count(ClipStatus::Failed),
        report.count(ClipStatus::Skipped)
    );

    if !report.all_succeeded() {
        let unfinished = report.count(ClipStatus::Failed) + report.count(ClipStatus::Skipped);
        anyhow::bail!("{unfinished} clip(s) did not render");
    }

    Ok(())
}
