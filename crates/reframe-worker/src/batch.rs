//! Batch execution: each clip of a manifest is cut and then reframed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use reframe_media::fs_utils::{move_file, remove_quietly};
use reframe_media::{
    clip_file_name, cut_clip, optimize_for_platform, platform_output_path, probe_video,
    FaceDetector, ReframeEngine, ReframeOutcome, ReframeRequest,
};
use reframe_models::{
    BatchManifest, BatchReport, ClipJob, ClipReport, ClipStatus, EncodingConfig, ManifestError,
    Platform, PlatformOutput, RenderDevice,
};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::ClipLogger;

/// Runs every clip of a manifest sequentially.
///
/// The cancellation flag is read only between clips. A clip that has started
/// always runs to completion or failure.
pub struct BatchRunner {
    config: WorkerConfig,
    detector: Arc<dyn FaceDetector>,
    cancel: watch::Receiver<bool>,
}

impl BatchRunner {
    pub fn new(
        config: WorkerConfig,
        detector: Arc<dyn FaceDetector>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            detector,
            cancel,
        }
    }

    /// Process the batch and write `{source_stem}_report.json` into the output directory.
    pub async fn run(&self, manifest: &BatchManifest) -> WorkerResult<BatchReport> {
        manifest.validate()?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        let job_id = Uuid::new_v4().simple().to_string();
        let encoding = manifest
            .encoding
            .clone()
            .unwrap_or_else(|| EncodingConfig::for_device(self.config.render_device));

        info!(
            job_id = %job_id,
            clips = manifest.clips.len(),
            device = %encoding.device,
            "Starting batch for {}",
            manifest.source.display()
        );

        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(manifest.clips.len());
        let mut cancelled = false;
        let mut halted: Option<String> = None;

        for (index, clip) in manifest.clips.iter().enumerate() {
            if !cancelled && *self.cancel.borrow() {
                info!(job_id = %job_id, "Cancellation requested, skipping remaining clips");
                cancelled = true;
            }
            if cancelled {
                reports.push(ClipReport::skipped(index, &clip.description, clip.mode));
                continue;
            }
            if let Some(reason) = &halted {
                let mut report = ClipReport::skipped(index, &clip.description, clip.mode);
                report.error = Some(reason.clone());
                reports.push(report);
                continue;
            }

            let logger = ClipLogger::new(&job_id, index, &clip.description);
            let started = Instant::now();
            let result = self
                .process_clip(manifest, index, clip, &encoding, &logger)
                .instrument(logger.create_span())
                .await;

            let mut report = ClipReport::skipped(index, &clip.description, clip.mode);

            match result {
                Ok(ReframeOutcome::Rendered {
                    path,
                    mode_used,
                    segments,
                }) => {
                    logger.log_completion(&format!(
                        "{} ({} segments, {:.1}s)",
                        path.display(),
                        segments,
                        started.elapsed().as_secs_f64()
                    ));
                    report.status = ClipStatus::Rendered;
                    report.mode_used = Some(mode_used);
                    report.segments = Some(segments);
                    report.platform_outputs = self
                        .optimize_platforms(&clip.platforms, &path, encoding.device, &logger)
                        .await;
                    report.output = Some(path);
                }
                Ok(ReframeOutcome::Passthrough { path }) => {
                    logger.log_completion(&format!("{} (passthrough)", path.display()));
                    report.status = ClipStatus::Passthrough;
                    report.platform_outputs = self
                        .optimize_platforms(&clip.platforms, &path, encoding.device, &logger)
                        .await;
                    report.output = Some(path);
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    if e.is_batch_fatal() {
                        warn!(job_id = %job_id, "Halting batch: {}", e);
                        halted = Some(format!("Batch halted: {e}"));
                    }
                    report.status = ClipStatus::Failed;
                    report.error = Some(e.to_string());
                }
            }
            report.elapsed_secs = started.elapsed().as_secs_f64();
            reports.push(report);
        }

        let report = BatchReport {
            source: manifest.source.clone(),
            started_at,
            finished_at: Utc::now(),
            cancelled,
            clips: reports,
        };

        let report_path = self.report_path(&manifest.source);
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&report_path, json).await?;

        info!(
            job_id = %job_id,
            rendered = report.count(ClipStatus::Rendered),
            passthrough = report.count(ClipStatus::Passthrough),
            failed = report.count(ClipStatus::Failed),
            skipped = report.count(ClipStatus::Skipped),
            "Batch finished, report written to {}",
            report_path.display()
        );

        Ok(report)
    }

    fn report_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch".to_string());
        self.config.output_dir.join(format!("{stem}_report.json"))
    }

    /// Encode `clip_output` once per platform. A failed encode is recorded and
    /// never fails the clip.
    async fn optimize_platforms(
        &self,
        platforms: &[Platform],
        clip_output: &Path,
        device: RenderDevice,
        logger: &ClipLogger,
    ) -> Vec<PlatformOutput> {
        let timeout_secs = self.config.reframe.ffmpeg_timeout_secs;
        let mut outputs = Vec::with_capacity(platforms.len());

        for &platform in platforms {
            let target = platform_output_path(clip_output, platform);
            let result =
                optimize_for_platform(clip_output, &target, platform, device, timeout_secs).await;

            outputs.push(match result {
                Ok(warnings) => {
                    logger.log_progress(&format!("{} -> {}", platform, target.display()));
                    PlatformOutput {
                        platform,
                        output: Some(target),
                        warnings,
                        error: None,
                    }
                }
                Err(e) => {
                    logger.log_warning(&format!("{} encode failed: {}", platform, e));
                    remove_quietly(&target).await;
                    PlatformOutput {
                        platform,
                        output: None,
                        warnings: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        outputs
    }

    async fn process_clip(
        &self,
        manifest: &BatchManifest,
        index: usize,
        clip: &ClipJob,
        encoding: &EncodingConfig,
        logger: &ClipLogger,
    ) -> WorkerResult<ReframeOutcome> {
        let (start, end) = clip
            .range()
            .map_err(|source| ManifestError::Timestamp { index, source })?;

        let file_name = clip_file_name(index, &clip.description);
        let cut_path = self
            .config
            .work_dir
            .join(format!("{}_{}", logger.job_id(), file_name));
        let output = self.config.output_dir.join(&file_name);

        logger.log_start(&format!("{:.2}s - {:.2}s, mode {}", start, end, clip.mode));

        let result = self
            .reframe_cut(manifest, clip, start, end, &cut_path, &output, encoding, logger)
            .await;
        remove_quietly(&cut_path).await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn reframe_cut(
        &self,
        manifest: &BatchManifest,
        clip: &ClipJob,
        start: f64,
        end: f64,
        cut_path: &Path,
        output: &Path,
        encoding: &EncodingConfig,
        logger: &ClipLogger,
    ) -> WorkerResult<ReframeOutcome> {
        let timeout_secs = self.config.reframe.ffmpeg_timeout_secs;
        cut_clip(&manifest.source, start, end, cut_path, encoding, timeout_secs).await?;

        let info = probe_video(cut_path).await?;
        logger.log_progress(&format!(
            "cut {}x{} @ {:.2}fps, {:.2}s",
            info.width, info.height, info.fps, info.duration
        ));

        let engine = ReframeEngine::for_source(
            self.config.reframe.clone(),
            cut_path,
            &info,
            Arc::clone(&self.detector),
        );

        let mut request = ReframeRequest::new(cut_path, output, info, clip.mode);
        request.speech_intervals = clip.speech_for_clip(&manifest.speech_intervals, start, end);
        request.overlay = clip.overlay.as_ref().map(|o| o.path.clone());
        request.subtitle = clip.subtitle.clone();
        request.encoding = encoding.clone();

        match engine.reframe(&request).await? {
            ReframeOutcome::Passthrough { .. } => {
                logger.log_warning("source narrower than the 9:16 target, keeping the cut as-is");
                move_file(cut_path, output).await?;
                Ok(ReframeOutcome::Passthrough {
                    path: output.to_path_buf(),
                })
            }
            rendered => Ok(rendered),
        }
    }
}
