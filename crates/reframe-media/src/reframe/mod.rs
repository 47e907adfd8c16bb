//! Dynamic reframing of landscape video into 9:16.
//!
//! # Architecture
//!
//! ```text
//! Source video (+ speech intervals, overlay, subtitles)
//!     │
//!     ▼
//! ┌─────────────────────┐
//! │    FrameSampler     │ ← Decode frames at a fixed step, detect faces
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ TimelineClassifier  │ ← Single-subject track or SINGLE/DUAL runs
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ SegmentStabilizer   │ ← Enforce minimum dwell time
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ ActiveSpeakerScorer │ ← Mouth activity per speech interval (active mode)
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    CropPlanner      │ ← Bounds-checked crop offsets and filters
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  SegmentRenderer    │ ← Cut, concat, optional styling pass
//! └──────────┬──────────┘
//!            │
//!            ▼
//!      Output video
//! ```
//!
//! Degradation is ordered and deterministic: active speaker falls back to
//! single-subject tracking, tracking without faces falls back to a static
//! center crop, and a source too narrow to crop passes through untouched.

pub mod active_speaker;
pub mod classifier;
pub mod config;
pub mod crop_planner;
pub mod detector;
#[cfg(feature = "face-mesh")]
pub mod face_mesh;
pub mod models;
pub mod renderer;
pub mod sampler;
pub mod stabilizer;
#[cfg(feature = "opencv")]
pub mod yunet;

pub use active_speaker::{ActiveSpeakerScorer, SpeakerDecision, SpeakerPositions};
pub use config::ReframeConfig;
pub use crop_planner::{CropPlanner, SegmentFilter, SplitLayout};
pub use detector::{
    default_detector, FaceDetector, FfmpegFrameSource, FrameSource, LandmarkRefiner,
    LayeredDetector, NullDetector, VideoFrame,
};
pub use models::{
    EditInstruction, FaceDetection, FaceLandmarks, Point, Sample, Segment, SegmentKind,
    SpeakerChoice,
};
pub use renderer::{FfmpegBackend, MediaBackend, RenderRequest, RenderSummary, SegmentRenderer};
pub use sampler::FrameSampler;
pub use stabilizer::stabilize;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use reframe_models::{EncodingConfig, ReframeMode, SpeechInterval, SubtitleStyle};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::VideoInfo;

/// One clip to reframe.
#[derive(Debug, Clone)]
pub struct ReframeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub info: VideoInfo,
    pub mode: ReframeMode,
    /// Speech intervals relative to the clip start
    pub speech_intervals: Vec<SpeechInterval>,
    pub overlay: Option<PathBuf>,
    pub subtitle: Option<SubtitleStyle>,
    pub encoding: EncodingConfig,
}

impl ReframeRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        info: VideoInfo,
        mode: ReframeMode,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            info,
            mode,
            speech_intervals: Vec::new(),
            overlay: None,
            subtitle: None,
            encoding: EncodingConfig::default(),
        }
    }
}

/// Result of a reframe call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReframeOutcome {
    /// A new file was rendered at `path`.
    Rendered {
        path: PathBuf,
        mode_used: ReframeMode,
        segments: usize,
    },
    /// The source was too narrow to crop; `path` is the untouched source.
    Passthrough { path: PathBuf },
}

impl ReframeOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ReframeOutcome::Rendered { path, .. } | ReframeOutcome::Passthrough { path } => path,
        }
    }
}

/// Segment timeline and the mode that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub mode_used: ReframeMode,
    pub segments: Vec<Segment>,
}

/// Runs the whole pipeline for one source video.
pub struct ReframeEngine {
    config: ReframeConfig,
    sampler: FrameSampler,
    backend: Arc<dyn MediaBackend>,
}

impl ReframeEngine {
    pub fn new(
        config: ReframeConfig,
        frame_source: Arc<dyn FrameSource>,
        detector: Arc<dyn FaceDetector>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        Self {
            config,
            sampler: FrameSampler::new(frame_source, detector),
            backend,
        }
    }

    /// Engine wired to FFmpeg for decoding and encoding `source`.
    pub fn for_source(
        config: ReframeConfig,
        source: impl AsRef<Path>,
        info: &VideoInfo,
        detector: Arc<dyn FaceDetector>,
    ) -> Self {
        let frames = FfmpegFrameSource::new(source, info.width, info.height);
        let backend = FfmpegBackend::new(config.ffmpeg_timeout_secs);
        Self::new(config, Arc::new(frames), detector, Arc::new(backend))
    }

    pub fn config(&self) -> &ReframeConfig {
        &self.config
    }

    /// Reframe `request.source` into `request.output`.
    pub async fn reframe(&self, request: &ReframeRequest) -> MediaResult<ReframeOutcome> {
        let render_id = Uuid::new_v4().simple().to_string();
        let span = info_span!(
            "reframe",
            render_id = %render_id,
            mode = request.mode.as_str(),
            source = %request.source.display()
        );

        self.reframe_inner(request, &render_id)
            .instrument(span)
            .await
    }

    async fn reframe_inner(
        &self,
        request: &ReframeRequest,
        render_id: &str,
    ) -> MediaResult<ReframeOutcome> {
        let started = Instant::now();
        let info = &request.info;

        let Some(planner) = CropPlanner::new(info.width, info.height) else {
            warn!(
                reason = "source narrower than a 9:16 window",
                width = info.width,
                height = info.height,
                "Passing source through unchanged"
            );
            metrics::record_degradation("passthrough");
            return Ok(ReframeOutcome::Passthrough {
                path: request.source.clone(),
            });
        };

        let timeline = self.timeline(request, &planner).await?;
        let instructions = planner.plan(&timeline.segments);
        info!(
            "Planned {} segments in {} mode for {:.2}s",
            instructions.len(),
            timeline.mode_used.as_str(),
            info.duration
        );

        if let Some(parent) = request
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut overlay = request.overlay.as_deref();
        if let Some(path) = overlay {
            if !file_exists(path).await {
                warn!(
                    reason = "overlay file missing",
                    path = %path.display(),
                    "Rendering without overlay"
                );
                overlay = None;
            }
        }
        let mut subtitle = request.subtitle.as_ref();
        if let Some(style) = subtitle {
            if !file_exists(&style.path).await {
                warn!(
                    reason = "subtitle file missing",
                    path = %style.path.display(),
                    "Rendering without subtitles"
                );
                subtitle = None;
            }
        }

        let renderer = SegmentRenderer::new(Arc::clone(&self.backend), planner);
        let summary = renderer
            .render(&RenderRequest {
                source: &request.source,
                output: &request.output,
                instructions: &instructions,
                overlay,
                subtitle,
                encoding: &request.encoding,
                render_id,
            })
            .await?;

        metrics::record_render_duration(
            timeline.mode_used.as_str(),
            started.elapsed().as_secs_f64(),
        );

        Ok(ReframeOutcome::Rendered {
            path: request.output.clone(),
            mode_used: timeline.mode_used,
            segments: summary.segments_rendered,
        })
    }

    /// Build the final segment timeline, applying the degradation chain.
    pub async fn timeline(
        &self,
        request: &ReframeRequest,
        planner: &CropPlanner,
    ) -> MediaResult<Timeline> {
        let duration = request.info.duration;

        if request.mode == ReframeMode::ActiveSpeaker {
            if let Some(segments) = self.active_speaker_timeline(request, planner).await? {
                return Ok(Timeline {
                    mode_used: ReframeMode::ActiveSpeaker,
                    segments,
                });
            }
        }

        let samples = self
            .sampler
            .sample(duration, self.config.sample_step, false)
            .await?;

        let (mode_used, raw) = match request.mode {
            ReframeMode::SplitScreen => (
                ReframeMode::SplitScreen,
                classifier::classify_speaker_count(&samples, duration, planner.source_width()),
            ),
            ReframeMode::Track | ReframeMode::ActiveSpeaker => (
                ReframeMode::Track,
                classifier::track_single_subject(
                    &samples,
                    duration,
                    planner,
                    self.config.movement_threshold,
                ),
            ),
        };

        match raw {
            Ok(segments) => Ok(Timeline {
                mode_used,
                segments: stabilize(&segments, self.config.min_segment_duration),
            }),
            Err(MediaError::NoFacesDetected) => {
                warn!(
                    reason = "no faces detected",
                    samples = samples.len(),
                    "Falling back to a static center crop"
                );
                metrics::record_degradation("single_to_center");
                Ok(Timeline {
                    mode_used: ReframeMode::Track,
                    segments: vec![planner.static_center(duration)],
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn active_speaker_timeline(
        &self,
        request: &ReframeRequest,
        planner: &CropPlanner,
    ) -> MediaResult<Option<Vec<Segment>>> {
        let reason = if request.speech_intervals.is_empty() {
            "no speech intervals"
        } else {
            let scorer = ActiveSpeakerScorer::new(&self.sampler, &self.config);
            match scorer
                .timeline(&request.speech_intervals, request.info.duration, planner)
                .await?
            {
                Some(segments) => return Ok(Some(segments)),
                None => "two speaker regions not found",
            }
        };

        warn!(reason, "Falling back to single-subject tracking");
        metrics::record_degradation("active_to_single");
        Ok(None)
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
