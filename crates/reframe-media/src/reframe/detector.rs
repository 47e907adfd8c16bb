//! Frame decoding and face detection collaborators.
//!
//! The pipeline only sees two seams:
//! - [`FrameSource`] seeks and decodes one frame at a timestamp.
//! - [`FaceDetector`] finds faces (and optionally landmarks) in that frame.
//!
//! Concrete neural detectors live behind the `opencv` and `face-mesh`
//! features; [`NullDetector`] is always available and drives the static
//! center-crop fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

use super::models::FaceDetection;

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Timestamp in seconds
    pub time: f64,
    pub image: RgbImage,
}

impl VideoFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Seek-and-decode access to a video.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Decode the frame at `time`. `Ok(None)` means the frame could not be
    /// decoded; errors are reserved for problems that affect every frame.
    async fn frame_at(&self, time: f64) -> MediaResult<Option<VideoFrame>>;
}

/// Face detector. Implementations must be deterministic for a given frame.
pub trait FaceDetector: Send + Sync {
    /// Detect faces. Landmarks are only required when `with_landmarks` is set.
    fn detect(&self, frame: &VideoFrame, with_landmarks: bool) -> MediaResult<Vec<FaceDetection>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Adds landmarks to faces found by a box detector.
pub trait LandmarkRefiner: Send + Sync {
    fn refine(&self, frame: &VideoFrame, faces: Vec<FaceDetection>) -> MediaResult<Vec<FaceDetection>>;
}

/// Decodes single frames through FFmpeg as packed RGB24.
pub struct FfmpegFrameSource {
    path: PathBuf,
    width: u32,
    height: u32,
    runner: FfmpegRunner,
}

impl FfmpegFrameSource {
    pub fn new(path: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            width,
            height,
            runner: FfmpegRunner::new().with_timeout(60),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn frame_at(&self, time: f64) -> MediaResult<Option<VideoFrame>> {
        let cmd = FfmpegCommand::new(&self.path, "pipe:1")
            .seek(time)
            .single_rgb_frame();

        let bytes = match self.runner.run_capture(&cmd).await {
            Ok(bytes) => bytes,
            Err(MediaError::FfmpegFailed { message, .. }) => {
                debug!("Frame decode failed at {:.2}s: {}", time, message);
                return Ok(None);
            }
            Err(MediaError::Timeout(secs)) => {
                debug!("Frame decode at {:.2}s timed out after {}s", time, secs);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Seeking past the last keyframe yields no bytes at all.
        Ok(RgbImage::from_raw(self.width, self.height, bytes).map(|image| VideoFrame { time, image }))
    }
}

/// Detector that never finds a face.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn detect(&self, _frame: &VideoFrame, _with_landmarks: bool) -> MediaResult<Vec<FaceDetection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Box detector followed by an optional landmark refiner.
///
/// The refiner only runs when landmarks are requested and at least one face
/// was found.
pub struct LayeredDetector {
    boxes: Arc<dyn FaceDetector>,
    refiner: Option<Arc<dyn LandmarkRefiner>>,
}

impl LayeredDetector {
    pub fn new(boxes: Arc<dyn FaceDetector>) -> Self {
        Self {
            boxes,
            refiner: None,
        }
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn LandmarkRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }
}

impl FaceDetector for LayeredDetector {
    fn detect(&self, frame: &VideoFrame, with_landmarks: bool) -> MediaResult<Vec<FaceDetection>> {
        let faces = self.boxes.detect(frame, with_landmarks)?;
        match &self.refiner {
            Some(refiner) if with_landmarks && !faces.is_empty() => refiner.refine(frame, faces),
            _ => Ok(faces),
        }
    }

    fn name(&self) -> &'static str {
        self.boxes.name()
    }
}

/// Best detector compiled into this build.
///
/// YuNet (plus the face mesh refiner when `face-mesh` is enabled). Falls back
/// to [`NullDetector`] when the model cannot be loaded or `opencv` is
/// disabled, in which case every clip uses a static center crop.
pub fn default_detector() -> Arc<dyn FaceDetector> {
    #[cfg(feature = "opencv")]
    {
        match super::yunet::YuNetDetector::new() {
            Ok(yunet) => {
                let layered = LayeredDetector::new(Arc::new(yunet));
                #[cfg(feature = "face-mesh")]
                let layered = match super::face_mesh::FaceMeshRefiner::new_default() {
                    Ok(mesh) => layered.with_refiner(Arc::new(mesh)),
                    Err(e) => {
                        tracing::warn!("Face mesh unavailable, mouth activity disabled: {}", e);
                        layered
                    }
                };
                return Arc::new(layered);
            }
            Err(e) => tracing::warn!("YuNet unavailable, falling back to null detector: {}", e),
        }
    }

    tracing::warn!("No face detector available; clips will use a static center crop");
    Arc::new(NullDetector)
}
