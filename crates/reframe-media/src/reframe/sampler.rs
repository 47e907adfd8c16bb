//! Fixed-step frame sampling with face detection.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

use super::detector::{FaceDetector, FrameSource};
use super::models::Sample;

/// Pulls frames at given timestamps and runs the detector on each.
#[derive(Clone)]
pub struct FrameSampler {
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn FaceDetector>,
}

impl FrameSampler {
    pub fn new(source: Arc<dyn FrameSource>, detector: Arc<dyn FaceDetector>) -> Self {
        Self { source, detector }
    }

    /// Sample every `step` seconds over `[0, duration)`.
    pub async fn sample(
        &self,
        duration: f64,
        step: f64,
        with_landmarks: bool,
    ) -> MediaResult<Vec<Sample>> {
        self.sample_at(&sample_times(duration, step), with_landmarks)
            .await
    }

    /// Sample at explicit timestamps, in ascending order.
    ///
    /// Frames that cannot be decoded, or on which detection fails, are
    /// omitted from the result.
    pub async fn sample_at(&self, times: &[f64], with_landmarks: bool) -> MediaResult<Vec<Sample>> {
        let mut samples = Vec::with_capacity(times.len());

        for &time in times {
            let Some(frame) = self.source.frame_at(time).await? else {
                debug!("Skipping undecodable frame at {:.2}s", time);
                continue;
            };

            let detector = Arc::clone(&self.detector);
            let detected =
                tokio::task::spawn_blocking(move || detector.detect(&frame, with_landmarks))
                    .await
                    .map_err(|e| MediaError::internal(format!("Detection task failed: {e}")))?;

            match detected {
                Ok(faces) => samples.push(Sample::new(time, faces)),
                Err(e) => warn!("Face detection failed at {:.2}s, skipping: {}", time, e),
            }
        }

        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(samples)
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }
}

/// `0, step, 2*step, ...` strictly below `duration`.
pub fn sample_times(duration: f64, step: f64) -> Vec<f64> {
    if !(duration > 0.0) || !(step > 0.0) {
        return Vec::new();
    }
    (0..)
        .map(|i| i as f64 * step)
        .take_while(|t| *t < duration)
        .collect()
}
