//! Configuration for the reframing pipeline.
//!
//! The numeric defaults are tuning values, not requirements. Every one of them
//! can be overridden through `REFRAME_*` environment variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Configuration for the reframing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReframeConfig {
    // === Sampling ===
    /// Seconds between sampled frames (default: 0.5)
    pub sample_step: f64,

    // === Timeline ===
    /// Crop offset change, as a fraction of source width, that opens a new
    /// tracking segment (default: 0.10)
    pub movement_threshold: f64,

    /// Minimum dwell time in seconds before the camera may move again (default: 1.2)
    pub min_segment_duration: f64,

    // === Active speaker ===
    /// Adjacent decisions closer than this fraction of source width are merged (default: 0.05)
    pub stabilization_tolerance: f64,

    /// Average mouth aspect ratio a side must exceed to count as speaking (default: 0.03)
    pub mouth_activity_floor: f64,

    /// Score difference at or below which left and right are treated as tied
    pub score_tie_epsilon: f64,

    /// Frames sampled per second of speech (default: 2)
    pub speech_samples_per_second: f64,

    /// Upper bound on frames sampled per speech interval (default: 5)
    pub max_speech_samples: usize,

    /// Evenly spaced frames (10%..90% of the clip) used to locate the two speakers (default: 9)
    pub global_scan_points: usize,

    // === Rendering ===
    /// Per-ffmpeg-invocation timeout in seconds (0 disables)
    pub ffmpeg_timeout_secs: u64,
}

impl Default for ReframeConfig {
    fn default() -> Self {
        Self {
            sample_step: 0.5,
            movement_threshold: 0.10,
            min_segment_duration: 1.2,
            stabilization_tolerance: 0.05,
            mouth_activity_floor: 0.03,
            score_tie_epsilon: 1e-3,
            speech_samples_per_second: 2.0,
            max_speech_samples: 5,
            global_scan_points: 9,
            ffmpeg_timeout_secs: 600,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl ReframeConfig {
    /// Load from `REFRAME_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            sample_step: env_or("REFRAME_SAMPLE_STEP", d.sample_step),
            movement_threshold: env_or("REFRAME_MOVEMENT_THRESHOLD", d.movement_threshold),
            min_segment_duration: env_or("REFRAME_MIN_SEGMENT_DURATION", d.min_segment_duration),
            stabilization_tolerance: env_or(
                "REFRAME_STABILIZATION_TOLERANCE",
                d.stabilization_tolerance,
            ),
            mouth_activity_floor: env_or("REFRAME_MOUTH_ACTIVITY_FLOOR", d.mouth_activity_floor),
            score_tie_epsilon: env_or("REFRAME_SCORE_TIE_EPSILON", d.score_tie_epsilon),
            speech_samples_per_second: env_or(
                "REFRAME_SPEECH_SAMPLES_PER_SECOND",
                d.speech_samples_per_second,
            ),
            max_speech_samples: env_or("REFRAME_MAX_SPEECH_SAMPLES", d.max_speech_samples),
            global_scan_points: env_or("REFRAME_GLOBAL_SCAN_POINTS", d.global_scan_points),
            ffmpeg_timeout_secs: env_or("REFRAME_FFMPEG_TIMEOUT", d.ffmpeg_timeout_secs),
        }
        .sanitized()
    }

    /// Fast configuration for previews: sparser sampling, fewer speech frames.
    pub fn fast() -> Self {
        Self {
            sample_step: 1.0,
            max_speech_samples: 3,
            global_scan_points: 5,
            ..Default::default()
        }
    }

    /// Calmer camera: longer dwell and wider merge tolerance.
    pub fn steady() -> Self {
        Self {
            movement_threshold: 0.15,
            min_segment_duration: 2.0,
            stabilization_tolerance: 0.08,
            ..Default::default()
        }
    }

    /// Replace out-of-range values with defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if !(self.sample_step > 0.0) {
            self.sample_step = d.sample_step;
        }
        if !(0.0..=1.0).contains(&self.movement_threshold) {
            self.movement_threshold = d.movement_threshold;
        }
        if !(self.min_segment_duration >= 0.0) {
            self.min_segment_duration = d.min_segment_duration;
        }
        if !(0.0..=1.0).contains(&self.stabilization_tolerance) {
            self.stabilization_tolerance = d.stabilization_tolerance;
        }
        if !(self.speech_samples_per_second > 0.0) {
            self.speech_samples_per_second = d.speech_samples_per_second;
        }
        self.max_speech_samples = self.max_speech_samples.max(1);
        self.global_scan_points = self.global_scan_points.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReframeConfig::default();
        assert_eq!(config.sample_step, 0.5);
        assert_eq!(config.movement_threshold, 0.10);
        assert_eq!(config.min_segment_duration, 1.2);
        assert_eq!(config.stabilization_tolerance, 0.05);
        assert_eq!(config.mouth_activity_floor, 0.03);
    }

    #[test]
    fn test_sanitized_repairs_bad_values() {
        let config = ReframeConfig {
            sample_step: 0.0,
            movement_threshold: 4.0,
            min_segment_duration: f64::NAN,
            max_speech_samples: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.sample_step, 0.5);
        assert_eq!(config.movement_threshold, 0.10);
        assert_eq!(config.min_segment_duration, 1.2);
        assert_eq!(config.max_speech_samples, 1);
    }

    #[test]
    fn test_presets_differ_from_default() {
        assert!(ReframeConfig::fast().sample_step > ReframeConfig::default().sample_step);
        assert!(
            ReframeConfig::steady().min_segment_duration
                > ReframeConfig::default().min_segment_duration
        );
    }
}
