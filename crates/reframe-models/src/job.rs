//! Batch manifest and clip job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::encoding::EncodingConfig;
use crate::mode::ReframeMode;
use crate::platform::Platform;
use crate::style::{OverlaySpec, SubtitleStyle};
use crate::timestamp::{ClipTime, TimestampError};

/// Time range during which speech is present.
///
/// Produced by an external speech detector; the engine only consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeechInterval {
    pub start: f64,
    pub end: f64,
}

impl SpeechInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Manifest validation error.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest contains no clips")]
    NoClips,

    #[error("Clip {index}: {source}")]
    Timestamp {
        index: usize,
        #[source]
        source: TimestampError,
    },

    #[error("Clip {index}: end ({end:.3}s) must be after start ({start:.3}s)")]
    EmptyRange { index: usize, start: f64, end: f64 },

    #[error("Clip {index}: description must not be empty")]
    EmptyDescription { index: usize },

    #[error("Clip {index}: subtitle font size must be positive")]
    InvalidFontSize { index: usize },

    #[error("Speech interval [{start:.3}, {end:.3}] is empty or negative")]
    InvalidSpeechInterval { start: f64, end: f64 },

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One clip to cut from the source and reframe.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipJob {
    pub start: ClipTime,
    pub end: ClipTime,

    /// Short human description, used for the output filename
    pub description: String,

    #[serde(default)]
    pub mode: ReframeMode,

    #[serde(default)]
    pub subtitle: Option<SubtitleStyle>,

    #[serde(default)]
    pub overlay: Option<OverlaySpec>,

    /// Speech intervals relative to the clip start. Overrides the batch-level list.
    #[serde(default)]
    pub speech_intervals: Option<Vec<SpeechInterval>>,

    /// Extra per-platform encodes of the finished clip
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

impl ClipJob {
    /// Resolved `(start, end)` in source seconds.
    pub fn range(&self) -> Result<(f64, f64), TimestampError> {
        Ok((self.start.to_seconds()?, self.end.to_seconds()?))
    }

    /// Speech intervals for this clip, in clip-relative time.
    ///
    /// Batch-level intervals are clipped to `[start, end)` and shifted so the
    /// clip starts at zero.
    pub fn speech_for_clip(
        &self,
        batch_intervals: &[SpeechInterval],
        start: f64,
        end: f64,
    ) -> Vec<SpeechInterval> {
        if let Some(own) = &self.speech_intervals {
            return own.clone();
        }

        batch_intervals
            .iter()
            .filter(|i| i.end > start && i.start < end)
            .map(|i| SpeechInterval::new(i.start.max(start) - start, i.end.min(end) - start))
            .filter(|i| i.duration() > 0.0)
            .collect()
    }
}

/// A batch of clips cut from one long-form source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchManifest {
    /// Long-form source video
    pub source: PathBuf,

    /// Speech intervals in source time, shared by all clips
    #[serde(default)]
    pub speech_intervals: Vec<SpeechInterval>,

    /// Encoding override; the worker's render device applies otherwise
    #[serde(default)]
    pub encoding: Option<EncodingConfig>,

    pub clips: Vec<ClipJob>,
}

impl BatchManifest {
    /// Parse and validate a manifest.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.clips.is_empty() {
            return Err(ManifestError::NoClips);
        }

        validate_intervals(&self.speech_intervals)?;

        for (index, clip) in self.clips.iter().enumerate() {
            let (start, end) = clip
                .range()
                .map_err(|source| ManifestError::Timestamp { index, source })?;

            if end <= start {
                return Err(ManifestError::EmptyRange { index, start, end });
            }

            if clip.description.trim().is_empty() {
                return Err(ManifestError::EmptyDescription { index });
            }

            if let Some(sub) = &clip.subtitle {
                if sub.font_size == 0 {
                    return Err(ManifestError::InvalidFontSize { index });
                }
            }

            if let Some(intervals) = &clip.speech_intervals {
                validate_intervals(intervals)?;
            }
        }

        Ok(())
    }
}

fn validate_intervals(intervals: &[SpeechInterval]) -> Result<(), ManifestError> {
    match intervals.iter().find(|i| i.start < 0.0 || i.end <= i.start) {
        Some(bad) => Err(ManifestError::InvalidSpeechInterval {
            start: bad.start,
            end: bad.end,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start: f64, end: f64) -> ClipJob {
        ClipJob {
            start: start.into(),
            end: end.into(),
            description: "hot take".to_string(),
            mode: ReframeMode::Track,
            subtitle: None,
            overlay: None,
            speech_intervals: None,
            platforms: Vec::new(),
        }
    }

    #[test]
    fn test_manifest_from_json() {
        let json = r#"{
            "source": "talk.mp4",
            "speech_intervals": [{"start": 10.0, "end": 14.0}],
            "clips": [
                {"start": "00:00:10", "end": 40, "description": "intro", "mode": "active_speaker",
                 "platforms": ["tiktok", "youtube_shorts"]},
                {"start": 50, "end": 60, "description": "outro"}
            ]
        }"#;
        let manifest = BatchManifest::from_json(json).unwrap();
        assert_eq!(manifest.clips.len(), 2);
        assert_eq!(manifest.clips[0].range().unwrap(), (10.0, 40.0));
        assert_eq!(manifest.clips[0].mode, ReframeMode::ActiveSpeaker);
        assert_eq!(
            manifest.clips[0].platforms,
            vec![Platform::TikTok, Platform::YouTubeShorts]
        );
        assert!(manifest.clips[1].platforms.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_clips() {
        let empty = BatchManifest {
            source: "a.mp4".into(),
            speech_intervals: vec![],
            encoding: None,
            clips: vec![],
        };
        assert!(matches!(empty.validate(), Err(ManifestError::NoClips)));

        let reversed = BatchManifest {
            clips: vec![clip(20.0, 10.0)],
            ..empty.clone()
        };
        assert!(matches!(
            reversed.validate(),
            Err(ManifestError::EmptyRange { index: 0, .. })
        ));

        let mut unnamed = clip(0.0, 10.0);
        unnamed.description = "   ".to_string();
        let unnamed = BatchManifest {
            clips: vec![clip(0.0, 5.0), unnamed],
            ..empty
        };
        assert!(matches!(
            unnamed.validate(),
            Err(ManifestError::EmptyDescription { index: 1 })
        ));
    }

    #[test]
    fn test_speech_for_clip_shifts_and_clips() {
        let batch = vec![
            SpeechInterval::new(5.0, 12.0),
            SpeechInterval::new(15.0, 18.0),
            SpeechInterval::new(40.0, 45.0),
        ];
        let job = clip(10.0, 20.0);
        let speech = job.speech_for_clip(&batch, 10.0, 20.0);
        assert_eq!(
            speech,
            vec![SpeechInterval::new(0.0, 2.0), SpeechInterval::new(5.0, 8.0)]
        );
    }

    #[test]
    fn test_clip_speech_overrides_batch() {
        let mut job = clip(10.0, 20.0);
        job.speech_intervals = Some(vec![SpeechInterval::new(1.0, 3.0)]);
        let speech = job.speech_for_clip(&[SpeechInterval::new(0.0, 100.0)], 10.0, 20.0);
        assert_eq!(speech, vec![SpeechInterval::new(1.0, 3.0)]);
    }
}
