//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during reframing and rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    /// One segment could not be cut or cropped. The renderer drops it and continues.
    #[error("Segment {index} failed to render: {message}")]
    SegmentDecodeFailed { index: usize, message: String },

    /// Every planned segment failed.
    #[error("No segments rendered ({attempted} attempted)")]
    NoSegmentsRendered { attempted: usize },

    /// Sampling found no usable face in the whole clip.
    #[error("No faces detected")]
    NoFacesDetected,

    /// Overlay/subtitle pass failed after a successful concatenation.
    #[error("Final overlay/subtitle pass failed: {message}")]
    FinalPassFailed { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a segment failure error.
    pub fn segment_failed(index: usize, message: impl Into<String>) -> Self {
        Self::SegmentDecodeFailed {
            index,
            message: message.into(),
        }
    }

    /// Create a final pass failure error.
    pub fn final_pass_failed(message: impl Into<String>) -> Self {
        Self::FinalPassFailed {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the render call as a whole failed (as opposed to a dropped segment
    /// or a downgrade trigger).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::SegmentDecodeFailed { .. } | Self::NoFacesDetected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(!MediaError::segment_failed(2, "bad seek").is_fatal());
        assert!(!MediaError::NoFacesDetected.is_fatal());
        assert!(MediaError::NoSegmentsRendered { attempted: 5 }.is_fatal());
        assert!(MediaError::final_pass_failed("subtitles").is_fatal());
    }

    #[test]
    fn test_display() {
        let err = MediaError::segment_failed(3, "exit 1");
        assert_eq!(err.to_string(), "Segment 3 failed to render: exit 1");
    }
}
