#![deny(unreachable_patterns)]
//! Dynamic reframing engine and its FFmpeg plumbing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a timeout-aware runner
//! - FFprobe video inspection
//! - Clip extraction from long-form sources
//! - Per-platform re-encodes of finished clips
//! - The reframing pipeline: sampling, timeline classification, stabilization,
//!   active-speaker scoring, crop planning and segment rendering
//!
//! YuNet face detection through OpenCV is on by default (`opencv`). Add
//! `face-mesh` for lip landmarks, which active-speaker scoring needs. A build
//! with `--no-default-features` has no detector and every clip renders as a
//! static center crop.

pub mod clip;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod metrics;
pub mod platform;
pub mod probe;
pub mod reframe;

pub use clip::{clip_file_name, cut_clip};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use platform::{optimize_for_platform, platform_output_path};
pub use probe::{probe_video, VideoInfo};
pub use reframe::{
    default_detector, FaceDetector, MediaBackend, ReframeConfig, ReframeEngine, ReframeOutcome,
    ReframeRequest,
};
