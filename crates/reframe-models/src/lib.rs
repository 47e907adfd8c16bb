//! Shared data models for the reframing engine.
//!
//! This crate provides Serde-serializable types for:
//! - Batch manifests and clip jobs
//! - Reframe modes
//! - Subtitle styling and overlay references
//! - Encoding configuration and render devices
//! - Platform delivery specs
//! - Batch reports

pub mod encoding;
pub mod job;
pub mod mode;
pub mod platform;
pub mod report;
pub mod style;
pub mod timestamp;

// Re-export common types
pub use encoding::{EncodingConfig, RenderDevice};
pub use job::{BatchManifest, ClipJob, ManifestError, SpeechInterval};
pub use mode::ReframeMode;
pub use platform::{Platform, PlatformOutput, PlatformSpec};
pub use report::{BatchReport, ClipReport, ClipStatus};
pub use style::{OverlaySpec, SubtitleStyle};
pub use timestamp::{parse_timestamp, ClipTime, TimestampError};
