//! Render metrics.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the host
//! process installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_RENDERED_TOTAL: &str = "reframe_segments_rendered_total";
    pub const SEGMENTS_FAILED_TOTAL: &str = "reframe_segments_failed_total";
    pub const DEGRADATIONS_TOTAL: &str = "reframe_degradations_total";
    pub const RENDER_DURATION_SECONDS: &str = "reframe_render_duration_seconds";
}

pub fn record_segment_rendered() {
    counter!(names::SEGMENTS_RENDERED_TOTAL).increment(1);
}

pub fn record_segment_failed() {
    counter!(names::SEGMENTS_FAILED_TOTAL).increment(1);
}

/// Record a degradation step (`active_to_single`, `single_to_center`, `passthrough`).
pub fn record_degradation(step: &'static str) {
    let labels = [("step", step.to_string())];
    counter!(names::DEGRADATIONS_TOTAL, &labels).increment(1);
}

/// Record a full reframe call, labelled by the mode that was actually rendered.
pub fn record_render_duration(mode: &'static str, duration_secs: f64) {
    let labels = [("mode", mode.to_string())];
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}
