//! Batch report written after a worker run.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::mode::ReframeMode;
use crate::platform::PlatformOutput;

/// Final state of a single clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// Reframed output written
    Rendered,
    /// Source too narrow; the cut clip is returned unchanged
    Passthrough,
    /// The clip could not be produced
    Failed,
    /// Not started because the batch was cancelled
    Skipped,
}

/// Outcome of one clip in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipReport {
    pub index: usize,
    pub description: String,
    pub status: ClipStatus,

    /// Requested mode
    pub mode: ReframeMode,

    /// Mode actually rendered after any downgrade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_used: Option<ReframeMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Per-platform encodes of the output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platform_outputs: Vec<PlatformOutput>,

    pub elapsed_secs: f64,
}

impl ClipReport {
    /// Report for a clip the batch never started.
    pub fn skipped(index: usize, description: impl Into<String>, mode: ReframeMode) -> Self {
        Self {
            index,
            description: description.into(),
            status: ClipStatus::Skipped,
            mode,
            mode_used: None,
            output: None,
            segments: None,
            error: None,
            platform_outputs: Vec::new(),
            elapsed_secs: 0.0,
        }
    }
}

/// Summary of a worker run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchReport {
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub clips: Vec<ClipReport>,
}

impl BatchReport {
    pub fn count(&self, status: ClipStatus) -> usize {
        self.clips.iter().filter(|c| c.status == status).count()
    }

    /// True when every clip produced an output file.
    pub fn all_succeeded(&self) -> bool {
        self.clips
            .iter()
            .all(|c| matches!(c.status, ClipStatus::Rendered | ClipStatus::Passthrough))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let now = Utc::now();
        let mut rendered = ClipReport::skipped(0, "a", ReframeMode::Track);
        rendered.status = ClipStatus::Rendered;
        let report = BatchReport {
            source: "talk.mp4".into(),
            started_at: now,
            finished_at: now,
            cancelled: true,
            clips: vec![rendered, ClipReport::skipped(1, "b", ReframeMode::SplitScreen)],
        };

        assert_eq!(report.count(ClipStatus::Rendered), 1);
        assert_eq!(report.count(ClipStatus::Skipped), 1);
        assert!(!report.all_succeeded());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"skipped\""));
        assert!(!json.contains("mode_used"));
        assert!(!json.contains("platform_outputs"));
    }
}
