//! Structured clip logging.
//!
//! Every line carries the batch `job_id` and the clip index so a single clip
//! can be followed through a long batch.

use tracing::{error, info, warn, Span};

/// Logger for one clip of one batch.
#[derive(Debug, Clone)]
pub struct ClipLogger {
    job_id: String,
    clip: usize,
    description: String,
}

impl ClipLogger {
    pub fn new(job_id: &str, clip: usize, description: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            clip,
            description: description.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            clip = self.clip,
            "Clip started ({}): {}", self.description, message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            clip = self.clip,
            "Clip progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            clip = self.clip,
            "Clip warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            clip = self.clip,
            "Clip failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            clip = self.clip,
            "Clip completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn clip(&self) -> usize {
        self.clip
    }

    /// Span wrapping all work for this clip.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("clip", job_id = %self.job_id, clip = self.clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_logger_creation() {
        let logger = ClipLogger::new("batch-123", 4, "Closing");
        assert_eq!(logger.job_id(), "batch-123");
        assert_eq!(logger.clip(), 4);
    }
}
