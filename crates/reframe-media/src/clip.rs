//! Clip extraction from long-form source video.

use std::path::Path;
use tracing::info;

use reframe_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Re-encode `[start, end)` of `source` into a standalone clip.
///
/// Re-encoding (rather than stream copy) makes the cut frame-accurate, which
/// matters because speech intervals are expressed relative to the clip start.
pub async fn cut_clip(
    source: impl AsRef<Path>,
    start: f64,
    end: f64,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
    timeout_secs: u64,
) -> MediaResult<()> {
    let source = source.as_ref();
    let output = output.as_ref();

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }
    if !(end > start) || start < 0.0 {
        return Err(MediaError::internal(format!(
            "Invalid clip range {start:.3}..{end:.3}"
        )));
    }

    info!(
        "Cutting clip: {} -> {} (start: {:.2}s, duration: {:.2}s)",
        source.display(),
        output.display(),
        start,
        end - start
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(source, output)
        .seek(start)
        .duration(end - start)
        .encoding(encoding);

    let runner = if timeout_secs > 0 {
        FfmpegRunner::new().with_timeout(timeout_secs)
    } else {
        FfmpegRunner::new()
    };
    runner.run(&cmd).await
}

/// `clip_{n}_{description}.mp4` with a one-based `n`.
///
/// Spaces become `_`, `/` becomes `-`, and anything else that is not
/// alphanumeric, `-`, `_` or `.` is dropped.
pub fn clip_file_name(index: usize, description: &str) -> String {
    let sanitized: String = description
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' => Some('-'),
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            _ => None,
        })
        .collect();

    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        format!("clip_{}.mp4", index + 1)
    } else {
        format!("clip_{}_{}.mp4", index + 1, sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_file_name() {
        assert_eq!(clip_file_name(0, "Opening Remarks"), "clip_1_Opening_Remarks.mp4");
        assert_eq!(clip_file_name(2, "Q/A: round 2"), "clip_3_Q-A_round_2.mp4");
        assert_eq!(clip_file_name(4, "../../etc"), "clip_5_-..-etc.mp4");
        assert_eq!(clip_file_name(1, "???"), "clip_2.mp4");
    }

    #[tokio::test]
    async fn test_cut_clip_missing_source() {
        let err = cut_clip(
            "/nonexistent/source.mp4",
            0.0,
            5.0,
            "/tmp/out.mp4",
            &EncodingConfig::default(),
            0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
