//! Segment rendering: per-segment cut and crop, stream-copy concat, then at
//! most one styling pass.
//!
//! ```text
//! PLAN -> PER-SEGMENT CUT+CROP -> CONCAT -> [OVERLAY/SUBTITLE PASS] -> DONE
//!                  \ all failed -> NoSegmentsRendered
//! ```
//!
//! Every intermediate file is named after the output stem and the render id,
//! and is removed before `render` returns on every path. The output path is
//! only written by a final rename, so a failed render leaves whatever was
//! there before untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reframe_models::{EncodingConfig, SubtitleStyle};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{self, VIDEO_OUT};
use crate::fs_utils::{move_file, remove_all_quietly};
use crate::metrics;

use super::crop_planner::{CropPlanner, SegmentFilter};
use super::models::EditInstruction;

/// One segment encode.
#[derive(Debug, Clone)]
pub struct SegmentJob<'a> {
    pub index: usize,
    pub source: &'a Path,
    pub output: &'a Path,
    pub start: f64,
    pub duration: f64,
    pub filter: &'a SegmentFilter,
    pub encoding: &'a EncodingConfig,
}

/// The single re-encode over the concatenated output.
#[derive(Debug, Clone)]
pub struct FinalPassJob<'a> {
    pub input: &'a Path,
    pub overlay: Option<&'a Path>,
    pub output: &'a Path,
    /// Complex graph producing `[vout]`
    pub graph: &'a str,
    pub encoding: &'a EncodingConfig,
}

/// Decode, encode and concat collaborator.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Cut `[start, start + duration)` from the source and encode it through the filter.
    async fn render_segment(&self, job: &SegmentJob<'_>) -> MediaResult<()>;

    /// Losslessly join the files named in a concat list.
    async fn concat(&self, list: &Path, output: &Path) -> MediaResult<()>;

    /// Burn overlay and/or subtitles into the concatenated output.
    async fn final_pass(&self, job: &FinalPassJob<'_>) -> MediaResult<()>;
}

/// [`MediaBackend`] that shells out to FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    runner: FfmpegRunner,
}

impl FfmpegBackend {
    pub fn new(timeout_secs: u64) -> Self {
        let runner = if timeout_secs > 0 {
            FfmpegRunner::new().with_timeout(timeout_secs)
        } else {
            FfmpegRunner::new()
        };
        Self { runner }
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn render_segment(&self, job: &SegmentJob<'_>) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(job.source, job.output)
            .seek(job.start)
            .duration(job.duration);

        let cmd = match job.filter {
            SegmentFilter::Simple(vf) => cmd.video_filter(vf.as_str()).map("0:v").map("0:a?"),
            SegmentFilter::Complex(graph) => {
                cmd.filter_complex(graph.as_str()).map(VIDEO_OUT).map("0:a?")
            }
        };

        self.runner.run(&cmd.encoding(job.encoding)).await
    }

    async fn concat(&self, list: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(list, output)
            .input_args(["-f", "concat", "-safe", "0"])
            .stream_copy();
        self.runner.run(&cmd).await
    }

    async fn final_pass(&self, job: &FinalPassJob<'_>) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(job.input, job.output);
        if let Some(overlay) = job.overlay {
            cmd = cmd.add_input(overlay);
        }
        let cmd = cmd
            .filter_complex(job.graph)
            .map(VIDEO_OUT)
            .map("0:a?")
            .encoding(job.encoding);
        self.runner.run(&cmd).await
    }
}

/// Inputs for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub instructions: &'a [EditInstruction],
    pub overlay: Option<&'a Path>,
    pub subtitle: Option<&'a SubtitleStyle>,
    pub encoding: &'a EncodingConfig,
    /// Unique per render call; keeps temp names from colliding across reruns
    pub render_id: &'a str,
}

/// What a successful render produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub segments_rendered: usize,
    pub segments_failed: usize,
    pub styled: bool,
}

/// Renders planned instructions into one output file.
pub struct SegmentRenderer {
    backend: Arc<dyn MediaBackend>,
    planner: CropPlanner,
}

impl SegmentRenderer {
    pub fn new(backend: Arc<dyn MediaBackend>, planner: CropPlanner) -> Self {
        Self { backend, planner }
    }

    /// Render `request.instructions` into `request.output`.
    ///
    /// Individual segment failures are logged and skipped. On any error the
    /// output path is not touched.
    pub async fn render(&self, request: &RenderRequest<'_>) -> MediaResult<RenderSummary> {
        let mut artifacts = Vec::new();
        let result = self.render_inner(request, &mut artifacts).await;
        remove_all_quietly(&artifacts).await;
        result
    }

    async fn render_inner(
        &self,
        request: &RenderRequest<'_>,
        artifacts: &mut Vec<PathBuf>,
    ) -> MediaResult<RenderSummary> {
        let names = ArtifactNames::new(request.output, request.render_id);
        let attempted = request.instructions.len();
        let mut rendered = Vec::with_capacity(attempted);

        for (index, instruction) in request.instructions.iter().enumerate() {
            let segment_path = names.segment(index);
            artifacts.push(segment_path.clone());

            let filter = self.planner.filter_for(instruction);
            let job = SegmentJob {
                index,
                source: request.source,
                output: &segment_path,
                start: instruction.start(),
                duration: instruction.duration(),
                filter: &filter,
                encoding: request.encoding,
            };

            match self.backend.render_segment(&job).await {
                Ok(()) => {
                    metrics::record_segment_rendered();
                    rendered.push(segment_path);
                }
                Err(e) => {
                    metrics::record_segment_failed();
                    let e = MediaError::segment_failed(index, e.to_string());
                    warn!(segment = index, error = %e, "Dropping segment");
                }
            }
        }

        if rendered.is_empty() {
            return Err(MediaError::NoSegmentsRendered { attempted });
        }

        let list_path = names.concat_list();
        artifacts.push(list_path.clone());
        tokio::fs::write(&list_path, concat_list_body(&rendered)).await?;

        let raw_path = names.raw();
        artifacts.push(raw_path.clone());
        self.backend.concat(&list_path, &raw_path).await?;
        debug!(
            "Concatenated {}/{} segments into {}",
            rendered.len(),
            attempted,
            raw_path.display()
        );

        let graph = filters::final_pass_graph(
            self.planner.target_width(),
            self.planner.target_height(),
            request.overlay.is_some(),
            request.subtitle,
        );

        let styled = match graph {
            Some(graph) => {
                let styled_path = names.styled();
                artifacts.push(styled_path.clone());
                let job = FinalPassJob {
                    input: &raw_path,
                    overlay: request.overlay,
                    output: &styled_path,
                    graph: &graph,
                    encoding: request.encoding,
                };
                self.backend
                    .final_pass(&job)
                    .await
                    .map_err(|e| MediaError::final_pass_failed(e.to_string()))?;
                move_file(&styled_path, request.output).await?;
                true
            }
            None => {
                move_file(&raw_path, request.output).await?;
                false
            }
        };

        info!(
            "Rendered {} ({} of {} segments{})",
            request.output.display(),
            rendered.len(),
            attempted,
            if styled { ", styled" } else { "" }
        );

        Ok(RenderSummary {
            segments_rendered: rendered.len(),
            segments_failed: attempted - rendered.len(),
            styled,
        })
    }
}

/// Temp artifact paths for one render, next to the output.
struct ArtifactNames {
    dir: PathBuf,
    stem: String,
    render_id: String,
}

impl ArtifactNames {
    fn new(output: &Path, render_id: &str) -> Self {
        Self {
            dir: output.parent().map(Path::to_path_buf).unwrap_or_default(),
            stem: output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string()),
            render_id: render_id.to_string(),
        }
    }

    fn segment(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_seg_{}_{}.mp4", self.stem, self.render_id, index))
    }

    fn concat_list(&self) -> PathBuf {
        self.dir
            .join(format!("{}_concat_{}.txt", self.stem, self.render_id))
    }

    fn raw(&self) -> PathBuf {
        self.dir
            .join(format!("{}_raw_{}.mp4", self.stem, self.render_id))
    }

    fn styled(&self) -> PathBuf {
        self.dir
            .join(format!("{}_styled_{}.mp4", self.stem, self.render_id))
    }
}

/// FFmpeg concat demuxer list.
///
/// Entries are bare file names, which the demuxer resolves against the list's
/// own directory.
fn concat_list_body(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| {
            let name = name.to_string_lossy().replace('\'', "'\\''");
            format!("file '{name}'\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes placeholder files; fails the configured segment indices after
    /// leaving a partial file behind.
    #[derive(Default)]
    struct StubBackend {
        fail_segments: HashSet<usize>,
        fail_final_pass: bool,
        concat_lists: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaBackend for StubBackend {
        async fn render_segment(&self, job: &SegmentJob<'_>) -> MediaResult<()> {
            tokio::fs::write(job.output, format!("segment {}", job.index)).await?;
            if self.fail_segments.contains(&job.index) {
                return Err(MediaError::ffmpeg_failed("decode error", None, Some(1)));
            }
            Ok(())
        }

        async fn concat(&self, list: &Path, output: &Path) -> MediaResult<()> {
            let body = tokio::fs::read_to_string(list).await?;
            self.concat_lists.lock().unwrap().push(body);
            tokio::fs::write(output, b"raw").await?;
            Ok(())
        }

        async fn final_pass(&self, job: &FinalPassJob<'_>) -> MediaResult<()> {
            tokio::fs::write(job.output, b"partial").await?;
            if self.fail_final_pass {
                return Err(MediaError::ffmpeg_failed("subtitle error", None, Some(1)));
            }
            tokio::fs::write(job.output, b"styled").await?;
            Ok(())
        }
    }

    fn instructions(count: usize) -> Vec<EditInstruction> {
        (0..count)
            .map(|i| EditInstruction::Single {
                start: i as f64 * 2.0,
                end: (i + 1) as f64 * 2.0,
                crop_x: 657,
            })
            .collect()
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn renderer(backend: Arc<StubBackend>) -> SegmentRenderer {
        SegmentRenderer::new(backend, CropPlanner::new(1920, 1080).unwrap())
    }

    #[tokio::test]
    async fn test_partial_failure_still_produces_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip_1.mp4");
        let backend = Arc::new(StubBackend {
            fail_segments: [1, 2, 4].into_iter().collect(),
            ..Default::default()
        });
        let plan = instructions(5);
        let encoding = EncodingConfig::default();

        let summary = renderer(backend.clone())
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: None,
                subtitle: None,
                encoding: &encoding,
                render_id: "r1",
            })
            .await
            .unwrap();

        assert_eq!(summary.segments_rendered, 2);
        assert_eq!(summary.segments_failed, 3);
        assert!(!summary.styled);
        assert_eq!(files_in(dir.path()), vec!["clip_1.mp4"]);
        assert_eq!(std::fs::read(&output).unwrap(), b"raw");

        let lists = backend.concat_lists.lock().unwrap();
        assert_eq!(
            lists[0],
            "file 'clip_1_seg_r1_0.mp4'\nfile 'clip_1_seg_r1_3.mp4'\n"
        );
    }

    #[tokio::test]
    async fn test_all_segments_failing_is_terminal() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip_2.mp4");
        let backend = Arc::new(StubBackend {
            fail_segments: (0..3).collect(),
            ..Default::default()
        });
        let plan = instructions(3);
        let encoding = EncodingConfig::default();

        let err = renderer(backend)
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: None,
                subtitle: None,
                encoding: &encoding,
                render_id: "r2",
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::NoSegmentsRendered { attempted: 3 }));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_styled_output_goes_through_final_pass() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip_3.mp4");
        let backend = Arc::new(StubBackend::default());
        let plan = instructions(2);
        let encoding = EncodingConfig::default();
        let style = SubtitleStyle::new(dir.path().join("clip_3.srt"));

        let summary = renderer(backend)
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: None,
                subtitle: Some(&style),
                encoding: &encoding,
                render_id: "r3",
            })
            .await
            .unwrap();

        assert!(summary.styled);
        assert_eq!(std::fs::read(&output).unwrap(), b"styled");
        assert_eq!(files_in(dir.path()), vec!["clip_3.mp4"]);
    }

    #[tokio::test]
    async fn test_final_pass_failure_does_not_substitute_raw_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip_4.mp4");
        let backend = Arc::new(StubBackend {
            fail_final_pass: true,
            ..Default::default()
        });
        let plan = instructions(2);
        let encoding = EncodingConfig::default();
        let overlay = dir.path().join("logo.png");

        let err = renderer(backend)
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: Some(&overlay),
                subtitle: None,
                encoding: &encoding,
                render_id: "r4",
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::FinalPassFailed { .. }));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_render_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip_5.mp4");
        std::fs::write(&output, b"previous run").unwrap();
        let plan = instructions(2);
        let encoding = EncodingConfig::default();
        let style = SubtitleStyle::new(dir.path().join("clip_5.srt"));

        let all_failing = Arc::new(StubBackend {
            fail_segments: (0..2).collect(),
            ..Default::default()
        });
        let err = renderer(all_failing)
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: None,
                subtitle: None,
                encoding: &encoding,
                render_id: "r5",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoSegmentsRendered { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous run");

        let failing_pass = Arc::new(StubBackend {
            fail_final_pass: true,
            ..Default::default()
        });
        let err = renderer(failing_pass)
            .render(&RenderRequest {
                source: Path::new("source.mp4"),
                output: &output,
                instructions: &plan,
                overlay: None,
                subtitle: Some(&style),
                encoding: &encoding,
                render_id: "r6",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FinalPassFailed { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous run");
        assert_eq!(files_in(dir.path()), vec!["clip_5.mp4"]);
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let body = concat_list_body(&[PathBuf::from("/tmp/it's_seg_a_0.mp4")]);
        assert_eq!(body, "file 'it'\\''s_seg_a_0.mp4'\n");
    }
}
