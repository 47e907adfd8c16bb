//! Per-platform re-encode of a finished clip.
//!
//! Scales and center-crops to the platform resolution, conforms the frame
//! rate, and encodes at the platform bitrate with `+faststart`. A clip with no
//! audio gets a silent stereo track.

use std::path::{Path, PathBuf};

use reframe_models::{Platform, PlatformSpec, RenderDevice};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Silent stereo source used when the clip has no audio stream.
const SILENT_AUDIO: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Scale + center-crop chain from the source geometry to the platform resolution.
///
/// Matching aspect ratios only scale. A wider source is scaled to the target
/// height and cropped horizontally; a taller one is scaled to the target width
/// and cropped vertically. `fps` is appended when the rates differ.
pub fn platform_filter(info: &VideoInfo, spec: &PlatformSpec) -> String {
    let (sw, sh) = (info.width as f64, info.height as f64);
    let (tw, th) = (spec.width, spec.height);
    let source_ratio = sw / sh;
    let target_ratio = tw as f64 / th as f64;

    let mut filter = if (source_ratio - target_ratio).abs() < 0.01 {
        format!("scale={tw}:{th}")
    } else if source_ratio > target_ratio {
        let scale_w = (sw * th as f64 / sh) as u32;
        let crop_x = scale_w.saturating_sub(tw) / 2;
        format!("scale={scale_w}:{th},crop={tw}:{th}:{crop_x}:0")
    } else {
        let scale_h = (sh * tw as f64 / sw) as u32;
        let crop_y = scale_h.saturating_sub(th) / 2;
        format!("scale={tw}:{scale_h},crop={tw}:{th}:0:{crop_y}")
    };

    if (info.fps - spec.fps as f64).abs() > 0.1 {
        filter.push_str(&format!(",fps={}", spec.fps));
    }

    filter
}

/// Encoder arguments for a platform encode on `device`.
fn encoder_args(device: RenderDevice, spec: &PlatformSpec) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        device.video_codec().to_string(),
        "-b:v".to_string(),
        spec.video_bitrate.to_string(),
    ];

    let tuning: &[&str] = match device {
        RenderDevice::Cpu => &["-preset", "fast", "-profile:v", "high", "-level", "4.1", "-crf", "23"],
        RenderDevice::Nvidia => &["-preset", "fast", "-profile:v", "high", "-level", "4.1", "-rc", "cbr"],
        RenderDevice::Amd => &[],
    };
    args.extend(tuning.iter().map(|s| s.to_string()));

    args.extend(
        ["-c:a", "aac", "-b:a", spec.audio_bitrate, "-movflags", "+faststart"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

/// Full FFmpeg command for one platform encode.
pub fn platform_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    info: &VideoInfo,
    platform: Platform,
    device: RenderDevice,
) -> FfmpegCommand {
    let spec = platform.spec();
    let mut cmd = FfmpegCommand::new(input, output);

    if !info.has_audio {
        cmd = cmd.add_input(SILENT_AUDIO).input_args(["-f", "lavfi"]);
    }

    cmd = cmd
        .video_filter(platform_filter(info, &spec))
        .map("0:v")
        .map(if info.has_audio { "0:a" } else { "1:a" })
        .output_args(encoder_args(device, &spec));

    if !info.has_audio {
        cmd = cmd.output_arg("-shortest");
    }
    cmd
}

/// `{stem}_{platform}.mp4` next to `clip`.
pub fn platform_output_path(clip: &Path, platform: Platform) -> PathBuf {
    let stem = clip
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    clip.with_file_name(format!("{stem}_{}.mp4", platform.as_str()))
}

/// Re-encode `input` for `platform` into `output`.
///
/// Returns the duration warnings for the platform; they never fail the encode.
pub async fn optimize_for_platform(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    platform: Platform,
    device: RenderDevice,
    timeout_secs: u64,
) -> MediaResult<Vec<String>> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let info = probe_video(input).await?;
    let warnings = platform.validate_duration(info.duration);
    for warning in &warnings {
        warn!(platform = %platform, "{}", warning);
    }

    let spec = platform.spec();
    info!(
        "Optimizing {} for {}: {}x{} -> {}x{}",
        input.display(),
        spec.description,
        info.width,
        info.height,
        spec.width,
        spec.height
    );

    let cmd = platform_command(input, output, &info, platform, device);
    let runner = if timeout_secs > 0 {
        FfmpegRunner::new().with_timeout(timeout_secs)
    } else {
        FfmpegRunner::new()
    };
    runner.run(&cmd).await?;

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> VideoInfo {
        VideoInfo::new(width, height, 30.0)
    }

    #[test]
    fn test_filter_same_aspect_only_scales() {
        let filter = platform_filter(&info(606, 1080), &Platform::TikTok.spec());
        assert_eq!(filter, "scale=1080:1920");
    }

    #[test]
    fn test_filter_wider_source_crops_horizontally() {
        let filter = platform_filter(&info(1920, 1080), &Platform::InstagramPost.spec());
        assert_eq!(filter, "scale=1920:1080,crop=1080:1080:420:0");
    }

    #[test]
    fn test_filter_taller_source_crops_vertically_and_conforms_fps() {
        let mut portrait = info(1080, 1920);
        portrait.fps = 60.0;
        let filter = platform_filter(&portrait, &Platform::TwitterVideo.spec());
        assert_eq!(filter, "scale=1280:2275,crop=1280:720:0:777,fps=30");
    }

    #[test]
    fn test_command_args_for_cpu() {
        let args = platform_command(
            "clip_1.mp4",
            "clip_1_youtube_shorts.mp4",
            &info(606, 1080),
            Platform::YouTubeShorts,
            RenderDevice::Cpu,
        )
        .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-i clip_1.mp4 -vf scale=1080:1920 -map 0:v -map 0:a"));
        assert!(joined.contains("-c:v libx264 -b:v 10M -preset fast"));
        assert!(joined.contains("-crf 23"));
        assert!(joined.contains("-c:a aac -b:a 192k -movflags +faststart"));
        assert!(!joined.contains("lavfi"));
        assert_eq!(args.last().unwrap(), "clip_1_youtube_shorts.mp4");
    }

    #[test]
    fn test_command_adds_silent_track_without_audio() {
        let mut silent = info(606, 1080);
        silent.has_audio = false;
        let args = platform_command("in.mp4", "out.mp4", &silent, Platform::TikTok, RenderDevice::Nvidia)
            .build_args();

        let lavfi = args.iter().position(|a| a == "lavfi").unwrap();
        assert_eq!(args[lavfi - 1], "-f");
        assert_eq!(args[lavfi + 1], "-i");
        assert_eq!(args[lavfi + 2], SILENT_AUDIO);
        assert!(args.join(" ").contains("-map 1:a"));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.join(" ").contains("-c:v h264_nvenc -b:v 8M"));
        assert!(args.join(" ").contains("-rc cbr"));
    }

    #[test]
    fn test_platform_output_path() {
        assert_eq!(
            platform_output_path(Path::new("/out/clip_1_Intro.mp4"), Platform::InstagramReels),
            PathBuf::from("/out/clip_1_Intro_instagram_reels.mp4")
        );
    }

    #[tokio::test]
    async fn test_missing_input() {
        let err = optimize_for_platform("/nonexistent.mp4", "/tmp/x.mp4", Platform::TikTok, RenderDevice::Cpu, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
