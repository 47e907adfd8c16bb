//! Worker configuration.

use std::path::{Path, PathBuf};

use reframe_media::ReframeConfig;
use reframe_models::RenderDevice;
use tracing::debug;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory receiving rendered clips and the batch report
    pub output_dir: PathBuf,
    /// Scratch directory for cut clips before reframing
    pub work_dir: PathBuf,
    /// Encoder family used when the manifest does not pin one
    pub render_device: RenderDevice,
    /// Directory holding the ffmpeg/ffprobe binaries, if not on `PATH`
    pub ffmpeg_path: Option<PathBuf>,
    /// Reframing pipeline tuning
    pub reframe: ReframeConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            work_dir: std::env::temp_dir().join("reframe"),
            render_device: RenderDevice::Cpu,
            ffmpeg_path: None,
            reframe: ReframeConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("REFRAME_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            work_dir: std::env::var("REFRAME_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            render_device: std::env::var("REFRAME_RENDER_DEVICE")
                .map(|v| RenderDevice::parse_lenient(&v))
                .unwrap_or(defaults.render_device),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            reframe: ReframeConfig::from_env(),
        }
    }

    /// Prepend `ffmpeg_path` to `PATH` so binary lookups find it first.
    ///
    /// Must run before any task is spawned.
    pub fn apply_ffmpeg_path(&self) {
        let Some(dir) = &self.ffmpeg_path else {
            return;
        };
        let path = prepend_path(dir, std::env::var_os("PATH").as_deref());
        debug!("Prepending {} to PATH", dir.display());
        std::env::set_var("PATH", path);
    }
}

fn prepend_path(dir: &Path, current: Option<&std::ffi::OsStr>) -> std::ffi::OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(current) = current {
        entries.extend(std::env::split_paths(current).filter(|p| p != dir));
    }
    std::env::join_paths(entries).unwrap_or_else(|_| dir.as_os_str().to_os_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.render_device, RenderDevice::Cpu);
        assert!(config.ffmpeg_path.is_none());
        assert_eq!(config.output_dir, PathBuf::from("./output"));
    }

    #[test]
    fn test_prepend_path_dedupes() {
        let dir = Path::new("/opt/ffmpeg/bin");
        let joined = prepend_path(dir, Some(std::ffi::OsStr::new("/usr/bin:/opt/ffmpeg/bin")));
        let entries: Vec<PathBuf> = std::env::split_paths(&joined).collect();
        assert_eq!(
            entries,
            vec![PathBuf::from("/opt/ffmpeg/bin"), PathBuf::from("/usr/bin")]
        );

        let alone = prepend_path(dir, None);
        assert_eq!(alone, std::ffi::OsString::from("/opt/ffmpeg/bin"));
    }
}
