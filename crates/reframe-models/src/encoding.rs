//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Device used for the H.264 encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderDevice {
    #[default]
    Cpu,
    Nvidia,
    Amd,
}

impl RenderDevice {
    /// FFmpeg encoder name for this device.
    pub fn video_codec(&self) -> &'static str {
        match self {
            RenderDevice::Cpu => "libx264",
            RenderDevice::Nvidia => "h264_nvenc",
            RenderDevice::Amd => "h264_amf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderDevice::Cpu => "cpu",
            RenderDevice::Nvidia => "nvidia",
            RenderDevice::Amd => "amd",
        }
    }

    /// Lenient parse: unknown values fall back to the CPU encoder.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for RenderDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RenderDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(RenderDevice::Cpu),
            "nvidia" | "nvenc" | "cuda" => Ok(RenderDevice::Nvidia),
            "amd" | "amf" => Ok(RenderDevice::Amd),
            other => Err(format!("Unknown render device: {other}")),
        }
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Device that determines the video encoder
    #[serde(default)]
    pub device: RenderDevice,

    /// Encoding preset (e.g., "fast", "medium"); ignored by AMF
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            device: RenderDevice::Cpu,
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

impl EncodingConfig {
    /// Default settings for the given device.
    pub fn for_device(device: RenderDevice) -> Self {
        Self {
            device,
            ..Default::default()
        }
    }

    /// Encoder name passed to `-c:v`.
    pub fn video_codec(&self) -> &'static str {
        self.device.video_codec()
    }

    /// Convert to FFmpeg output arguments (video and audio).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec().to_string()];

        match self.device {
            RenderDevice::Cpu => {
                args.extend(["-preset".to_string(), self.preset.clone()]);
                args.extend(["-crf".to_string(), self.crf.to_string()]);
            }
            // NVENC takes -cq instead of -crf
            RenderDevice::Nvidia => {
                args.extend(["-preset".to_string(), self.preset.clone()]);
                args.extend(["-cq".to_string(), self.crf.to_string()]);
            }
            RenderDevice::Amd => {
                args.extend(["-rc".to_string(), "cqp".to_string()]);
                args.extend(["-qp_i".to_string(), self.crf.to_string()]);
                args.extend(["-qp_p".to_string(), self.crf.to_string()]);
            }
        }

        args.extend([
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.video_codec(), "libx264");
        assert_eq!(config.crf, DEFAULT_CRF);
    }

    #[test]
    fn test_cpu_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_nvenc_uses_cq() {
        let args = EncodingConfig::for_device(RenderDevice::Nvidia).to_ffmpeg_args();
        assert!(args.contains(&"h264_nvenc".to_string()));
        assert!(args.contains(&"-cq".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_amf_has_no_preset() {
        let args = EncodingConfig::for_device(RenderDevice::Amd).to_ffmpeg_args();
        assert!(args.contains(&"h264_amf".to_string()));
        assert!(!args.contains(&"-preset".to_string()));
    }

    #[test]
    fn test_device_parse() {
        assert_eq!("NVIDIA".parse::<RenderDevice>().unwrap(), RenderDevice::Nvidia);
        assert_eq!(" amd ".parse::<RenderDevice>().unwrap(), RenderDevice::Amd);
        assert_eq!(RenderDevice::parse_lenient("quantum"), RenderDevice::Cpu);
    }
}
