//! Social platform delivery targets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Platform a finished clip can be re-encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[serde(rename = "tiktok")]
    TikTok,
    #[serde(rename = "youtube_shorts")]
    YouTubeShorts,
    InstagramReels,
    InstagramPost,
    InstagramStory,
    FacebookVideo,
    TwitterVideo,
    #[serde(rename = "linkedin_video")]
    LinkedInVideo,
    #[serde(rename = "youtube_standard")]
    YouTubeStandard,
}

/// Delivery constraints for one platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformSpec {
    pub width: u32,
    pub height: u32,
    /// Hard upper limit in seconds, if the platform has one
    pub max_duration: Option<f64>,
    /// Recommended `(min, max)` duration in seconds
    pub optimal_duration: (f64, f64),
    pub fps: u32,
    pub video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
    pub description: &'static str,
}

const fn vertical(
    max_duration: f64,
    optimal_duration: (f64, f64),
    video_bitrate: &'static str,
    description: &'static str,
) -> PlatformSpec {
    PlatformSpec {
        width: 1080,
        height: 1920,
        max_duration: Some(max_duration),
        optimal_duration,
        fps: 30,
        video_bitrate,
        audio_bitrate: "192k",
        description,
    }
}

impl Platform {
    pub const ALL: &'static [Platform] = &[
        Platform::TikTok,
        Platform::YouTubeShorts,
        Platform::InstagramReels,
        Platform::InstagramPost,
        Platform::InstagramStory,
        Platform::FacebookVideo,
        Platform::TwitterVideo,
        Platform::LinkedInVideo,
        Platform::YouTubeStandard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::YouTubeShorts => "youtube_shorts",
            Platform::InstagramReels => "instagram_reels",
            Platform::InstagramPost => "instagram_post",
            Platform::InstagramStory => "instagram_story",
            Platform::FacebookVideo => "facebook_video",
            Platform::TwitterVideo => "twitter_video",
            Platform::LinkedInVideo => "linkedin_video",
            Platform::YouTubeStandard => "youtube_standard",
        }
    }

    pub fn spec(&self) -> PlatformSpec {
        match self {
            Platform::TikTok => vertical(600.0, (15.0, 60.0), "8M", "TikTok Vertical (9:16)"),
            Platform::YouTubeShorts => {
                vertical(60.0, (15.0, 60.0), "10M", "YouTube Shorts (9:16)")
            }
            Platform::InstagramReels => {
                vertical(90.0, (15.0, 30.0), "8M", "Instagram Reels (9:16)")
            }
            Platform::InstagramStory => {
                vertical(15.0, (5.0, 15.0), "8M", "Instagram Story (9:16)")
            }
            Platform::InstagramPost => PlatformSpec {
                width: 1080,
                height: 1080,
                max_duration: Some(60.0),
                optimal_duration: (15.0, 60.0),
                fps: 30,
                video_bitrate: "6M",
                audio_bitrate: "128k",
                description: "Instagram Post Square (1:1)",
            },
            Platform::FacebookVideo => PlatformSpec {
                width: 1920,
                height: 1080,
                max_duration: Some(240.0),
                optimal_duration: (60.0, 120.0),
                fps: 30,
                video_bitrate: "8M",
                audio_bitrate: "192k",
                description: "Facebook Video Landscape (16:9)",
            },
            Platform::TwitterVideo => PlatformSpec {
                width: 1280,
                height: 720,
                max_duration: Some(140.0),
                optimal_duration: (30.0, 60.0),
                fps: 30,
                video_bitrate: "6M",
                audio_bitrate: "128k",
                description: "Twitter Video (16:9)",
            },
            Platform::LinkedInVideo => PlatformSpec {
                width: 1920,
                height: 1080,
                max_duration: Some(600.0),
                optimal_duration: (30.0, 90.0),
                fps: 30,
                video_bitrate: "10M",
                audio_bitrate: "192k",
                description: "LinkedIn Video (16:9)",
            },
            Platform::YouTubeStandard => PlatformSpec {
                width: 1920,
                height: 1080,
                max_duration: None,
                optimal_duration: (60.0, 300.0),
                fps: 30,
                video_bitrate: "12M",
                audio_bitrate: "192k",
                description: "YouTube Standard (16:9)",
            },
        }
    }

    /// Warnings for a clip of `duration` seconds. Empty when the duration suits the platform.
    pub fn validate_duration(&self, duration: f64) -> Vec<String> {
        let spec = self.spec();
        let (min, max) = spec.optimal_duration;
        let mut warnings = Vec::new();

        if let Some(limit) = spec.max_duration {
            if duration > limit {
                warnings.push(format!(
                    "Video ({duration:.1}s) exceeds {self} maximum duration ({limit}s)"
                ));
            }
        }

        if duration < min {
            warnings.push(format!(
                "Video ({duration:.1}s) is shorter than optimal for {self} ({min}-{max}s)"
            ));
        } else if duration > max {
            warnings.push(format!(
                "Video ({duration:.1}s) is longer than optimal for {self} ({min}-{max}s)"
            ));
        }

        warnings
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    /// Accepts `snake_case` names and display names such as `"YouTube Shorts"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().replace('_', "") == key)
            .ok_or_else(|| PlatformParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown platform: {0}")]
pub struct PlatformParseError(String);

/// Result of re-encoding one clip for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformOutput {
    pub platform: Platform,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), *platform);
        }
        assert_eq!("YouTube Shorts".parse::<Platform>().unwrap(), Platform::YouTubeShorts);
        assert_eq!("TikTok".parse::<Platform>().unwrap(), Platform::TikTok);
        assert!("myspace".parse::<Platform>().is_err());

        let parsed: Platform = serde_json::from_str("\"linkedin_video\"").unwrap();
        assert_eq!(parsed, Platform::LinkedInVideo);
    }

    #[test]
    fn test_validate_duration() {
        assert!(Platform::TikTok.validate_duration(30.0).is_empty());

        let long_short = Platform::YouTubeShorts.validate_duration(75.0);
        assert_eq!(long_short.len(), 2);
        assert!(long_short[0].contains("exceeds youtube_shorts maximum duration (60s)"));
        assert!(long_short[1].contains("longer than optimal"));

        let brief = Platform::FacebookVideo.validate_duration(20.0);
        assert_eq!(brief.len(), 1);
        assert!(brief[0].contains("shorter than optimal"));

        // No hard limit for long-form uploads
        assert_eq!(Platform::YouTubeStandard.validate_duration(3600.0).len(), 1);
    }

    #[test]
    fn test_specs() {
        let shorts = Platform::YouTubeShorts.spec();
        assert_eq!((shorts.width, shorts.height), (1080, 1920));
        assert_eq!(shorts.video_bitrate, "10M");
        assert_eq!(Platform::InstagramPost.spec().width, 1080);
        assert_eq!(Platform::InstagramPost.spec().height, 1080);
        assert_eq!(Platform::TwitterVideo.spec().audio_bitrate, "128k");
    }
}
