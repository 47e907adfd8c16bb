//! Subtitle styling and overlay references.
//!
//! Colors are opaque ASS tokens (e.g. `&H00FFFFFF`). They are forwarded to the
//! subtitles filter untouched.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_FONT: &str = "Arial";
pub const DEFAULT_FONT_SIZE: u32 = 8;
pub const DEFAULT_PRIMARY_COLOR: &str = "&H00FFFFFF";
pub const DEFAULT_OUTLINE_COLOR: &str = "&H00000000";

/// Burned-in subtitle track and its styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleStyle {
    /// Subtitle file (SRT/ASS) already sliced to the clip
    pub path: PathBuf,

    #[serde(default = "default_font")]
    pub font: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default = "default_primary_color")]
    pub primary_color: String,

    #[serde(default = "default_outline_color")]
    pub outline_color: String,

    /// Semi-transparent box behind the text; absent means outline only
    #[serde(default)]
    pub background_color: Option<String>,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}
fn default_primary_color() -> String {
    DEFAULT_PRIMARY_COLOR.to_string()
}
fn default_outline_color() -> String {
    DEFAULT_OUTLINE_COLOR.to_string()
}

impl SubtitleStyle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            font: default_font(),
            font_size: DEFAULT_FONT_SIZE,
            primary_color: default_primary_color(),
            outline_color: default_outline_color(),
            background_color: None,
        }
    }

    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into()).filter(|c: &String| !c.is_empty());
        self
    }
}

/// Image composited over the full output frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OverlaySpec {
    pub path: PathBuf,
}

impl OverlaySpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_defaults_from_json() {
        let style: SubtitleStyle = serde_json::from_str(r#"{"path":"subs.srt"}"#).unwrap();
        assert_eq!(style.font, "Arial");
        assert_eq!(style.font_size, 8);
        assert_eq!(style.primary_color, "&H00FFFFFF");
        assert!(style.background_color.is_none());
    }

    #[test]
    fn test_empty_background_is_none() {
        let style = SubtitleStyle::new("a.srt").with_background("");
        assert!(style.background_color.is_none());

        let style = SubtitleStyle::new("a.srt").with_background("&H80000000");
        assert_eq!(style.background_color.as_deref(), Some("&H80000000"));
    }
}
