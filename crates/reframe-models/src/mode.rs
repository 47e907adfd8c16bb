//! Reframe mode definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the virtual camera follows subjects in a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReframeMode {
    /// Follow the largest face, moving only on a real relocation
    #[default]
    Track,
    /// Single crop while one face is visible, stacked halves while two are
    SplitScreen,
    /// Switch between two speakers based on mouth activity during speech
    ActiveSpeaker,
}

impl ReframeMode {
    pub const ALL: &'static [ReframeMode] = &[
        ReframeMode::Track,
        ReframeMode::SplitScreen,
        ReframeMode::ActiveSpeaker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReframeMode::Track => "track",
            ReframeMode::SplitScreen => "split_screen",
            ReframeMode::ActiveSpeaker => "active_speaker",
        }
    }

    /// Whether this mode consumes speech intervals.
    pub fn needs_speech(&self) -> bool {
        matches!(self, ReframeMode::ActiveSpeaker)
    }
}

impl fmt::Display for ReframeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReframeMode {
    type Err = ReframeModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "track" | "single" => Ok(ReframeMode::Track),
            "split_screen" | "split" | "dual" => Ok(ReframeMode::SplitScreen),
            "active_speaker" | "active" => Ok(ReframeMode::ActiveSpeaker),
            _ => Err(ReframeModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown reframe mode: {0}")]
pub struct ReframeModeParseError(String);
