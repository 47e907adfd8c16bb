//! Crop geometry: turns segments into bounds-checked edit instructions.
//!
//! Output frames are 9:16 at the source's native height. Split segments stack
//! two speaker regions and scale the stack back to the same output size.

use crate::filters;

use super::models::{EditInstruction, Segment, SegmentKind};

/// Width/height of one speaker region in quality split mode.
pub const SPLIT_REGION_ASPECT: f64 = 9.0 / 8.0;

/// Round down to an even number (H.264 needs even dimensions).
#[inline]
pub fn make_even(value: u32) -> u32 {
    value & !1
}

/// Round up to an even number.
#[inline]
pub fn make_even_up(value: u32) -> u32 {
    value + (value & 1)
}

/// How split segments are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitLayout {
    /// Two 9:8 full-height regions, stacked, then scaled to the output
    Quality { region_width: u32 },
    /// Two 9:16 windows, each scaled to half height, then stacked
    Squash,
}

/// Filter for one segment render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentFilter {
    /// Simple `-vf` chain
    Simple(String),
    /// `-filter_complex` graph producing `[vout]`
    Complex(String),
}

/// Crop geometry for one source size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlanner {
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
}

impl CropPlanner {
    /// Geometry for a source, or `None` when the source is narrower than a
    /// 9:16 window and should pass through untouched.
    pub fn new(source_width: u32, source_height: u32) -> Option<Self> {
        let target_width = make_even((source_height as f64 * 9.0 / 16.0) as u32);
        let target_height = make_even(source_height);

        if target_width == 0 || target_height == 0 || source_width < target_width {
            return None;
        }

        Some(Self {
            source_width,
            source_height,
            target_width,
            target_height,
        })
    }

    pub fn source_width(&self) -> u32 {
        self.source_width
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    /// Quality mode when a full-height 9:8 region fits the frame, squash otherwise.
    /// The two regions may overlap when the speakers sit close together.
    pub fn split_layout(&self) -> SplitLayout {
        let region_width =
            make_even_up((self.source_height as f64 * SPLIT_REGION_ASPECT).ceil() as u32);
        if self.source_width >= region_width {
            SplitLayout::Quality { region_width }
        } else {
            SplitLayout::Squash
        }
    }

    /// Width of one split region for the current layout.
    pub fn split_region_width(&self) -> u32 {
        match self.split_layout() {
            SplitLayout::Quality { region_width } => region_width,
            SplitLayout::Squash => self.target_width,
        }
    }

    /// Left edge of a `window`-wide crop centered on `center_x`, clamped to the frame.
    fn clamp_offset(&self, center_x: f64, window: u32) -> u32 {
        let max = self.source_width.saturating_sub(window) as f64;
        let ideal = center_x - window as f64 / 2.0;
        if ideal.is_nan() {
            return (max / 2.0).floor() as u32;
        }
        ideal.clamp(0.0, max).floor() as u32
    }

    /// Single-window crop offset for a subject at `center_x`.
    pub fn crop_x(&self, center_x: f64) -> u32 {
        self.clamp_offset(center_x, self.target_width)
    }

    /// Split-region crop offset for a subject at `center_x`.
    pub fn split_crop_x(&self, center_x: f64) -> u32 {
        self.clamp_offset(center_x, self.split_region_width())
    }

    /// Center of the single window that `crop_x` would choose for `center_x`.
    pub fn clamped_center(&self, center_x: f64) -> f64 {
        self.crop_x(center_x) as f64 + self.target_width as f64 / 2.0
    }

    /// Static center-crop segment covering `[0, duration)`.
    pub fn static_center(&self, duration: f64) -> Segment {
        Segment::single(0.0, duration, self.source_width as f64 / 2.0)
    }

    pub fn instruction(&self, segment: &Segment) -> EditInstruction {
        match segment.kind {
            SegmentKind::Single { center_x } => EditInstruction::Single {
                start: segment.start,
                end: segment.end,
                crop_x: self.crop_x(center_x),
            },
            SegmentKind::Dual { left_x, right_x } => EditInstruction::Split {
                start: segment.start,
                end: segment.end,
                crop_x_left: self.split_crop_x(left_x),
                crop_x_right: self.split_crop_x(right_x),
            },
        }
    }

    /// Instructions for every non-empty segment, in order.
    pub fn plan(&self, segments: &[Segment]) -> Vec<EditInstruction> {
        segments
            .iter()
            .filter(|s| s.duration() > 0.0)
            .map(|s| self.instruction(s))
            .collect()
    }

    /// Filter that renders `instruction` at the output size.
    pub fn filter_for(&self, instruction: &EditInstruction) -> SegmentFilter {
        match *instruction {
            EditInstruction::Single { crop_x, .. } => SegmentFilter::Simple(filters::crop_filter(
                self.target_width,
                self.target_height,
                crop_x,
            )),
            EditInstruction::Split {
                crop_x_left,
                crop_x_right,
                ..
            } => SegmentFilter::Complex(match self.split_layout() {
                SplitLayout::Quality { region_width } => filters::split_quality_graph(
                    region_width,
                    self.target_height,
                    crop_x_left,
                    crop_x_right,
                    self.target_width,
                    self.target_height,
                ),
                SplitLayout::Squash => filters::split_squash_graph(
                    self.target_width,
                    self.target_height,
                    crop_x_left,
                    crop_x_right,
                ),
            }),
        }
    }
}
