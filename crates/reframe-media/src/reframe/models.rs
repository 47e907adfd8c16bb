//! Data types flowing through the reframing pipeline.

use serde::{Deserialize, Serialize};

/// 2D point in source frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Facial landmarks for one face.
///
/// Named points are optional because detectors differ in what they provide:
/// YuNet gives nose and mouth corners, a face mesh adds the inner lips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub nose: Option<Point>,
    pub mouth_left: Option<Point>,
    pub mouth_right: Option<Point>,
    pub upper_lip: Option<Point>,
    pub lower_lip: Option<Point>,
    /// Dense mesh points, when available
    #[serde(default)]
    pub mesh: Vec<Point>,
}

impl FaceLandmarks {
    /// Mouth aspect ratio: vertical lip gap over corner-to-corner width.
    ///
    /// Returns 0 when the lip points are missing or the mouth is narrower than
    /// one pixel.
    pub fn mouth_aspect_ratio(&self) -> f64 {
        let (Some(upper), Some(lower), Some(left), Some(right)) = (
            self.upper_lip,
            self.lower_lip,
            self.mouth_left,
            self.mouth_right,
        ) else {
            return 0.0;
        };

        let horizontal = (right.x - left.x).abs();
        if horizontal < 1.0 {
            return 0.0;
        }
        (upper.y - lower.y).abs() / horizontal
    }

    /// Mean x of the mesh, falling back to the mean of the named points.
    pub fn center_x(&self) -> Option<f64> {
        if !self.mesh.is_empty() {
            let sum: f64 = self.mesh.iter().map(|p| p.x).sum();
            return Some(sum / self.mesh.len() as f64);
        }

        let named: Vec<f64> = [
            self.nose,
            self.mouth_left,
            self.mouth_right,
            self.upper_lip,
            self.lower_lip,
        ]
        .iter()
        .flatten()
        .map(|p| p.x)
        .collect();

        if named.is_empty() {
            None
        } else {
            Some(named.iter().sum::<f64>() / named.len() as f64)
        }
    }
}

/// One detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub center_x: f64,
    /// Vertical box center; only box detectors that see the full frame set it
    #[serde(default)]
    pub center_y: Option<f64>,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub landmarks: Option<FaceLandmarks>,
}

impl FaceDetection {
    pub fn new(center_x: f64, width: f64, height: f64) -> Self {
        Self {
            center_x,
            center_y: None,
            width,
            height,
            landmarks: None,
        }
    }

    pub fn with_center_y(mut self, center_y: f64) -> Self {
        self.center_y = Some(center_y);
        self
    }

    pub fn with_landmarks(mut self, landmarks: FaceLandmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Horizontal anchor used for left/right classification: the nose when
    /// known, otherwise the box center.
    pub fn anchor_x(&self) -> f64 {
        self.landmarks
            .as_ref()
            .and_then(|l| l.nose)
            .map(|p| p.x)
            .unwrap_or(self.center_x)
    }

    /// Face center from landmarks when present, otherwise the box center.
    pub fn landmark_center_x(&self) -> f64 {
        self.landmarks
            .as_ref()
            .and_then(FaceLandmarks::center_x)
            .unwrap_or(self.center_x)
    }

    pub fn mouth_aspect_ratio(&self) -> f64 {
        self.landmarks
            .as_ref()
            .map(FaceLandmarks::mouth_aspect_ratio)
            .unwrap_or(0.0)
    }
}

/// Detections for one sampled frame. Faces are ordered by ascending x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub faces: Vec<FaceDetection>,
}

impl Sample {
    /// Build a sample, sorting faces left to right.
    pub fn new(time: f64, mut faces: Vec<FaceDetection>) -> Self {
        faces.sort_by(|a, b| a.center_x.total_cmp(&b.center_x));
        Self { time, faces }
    }

    pub fn largest_face(&self) -> Option<&FaceDetection> {
        self.faces
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))
    }

    pub fn leftmost(&self) -> Option<&FaceDetection> {
        self.faces.first()
    }

    pub fn rightmost(&self) -> Option<&FaceDetection> {
        self.faces.last()
    }

    pub fn is_dual(&self) -> bool {
        self.faces.len() >= 2
    }
}

/// Geometry of a segment, tagged by how many subjects it frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentKind {
    Single { center_x: f64 },
    Dual { left_x: f64, right_x: f64 },
}

/// A time range rendered with one fixed crop geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn single(start: f64, end: f64, center_x: f64) -> Self {
        Self {
            start,
            end,
            kind: SegmentKind::Single { center_x },
        }
    }

    pub fn dual(start: f64, end: f64, left_x: f64, right_x: f64) -> Self {
        Self {
            start,
            end,
            kind: SegmentKind::Dual { left_x, right_x },
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_dual(&self) -> bool {
        matches!(self.kind, SegmentKind::Dual { .. })
    }
}

/// Which face an active-speaker decision settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerChoice {
    Left,
    Right,
    Center,
}

/// Concrete, bounds-checked render input for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditInstruction {
    Single {
        start: f64,
        end: f64,
        crop_x: u32,
    },
    Split {
        start: f64,
        end: f64,
        crop_x_left: u32,
        crop_x_right: u32,
    },
}

impl EditInstruction {
    pub fn start(&self) -> f64 {
        match *self {
            EditInstruction::Single { start, .. } | EditInstruction::Split { start, .. } => start,
        }
    }

    pub fn end(&self) -> f64 {
        match *self {
            EditInstruction::Single { end, .. } | EditInstruction::Split { end, .. } => end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}
