//! MediaPipe Face Mesh ONNX inference for lip landmarks.
//!
//! Refines box detections with the dense mesh so that mouth aspect ratios can
//! be measured. Each face box is padded by 25%, squared, cropped, resized to
//! 192x192 and normalized to `[-1, 1]` CHW. Mesh points come back in crop
//! space and are mapped to frame coordinates around the crop center.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

use super::detector::{LandmarkRefiner, VideoFrame};
use super::models::{FaceDetection, FaceLandmarks, Point};

/// Model input edge in pixels.
const INPUT_SIZE: u32 = 192;
/// Padding added around a face box before squaring.
const PAD_RATIO: f64 = 0.25;

const UPPER_LIP: usize = 13;
const LOWER_LIP: usize = 14;
const MOUTH_LEFT: usize = 78;
const MOUTH_RIGHT: usize = 308;
const NOSE_TIP: usize = 1;

/// Env var overriding the model search.
pub const FACE_MESH_MODEL_ENV: &str = "REFRAME_FACE_MESH_MODEL";

const CANDIDATES: &[&str] = &[
    "./models/face_mesh/face_landmark_with_attention.onnx",
    "/app/models/face_mesh/face_landmark_with_attention.onnx",
];

fn find_default_model_path() -> Option<PathBuf> {
    std::env::var(FACE_MESH_MODEL_ENV)
        .ok()
        .map(PathBuf::from)
        .into_iter()
        .chain(CANDIDATES.iter().map(PathBuf::from))
        .find(|p| p.exists())
}

/// Square crop in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropRect {
    x: u32,
    y: u32,
    size: u32,
}

/// ONNX Runtime-backed face mesh refiner.
pub struct FaceMeshRefiner {
    session: Mutex<Session>,
}

impl FaceMeshRefiner {
    /// Load the model from the default search paths.
    pub fn new_default() -> MediaResult<Self> {
        let model_path = find_default_model_path().ok_or_else(|| {
            MediaError::detection_failed(format!(
                "face_landmark_with_attention.onnx not found; set {FACE_MESH_MODEL_ENV}"
            ))
        })?;
        Self::load(&model_path)
    }

    pub fn load(model_path: &Path) -> MediaResult<Self> {
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| MediaError::detection_failed(format!("ORT read model file: {e}")))?;

        let session = Session::builder()
            .map_err(|e| MediaError::detection_failed(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MediaError::detection_failed(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| MediaError::detection_failed(format!("ORT load model: {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Mesh points for one face, in frame coordinates.
    fn mesh_for(&self, image: &RgbImage, face: &FaceDetection) -> MediaResult<Vec<Point>> {
        let crop = square_crop(image.width(), image.height(), face)?;
        let patch = imageops::crop_imm(image, crop.x, crop.y, crop.size, crop.size).to_image();
        let resized = imageops::resize(&patch, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let tensor = to_chw_tensor(&resized)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::detection_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;
        let output = outputs
            .get("output")
            .ok_or_else(|| MediaError::detection_failed("ORT returned no outputs"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;

        let (points, dims) = match shape.len() {
            3 if shape[0] == 1 => (shape[1] as usize, shape[2] as usize),
            2 => (shape[0] as usize, shape[1] as usize),
            _ => {
                return Err(MediaError::detection_failed(format!(
                    "Unexpected face mesh output shape: {shape:?}"
                )))
            }
        };
        if dims < 2 || data.len() < points * dims {
            return Err(MediaError::detection_failed("Face mesh output too short"));
        }

        Ok((0..points)
            .map(|i| {
                let nx = data[i * dims] as f64 / INPUT_SIZE as f64;
                let ny = data[i * dims + 1] as f64 / INPUT_SIZE as f64;
                map_to_frame(nx, ny, crop)
            })
            .collect())
    }
}

impl LandmarkRefiner for FaceMeshRefiner {
    fn refine(&self, frame: &VideoFrame, faces: Vec<FaceDetection>) -> MediaResult<Vec<FaceDetection>> {
        Ok(faces
            .into_iter()
            .map(|face| match self.mesh_for(&frame.image, &face) {
                Ok(mesh) => {
                    let landmarks = landmarks_from_mesh(mesh, face.landmarks.as_ref());
                    face.with_landmarks(landmarks)
                }
                Err(e) => {
                    debug!("Face mesh skipped at {:.2}s: {}", frame.time, e);
                    face
                }
            })
            .collect())
    }
}

/// Named points from the mesh, keeping any existing point the mesh lacks.
fn landmarks_from_mesh(mesh: Vec<Point>, existing: Option<&FaceLandmarks>) -> FaceLandmarks {
    let at = |i: usize| mesh.get(i).copied();
    let fallback = existing.cloned().unwrap_or_default();

    FaceLandmarks {
        nose: at(NOSE_TIP).or(fallback.nose),
        mouth_left: at(MOUTH_LEFT).or(fallback.mouth_left),
        mouth_right: at(MOUTH_RIGHT).or(fallback.mouth_right),
        upper_lip: at(UPPER_LIP),
        lower_lip: at(LOWER_LIP),
        mesh,
    }
}

/// Pad the face box, make it square, clamp it to the frame.
fn square_crop(frame_w: u32, frame_h: u32, face: &FaceDetection) -> MediaResult<CropRect> {
    let center_y = face.center_y.unwrap_or(frame_h as f64 / 2.0);
    let size = face.width.max(face.height) * (1.0 + PAD_RATIO);

    let mut x = face.center_x - size / 2.0;
    let mut y = center_y - size / 2.0;
    let mut s = size;

    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    s = s.min(frame_w as f64 - x).min(frame_h as f64 - y);

    if s < 8.0 {
        return Err(MediaError::detection_failed("ROI too small for face mesh"));
    }

    Ok(CropRect {
        x: x.round() as u32,
        y: y.round() as u32,
        size: (s.floor() as u32).min(frame_w.saturating_sub(x.round() as u32)),
    })
}

/// Center-based mapping from normalized crop coordinates to frame coordinates.
fn map_to_frame(nx: f64, ny: f64, crop: CropRect) -> Point {
    let size = crop.size as f64;
    let center_x = crop.x as f64 + size / 2.0;
    let center_y = crop.y as f64 + size / 2.0;
    Point::new(center_x + (nx - 0.5) * size, center_y + (ny - 0.5) * size)
}

/// HWC RGB to a `(1, 3, H, W)` tensor in `[-1, 1]`.
fn to_chw_tensor(image: &RgbImage) -> MediaResult<Value> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let raw = image.as_raw();

    let mut chw = Vec::with_capacity(w * h * 3);
    for c in 0..3 {
        for y in 0..h {
            for x in 0..w {
                let v = raw[(y * w + x) * 3 + c] as f32 / 255.0;
                chw.push(v * 2.0 - 1.0);
            }
        }
    }

    Tensor::from_array((vec![1usize, 3, h, w], chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))
}
