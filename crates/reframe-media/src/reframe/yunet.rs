//! OpenCV YuNet face detector.
//!
//! YuNet is a lightweight CNN face detector exposed through OpenCV's
//! `FaceDetectorYN`. Besides the box it returns five landmarks, of which the
//! nose tip and both mouth corners are kept. It does not see the inner lips,
//! so mouth aspect ratios stay at 0 unless a mesh refiner runs after it.
//!
//! # Requirements
//! - OpenCV 4.5+ with the DNN and objdetect modules
//! - A YuNet ONNX model in one of [`YUNET_MODEL_PATHS`]

use std::path::Path;
use std::sync::Mutex;

use opencv::core::{Mat, Ptr, Size};
use opencv::imgproc;
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::{FaceDetectorYNTrait, MatTraitConst};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

use super::detector::{FaceDetector, VideoFrame};
use super::models::{FaceDetection, FaceLandmarks, Point};

const SCORE_THRESHOLD: f32 = 0.3;
const NMS_THRESHOLD: f32 = 0.3;
const TOP_K: i32 = 10;

/// Model search order. The 2023mar model is preferred; 2022mar loads on older
/// OpenCV builds.
pub const YUNET_MODEL_PATHS: &[&str] = &[
    "./models/face_detection/yunet/face_detection_yunet_2023mar.onnx",
    "/app/models/face_detection/yunet/face_detection_yunet_2023mar.onnx",
    "/usr/share/opencv/models/face_detection_yunet_2023mar.onnx",
    "./models/face_detection/yunet/face_detection_yunet_2022mar.onnx",
    "/app/models/face_detection/yunet/face_detection_yunet_2022mar.onnx",
    "/usr/share/opencv/models/face_detection_yunet_2022mar.onnx",
];

/// Env var overriding the model search.
pub const YUNET_MODEL_ENV: &str = "REFRAME_YUNET_MODEL";

fn find_model_path() -> Option<String> {
    if let Ok(path) = std::env::var(YUNET_MODEL_ENV) {
        if Path::new(&path).exists() {
            return Some(path);
        }
        warn!("{} points at a missing file: {}", YUNET_MODEL_ENV, path);
    }
    YUNET_MODEL_PATHS
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
}

/// YuNet detector. The OpenCV handle is not reentrant, so calls are serialized.
pub struct YuNetDetector {
    detector: Mutex<Ptr<FaceDetectorYN>>,
    model_path: String,
}

impl YuNetDetector {
    /// Load the first model found on the search path.
    pub fn new() -> MediaResult<Self> {
        let model_path = find_model_path().ok_or_else(|| {
            MediaError::detection_failed(format!(
                "No YuNet model found; set {YUNET_MODEL_ENV} or place one under ./models"
            ))
        })?;
        Self::with_model(&model_path)
    }

    pub fn with_model(model_path: &str) -> MediaResult<Self> {
        let metadata = std::fs::metadata(model_path).map_err(|e| {
            MediaError::detection_failed(format!("Cannot read YuNet model file: {e}"))
        })?;
        if metadata.len() < 50_000 {
            return Err(MediaError::detection_failed(format!(
                "YuNet model file appears corrupted (size: {} bytes)",
                metadata.len()
            )));
        }

        let detector = create_detector_with_fallback(model_path)?;
        info!("YuNet detector initialized: model={}", model_path);

        Ok(Self {
            detector: Mutex::new(detector),
            model_path: model_path.to_string(),
        })
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

/// Try the default DNN backend first, then the plain OpenCV one.
fn create_detector_with_fallback(model_path: &str) -> MediaResult<Ptr<FaceDetectorYN>> {
    use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_BACKEND_OPENCV, DNN_TARGET_CPU};

    let backends = [
        (DNN_BACKEND_DEFAULT, DNN_TARGET_CPU, "default"),
        (DNN_BACKEND_OPENCV, DNN_TARGET_CPU, "opencv"),
    ];

    let mut last_error = String::new();
    for (backend_id, target_id, backend_name) in backends {
        match FaceDetectorYN::create(
            model_path,
            "",
            Size::new(320, 320),
            SCORE_THRESHOLD,
            NMS_THRESHOLD,
            TOP_K,
            backend_id,
            target_id,
        ) {
            Ok(detector) => {
                debug!("YuNet created with {} backend", backend_name);
                return Ok(detector);
            }
            Err(e) => {
                warn!("YuNet {} backend failed: {}", backend_name, e);
                last_error = e.to_string();
            }
        }
    }

    Err(MediaError::detection_failed(format!(
        "Failed to create YuNet detector with any backend: {last_error}"
    )))
}

/// Network input size: at most 960x540, aligned to 32.
fn input_size(frame_width: u32, frame_height: u32) -> (i32, i32) {
    const ALIGNMENT: i32 = 32;
    let scale = (frame_width as f64 / 960.0)
        .max(frame_height as f64 / 540.0)
        .max(1.0);

    let align = |v: f64| (((v.round() as i32) + ALIGNMENT / 2) / ALIGNMENT) * ALIGNMENT;
    (
        align(frame_width as f64 / scale).clamp(160, 960),
        align(frame_height as f64 / scale).clamp(120, 540),
    )
}

/// Packed RGB bytes to a BGR `Mat`.
fn to_bgr_mat(frame: &VideoFrame) -> MediaResult<Mat> {
    let flat = Mat::from_slice(frame.image.as_raw())
        .map_err(|e| MediaError::detection_failed(format!("Mat from frame: {e}")))?;
    let rgb = flat
        .reshape(3, frame.height() as i32)
        .map_err(|e| MediaError::detection_failed(format!("Mat reshape: {e}")))?;

    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::detection_failed(format!("RGB2BGR failed: {e}")))?;
    Ok(bgr)
}

/// Read one row of the YuNet output:
/// `[x, y, w, h, x_re, y_re, x_le, y_le, x_n, y_n, x_m1, y_m1, x_m2, y_m2, score]`.
fn parse_row(faces: &Mat, row: i32, scale_x: f64, scale_y: f64) -> Option<FaceDetection> {
    let at = |col: i32| faces.at_2d::<f32>(row, col).ok().map(|v| *v as f64);

    let score = at(14)?;
    if score < SCORE_THRESHOLD as f64 {
        return None;
    }

    let (x, y, w, h) = (
        at(0)? * scale_x,
        at(1)? * scale_y,
        at(2)? * scale_x,
        at(3)? * scale_y,
    );
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    let point = |col: i32| Some(Point::new(at(col)? * scale_x, at(col + 1)? * scale_y));
    let (m1, m2) = (point(10)?, point(12)?);
    let (mouth_left, mouth_right) = if m1.x <= m2.x { (m1, m2) } else { (m2, m1) };

    let landmarks = FaceLandmarks {
        nose: point(8),
        mouth_left: Some(mouth_left),
        mouth_right: Some(mouth_right),
        ..Default::default()
    };

    Some(
        FaceDetection::new(x + w / 2.0, w, h)
            .with_center_y(y + h / 2.0)
            .with_landmarks(landmarks),
    )
}

impl FaceDetector for YuNetDetector {
    fn detect(&self, frame: &VideoFrame, _with_landmarks: bool) -> MediaResult<Vec<FaceDetection>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let bgr = to_bgr_mat(frame)?;
        let (input_w, input_h) = input_size(frame.width(), frame.height());

        let mut resized = Mat::default();
        imgproc::resize(
            &bgr,
            &mut resized,
            Size::new(input_w, input_h),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| MediaError::detection_failed(format!("Resize failed: {e}")))?;

        let mut detector = self
            .detector
            .lock()
            .map_err(|_| MediaError::detection_failed("YuNet detector poisoned"))?;

        if let Err(e) = detector.set_input_size(Size::new(input_w, input_h)) {
            debug!("Failed to set YuNet input size (may be OK): {}", e);
        }

        let mut faces = Mat::default();
        detector
            .detect(&resized, &mut faces)
            .map_err(|e| MediaError::detection_failed(format!("YuNet detection failed: {e}")))?;

        if faces.rows() <= 0 {
            return Ok(Vec::new());
        }
        if faces.cols() < 15 {
            warn!("YuNet output has {} columns, expected 15", faces.cols());
            return Ok(Vec::new());
        }

        let scale_x = frame.width() as f64 / input_w as f64;
        let scale_y = frame.height() as f64 / input_h as f64;

        let detections: Vec<FaceDetection> = (0..faces.rows())
            .filter_map(|row| parse_row(&faces, row, scale_x, scale_y))
            .collect();

        debug!(
            "YuNet detected {} faces at {:.2}s ({} candidates)",
            detections.len(),
            frame.time,
            faces.rows()
        );
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yunet"
    }
}
