//! Raw timeline construction from sampled detections.
//!
//! Both builders are pure: they take the sample list and return a fresh,
//! contiguous segment list covering `[0, duration)`.

use crate::error::{MediaError, MediaResult};

use super::crop_planner::CropPlanner;
use super::models::{Sample, Segment};

/// Median of `values`; the mean of the two middle values for even lengths.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Continuous single-subject track.
///
/// The window starts on the first detected (largest) face and only moves when
/// the ideal crop offset drifts more than `movement_threshold * width` from the
/// current one. Fails with `NoFacesDetected` when no sample has a face.
pub fn track_single_subject(
    samples: &[Sample],
    duration: f64,
    planner: &CropPlanner,
    movement_threshold: f64,
) -> MediaResult<Vec<Segment>> {
    let mut track = samples
        .iter()
        .filter_map(|s| s.largest_face().map(|f| (s.time, f.center_x)));

    let (_, first_x) = track.next().ok_or(MediaError::NoFacesDetected)?;

    let threshold_px = movement_threshold * planner.source_width() as f64;
    let mut current = planner.crop_x(first_x);
    let mut segment_start = 0.0;
    let mut segments = Vec::new();

    for (time, center_x) in track {
        if time >= duration {
            break;
        }
        let ideal = planner.crop_x(center_x);
        if (ideal as f64 - current as f64).abs() > threshold_px && time > segment_start {
            segments.push(Segment::single(
                segment_start,
                time,
                window_center(planner, current),
            ));
            segment_start = time;
            current = ideal;
        }
    }

    segments.push(Segment::single(
        segment_start,
        duration,
        window_center(planner, current),
    ));

    Ok(segments)
}

/// Center x of the window whose left edge is `crop_x`.
fn window_center(planner: &CropPlanner, crop_x: u32) -> f64 {
    crop_x as f64 + planner.target_width() as f64 / 2.0
}

/// SINGLE/DUAL classification track.
///
/// A sample with two or more faces is DUAL. Runs of the same class become
/// one segment ending at the first sample of the next run. SINGLE positions
/// are the median of every face seen; DUAL positions the medians of each
/// sample's leftmost and rightmost faces. Fails with `NoFacesDetected` when no
/// sample has a face.
pub fn classify_speaker_count(
    samples: &[Sample],
    duration: f64,
    source_width: u32,
) -> MediaResult<Vec<Segment>> {
    if !samples.iter().any(|s| !s.faces.is_empty()) {
        return Err(MediaError::NoFacesDetected);
    }

    let width = source_width as f64;
    let mut segments = Vec::new();
    let mut run_start = 0.0;
    let mut run: Vec<&Sample> = Vec::new();

    for sample in samples.iter().filter(|s| s.time < duration) {
        if let Some(first) = run.first() {
            if first.is_dual() != sample.is_dual() && sample.time > run_start {
                segments.push(summarize_run(&run, run_start, sample.time, width));
                run_start = sample.time;
                run.clear();
            }
        }
        run.push(sample);
    }

    if run.is_empty() {
        return Err(MediaError::NoFacesDetected);
    }
    segments.push(summarize_run(&run, run_start, duration, width));

    Ok(segments)
}

fn summarize_run(run: &[&Sample], start: f64, end: f64, width: f64) -> Segment {
    let dual = run.first().is_some_and(|s| s.is_dual());

    if dual {
        // Single-face samples inside a DUAL run are ignored.
        let pairs = run.iter().filter(|s| s.is_dual());
        let lefts: Vec<f64> = pairs
            .clone()
            .filter_map(|s| s.leftmost().map(|f| f.center_x))
            .collect();
        let rights: Vec<f64> = pairs
            .filter_map(|s| s.rightmost().map(|f| f.center_x))
            .collect();

        Segment::dual(
            start,
            end,
            median(&lefts).unwrap_or(width / 4.0),
            median(&rights).unwrap_or(width * 3.0 / 4.0),
        )
    } else {
        let centers: Vec<f64> = run
            .iter()
            .flat_map(|s| s.faces.iter().map(|f| f.center_x))
            .collect();
        Segment::single(start, end, median(&centers).unwrap_or(width / 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reframe::models::FaceDetection;

    fn face(x: f64) -> FaceDetection {
        FaceDetection::new(x, 120.0, 120.0)
    }

    fn assert_partition(segments: &[Segment], duration: f64) {
        assert_eq!(segments.first().unwrap().start, 0.0);
        assert_eq!(segments.last().unwrap().end, duration);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_linear_motion_produces_multiple_segments() {
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let duration = 20.0;
        let samples: Vec<Sample> = (0..40)
            .map(|i| {
                let t = i as f64 * 0.5;
                let x = 100.0 + 800.0 * t / duration;
                Sample::new(t, vec![face(x)])
            })
            .collect();

        let segments = track_single_subject(&samples, duration, &planner, 0.10).unwrap();
        assert!(segments.len() >= 2, "got {} segments", segments.len());
        assert_partition(&segments, duration);
    }

    #[test]
    fn test_small_jitter_holds_one_segment() {
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let samples: Vec<Sample> = (0..20)
            .map(|i| Sample::new(i as f64 * 0.5, vec![face(960.0 + (i % 3) as f64 * 30.0)]))
            .collect();

        let segments = track_single_subject(&samples, 10.0, &planner, 0.10).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 10.0);
    }

    #[test]
    fn test_tracking_without_faces_fails() {
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let samples = vec![Sample::new(0.0, vec![]), Sample::new(0.5, vec![])];
        assert!(matches!(
            track_single_subject(&samples, 30.0, &planner, 0.10),
            Err(MediaError::NoFacesDetected)
        ));
    }

    #[test]
    fn test_classification_groups_runs() {
        let samples = vec![
            Sample::new(0.0, vec![face(900.0)]),
            Sample::new(0.5, vec![face(950.0)]),
            Sample::new(1.0, vec![face(400.0), face(1500.0)]),
            Sample::new(1.5, vec![face(420.0), face(1480.0)]),
            Sample::new(2.0, vec![face(410.0), face(1490.0)]),
            Sample::new(2.5, vec![face(1000.0)]),
        ];

        let segments = classify_speaker_count(&samples, 4.0, 1920).unwrap();
        assert_eq!(segments.len(), 3);
        assert_partition(&segments, 4.0);

        assert_eq!(segments[0], Segment::single(0.0, 1.0, 925.0));
        assert_eq!(segments[1], Segment::dual(1.0, 2.5, 410.0, 1490.0));
        assert_eq!(segments[2], Segment::single(2.5, 4.0, 1000.0));
    }

    #[test]
    fn test_dual_run_ignores_single_face_samples() {
        let pair = Sample::new(0.0, vec![face(10.0), face(20.0)]);
        let stray = Sample::new(0.5, vec![face(100.0)]);
        let segment = summarize_run(&[&pair, &stray], 0.0, 1.0, 1920.0);
        assert_eq!(segment, Segment::dual(0.0, 1.0, 10.0, 20.0));

        let single = summarize_run(&[&stray], 0.0, 1.0, 1920.0);
        assert_eq!(single, Segment::single(0.0, 1.0, 100.0));
    }

    #[test]
    fn test_classification_without_faces_fails() {
        let samples = vec![Sample::new(0.0, vec![])];
        assert!(matches!(
            classify_speaker_count(&samples, 5.0, 1920),
            Err(MediaError::NoFacesDetected)
        ));
    }
}
