//! Active-speaker selection from mouth activity inside speech intervals.
//!
//! Two speaker positions are located once per clip from a coarse global scan.
//! Each speech interval is then sampled a few times with landmarks, mouth
//! aspect ratios are averaged per side, and the louder-looking side wins. Weak
//! or tied evidence always resolves to the midpoint between both speakers.

use reframe_models::SpeechInterval;
use tracing::debug;

use crate::error::MediaResult;

use super::classifier::median;
use super::config::ReframeConfig;
use super::crop_planner::CropPlanner;
use super::models::{Sample, Segment, SegmentKind, SpeakerChoice};
use super::sampler::FrameSampler;

/// Resting positions of the two speakers, from the global scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeakerPositions {
    pub left_x: f64,
    pub right_x: f64,
}

impl SpeakerPositions {
    /// Crop center used when no side is clearly speaking.
    pub fn center_x(&self) -> f64 {
        (self.left_x + self.right_x) / 2.0
    }
}

/// Aggregated mouth activity for one side within one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideScore {
    /// Mean mouth aspect ratio over every face seen on this side
    pub activity: f64,
    /// Mean landmark-derived face center, if any face was seen
    pub center_x: Option<f64>,
}

/// Per-interval decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeakerDecision {
    pub start: f64,
    pub end: f64,
    pub choice: SpeakerChoice,
    pub center_x: f64,
}

/// Scores speech intervals and turns the decisions into a camera timeline.
pub struct ActiveSpeakerScorer<'a> {
    sampler: &'a FrameSampler,
    config: &'a ReframeConfig,
}

impl<'a> ActiveSpeakerScorer<'a> {
    pub fn new(sampler: &'a FrameSampler, config: &'a ReframeConfig) -> Self {
        Self { sampler, config }
    }

    /// Locate both speakers from evenly spaced frames between 10% and 90% of
    /// the clip. Returns `None` unless both halves of the frame hold a face.
    pub async fn locate_speakers(
        &self,
        duration: f64,
        source_width: u32,
    ) -> MediaResult<Option<SpeakerPositions>> {
        let times = global_scan_times(duration, self.config.global_scan_points);
        let samples = self.sampler.sample_at(&times, false).await?;
        Ok(positions_from_samples(&samples, source_width as f64 / 2.0))
    }

    /// Decide who speaks in each interval.
    pub async fn score_intervals(
        &self,
        intervals: &[SpeechInterval],
        duration: f64,
        source_width: u32,
        positions: SpeakerPositions,
    ) -> MediaResult<Vec<SpeakerDecision>> {
        let midpoint = source_width as f64 / 2.0;
        let mut decisions = Vec::with_capacity(intervals.len());

        for interval in normalized_intervals(intervals, duration) {
            let times = interval_sample_times(
                &interval,
                self.config.speech_samples_per_second,
                self.config.max_speech_samples,
            );
            let samples = self.sampler.sample_at(&times, true).await?;
            let (left, right) = score_sides(&samples, midpoint);
            let (choice, center_x) = decide(
                left,
                right,
                positions,
                self.config.mouth_activity_floor,
                self.config.score_tie_epsilon,
            );

            debug!(
                "Speech {:.2}-{:.2}s: left={:.4} right={:.4} -> {:?}",
                interval.start, interval.end, left.activity, right.activity, choice
            );

            decisions.push(SpeakerDecision {
                start: interval.start,
                end: interval.end,
                choice,
                center_x,
            });
        }

        Ok(decisions)
    }

    /// Full active-speaker timeline, or `None` when the clip cannot support it.
    pub async fn timeline(
        &self,
        intervals: &[SpeechInterval],
        duration: f64,
        planner: &CropPlanner,
    ) -> MediaResult<Option<Vec<Segment>>> {
        if normalized_intervals(intervals, duration).is_empty() {
            return Ok(None);
        }

        let Some(positions) = self
            .locate_speakers(duration, planner.source_width())
            .await?
        else {
            return Ok(None);
        };

        let decisions = self
            .score_intervals(intervals, duration, planner.source_width(), positions)
            .await?;

        Ok(Some(merge_decisions(
            &decisions,
            duration,
            planner,
            self.config.stabilization_tolerance,
        )))
    }
}

/// `points` timestamps evenly spread over 10%..90% of the clip.
pub fn global_scan_times(duration: f64, points: usize) -> Vec<f64> {
    if !(duration > 0.0) || points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![duration * 0.5];
    }
    (0..points)
        .map(|i| duration * (0.1 + 0.8 * i as f64 / (points - 1) as f64))
        .collect()
}

/// Median face position on each side of `midpoint`.
pub fn positions_from_samples(samples: &[Sample], midpoint: f64) -> Option<SpeakerPositions> {
    let (left, right): (Vec<f64>, Vec<f64>) = samples
        .iter()
        .flat_map(|s| s.faces.iter().map(|f| f.center_x))
        .partition(|x| *x < midpoint);

    Some(SpeakerPositions {
        left_x: median(&left)?,
        right_x: median(&right)?,
    })
}

/// Sorted, clipped to `[0, duration]`, empty intervals dropped.
/// Clip to `[0, duration)`, sort, and coalesce overlapping intervals so every
/// decision owns a distinct start time.
fn normalized_intervals(intervals: &[SpeechInterval], duration: f64) -> Vec<SpeechInterval> {
    let mut clipped: Vec<SpeechInterval> = intervals
        .iter()
        .map(|i| SpeechInterval::new(i.start.max(0.0), i.end.min(duration)))
        .filter(|i| i.duration() > 0.0)
        .collect();
    clipped.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<SpeechInterval> = Vec::with_capacity(clipped.len());
    for interval in clipped {
        match merged.last_mut() {
            Some(last) if interval.start < last.end => last.end = last.end.max(interval.end),
            _ => merged.push(interval),
        }
    }
    merged
}

/// Interior sample times: `min(max, dur * rate)` frames, at least one, never
/// on the interval boundaries.
pub fn interval_sample_times(interval: &SpeechInterval, per_second: f64, max: usize) -> Vec<f64> {
    let duration = interval.duration();
    let count = ((duration * per_second) as usize).min(max).max(1);
    (0..count)
        .map(|i| interval.start + duration * (i + 1) as f64 / (count + 1) as f64)
        .collect()
}

/// Average mouth activity per side, classifying faces by nose position.
pub fn score_sides(samples: &[Sample], midpoint: f64) -> (SideScore, SideScore) {
    let mut left = (Vec::new(), Vec::new());
    let mut right = (Vec::new(), Vec::new());

    for face in samples.iter().flat_map(|s| s.faces.iter()) {
        let side = if face.anchor_x() < midpoint {
            &mut left
        } else {
            &mut right
        };
        side.0.push(face.mouth_aspect_ratio());
        side.1.push(face.landmark_center_x());
    }

    (summarize_side(&left.0, &left.1), summarize_side(&right.0, &right.1))
}

fn summarize_side(scores: &[f64], centers: &[f64]) -> SideScore {
    let mean = |values: &[f64]| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };
    SideScore {
        activity: mean(scores).unwrap_or(0.0),
        center_x: mean(centers),
    }
}

/// Pick a side. A side must beat the other by more than `tie_epsilon` and
/// exceed `floor`; anything else is `Center`.
pub fn decide(
    left: SideScore,
    right: SideScore,
    positions: SpeakerPositions,
    floor: f64,
    tie_epsilon: f64,
) -> (SpeakerChoice, f64) {
    if left.activity - right.activity > tie_epsilon && left.activity > floor {
        (
            SpeakerChoice::Left,
            left.center_x.unwrap_or(positions.left_x),
        )
    } else if right.activity - left.activity > tie_epsilon && right.activity > floor {
        (
            SpeakerChoice::Right,
            right.center_x.unwrap_or(positions.right_x),
        )
    } else {
        (SpeakerChoice::Center, positions.center_x())
    }
}

/// Merge decisions into a contiguous single-window timeline over `[0, duration)`.
///
/// Adjacent decisions whose crop offsets differ by less than `tolerance *
/// source_width` collapse into one segment. Each segment holds its position
/// through the silence that follows it.
pub fn merge_decisions(
    decisions: &[SpeakerDecision],
    duration: f64,
    planner: &CropPlanner,
    tolerance: f64,
) -> Vec<Segment> {
    let tolerance_px = tolerance * planner.source_width() as f64;
    let mut segments: Vec<Segment> = Vec::new();

    for decision in decisions {
        if let Some(last) = segments.last_mut() {
            if let SegmentKind::Single { center_x } = last.kind {
                let delta =
                    planner.crop_x(decision.center_x) as f64 - planner.crop_x(center_x) as f64;
                if delta.abs() < tolerance_px {
                    continue;
                }
            }
            last.end = decision.start;
        }
        segments.push(Segment::single(decision.start, duration, decision.center_x));
    }

    if let Some(first) = segments.first_mut() {
        first.start = 0.0;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reframe::detector::{FaceDetector, FrameSource, VideoFrame};
    use crate::reframe::models::{FaceDetection, FaceLandmarks, Point};
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::Arc;

    fn talking_face(x: f64, open: f64) -> FaceDetection {
        FaceDetection::new(x, 200.0, 200.0).with_landmarks(FaceLandmarks {
            nose: Some(Point::new(x, 400.0)),
            mouth_left: Some(Point::new(x - 40.0, 500.0)),
            mouth_right: Some(Point::new(x + 40.0, 500.0)),
            upper_lip: Some(Point::new(x, 500.0)),
            lower_lip: Some(Point::new(x, 500.0 + open)),
            mesh: Vec::new(),
        })
    }

    fn positions() -> SpeakerPositions {
        SpeakerPositions {
            left_x: 480.0,
            right_x: 1440.0,
        }
    }

    #[test]
    fn test_global_scan_times() {
        let times = global_scan_times(100.0, 9);
        assert_eq!(times.len(), 9);
        assert!((times[0] - 10.0).abs() < 1e-9);
        assert!((times[4] - 50.0).abs() < 1e-9);
        assert!((times[8] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_intervals_are_coalesced() {
        let merged = normalized_intervals(
            &[
                SpeechInterval::new(2.0, 4.0),
                SpeechInterval::new(2.0, 6.0),
                SpeechInterval::new(5.5, 7.0),
                SpeechInterval::new(8.0, 12.0),
            ],
            10.0,
        );
        assert_eq!(
            merged,
            vec![SpeechInterval::new(2.0, 7.0), SpeechInterval::new(8.0, 10.0)]
        );
    }

    #[test]
    fn test_interval_sample_times() {
        let long = interval_sample_times(&SpeechInterval::new(10.0, 20.0), 2.0, 5);
        assert_eq!(long.len(), 5);
        assert!(long.iter().all(|t| *t > 10.0 && *t < 20.0));

        let short = interval_sample_times(&SpeechInterval::new(3.0, 3.2), 2.0, 5);
        assert_eq!(short.len(), 1);
        assert!((short[0] - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_positions_need_both_sides() {
        let both = vec![
            Sample::new(1.0, vec![FaceDetection::new(400.0, 1.0, 1.0)]),
            Sample::new(2.0, vec![FaceDetection::new(1500.0, 1.0, 1.0)]),
        ];
        assert_eq!(
            positions_from_samples(&both, 960.0),
            Some(SpeakerPositions {
                left_x: 400.0,
                right_x: 1500.0
            })
        );

        let one_side = vec![Sample::new(1.0, vec![FaceDetection::new(400.0, 1.0, 1.0)])];
        assert_eq!(positions_from_samples(&one_side, 960.0), None);
    }

    #[test]
    fn test_tied_scores_choose_center() {
        let samples = vec![
            Sample::new(1.0, vec![talking_face(500.0, 20.0), talking_face(1400.0, 20.0)]),
            Sample::new(1.5, vec![talking_face(510.0, 10.0), talking_face(1410.0, 10.0)]),
        ];
        let (left, right) = score_sides(&samples, 960.0);
        assert_eq!(left.activity, right.activity);

        let (choice, x) = decide(left, right, positions(), 0.03, 1e-3);
        assert_eq!(choice, SpeakerChoice::Center);
        assert_eq!(x, 960.0);
    }

    #[test]
    fn test_louder_side_wins_with_its_observed_center() {
        let samples = vec![Sample::new(
            1.0,
            vec![talking_face(520.0, 2.0), talking_face(1400.0, 30.0)],
        )];
        let (left, right) = score_sides(&samples, 960.0);
        let (choice, x) = decide(left, right, positions(), 0.03, 1e-3);
        assert_eq!(choice, SpeakerChoice::Right);
        assert_eq!(x, 1400.0);
    }

    #[test]
    fn test_below_floor_is_center() {
        // 2px over an 80px mouth is 0.025, under the 0.03 floor
        let samples = vec![Sample::new(1.0, vec![talking_face(520.0, 2.0)])];
        let (left, right) = score_sides(&samples, 960.0);
        let (choice, _) = decide(left, right, positions(), 0.03, 1e-3);
        assert_eq!(choice, SpeakerChoice::Center);
    }

    #[test]
    fn test_merge_fills_gaps_and_collapses_close_positions() {
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let decision = |start, end, choice, center_x| SpeakerDecision {
            start,
            end,
            choice,
            center_x,
        };
        let decisions = vec![
            decision(2.0, 4.0, SpeakerChoice::Left, 480.0),
            decision(5.0, 7.0, SpeakerChoice::Left, 500.0),
            decision(9.0, 12.0, SpeakerChoice::Right, 1440.0),
        ];

        let segments = merge_decisions(&decisions, 20.0, &planner, 0.05);
        assert_eq!(
            segments,
            vec![
                Segment::single(0.0, 9.0, 480.0),
                Segment::single(9.0, 20.0, 1440.0),
            ]
        );
    }

    /// Left speaker talks before 10s, right speaker after.
    struct TwoSpeakers;

    impl FaceDetector for TwoSpeakers {
        fn detect(&self, frame: &VideoFrame, _lm: bool) -> MediaResult<Vec<FaceDetection>> {
            let (l, r) = if frame.time < 10.0 { (30.0, 0.0) } else { (0.0, 30.0) };
            Ok(vec![talking_face(480.0, l), talking_face(1440.0, r)])
        }

        fn name(&self) -> &'static str {
            "two-speakers"
        }
    }

    struct BlankSource;

    #[async_trait]
    impl FrameSource for BlankSource {
        async fn frame_at(&self, time: f64) -> MediaResult<Option<VideoFrame>> {
            Ok(Some(VideoFrame {
                time,
                image: RgbImage::new(2, 2),
            }))
        }
    }

    #[tokio::test]
    async fn test_timeline_switches_between_speakers() {
        let sampler = FrameSampler::new(Arc::new(BlankSource), Arc::new(TwoSpeakers));
        let config = ReframeConfig::default();
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let scorer = ActiveSpeakerScorer::new(&sampler, &config);

        let intervals = vec![SpeechInterval::new(1.0, 6.0), SpeechInterval::new(12.0, 18.0)];
        let segments = scorer
            .timeline(&intervals, 20.0, &planner)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            segments,
            vec![
                Segment::single(0.0, 12.0, 480.0),
                Segment::single(12.0, 20.0, 1440.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_timeline_without_intervals_is_none() {
        let sampler = FrameSampler::new(Arc::new(BlankSource), Arc::new(TwoSpeakers));
        let config = ReframeConfig::default();
        let planner = CropPlanner::new(1920, 1080).unwrap();
        let scorer = ActiveSpeakerScorer::new(&sampler, &config);

        assert!(scorer.timeline(&[], 20.0, &planner).await.unwrap().is_none());
    }
}
