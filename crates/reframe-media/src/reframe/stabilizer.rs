//! Minimum-dwell enforcement for segment timelines.

use super::models::Segment;

/// Merge segments shorter than `min_duration` into their neighbours.
///
/// Scanning forward, a short segment is absorbed by the last accepted one. A
/// short leading segment has no predecessor, so the next segment is pulled
/// back to its start instead. A short trailing segment joins the last
/// accepted one. Boundaries stay contiguous, so the total span is unchanged.
pub fn stabilize(segments: &[Segment], min_duration: f64) -> Vec<Segment> {
    let mut iter = segments.iter().copied();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut stable: Vec<Segment> = Vec::with_capacity(segments.len());

    for mut next in iter {
        if current.duration() < min_duration {
            match stable.last_mut() {
                Some(last) => {
                    last.end = current.end;
                    current = next;
                }
                None => {
                    next.start = current.start;
                    current = next;
                }
            }
        } else {
            stable.push(current);
            current = next;
        }
    }

    match stable.last_mut() {
        Some(last) if current.duration() < min_duration => last.end = current.end,
        _ => stable.push(current),
    }

    stable
}
