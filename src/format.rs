//! # Timeline and Formatting Module
//!
//! Deriva la timeline dai segmenti di trascrizione e fornisce helper di
//! formattazione per le durate.
//!
//! ## Regole della timeline:
//! - `step = max(1, segmenti / punti_richiesti)`, campionando un segmento
//!   ogni step
//! - Timestamp `HH:MM:SS` quando ci sono ore, altrimenti `MM:SS`
//! - Nessun segmento ⇒ timeline vuota

use crate::transcriber::TranscriptSegment;
use serde::{Deserialize, Serialize};

/// One timeline point derived from a transcript segment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelinePoint {
    /// Display timestamp (`HH:MM:SS` or `MM:SS`)
    pub time: String,
    /// Offset from the start, whole seconds
    pub seconds: u64,
    pub text: String,
}

/// Sample the segment list down to roughly `num_points` timeline entries
pub fn create_timeline(segments: &[TranscriptSegment], num_points: usize) -> Vec<TimelinePoint> {
    if segments.is_empty() || num_points == 0 {
        return Vec::new();
    }

    let step = std::cmp::max(1, segments.len() / num_points);

    segments
        .iter()
        .step_by(step)
        .map(|seg| {
            let seconds = seg.start.max(0.0) as u64;
            TimelinePoint {
                time: format_timestamp(seconds),
                seconds,
                text: seg.text.trim().to_string(),
            }
        })
        .collect()
}

/// `HH:MM:SS` when there are hours, `MM:SS` otherwise
pub fn format_timestamp(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;

    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Human-readable `Xm Ys` duration used in prompts and logs
pub fn format_duration_jp(duration_secs: f64) -> (u64, u64) {
    let total = duration_secs.max(0.0) as u64;
    (total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end: start + 5.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_segments_empty_timeline() {
        assert!(create_timeline(&[], 10).is_empty());
    }

    #[test]
    fn test_fewer_segments_than_points_keeps_all() {
        let segments = vec![seg(0.0, "a"), seg(10.0, "b"), seg(20.0, "c")];
        let timeline = create_timeline(&segments, 10);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_sampling_step() {
        let segments: Vec<_> = (0..100).map(|i| seg(i as f64 * 10.0, "x")).collect();
        let timeline = create_timeline(&segments, 10);
        // step = 100 / 10 = 10 → every 10th segment
        assert_eq!(timeline.len(), 10);
        assert_eq!(timeline[1].seconds, 100);
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(format_timestamp(0), "00:00");
        assert_eq!(format_timestamp(75), "01:15");
        assert_eq!(format_timestamp(3600), "01:00:00");
        assert_eq!(format_timestamp(3725), "01:02:05");
    }

    #[test]
    fn test_timeline_trims_text() {
        let timeline = create_timeline(&[seg(1.5, "  こんにちは  ")], 5);
        assert_eq!(timeline[0].text, "こんにちは");
        assert_eq!(timeline[0].seconds, 1);
        assert_eq!(timeline[0].time, "00:01");
    }

    #[test]
    fn test_duration_split() {
        assert_eq!(format_duration_jp(125.0), (2, 5));
        assert_eq!(format_duration_jp(0.0), (0, 0));
    }
}
