//! # Processing Strategy Module
//!
//! Questo modulo decide come preparare un video per l'analisi remota,
//! mantenendo il consumo token del modello entro il budget.
//!
//! ## Responsabilità:
//! - Politica a scaglioni basata sulla durata (4 tier + rifiuto oltre 240 min)
//! - Stima del consumo token con un modello lineare per secondo
//! - Nessun I/O: funzione pura su (durata, dimensione)
//!
//! ## Tier di durata (limiti superiori inclusivi):
//! - ≤ 40 min: upload diretto, nessuna elaborazione
//! - ≤ 80 min: velocità 2x
//! - ≤ 120 min: velocità 2x + campionamento 0.5 fps
//! - ≤ 240 min: velocità 2x + solo audio
//! - > 240 min: rifiutato (nessuna eccezione, decisione esplicita)
//!
//! ## Modello di costo:
//! `tokens = (durata / speedup) × rate`, dove rate dipende da fps e
//! dalla presenza del flusso video. Superare `limit × 0.95` produce solo
//! un warning: il rifiuto dipende esclusivamente dalla durata.

use tracing::{debug, warn};

/// Token consumption per processed second, measured against the hosted API.
pub const TOKEN_RATE_VIDEO_FPS1: f64 = 55.0;
pub const TOKEN_RATE_VIDEO_FPS05: f64 = 27.5;
pub const TOKEN_RATE_AUDIO: f64 = 32.0;

/// Combined per-second rates
pub const RATE_FPS1: f64 = TOKEN_RATE_VIDEO_FPS1 + TOKEN_RATE_AUDIO;
pub const RATE_FPS05: f64 = TOKEN_RATE_VIDEO_FPS05 + TOKEN_RATE_AUDIO;
pub const RATE_AUDIO_ONLY: f64 = TOKEN_RATE_AUDIO;

/// Default remote token budget
pub const DEFAULT_TOKEN_LIMIT: f64 = 250_000.0;

/// Fraction of the budget considered safe to spend
pub const SAFETY_MARGIN: f64 = 0.95;

/// Longest duration (minutes) the pipeline accepts
pub const MAX_DURATION_MINUTES: f64 = 240.0;

/// How a video should be prepared before the backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingStrategy {
    /// Playback speed-up factor, >= 1.0
    pub speedup: f64,
    /// Frame sampling override forwarded to the backend (None = default 1.0)
    pub fps: Option<f64>,
    /// Strip the video stream and upload audio only
    pub audio_only: bool,
    /// Estimated token consumption of the prepared artifact
    pub estimated_tokens: f64,
    pub description: String,
}

/// Outcome of strategy selection. Rejection is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyDecision {
    Selected(ProcessingStrategy),
    /// Duration exceeds [`MAX_DURATION_MINUTES`]
    TooLong,
    /// Duration could not be read (zero or negative) — an I/O-level failure,
    /// deliberately distinct from `TooLong`
    UnknownDuration,
}

impl StrategyDecision {
    pub fn is_selected(&self) -> bool {
        matches!(self, StrategyDecision::Selected(_))
    }
}

/// Duration-tiered strategy selector with a linear token cost model
#[derive(Debug, Clone)]
pub struct StrategySelector {
    token_limit: f64,
}

impl StrategySelector {
    pub fn new(token_limit: f64) -> Self {
        Self { token_limit }
    }

    /// Effective budget after the safety margin
    pub fn effective_limit(&self) -> f64 {
        self.token_limit * SAFETY_MARGIN
    }

    /// Pick the processing strategy for a video of the given duration and
    /// size. Tiers depend on duration alone; the size feeds the logs.
    ///
    /// Tiers are checked in ascending order with inclusive upper bounds,
    /// first match wins. Never panics and never returns an error.
    pub fn select(&self, duration_secs: f64, file_size_bytes: u64) -> StrategyDecision {
        if duration_secs <= 0.0 {
            return StrategyDecision::UnknownDuration;
        }

        let minutes = duration_secs / 60.0;
        debug!(
            "Selecting strategy for {:.1} min, {:.1} MB",
            minutes,
            file_size_bytes as f64 / (1024.0 * 1024.0)
        );

        let (speedup, fps, audio_only, description) = if minutes <= 40.0 {
            (1.0, None, false, "tier 1: upload as-is")
        } else if minutes <= 80.0 {
            (2.0, None, false, "tier 2: 2x speed-up")
        } else if minutes <= 120.0 {
            (2.0, Some(0.5), false, "tier 3: 2x speed-up + 0.5 fps")
        } else if minutes <= MAX_DURATION_MINUTES {
            (2.0, None, true, "tier 4: 2x speed-up + audio only")
        } else {
            return StrategyDecision::TooLong;
        };

        let estimated_tokens = estimate_tokens(duration_secs, speedup, fps, audio_only);

        if estimated_tokens > self.effective_limit() {
            warn!(
                "Estimated token usage {:.0} exceeds safe limit {:.0}",
                estimated_tokens,
                self.effective_limit()
            );
        }

        StrategyDecision::Selected(ProcessingStrategy {
            speedup,
            fps,
            audio_only,
            estimated_tokens,
            description: description.to_string(),
        })
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIMIT)
    }
}

/// Linear token cost: processed duration times a per-second rate
fn estimate_tokens(duration_secs: f64, speedup: f64, fps: Option<f64>, audio_only: bool) -> f64 {
    let processed_duration = duration_secs / speedup;

    let rate = if audio_only {
        RATE_AUDIO_ONLY
    } else if fps == Some(0.5) {
        RATE_FPS05
    } else {
        RATE_FPS1
    };

    processed_duration * rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(minutes: f64) -> StrategyDecision {
        StrategySelector::default().select(minutes * 60.0, 1024 * 1024 * 1024)
    }

    fn unwrap(decision: StrategyDecision) -> ProcessingStrategy {
        match decision {
            StrategyDecision::Selected(s) => s,
            other => panic!("expected a strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_tier1_short_video() {
        let s = unwrap(select(30.0));
        assert_eq!(s.speedup, 1.0);
        assert_eq!(s.fps, None);
        assert!(!s.audio_only);
    }

    #[test]
    fn test_tier2_medium_video() {
        let s = unwrap(select(55.0));
        assert_eq!(s.speedup, 2.0);
        assert_eq!(s.fps, None);
        assert!(!s.audio_only);
        // (55 * 60 / 2.0) * 87 tokens/sec
        assert_eq!(s.estimated_tokens, 55.0 * 60.0 / 2.0 * RATE_FPS1);
    }

    #[test]
    fn test_tier3_reduced_fps() {
        let s = unwrap(select(100.0));
        assert_eq!(s.speedup, 2.0);
        assert_eq!(s.fps, Some(0.5));
        assert!(!s.audio_only);
    }

    #[test]
    fn test_tier4_audio_only() {
        let s = unwrap(select(200.0));
        assert_eq!(s.speedup, 2.0);
        assert_eq!(s.fps, None);
        assert!(s.audio_only);
        assert_eq!(s.estimated_tokens, 200.0 * 60.0 / 2.0 * RATE_AUDIO_ONLY);
    }

    #[test]
    fn test_boundaries_belong_to_lower_tier() {
        assert_eq!(unwrap(select(40.0)).speedup, 1.0);
        assert_eq!(unwrap(select(80.0)).fps, None);
        assert_eq!(unwrap(select(80.0)).speedup, 2.0);
        assert_eq!(unwrap(select(120.0)).fps, Some(0.5));
        assert!(unwrap(select(240.0)).audio_only);
    }

    #[test]
    fn test_just_past_boundaries_move_up() {
        assert_eq!(unwrap(select(40.0 + 0.01)).speedup, 2.0);
        assert_eq!(unwrap(select(80.0 + 0.01)).fps, Some(0.5));
        assert!(unwrap(select(120.0 + 0.01)).audio_only);
    }

    #[test]
    fn test_too_long_is_rejected_not_errored() {
        assert_eq!(select(241.0), StrategyDecision::TooLong);
        assert_eq!(select(300.0), StrategyDecision::TooLong);
    }

    #[test]
    fn test_unknown_duration_is_distinct_from_rejection() {
        assert_eq!(select(0.0), StrategyDecision::UnknownDuration);
        assert_eq!(select(-1.0), StrategyDecision::UnknownDuration);
        assert_ne!(select(0.0), StrategyDecision::TooLong);
    }

    #[test]
    fn test_every_accepted_duration_hits_exactly_one_tier() {
        // Sweep (0, 240] minutes and confirm the partition is total
        let mut minutes = 0.5;
        while minutes <= 240.0 {
            assert!(select(minutes).is_selected(), "no tier for {} min", minutes);
            minutes += 0.5;
        }
    }

    #[test]
    fn test_size_does_not_affect_tiering() {
        let selector = StrategySelector::default();
        let small = selector.select(100.0 * 60.0, 1);
        let huge = selector.select(100.0 * 60.0, 50 * 1024 * 1024 * 1024);
        assert_eq!(small, huge);
    }

    #[test]
    fn test_cost_monotonic_within_tier() {
        let a = unwrap(select(45.0)).estimated_tokens;
        let b = unwrap(select(60.0)).estimated_tokens;
        let c = unwrap(select(80.0)).estimated_tokens;
        assert!(a < b && b < c);
    }

    #[test]
    fn test_audio_only_cheaper_than_full_video() {
        let duration = 130.0 * 60.0;
        let audio = estimate_tokens(duration, 2.0, None, true);
        let video = estimate_tokens(duration, 2.0, None, false);
        assert!(audio < video);
    }

    #[test]
    fn test_over_budget_is_warned_not_rejected() {
        // 240 min at audio-only rate = 230,400 tokens; shrink the budget so
        // the estimate exceeds it and confirm the strategy is still returned
        let selector = StrategySelector::new(10_000.0);
        assert!(selector.select(240.0 * 60.0, 1024).is_selected());
    }
}
