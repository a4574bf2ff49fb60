//! Episode segmentation and the auto-threshold policy

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::types::Tick;

/// Maximal contiguous run of ticks with score at or above the threshold
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub peak_tick: Tick,
    pub peak_score: f64,
}

impl Episode {
    fn open(tick: Tick, score: f64) -> Self {
        Self {
            start_tick: tick,
            end_tick: tick,
            peak_tick: tick,
            peak_score: score,
        }
    }
}

/// Incremental episode segmentation over a tick-ordered score series
///
/// An episode stays open while scores stay at or above the threshold and is
/// closed at the last qualifying tick. The peak is the earliest maximum.
#[derive(Clone, Debug)]
pub struct EpisodeTracker {
    threshold: f64,
    open: Option<Episode>,
    closed: Vec<Episode>,
}

impl EpisodeTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            open: None,
            closed: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one tick; returns true when this tick starts a new episode
    pub fn push(&mut self, tick: Tick, score: f64) -> bool {
        if score >= self.threshold {
            match self.open.as_mut() {
                Some(episode) => {
                    episode.end_tick = tick;
                    if score > episode.peak_score {
                        episode.peak_score = score;
                        episode.peak_tick = tick;
                    }
                    false
                }
                None => {
                    self.open = Some(Episode::open(tick, score));
                    true
                }
            }
        } else {
            if let Some(episode) = self.open.take() {
                self.closed.push(episode);
            }
            false
        }
    }

    /// Close any open episode and return all episodes in tick order
    pub fn finish(mut self) -> Vec<Episode> {
        if let Some(episode) = self.open.take() {
            self.closed.push(episode);
        }
        self.closed
    }
}

/// Nearest-rank percentile of a score series
///
/// `percentile` in (0, 100]; `None` for an empty series. NaN scores are
/// ignored.
pub fn auto_threshold(scores: &[f64], percentile: f64) -> Option<f64> {
    let mut sorted: Vec<OrderedFloat<f64>> = scores
        .iter()
        .filter(|s| !s.is_nan())
        .map(|&s| OrderedFloat(s))
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort();
    let n = sorted.len();
    let rank = ((percentile / 100.0) * n as f64).ceil() as usize;
    let rank = rank.clamp(1, n);
    Some(sorted[rank - 1].into_inner())
}
