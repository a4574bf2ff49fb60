//! Running statistics for the z-score baseline
//!
//! Welford accumulation with reverse updates so a trailing window can drop
//! its oldest sample without rescanning.

use std::collections::VecDeque;

/// Variance at or below this is treated as zero
pub const VARIANCE_EPSILON: f64 = 1e-12;

/// Online mean and population variance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    /// Undo a previous `push` of `sample`
    pub fn remove(&mut self, sample: f64) {
        match self.count {
            0 => {}
            1 => *self = Self::default(),
            _ => {
                let n = self.count as f64;
                let old_mean = (n * self.mean - sample) / (n - 1.0);
                self.m2 -= (sample - old_mean) * (sample - self.mean);
                self.mean = old_mean;
                self.count -= 1;
                if self.m2 < 0.0 {
                    self.m2 = 0.0;
                }
            }
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (M2 / n); zero when empty
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard score of `sample` against the accumulated samples
    ///
    /// `None` with fewer than two samples or (near) zero variance.
    pub fn z_score(&self, sample: f64) -> Option<f64> {
        if self.count < 2 || self.variance() <= VARIANCE_EPSILON {
            return None;
        }
        Some((sample - self.mean) / self.std_dev())
    }
}

/// Running statistics over the last `window` samples only
#[derive(Clone, Debug)]
pub struct TrailingStats {
    window: usize,
    samples: VecDeque<f64>,
    stats: RunningStats,
}

impl TrailingStats {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::with_capacity(window.max(1)),
            stats: RunningStats::new(),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.stats.remove(oldest);
            }
        }
        self.samples.push_back(sample);
        self.stats.push(sample);
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Baseline the detector scores each tick against
#[derive(Clone, Debug)]
pub enum Baseline {
    Cumulative(RunningStats),
    Trailing(TrailingStats),
}

impl Baseline {
    pub fn push(&mut self, sample: f64) {
        match self {
            Baseline::Cumulative(stats) => stats.push(sample),
            Baseline::Trailing(trailing) => trailing.push(sample),
        }
    }

    pub fn stats(&self) -> &RunningStats {
        match self {
            Baseline::Cumulative(stats) => stats,
            Baseline::Trailing(trailing) => trailing.stats(),
        }
    }
}
