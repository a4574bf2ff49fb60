//! Valence-driven compression policy for symbol emission
//!
//! Higher valence means higher concentration: the agent draws from a smaller
//! set of its most familiar symbols, so the population's realized vocabulary
//! shrinks. The mapping is a parameter, not a fixed law.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::core::config::CompressionParams;
use crate::core::types::Symbol;

/// Emission policy shared by every agent in a run
#[derive(Debug, Clone)]
pub struct CompressionPolicy {
    params: CompressionParams,
    alphabet_size: usize,
}

impl CompressionPolicy {
    pub fn new(params: CompressionParams, alphabet_size: usize) -> Self {
        Self {
            params,
            alphabet_size,
        }
    }

    pub fn params(&self) -> &CompressionParams {
        &self.params
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Concentration in [0, 1]; non-decreasing in valence
    pub fn concentration(&self, valence: f32) -> f32 {
        let v = valence.clamp(-1.0, 1.0);
        (self.params.concentration_mid + self.params.concentration_slope * v).clamp(0.0, 1.0)
    }

    /// Number of top-ranked symbols an agent with this valence draws from
    pub fn support(&self, valence: f32) -> usize {
        let spread = 1.0 - self.concentration(valence) as f64;
        let support = (self.alphabet_size as f64 * spread).ceil() as usize;
        support
            .max(self.params.min_support)
            .min(self.alphabet_size)
    }

    /// How many symbols to emit this tick: the baseline plus one extra with
    /// probability proportional to positive arousal
    pub fn emission_count<R: Rng>(&self, base: usize, arousal: f32, rng: &mut R) -> usize {
        let extra_chance = (arousal.max(0.0) * 0.5) as f64;
        if extra_chance > 0.0 && rng.gen_bool(extra_chance.min(1.0)) {
            base + 1
        } else {
            base
        }
    }

    /// Rank the alphabet by familiarity (descending, ties by lower id first)
    /// and keep the `support` best
    pub fn ranked_support(&self, familiarity: &[f32], support: usize) -> Vec<Symbol> {
        let mut order: Vec<usize> = (0..familiarity.len().min(self.alphabet_size)).collect();
        order.sort_by(|&a, &b| {
            familiarity[b]
                .total_cmp(&familiarity[a])
                .then_with(|| a.cmp(&b))
        });
        order.truncate(support);
        order.into_iter().map(|i| Symbol(i as u32)).collect()
    }

    /// Zipf weights `rank^-skew` for ranks 1..=len
    pub fn rank_weights(&self, len: usize) -> Vec<f64> {
        let skew = self.params.rank_skew as f64;
        (1..=len).map(|rank| (rank as f64).powf(-skew)).collect()
    }

    /// Draw `count` symbols for an agent with the given familiarity and valence
    pub fn choose<R: Rng>(
        &self,
        familiarity: &[f32],
        valence: f32,
        count: usize,
        rng: &mut R,
    ) -> Vec<Symbol> {
        if count == 0 {
            return Vec::new();
        }
        let ranked = self.ranked_support(familiarity, self.support(valence));
        let weights = self.rank_weights(ranked.len());
        let dist = WeightedIndex::new(&weights).ok();

        (0..count)
            .map(|_| {
                if rng.gen_bool(self.params.exploration as f64) || ranked.is_empty() {
                    Symbol(rng.gen_range(0..self.alphabet_size) as u32)
                } else {
                    let idx = match &dist {
                        Some(dist) => dist.sample(rng),
                        None => rng.gen_range(0..ranked.len()),
                    };
                    ranked[idx]
                }
            })
            .collect()
    }
}
