//! Independent seeded runs executed in parallel
//!
//! Each run builds its own `Simulation` from a config passed by value, so
//! runs share no mutable state. Results come back in input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::simulation::engine::Simulation;
use crate::simulation::metrics::TickMetricRecord;

/// Run every config for `ticks` ticks in parallel
pub fn run_ensemble(
    configs: Vec<SimulationConfig>,
    ticks: u64,
) -> Result<Vec<Vec<TickMetricRecord>>> {
    configs
        .into_par_iter()
        .map(|config| Simulation::new(config)?.run(ticks))
        .collect()
}

/// Mean outcome of all seeds at one valence bias
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub valence_bias: f32,
    pub mean_vocabulary_size: f64,
    pub mean_valence: f64,
    pub runs: usize,
}

/// Sweep the valence bias, averaging vocabulary size over every seed
///
/// The first `warmup` ticks of each run are discarded before averaging.
pub fn valence_sweep(
    base: &SimulationConfig,
    biases: &[f32],
    seeds: &[u64],
    ticks: u64,
    warmup: u64,
) -> Result<Vec<SweepPoint>> {
    let configs: Vec<SimulationConfig> = biases
        .iter()
        .flat_map(|&bias| {
            seeds
                .iter()
                .map(move |&seed| base.clone().with_seed(seed).with_valence_bias(bias))
        })
        .collect();

    let runs = run_ensemble(configs, ticks)?;

    let points = biases
        .iter()
        .zip(runs.chunks(seeds.len().max(1)))
        .map(|(&bias, group)| {
            let measured: Vec<&TickMetricRecord> = group
                .iter()
                .flat_map(|records| records.iter().filter(|r| r.tick >= warmup))
                .collect();
            let n = measured.len().max(1) as f64;
            let point = SweepPoint {
                valence_bias: bias,
                mean_vocabulary_size: measured
                    .iter()
                    .map(|r| r.vocabulary_size as f64)
                    .sum::<f64>()
                    / n,
                mean_valence: measured
                    .iter()
                    .map(|r| r.emotion_aggregate.valence as f64)
                    .sum::<f64>()
                    / n,
                runs: group.len(),
            };
            tracing::info!(
                bias,
                vocabulary = point.mean_vocabulary_size,
                valence = point.mean_valence,
                "sweep point"
            );
            point
        })
        .collect();

    Ok(points)
}

/// Least-squares slope of vocabulary size against valence bias
///
/// `None` with fewer than two distinct biases.
pub fn fitted_slope(points: &[SweepPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.valence_bias as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.mean_vocabulary_size).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for p in points {
        let dx = p.valence_bias as f64 - mean_x;
        sxy += dx * (p.mean_vocabulary_size - mean_y);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        None
    } else {
        Some(sxy / sxx)
    }
}
