//! Tick metric records and the pluggable emergence metrics that fill them
//!
//! `TickMetricRecord` is the only thing the detector ever sees from the
//! simulation. How score, recursion depth and cluster count are derived is a
//! strategy (`EmergenceMetrics`) so alternatives can be swapped in without
//! touching either engine.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::{Tick, Vad};
use crate::entity::agent::Agent;

// ============================================================================
// Record schema
// ============================================================================

/// Population mean VAD, flattened into the record as `emotion_*` keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionAggregate {
    #[serde(rename = "emotion_valence")]
    pub valence: f32,
    #[serde(rename = "emotion_arousal")]
    pub arousal: f32,
    #[serde(rename = "emotion_dominance")]
    pub dominance: f32,
}

impl EmotionAggregate {
    pub fn as_vad(&self) -> Vad {
        Vad {
            valence: self.valence,
            arousal: self.arousal,
            dominance: self.dominance,
        }
    }
}

impl From<Vad> for EmotionAggregate {
    fn from(vad: Vad) -> Self {
        Self {
            valence: vad.valence,
            arousal: vad.arousal,
            dominance: vad.dominance,
        }
    }
}

/// One record per simulated tick; ticks strictly increase within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMetricRecord {
    pub tick: Tick,
    pub score: f64,
    pub recursion_depth: u32,
    pub cluster_count: u32,
    pub vocabulary_size: u32,
    #[serde(flatten)]
    pub emotion_aggregate: EmotionAggregate,
}

impl TickMetricRecord {
    /// Record carrying only the detector-relevant fields; handy for replay
    /// and tests
    pub fn new(tick: Tick, score: f64, recursion_depth: u32, cluster_count: u32) -> Self {
        Self {
            tick,
            score,
            recursion_depth,
            cluster_count,
            vocabulary_size: 0,
            emotion_aggregate: EmotionAggregate::default(),
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// Read-only view of the population after the consolidation phase
#[derive(Clone, Copy)]
pub struct PopulationView<'a> {
    pub tick: Tick,
    pub agents: &'a [Agent],
    /// Population-level rolling unique-symbol count for this tick
    pub vocabulary_size: usize,
}

/// Derives the population-level statistics of a tick record
///
/// Contract: every method is a pure, deterministic function of the view and
/// total over any non-empty population. Implementations must not hold
/// interior mutability that changes results between calls.
pub trait EmergenceMetrics: Send + Sync + fmt::Debug {
    fn score(&self, view: &PopulationView<'_>) -> f64;
    fn recursion_depth(&self, view: &PopulationView<'_>) -> u32;
    fn cluster_count(&self, view: &PopulationView<'_>) -> u32;
}

/// Reference metrics used by default
///
/// - score: coherence of this tick's emissions scaled by mean arousal,
///   `coherence * (1 + mean_arousal)` where coherence is
///   `1 - (distinct - 1) / total` (0 when nothing was emitted)
/// - recursion depth: longest current echo chain (consecutive ticks an
///   agent repeated its own previous primary symbol)
/// - cluster count: greedy leader clustering of agents in VAD space,
///   visiting agents in id order, joining the first leader within `radius`
#[derive(Debug, Clone)]
pub struct ReferenceMetrics {
    pub cluster_radius: f32,
}

impl ReferenceMetrics {
    pub fn new(cluster_radius: f32) -> Self {
        Self { cluster_radius }
    }
}

impl EmergenceMetrics for ReferenceMetrics {
    fn score(&self, view: &PopulationView<'_>) -> f64 {
        let mut distinct = AHashSet::new();
        let mut total = 0usize;
        for agent in view.agents {
            for symbol in agent.last_emitted() {
                distinct.insert(*symbol);
                total += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        let coherence = 1.0 - (distinct.len() as f64 - 1.0) / total as f64;
        let mean_arousal = view
            .agents
            .iter()
            .map(|a| a.vad().arousal as f64)
            .sum::<f64>()
            / view.agents.len() as f64;
        coherence * (1.0 + mean_arousal)
    }

    fn recursion_depth(&self, view: &PopulationView<'_>) -> u32 {
        view.agents
            .iter()
            .map(|a| a.echo_chain())
            .max()
            .unwrap_or(0)
    }

    fn cluster_count(&self, view: &PopulationView<'_>) -> u32 {
        let mut leaders: Vec<Vad> = Vec::new();
        for agent in view.agents {
            let vad = agent.vad();
            if !leaders
                .iter()
                .any(|leader| leader.distance(&vad) <= self.cluster_radius)
            {
                leaders.push(vad);
            }
        }
        leaders.len() as u32
    }
}
