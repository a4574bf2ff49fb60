//! Simulation and detector configuration with documented constants
//!
//! All tunable numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every section validates itself and
//! fails fast with a configuration error; structural parameters are never
//! silently clamped.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{EmergenceError, Result};

// ============================================================================
// Emotion dynamics
// ============================================================================

/// Parameters of the VAD update rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionParams {
    /// Fraction of the gap to the neighbor mean closed each tick (all axes)
    ///
    /// At 0.2 a lone outlier is pulled most of the way into its
    /// neighborhood within ~10 ticks.
    pub contagion: f32,

    /// Rate at which valence relaxes toward `valence_bias` each tick
    pub valence_relaxation: f32,

    /// Resting valence the population drifts toward
    ///
    /// This is the knob the compression calibration sweeps: raising it
    /// raises steady-state valence and therefore vocabulary concentration.
    pub valence_bias: f32,

    /// Rate at which arousal decays back toward zero
    pub arousal_decay: f32,

    /// Arousal gained per unit of novelty pressure (unfamiliar symbols heard)
    pub pressure_gain: f32,

    /// Dominance gained when pressure is low, lost when it is high
    pub dominance_gain: f32,

    /// Rate at which dominance decays back toward zero
    pub dominance_decay: f32,
}

impl Default for EmotionParams {
    fn default() -> Self {
        Self {
            contagion: 0.2,
            valence_relaxation: 0.1,
            valence_bias: 0.0,
            arousal_decay: 0.1,
            pressure_gain: 0.05,
            dominance_gain: 0.05,
            dominance_decay: 0.1,
        }
    }
}

impl EmotionParams {
    pub fn validate(&self) -> Result<()> {
        check_unit("emotion.contagion", self.contagion)?;
        check_unit("emotion.valence_relaxation", self.valence_relaxation)?;
        check_unit("emotion.arousal_decay", self.arousal_decay)?;
        check_unit("emotion.dominance_decay", self.dominance_decay)?;
        if !(-1.0..=1.0).contains(&self.valence_bias) {
            return Err(EmergenceError::config(
                "emotion.valence_bias",
                self.valence_bias,
                "must lie in [-1.0, 1.0]",
            ));
        }
        check_finite("emotion.pressure_gain", self.pressure_gain as f64)?;
        check_finite("emotion.dominance_gain", self.dominance_gain as f64)?;
        Ok(())
    }
}

// ============================================================================
// Compression policy
// ============================================================================

/// Mapping from valence to vocabulary concentration
///
/// Concentration is `clamp(concentration_mid + concentration_slope * valence, 0, 1)`
/// and an agent draws from its `ceil(alphabet * (1 - concentration))` most
/// familiar symbols. With the defaults and a 128-symbol alphabet the support
/// shrinks by roughly 34 symbols per +1.0 valence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionParams {
    /// Concentration at neutral valence
    pub concentration_mid: f32,

    /// Change in concentration per +1.0 valence (must be >= 0 so the
    /// mapping is monotonic)
    pub concentration_slope: f32,

    /// Smallest support an agent ever draws from
    pub min_support: usize,

    /// Zipf exponent over the ranked support (0 = uniform)
    pub rank_skew: f32,

    /// Probability that a single emission ignores familiarity and picks a
    /// uniformly random alphabet symbol
    pub exploration: f32,

    /// Familiarity gained from hearing a neighbor use a symbol
    /// (own use always adds 1.0)
    pub adoption: f32,

    /// Initial familiarity of symbol 0; later symbols get a linearly
    /// decreasing share so every agent starts with the same ranking
    pub prior_strength: f32,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            concentration_mid: 0.5,
            concentration_slope: 0.265,
            min_support: 4,
            rank_skew: 0.5,
            exploration: 0.002,
            adoption: 0.5,
            prior_strength: 8.0,
        }
    }
}

impl CompressionParams {
    pub fn validate(&self) -> Result<()> {
        check_unit("compression.concentration_mid", self.concentration_mid)?;
        if !(self.concentration_slope >= 0.0) || !self.concentration_slope.is_finite() {
            return Err(EmergenceError::config(
                "compression.concentration_slope",
                self.concentration_slope,
                "must be finite and non-negative",
            ));
        }
        if self.min_support == 0 {
            return Err(EmergenceError::config(
                "compression.min_support",
                self.min_support,
                "must be positive",
            ));
        }
        if !(self.rank_skew >= 0.0) || !self.rank_skew.is_finite() {
            return Err(EmergenceError::config(
                "compression.rank_skew",
                self.rank_skew,
                "must be finite and non-negative",
            ));
        }
        check_unit("compression.exploration", self.exploration)?;
        if !(self.adoption >= 0.0) || !(self.prior_strength >= 0.0) {
            return Err(EmergenceError::config(
                "compression.adoption",
                format!("{} / prior {}", self.adoption, self.prior_strength),
                "adoption and prior_strength must be non-negative",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Configuration for one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the run's ChaCha RNG; identical seeds give identical streams
    pub seed: u64,

    /// Number of agents (fixed for the run)
    pub population: usize,

    /// Agents observe this many neighbors on each side of a ring
    pub neighbor_radius: usize,

    /// Number of distinct symbols that can ever be emitted
    pub alphabet_size: usize,

    /// Rolling vocabulary window W in ticks
    pub vocabulary_window: u64,

    /// Baseline emissions per agent per tick (arousal can add one more)
    pub emissions_per_tick: usize,

    /// Half-width of the uniform jitter around `valence_bias` at spawn
    pub initial_spread: f32,

    /// VAD distance under which two agents join the same cluster
    pub cluster_radius: f32,

    pub emotion: EmotionParams,
    pub compression: CompressionParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population: 24,
            neighbor_radius: 2,
            alphabet_size: 128,
            vocabulary_window: 20,
            emissions_per_tick: 2,
            initial_spread: 0.3,
            cluster_radius: 0.25,
            emotion: EmotionParams::default(),
            compression: CompressionParams::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_valence_bias(mut self, bias: f32) -> Self {
        self.emotion.valence_bias = bias;
        self
    }

    /// Validate structural parameters; the first violation is returned
    pub fn validate(&self) -> Result<()> {
        if self.population == 0 {
            return Err(EmergenceError::config(
                "population",
                self.population,
                "must be positive",
            ));
        }
        if self.alphabet_size == 0 || self.alphabet_size > u32::MAX as usize {
            return Err(EmergenceError::config(
                "alphabet_size",
                self.alphabet_size,
                "must be positive and fit in a u32",
            ));
        }
        if self.vocabulary_window == 0 {
            return Err(EmergenceError::config(
                "vocabulary_window",
                self.vocabulary_window,
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.initial_spread) {
            return Err(EmergenceError::config(
                "initial_spread",
                self.initial_spread,
                "must lie in [0.0, 1.0]",
            ));
        }
        if !(self.cluster_radius > 0.0) || !self.cluster_radius.is_finite() {
            return Err(EmergenceError::config(
                "cluster_radius",
                self.cluster_radius,
                "must be finite and positive",
            ));
        }
        self.emotion.validate()?;
        self.compression.validate()?;
        Ok(())
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Which history the running z-score is computed against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ZScoreBaseline {
    /// Every tick seen before the current one
    Cumulative,
    /// Only the last `window` ticks before the current one
    Trailing { window: usize },
}

/// Episode threshold policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EpisodeThreshold {
    /// Use this exact score threshold
    Fixed { value: f64 },
    /// Nearest-rank percentile (0, 100] of the complete score series
    Auto { percentile: f64 },
}

impl Default for EpisodeThreshold {
    fn default() -> Self {
        EpisodeThreshold::Auto { percentile: 90.0 }
    }
}

/// Configuration for the anomaly / meta-event detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// |z| at or above which a tick is anomalous
    pub z_threshold: f64,

    /// |score[t] - score[t-1]| at or above which a tick is anomalous
    pub jump_threshold: f64,

    /// A tick spikes when depth > ratio * max(previous depths)
    pub recursion_spike_ratio: f64,

    pub baseline: ZScoreBaseline,
    pub episode_threshold: EpisodeThreshold,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            z_threshold: 2.5,
            jump_threshold: 0.15,
            recursion_spike_ratio: 1.25,
            baseline: ZScoreBaseline::Cumulative,
            episode_threshold: EpisodeThreshold::default(),
        }
    }
}

impl DetectorConfig {
    pub fn with_episode_threshold(mut self, value: f64) -> Self {
        self.episode_threshold = EpisodeThreshold::Fixed { value };
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("z_threshold", self.z_threshold)?;
        check_positive("jump_threshold", self.jump_threshold)?;
        check_positive("recursion_spike_ratio", self.recursion_spike_ratio)?;
        if let ZScoreBaseline::Trailing { window } = self.baseline {
            if window == 0 {
                return Err(EmergenceError::config(
                    "baseline.window",
                    window,
                    "must be positive",
                ));
            }
        }
        match self.episode_threshold {
            EpisodeThreshold::Fixed { value } => check_finite("episode_threshold.value", value)?,
            EpisodeThreshold::Auto { percentile } => {
                if !(percentile > 0.0 && percentile <= 100.0) {
                    return Err(EmergenceError::config(
                        "episode_threshold.percentile",
                        percentile,
                        "must lie in (0, 100]",
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Settings for the command-line runner around the two engines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Ticks to simulate
    pub ticks: u64,

    /// Records kept in memory; the full stream still goes to disk
    pub history_limit: usize,

    /// Ticks between population snapshots (0 disables snapshots)
    pub snapshot_interval: u64,

    /// Scores at or above this are logged as alerts
    pub alert_threshold: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ticks: 1000,
            history_limit: 5000,
            snapshot_interval: 250,
            alert_threshold: 0.80,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(EmergenceError::config(
                "runner.history_limit",
                self.history_limit,
                "must be positive",
            ));
        }
        check_finite("runner.alert_threshold", self.alert_threshold)?;
        Ok(())
    }
}

// ============================================================================
// Top-level config file
// ============================================================================

/// Complete configuration as loaded from a TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergenceConfig {
    pub simulation: SimulationConfig,
    pub detector: DetectorConfig,
    pub runner: RunnerConfig,
}

impl EmergenceConfig {
    /// Parse and validate a TOML document; missing keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EmergenceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.detector.validate()?;
        self.runner.validate()?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_unit(parameter: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EmergenceError::config(parameter, value, "must lie in [0.0, 1.0]"))
    }
}

fn check_positive(parameter: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(EmergenceError::config(parameter, value, "must be finite and positive"))
    }
}

fn check_finite(parameter: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EmergenceError::config(parameter, value, "must be finite"))
    }
}
