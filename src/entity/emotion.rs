//! VAD emotion model
//!
//! The update rule is a pure function: it takes the current state and a
//! stimulus built from neighbor observations and returns the next state.
//! Out-of-range inputs are clamped, never rejected.

use serde::{Deserialize, Serialize};

use crate::core::config::EmotionParams;
use crate::core::types::Vad;

/// What an agent perceived this tick, reduced to the signals the update uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Mean pre-update VAD of the observed neighbors
    pub neighbor_mean: Vad,
    /// Novelty pressure in [0, 1]: share of heard symbols that are unfamiliar
    pub pressure: f32,
}

impl Stimulus {
    pub fn new(neighbor_mean: Vad, pressure: f32) -> Self {
        Self {
            neighbor_mean,
            pressure,
        }
    }
}

/// Compute the next VAD state
///
/// - valence: contagion toward neighbors plus relaxation toward the bias
/// - arousal: contagion, decay toward zero, pushed up by novelty pressure
/// - dominance: contagion, decay, rises in familiar surroundings and falls
///   under pressure
pub fn update(current: Vad, stimulus: &Stimulus, params: &EmotionParams) -> Vad {
    let current = current.clamped();
    let neighbors = stimulus.neighbor_mean.clamped();
    let pressure = if stimulus.pressure.is_nan() {
        0.0
    } else {
        stimulus.pressure.clamp(0.0, 1.0)
    };

    let pull = (neighbors - current) * params.contagion;

    let valence = current.valence
        + pull.valence
        + params.valence_relaxation * (params.valence_bias - current.valence);
    let arousal = current.arousal + pull.arousal - params.arousal_decay * current.arousal
        + params.pressure_gain * pressure;
    let dominance = current.dominance + pull.dominance - params.dominance_decay * current.dominance
        + params.dominance_gain * (0.5 - pressure);

    Vad::new(valence, arousal, dominance)
}
