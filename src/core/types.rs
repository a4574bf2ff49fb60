//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation tick counter (simulation time unit)
pub type Tick = u64;

/// Stable identifier for agents, assigned at spawn and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Opaque symbolic token. Only equality and identity carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub u32);

impl Symbol {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Valence-Arousal-Dominance affective state, each axis in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vad {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
}

impl Vad {
    /// Create a state, clamping each axis into range
    pub fn new(valence: f32, arousal: f32, dominance: f32) -> Self {
        Self {
            valence,
            arousal,
            dominance,
        }
        .clamped()
    }

    pub fn neutral() -> Self {
        Self::default()
    }

    /// Clamp every axis into [-1.0, 1.0]. NaN collapses to neutral.
    pub fn clamped(self) -> Self {
        fn clamp_axis(x: f32) -> f32 {
            if x.is_nan() {
                0.0
            } else {
                x.clamp(-1.0, 1.0)
            }
        }
        Self {
            valence: clamp_axis(self.valence),
            arousal: clamp_axis(self.arousal),
            dominance: clamp_axis(self.dominance),
        }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dv = self.valence - other.valence;
        let da = self.arousal - other.arousal;
        let dd = self.dominance - other.dominance;
        (dv * dv + da * da + dd * dd).sqrt()
    }

    /// Arithmetic mean of a set of states; `None` for an empty set
    pub fn mean(states: impl IntoIterator<Item = Vad>) -> Option<Vad> {
        let mut sum = Vad::default();
        let mut count = 0usize;
        for s in states {
            sum = sum + s;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(sum * (1.0 / count as f32))
        }
    }

    pub fn is_in_range(&self) -> bool {
        [self.valence, self.arousal, self.dominance]
            .iter()
            .all(|x| (-1.0..=1.0).contains(x))
    }
}

impl std::ops::Add for Vad {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            valence: self.valence + rhs.valence,
            arousal: self.arousal + rhs.arousal,
            dominance: self.dominance + rhs.dominance,
        }
    }
}

impl std::ops::Sub for Vad {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            valence: self.valence - rhs.valence,
            arousal: self.arousal - rhs.arousal,
            dominance: self.dominance - rhs.dominance,
        }
    }
}

impl std::ops::Mul<f32> for Vad {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self {
            valence: self.valence * rhs,
            arousal: self.arousal * rhs,
            dominance: self.dominance * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vad_new_clamps() {
        let v = Vad::new(1.5, -3.0, 0.25);
        assert_eq!(v.valence, 1.0);
        assert_eq!(v.arousal, -1.0);
        assert_eq!(v.dominance, 0.25);
        assert!(v.is_in_range());
    }

    #[test]
    fn test_vad_nan_collapses_to_neutral_axis() {
        let v = Vad {
            valence: f32::NAN,
            arousal: 0.5,
            dominance: 0.0,
        }
        .clamped();
        assert_eq!(v.valence, 0.0);
        assert_eq!(v.arousal, 0.5);
    }

    #[test]
    fn test_vad_mean() {
        let states = [Vad::new(1.0, 0.0, -1.0), Vad::new(0.0, 1.0, 1.0)];
        let m = Vad::mean(states.iter().copied()).unwrap();
        assert!((m.valence - 0.5).abs() < 1e-6);
        assert!((m.arousal - 0.5).abs() < 1e-6);
        assert!(m.dominance.abs() < 1e-6);

        assert!(Vad::mean(std::iter::empty()).is_none());
    }

    #[test]
    fn test_vad_distance() {
        let a = Vad::new(0.0, 0.0, 0.0);
        let b = Vad::new(0.3, 0.4, 0.0);
        assert!((a.distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_symbol_and_agent_display() {
        assert_eq!(Symbol(7).to_string(), "s7");
        assert_eq!(AgentId(3).to_string(), "agent-3");
        assert_eq!(Symbol(7).index(), 7);
    }

    #[test]
    fn test_agent_id_ordering() {
        assert!(AgentId(1) < AgentId(2));
        assert_eq!(AgentId::new(4), AgentId(4));
    }
}
