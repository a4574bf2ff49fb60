//! Saved simulation state for autosave and resume
//!
//! Everything a run needs to continue bit for bit: the configuration, the
//! next tick, every agent, the population vocabulary and the RNG position.
//! Derived parts (neighbor ring, compression policy, metrics strategy) are
//! rebuilt on restore.

use std::path::Path;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::Tick;
use crate::entity::agent::Agent;
use crate::entity::vocabulary::VocabularyStore;
use crate::history::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    pub config: SimulationConfig,
    /// Next tick to simulate
    pub tick: Tick,
    pub(crate) agents: Vec<Agent>,
    pub(crate) population_vocabulary: VocabularyStore,
    pub(crate) rng: ChaCha8Rng,
}

impl SimulationState {
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the state to `path`, replacing any previous save atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_json()?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
