//! Agent: an emotion state plus an exclusively owned vocabulary
//!
//! The engine drives agents through the tick phases in order:
//! `observe` (read-only over neighbors) -> `update_emotion` -> `emit` ->
//! `commit`. Nothing an agent does in a later phase is visible to another
//! agent's earlier phase of the same tick.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::EmotionParams;
use crate::core::error::Result;
use crate::core::types::{AgentId, Symbol, Tick, Vad};
use crate::entity::emission::CompressionPolicy;
use crate::entity::emotion::{self, Stimulus};
use crate::entity::vocabulary::VocabularyStore;

const AGENT_VOCABULARY: &str = "agent vocabulary";

/// Everything an agent took in during the observation phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub stimulus: Stimulus,
    /// Symbols neighbors emitted on the previous tick
    pub heard: Vec<Symbol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    vad: Vad,
    vocabulary: VocabularyStore,
    /// Familiarity weight per alphabet symbol, indexed by symbol id
    familiarity: Vec<f32>,
    last_emitted: Vec<Symbol>,
    /// Consecutive ticks the agent repeated its own previous primary symbol
    echo_chain: u32,
}

impl Agent {
    /// Spawn an agent; every agent starts from the same familiarity prior
    /// (linearly decreasing in symbol id) so rankings begin aligned
    pub fn new(id: AgentId, vad: Vad, alphabet_size: usize, prior_strength: f32) -> Self {
        let familiarity = (0..alphabet_size)
            .map(|i| prior_strength * (alphabet_size - i) as f32 / alphabet_size as f32)
            .collect();
        Self {
            id,
            vad: vad.clamped(),
            vocabulary: VocabularyStore::named(AGENT_VOCABULARY),
            familiarity,
            last_emitted: Vec::new(),
            echo_chain: 0,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn vad(&self) -> Vad {
        self.vad
    }

    pub fn vocabulary(&self) -> &VocabularyStore {
        &self.vocabulary
    }

    pub(crate) fn relabel_vocabulary(&mut self) {
        self.vocabulary.relabel(AGENT_VOCABULARY);
    }

    pub fn familiarity(&self) -> &[f32] {
        &self.familiarity
    }

    pub fn last_emitted(&self) -> &[Symbol] {
        &self.last_emitted
    }

    /// First symbol emitted on the latest tick
    pub fn primary_symbol(&self) -> Option<Symbol> {
        self.last_emitted.first().copied()
    }

    pub fn echo_chain(&self) -> u32 {
        self.echo_chain
    }

    /// Up to `n` most familiar symbols, best first
    pub fn top_symbols(&self, n: usize) -> Vec<Symbol> {
        let mut order: Vec<usize> = (0..self.familiarity.len()).collect();
        order.sort_by(|&a, &b| {
            self.familiarity[b]
                .total_cmp(&self.familiarity[a])
                .then_with(|| a.cmp(&b))
        });
        order.into_iter().take(n).map(|i| Symbol(i as u32)).collect()
    }

    /// Phase 1: read neighbor state without touching it
    ///
    /// With no neighbors the agent sees only itself, so contagion is a no-op.
    pub fn observe(&self, neighbors: &[&Agent], tick: Tick, window: Tick) -> Observation {
        let neighbor_mean =
            Vad::mean(neighbors.iter().map(|n| n.vad)).unwrap_or(self.vad);

        let heard: Vec<Symbol> = neighbors
            .iter()
            .flat_map(|n| n.last_emitted.iter().copied())
            .collect();

        let pressure = if heard.is_empty() {
            0.0
        } else {
            let unfamiliar = heard
                .iter()
                .filter(|s| !self.vocabulary.contains(**s, tick, window))
                .count();
            unfamiliar as f32 / heard.len() as f32
        };

        Observation {
            stimulus: Stimulus::new(neighbor_mean, pressure),
            heard,
        }
    }

    /// Phase 2: apply the VAD update to this agent only
    pub fn update_emotion(&mut self, observation: &Observation, params: &EmotionParams) {
        self.vad = emotion::update(self.vad, &observation.stimulus, params);
    }

    /// Phase 3: select this tick's symbols from post-update valence
    pub fn emit<R: Rng>(
        &self,
        policy: &CompressionPolicy,
        base_emissions: usize,
        rng: &mut R,
    ) -> Vec<Symbol> {
        let count = policy.emission_count(base_emissions, self.vad.arousal, rng);
        policy.choose(&self.familiarity, self.vad.valence, count, rng)
    }

    /// Phase 4: commit own emissions and adopt what was heard
    pub fn commit(
        &mut self,
        emitted: Vec<Symbol>,
        heard: &[Symbol],
        tick: Tick,
        adoption: f32,
    ) -> Result<()> {
        for symbol in &emitted {
            self.vocabulary.record_use(*symbol, tick)?;
            if let Some(weight) = self.familiarity.get_mut(symbol.index()) {
                *weight += 1.0;
            }
        }
        for symbol in heard {
            if let Some(weight) = self.familiarity.get_mut(symbol.index()) {
                *weight += adoption;
            }
        }

        let repeated = match (self.primary_symbol(), emitted.first()) {
            (Some(previous), Some(current)) => previous == *current,
            _ => false,
        };
        self.echo_chain = if repeated { self.echo_chain + 1 } else { 0 };
        self.last_emitted = emitted;
        Ok(())
    }

    /// Drop own vocabulary entries that fell out of the window
    pub fn evict_stale(&mut self, tick: Tick, window: Tick) -> usize {
        self.vocabulary.evict(tick, window)
    }
}
