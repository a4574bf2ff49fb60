//! Periodic population snapshots

use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, Symbol, Tick, Vad};
use crate::entity::agent::Agent;

/// Symbols listed per sampled agent
pub const TOP_SYMBOLS_PER_SAMPLE: usize = 6;

/// Point-in-time view of the population, taken between ticks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub ticks_completed: Tick,
    pub agent_count: usize,
    pub vocabulary_size: usize,
    pub emotion_aggregate: Vad,
    pub sample_agents: Vec<AgentSample>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSample {
    pub id: AgentId,
    pub vad: Vad,
    pub top_symbols: Vec<Symbol>,
    pub last_emitted: Vec<Symbol>,
}

impl AgentSample {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id(),
            vad: agent.vad(),
            top_symbols: agent.top_symbols(TOP_SYMBOLS_PER_SAMPLE),
            last_emitted: agent.last_emitted().to_vec(),
        }
    }
}

impl PopulationSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "tick {}: {} agents, vocabulary {}, valence {:+.3} arousal {:+.3} dominance {:+.3}",
            self.ticks_completed,
            self.agent_count,
            self.vocabulary_size,
            self.emotion_aggregate.valence,
            self.emotion_aggregate.arousal,
            self.emotion_aggregate.dominance,
        )
    }
}
