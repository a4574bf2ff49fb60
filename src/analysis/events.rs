//! Meta-event records emitted by the detector

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::Tick;

/// Declaration order is the tie-break order for events on the same tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaEventKind {
    EpisodeStart,
    ClusterCountChange,
    RecursionSpike,
}

impl fmt::Display for MetaEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetaEventKind::EpisodeStart => "episode_start",
            MetaEventKind::ClusterCountChange => "cluster_count_change",
            MetaEventKind::RecursionSpike => "recursion_spike",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaEventPayload {
    EpisodeStart { score: f64, threshold: f64 },
    ClusterCountChange { previous: u32, current: u32 },
    RecursionSpike { depth: u32, prior_max: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    pub kind: MetaEventKind,
    pub tick: Tick,
    pub payload: MetaEventPayload,
}

impl MetaEvent {
    pub fn episode_start(tick: Tick, score: f64, threshold: f64) -> Self {
        Self {
            kind: MetaEventKind::EpisodeStart,
            tick,
            payload: MetaEventPayload::EpisodeStart { score, threshold },
        }
    }

    pub fn cluster_count_change(tick: Tick, previous: u32, current: u32) -> Self {
        Self {
            kind: MetaEventKind::ClusterCountChange,
            tick,
            payload: MetaEventPayload::ClusterCountChange { previous, current },
        }
    }

    pub fn recursion_spike(tick: Tick, depth: u32, prior_max: u32) -> Self {
        Self {
            kind: MetaEventKind::RecursionSpike,
            tick,
            payload: MetaEventPayload::RecursionSpike { depth, prior_max },
        }
    }

    /// Sort key: tick first, then kind order
    pub fn order_key(&self) -> (Tick, MetaEventKind) {
        (self.tick, self.kind)
    }
}
