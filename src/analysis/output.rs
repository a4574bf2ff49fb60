//! Detector output tables and summary

use serde::{Deserialize, Serialize};

use crate::analysis::episodes::Episode;
use crate::analysis::events::{MetaEvent, MetaEventKind};
use crate::core::config::DetectorConfig;
use crate::core::types::Tick;

/// Per-tick anomaly verdict
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub tick: Tick,
    pub z_score: f64,
    pub is_anomalous: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEventCounts {
    pub episode_start: u32,
    pub cluster_count_change: u32,
    pub recursion_spike: u32,
}

impl MetaEventCounts {
    pub fn from_events(events: &[MetaEvent]) -> Self {
        let mut counts = Self::default();
        for event in events {
            match event.kind {
                MetaEventKind::EpisodeStart => counts.episode_start += 1,
                MetaEventKind::ClusterCountChange => counts.cluster_count_change += 1,
                MetaEventKind::RecursionSpike => counts.recursion_spike += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u32 {
        self.episode_start + self.cluster_count_change + self.recursion_spike
    }
}

/// Counters derived purely from the input stream and configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub records: u64,
    pub first_tick: Option<Tick>,
    pub last_tick: Option<Tick>,
    pub total_anomalies: u32,
    pub total_episodes: u32,
    pub meta_events: MetaEventCounts,
    pub total_meta_events: u32,
    pub z_threshold: f64,
    pub jump_threshold: f64,
    pub recursion_spike_ratio: f64,
    /// Threshold actually used for episodes; `None` when auto-detection had
    /// no scores to work from
    pub episode_threshold: Option<f64>,
}

/// Everything one detection pass produces
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorOutput {
    pub flags: Vec<AnomalyFlag>,
    pub episodes: Vec<Episode>,
    pub meta_events: Vec<MetaEvent>,
    pub summary: DetectionSummary,
    /// Ticks where the z rule could not apply (fewer than two prior samples
    /// or zero variance)
    pub zero_variance_ticks: u64,
}

impl DetectorOutput {
    pub(crate) fn assemble(
        config: &DetectorConfig,
        flags: Vec<AnomalyFlag>,
        episodes: Vec<Episode>,
        meta_events: Vec<MetaEvent>,
        episode_threshold: Option<f64>,
        zero_variance_ticks: u64,
    ) -> Self {
        let counts = MetaEventCounts::from_events(&meta_events);
        let summary = DetectionSummary {
            records: flags.len() as u64,
            first_tick: flags.first().map(|f| f.tick),
            last_tick: flags.last().map(|f| f.tick),
            total_anomalies: flags.iter().filter(|f| f.is_anomalous).count() as u32,
            total_episodes: episodes.len() as u32,
            total_meta_events: counts.total(),
            meta_events: counts,
            z_threshold: config.z_threshold,
            jump_threshold: config.jump_threshold,
            recursion_spike_ratio: config.recursion_spike_ratio,
            episode_threshold,
        };
        Self {
            flags,
            episodes,
            meta_events,
            summary,
            zero_variance_ticks,
        }
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyFlag> {
        self.flags.iter().filter(|f| f.is_anomalous)
    }

    pub fn events_of(&self, kind: MetaEventKind) -> impl Iterator<Item = &MetaEvent> {
        self.meta_events.iter().filter(move |e| e.kind == kind)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary_line(&self) -> String {
        let s = &self.summary;
        format!(
            "{} records ({}..{}), {} anomalies, {} episodes, {} meta-events \
             ({} episode starts, {} cluster changes, {} recursion spikes)",
            s.records,
            s.first_tick.map_or("-".to_string(), |t| t.to_string()),
            s.last_tick.map_or("-".to_string(), |t| t.to_string()),
            s.total_anomalies,
            s.total_episodes,
            s.total_meta_events,
            s.meta_events.episode_start,
            s.meta_events.cluster_count_change,
            s.meta_events.recursion_spike,
        )
    }
}
