//! Anomaly and meta-event detection over the tick metric stream
//!
//! `StreamingDetector` consumes one record at a time; `analyze` is the batch
//! entry point and is nothing more than a validated pass through the
//! streaming detector, so both modes produce identical output.
//!
//! Rules per tick t:
//! - z-score against the baseline of ticks before t (cumulative or trailing),
//!   population variance; undefined (z = 0) with fewer than two prior ticks
//!   or zero variance
//! - jump: |score[t] - score[t-1]| >= jump_threshold, not applied to the
//!   first tick
//! - episode_start at the first tick of each episode
//! - cluster_count_change whenever the count differs from the previous tick
//! - recursion_spike when depth > ratio * max(previous depths)

use crate::analysis::episodes::{auto_threshold, EpisodeTracker};
use crate::analysis::events::MetaEvent;
use crate::analysis::output::{AnomalyFlag, DetectorOutput};
use crate::analysis::stats::{Baseline, RunningStats, TrailingStats};
use crate::core::cancel::{CancelFlag, RunStatus};
use crate::core::config::{DetectorConfig, EpisodeThreshold, ZScoreBaseline};
use crate::core::error::{EmergenceError, Result};
use crate::core::types::Tick;
use crate::simulation::metrics::TickMetricRecord;

const STREAM_COMPONENT: &str = "detector stream";

/// Fixed thresholds segment live; auto thresholds need the whole series
#[derive(Clone, Debug)]
enum Segmentation {
    Live(EpisodeTracker),
    Deferred {
        percentile: f64,
        scores: Vec<(Tick, f64)>,
    },
}

#[derive(Clone, Debug)]
pub struct StreamingDetector {
    config: DetectorConfig,
    baseline: Baseline,
    last_tick: Option<Tick>,
    previous_score: Option<f64>,
    previous_clusters: Option<u32>,
    max_depth: Option<u32>,
    segmentation: Segmentation,
    flags: Vec<AnomalyFlag>,
    meta_events: Vec<MetaEvent>,
    zero_variance_ticks: u64,
}

impl StreamingDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let baseline = match config.baseline {
            ZScoreBaseline::Cumulative => Baseline::Cumulative(RunningStats::new()),
            ZScoreBaseline::Trailing { window } => Baseline::Trailing(TrailingStats::new(window)),
        };
        let segmentation = match config.episode_threshold {
            EpisodeThreshold::Fixed { value } => Segmentation::Live(EpisodeTracker::new(value)),
            EpisodeThreshold::Auto { percentile } => Segmentation::Deferred {
                percentile,
                scores: Vec::new(),
            },
        };
        Ok(Self {
            config,
            baseline,
            last_tick: None,
            previous_score: None,
            previous_clusters: None,
            max_depth: None,
            segmentation,
            flags: Vec::new(),
            meta_events: Vec::new(),
            zero_variance_ticks: 0,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn records_seen(&self) -> usize {
        self.flags.len()
    }

    /// Meta-events emitted so far (episode starts are held back until
    /// `finish` under an auto threshold)
    pub fn meta_events(&self) -> &[MetaEvent] {
        &self.meta_events
    }

    /// Consume the next record
    ///
    /// A record whose tick does not follow the previous one strictly is
    /// rejected with `Ordering` and leaves the detector unchanged.
    pub fn push(&mut self, record: &TickMetricRecord) -> Result<AnomalyFlag> {
        let tick = record.tick;
        if let Some(last) = self.last_tick {
            if tick <= last {
                return Err(EmergenceError::Ordering {
                    component: STREAM_COMPONENT,
                    tick,
                    last,
                });
            }
        }
        let score = record.score;

        let z = self.baseline.stats().z_score(score);
        if z.is_none() {
            self.zero_variance_ticks += 1;
            tracing::debug!(tick, "z rule skipped: degenerate baseline");
        }
        let z_score = z.unwrap_or(0.0);
        let z_rule = z.is_some() && z_score.abs() >= self.config.z_threshold;
        let jump_rule = self
            .previous_score
            .is_some_and(|previous| (score - previous).abs() >= self.config.jump_threshold);
        self.baseline.push(score);

        match &mut self.segmentation {
            Segmentation::Live(tracker) => {
                if tracker.push(tick, score) {
                    self.meta_events
                        .push(MetaEvent::episode_start(tick, score, tracker.threshold()));
                }
            }
            Segmentation::Deferred { scores, .. } => scores.push((tick, score)),
        }

        if let Some(previous) = self.previous_clusters {
            if previous != record.cluster_count {
                self.meta_events.push(MetaEvent::cluster_count_change(
                    tick,
                    previous,
                    record.cluster_count,
                ));
            }
        }

        let depth = record.recursion_depth;
        if let Some(prior_max) = self.max_depth {
            if depth as f64 > self.config.recursion_spike_ratio * prior_max as f64 {
                tracing::debug!(tick, depth, prior_max, "recursion spike");
                self.meta_events
                    .push(MetaEvent::recursion_spike(tick, depth, prior_max));
            }
        }
        self.max_depth = Some(self.max_depth.map_or(depth, |m| m.max(depth)));

        self.previous_score = Some(score);
        self.previous_clusters = Some(record.cluster_count);
        self.last_tick = Some(tick);

        let flag = AnomalyFlag {
            tick,
            z_score,
            is_anomalous: z_rule || jump_rule,
        };
        self.flags.push(flag.clone());
        Ok(flag)
    }

    /// Close open episodes and produce the full output
    pub fn finish(self) -> DetectorOutput {
        let Self {
            config,
            segmentation,
            flags,
            mut meta_events,
            zero_variance_ticks,
            ..
        } = self;

        let (threshold, episodes) = match segmentation {
            Segmentation::Live(tracker) => (Some(tracker.threshold()), tracker.finish()),
            Segmentation::Deferred { percentile, scores } => {
                let values: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
                match auto_threshold(&values, percentile) {
                    Some(threshold) => {
                        let mut tracker = EpisodeTracker::new(threshold);
                        for &(tick, score) in &scores {
                            if tracker.push(tick, score) {
                                meta_events.push(MetaEvent::episode_start(tick, score, threshold));
                            }
                        }
                        (Some(threshold), tracker.finish())
                    }
                    None => (None, Vec::new()),
                }
            }
        };

        meta_events.sort_by_key(MetaEvent::order_key);

        let output = DetectorOutput::assemble(
            &config,
            flags,
            episodes,
            meta_events,
            threshold,
            zero_variance_ticks,
        );
        tracing::info!(
            records = output.summary.records,
            anomalies = output.summary.total_anomalies,
            episodes = output.summary.total_episodes,
            meta_events = output.summary.total_meta_events,
            "detection finished"
        );
        output
    }
}

/// Fail with `Ordering` unless ticks strictly increase
pub fn validate_ordering(records: &[TickMetricRecord]) -> Result<()> {
    for pair in records.windows(2) {
        if pair[1].tick <= pair[0].tick {
            return Err(EmergenceError::Ordering {
                component: "detector batch",
                tick: pair[1].tick,
                last: pair[0].tick,
            });
        }
    }
    Ok(())
}

/// Batch analysis of a complete record sequence
pub fn analyze(config: &DetectorConfig, records: &[TickMetricRecord]) -> Result<DetectorOutput> {
    let (output, _) = analyze_cancellable(config, records, &CancelFlag::new())?;
    Ok(output)
}

/// Batch analysis that stops between records once `cancel` is set
///
/// The output covers exactly the records consumed before cancellation.
pub fn analyze_cancellable(
    config: &DetectorConfig,
    records: &[TickMetricRecord],
    cancel: &CancelFlag,
) -> Result<(DetectorOutput, RunStatus)> {
    validate_ordering(records)?;
    let mut detector = StreamingDetector::new(config.clone())?;
    let mut status = RunStatus::Completed;
    for record in records {
        if cancel.is_cancelled() {
            status = RunStatus::Cancelled {
                after: detector.last_tick,
            };
            tracing::info!(after = ?detector.last_tick, "detection cancelled");
            break;
        }
        detector.push(record)?;
    }
    Ok((detector.finish(), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::events::MetaEventKind;

    fn records(scores: &[f64]) -> Vec<TickMetricRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(t, &s)| TickMetricRecord::new(t as Tick, s, 0, 1))
            .collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DetectorConfig {
            z_threshold: 0.0,
            ..DetectorConfig::default()
        };
        assert!(StreamingDetector::new(config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_push_rejects_repeated_tick() {
        let mut detector = StreamingDetector::new(DetectorConfig::default()).unwrap();
        detector.push(&TickMetricRecord::new(5, 0.1, 0, 1)).unwrap();
        let err = detector
            .push(&TickMetricRecord::new(5, 0.1, 0, 1))
            .unwrap_err();
        assert!(err.is_ordering());
        assert_eq!(detector.records_seen(), 1);
    }

    #[test]
    fn test_first_tick_never_jumps() {
        let config = DetectorConfig::default().with_episode_threshold(10.0);
        let output = analyze(&config, &records(&[100.0])).unwrap();
        assert!(!output.flags[0].is_anomalous);
        assert_eq!(output.flags[0].z_score, 0.0);
        assert_eq!(output.zero_variance_ticks, 1);
    }

    #[test]
    fn test_jump_rule() {
        let config = DetectorConfig::default().with_episode_threshold(10.0);
        let output = analyze(&config, &records(&[0.1, 0.2, 0.5, 0.55])).unwrap();
        let flagged: Vec<bool> = output.flags.iter().map(|f| f.is_anomalous).collect();
        assert_eq!(flagged, vec![false, false, true, false]);
    }

    #[test]
    fn test_constant_series_never_anomalous() {
        let config = DetectorConfig::default().with_episode_threshold(10.0);
        let output = analyze(&config, &records(&[0.4; 20])).unwrap();
        assert_eq!(output.summary.total_anomalies, 0);
        assert_eq!(output.zero_variance_ticks, 20);
        assert!(output.flags.iter().all(|f| f.z_score == 0.0));
    }

    #[test]
    fn test_cluster_change_payload() {
        let stream = vec![
            TickMetricRecord::new(0, 0.0, 0, 2),
            TickMetricRecord::new(1, 0.0, 0, 2),
            TickMetricRecord::new(2, 0.0, 0, 5),
        ];
        let config = DetectorConfig::default().with_episode_threshold(1.0);
        let output = analyze(&config, &stream).unwrap();
        let changes: Vec<&MetaEvent> = output
            .events_of(MetaEventKind::ClusterCountChange)
            .collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(*changes[0], MetaEvent::cluster_count_change(2, 2, 5));
    }

    #[test]
    fn test_same_tick_events_in_kind_order() {
        let stream = vec![
            TickMetricRecord::new(0, 0.0, 1, 1),
            TickMetricRecord::new(1, 0.9, 5, 3),
        ];
        let config = DetectorConfig::default().with_episode_threshold(0.5);
        let output = analyze(&config, &stream).unwrap();
        let kinds: Vec<MetaEventKind> = output.meta_events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MetaEventKind::EpisodeStart,
                MetaEventKind::ClusterCountChange,
                MetaEventKind::RecursionSpike
            ]
        );
    }

    #[test]
    fn test_auto_threshold_defers_episodes() {
        let scores = [0.1, 0.2, 0.9, 0.3, 0.1, 0.2, 0.4, 0.2, 0.1, 0.3];
        let output = analyze(&DetectorConfig::default(), &records(&scores)).unwrap();
        // 90th nearest-rank percentile of ten scores is the 9th smallest
        assert_eq!(output.summary.episode_threshold, Some(0.4));
        assert_eq!(output.episodes.len(), 2);
        assert_eq!(output.episodes[0].start_tick, 2);
        assert_eq!(output.episodes[1].start_tick, 6);
    }

    #[test]
    fn test_cancelled_analysis_covers_consumed_records() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let (output, status) =
            analyze_cancellable(&DetectorConfig::default(), &records(&[0.1, 0.2]), &cancel)
                .unwrap();
        assert_eq!(status, RunStatus::Cancelled { after: None });
        assert_eq!(output.summary.records, 0);
        assert_eq!(output.summary.episode_threshold, None);
    }
}
