//! Integration tests for the anomaly / meta-event detector
//!
//! Covers the documented segmentation and spike examples, batch versus
//! streaming equivalence, idempotence, ordering errors and degenerate
//! statistics.

use emergent_lexicon::analysis::{
    analyze, analyze_cancellable, Episode, MetaEvent, MetaEventKind, StreamingDetector,
};
use emergent_lexicon::core::cancel::{CancelFlag, RunStatus};
use emergent_lexicon::core::config::{DetectorConfig, SimulationConfig, ZScoreBaseline};
use emergent_lexicon::core::error::EmergenceError;
use emergent_lexicon::core::types::Tick;
use emergent_lexicon::simulation::{Simulation, TickMetricRecord};

fn score_stream(scores: &[f64]) -> Vec<TickMetricRecord> {
    scores
        .iter()
        .enumerate()
        .map(|(t, &s)| TickMetricRecord::new(t as Tick, s, 0, 1))
        .collect()
}

fn depth_stream(depths: &[u32]) -> Vec<TickMetricRecord> {
    depths
        .iter()
        .enumerate()
        .map(|(t, &d)| TickMetricRecord::new(t as Tick, 0.0, d, 1))
        .collect()
}

fn simulated(ticks: u64) -> Vec<TickMetricRecord> {
    Simulation::new(SimulationConfig::default())
        .unwrap()
        .run(ticks)
        .unwrap()
}

// ============================================================================
// Episodes
// ============================================================================

#[test]
fn test_episode_segmentation_example() {
    let config = DetectorConfig::default().with_episode_threshold(0.8);
    let output = analyze(&config, &score_stream(&[0.1, 0.9, 0.95, 0.2, 0.85])).unwrap();

    assert_eq!(
        output.episodes,
        vec![
            Episode {
                start_tick: 1,
                end_tick: 2,
                peak_tick: 2,
                peak_score: 0.95,
            },
            Episode {
                start_tick: 4,
                end_tick: 4,
                peak_tick: 4,
                peak_score: 0.85,
            },
        ]
    );

    let starts: Vec<Tick> = output
        .events_of(MetaEventKind::EpisodeStart)
        .map(|e| e.tick)
        .collect();
    assert_eq!(starts, vec![1, 4]);
    assert_eq!(output.summary.total_episodes, 2);
    assert_eq!(output.summary.meta_events.episode_start, 2);
    assert_eq!(output.summary.episode_threshold, Some(0.8));
}

// ============================================================================
// Recursion spikes
// ============================================================================

#[test]
fn test_recursion_spike_at_last_tick() {
    let output = analyze(&DetectorConfig::default(), &depth_stream(&[1, 1, 1, 3])).unwrap();
    let spikes: Vec<&MetaEvent> = output.events_of(MetaEventKind::RecursionSpike).collect();
    assert_eq!(spikes.len(), 1);
    assert_eq!(*spikes[0], MetaEvent::recursion_spike(3, 3, 1));
}

#[test]
fn test_spike_compares_against_running_max() {
    // 6 would beat 1.25 * 4 but not 1.25 * 5
    let output = analyze(&DetectorConfig::default(), &depth_stream(&[4, 5, 6])).unwrap();
    assert_eq!(output.summary.meta_events.recursion_spike, 0);
}

#[test]
fn test_flat_recursion_never_spikes() {
    let output = analyze(&DetectorConfig::default(), &depth_stream(&[1, 1, 1, 1])).unwrap();
    assert_eq!(output.summary.meta_events.recursion_spike, 0);
}

#[test]
fn test_first_tick_cannot_spike() {
    let output = analyze(&DetectorConfig::default(), &depth_stream(&[50])).unwrap();
    assert_eq!(output.summary.meta_events.recursion_spike, 0);
}

#[test]
fn test_spike_needs_to_beat_ratio_of_prior_max() {
    // 5 is not > 1.25 * 4 and 7 is > 1.25 * 5
    let output = analyze(&DetectorConfig::default(), &depth_stream(&[4, 5, 7])).unwrap();
    let ticks: Vec<Tick> = output
        .events_of(MetaEventKind::RecursionSpike)
        .map(|e| e.tick)
        .collect();
    assert_eq!(ticks, vec![2]);
}

// ============================================================================
// Equivalence and reproducibility
// ============================================================================

#[test]
fn test_batch_equals_streaming_on_simulated_stream() {
    let records = simulated(300);
    for config in [
        DetectorConfig::default(),
        DetectorConfig::default().with_episode_threshold(0.6),
        DetectorConfig {
            baseline: ZScoreBaseline::Trailing { window: 25 },
            ..DetectorConfig::default()
        },
    ] {
        let batch = analyze(&config, &records).unwrap();

        let mut stream = StreamingDetector::new(config.clone()).unwrap();
        let mut flags = Vec::new();
        for record in &records {
            flags.push(stream.push(record).unwrap());
        }
        let streamed = stream.finish();

        assert_eq!(flags, batch.flags);
        assert_eq!(streamed, batch);
    }
}

#[test]
fn test_detection_is_byte_identical_across_runs() {
    let records = simulated(250);
    let config = DetectorConfig::default();
    let first = serde_json::to_vec(&analyze(&config, &records).unwrap()).unwrap();
    let second = serde_json::to_vec(&analyze(&config, &records).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_meta_events_are_tick_ordered() {
    let output = analyze(&DetectorConfig::default(), &simulated(400)).unwrap();
    for pair in output.meta_events.windows(2) {
        assert!(pair[0].order_key() <= pair[1].order_key());
    }
    assert_eq!(
        output.summary.total_meta_events as usize,
        output.meta_events.len()
    );
}

// ============================================================================
// Z-score rule
// ============================================================================

/// z of each tick against the scores before it, population variance
fn brute_force_z(scores: &[f64], window: Option<usize>) -> Vec<f64> {
    (0..scores.len())
        .map(|t| {
            let start = window.map_or(0, |w| t.saturating_sub(w));
            let prior = &scores[start..t];
            if prior.len() < 2 {
                return 0.0;
            }
            let n = prior.len() as f64;
            let mean = prior.iter().sum::<f64>() / n;
            let var = prior.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            if var <= 1e-12 {
                0.0
            } else {
                (scores[t] - mean) / var.sqrt()
            }
        })
        .collect()
}

#[test]
fn test_z_scores_match_brute_force() {
    let records = simulated(200);
    let scores: Vec<f64> = records.iter().map(|r| r.score).collect();

    for (baseline, window) in [
        (ZScoreBaseline::Cumulative, None),
        (ZScoreBaseline::Trailing { window: 30 }, Some(30)),
    ] {
        let config = DetectorConfig {
            baseline,
            ..DetectorConfig::default()
        };
        let output = analyze(&config, &records).unwrap();
        let expected = brute_force_z(&scores, window);
        for (flag, z) in output.flags.iter().zip(&expected) {
            assert!(
                (flag.z_score - z).abs() <= 1e-6 * z.abs().max(1.0),
                "tick {}: {} vs {}",
                flag.tick,
                flag.z_score,
                z
            );
        }
    }
}

#[test]
fn test_outlier_is_flagged_by_z_rule() {
    let mut scores = vec![0.50, 0.52, 0.48, 0.51, 0.49, 0.50, 0.52, 0.48];
    scores.push(0.60);
    let config = DetectorConfig {
        jump_threshold: 10.0,
        ..DetectorConfig::default().with_episode_threshold(1.0)
    };
    let output = analyze(&config, &score_stream(&scores)).unwrap();
    let last = output.flags.last().unwrap();
    assert!(last.z_score > 2.5);
    assert!(last.is_anomalous);
    assert!(output.summary.total_anomalies >= 1);
}

#[test]
fn test_zero_variance_series_is_not_an_error() {
    let config = DetectorConfig::default().with_episode_threshold(0.5);
    let output = analyze(&config, &score_stream(&[0.3; 50])).unwrap();
    assert_eq!(output.summary.total_anomalies, 0);
    assert_eq!(output.zero_variance_ticks, 50);
    assert!(output.episodes.is_empty());
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_empty_stream_yields_empty_output() {
    let output = analyze(&DetectorConfig::default(), &[]).unwrap();
    assert!(output.flags.is_empty());
    assert!(output.episodes.is_empty());
    assert!(output.meta_events.is_empty());
    assert_eq!(output.summary.records, 0);
    assert_eq!(output.summary.total_anomalies, 0);
    assert_eq!(output.summary.total_meta_events, 0);
    assert_eq!(output.summary.first_tick, None);
}

#[test]
fn test_reversed_ticks_are_an_ordering_error() {
    let records = vec![
        TickMetricRecord::new(508450, 0.1, 0, 1),
        TickMetricRecord::new(7626, 0.2, 0, 1),
    ];
    let err = analyze(&DetectorConfig::default(), &records).unwrap_err();
    assert!(matches!(
        err,
        EmergenceError::Ordering {
            tick: 7626,
            last: 508450,
            ..
        }
    ));
}

#[test]
fn test_gaps_in_ticks_are_accepted() {
    let records = vec![
        TickMetricRecord::new(3, 0.1, 0, 1),
        TickMetricRecord::new(10, 0.9, 0, 2),
        TickMetricRecord::new(11, 0.1, 0, 2),
    ];
    let output = analyze(&DetectorConfig::default().with_episode_threshold(0.8), &records).unwrap();
    assert_eq!(output.summary.first_tick, Some(3));
    assert_eq!(output.summary.last_tick, Some(11));
    assert_eq!(output.episodes[0].start_tick, 10);
    assert_eq!(output.events_of(MetaEventKind::ClusterCountChange).count(), 1);
}

#[test]
fn test_cancelled_detection_reports_progress() {
    let records = score_stream(&[0.1, 0.2, 0.3]);
    let cancel = CancelFlag::new();
    let (output, status) =
        analyze_cancellable(&DetectorConfig::default(), &records, &cancel).unwrap();
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(output.summary.records, 3);
}
