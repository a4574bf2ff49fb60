//! Integration tests for the simulation engine
//!
//! These tests drive whole runs end-to-end:
//! - Determinism and isolation between runs
//! - Tick monotonicity of the record stream
//! - The vocabulary-compression law and its calibration slope
//! - Cancellation at tick boundaries
//! - Save and resume through a state file

use emergent_lexicon::core::cancel::{CancelFlag, RunStatus};
use emergent_lexicon::core::config::{EmergenceConfig, SimulationConfig};
use emergent_lexicon::history::{read_jsonl, write_jsonl};
use emergent_lexicon::simulation::{
    fitted_slope, run_ensemble, valence_sweep, EmergenceMetrics, PopulationView, Simulation,
    SimulationState,
};

fn calibration_base() -> SimulationConfig {
    SimulationConfig {
        initial_spread: 0.0,
        ..SimulationConfig::default()
    }
}

// ============================================================================
// Stream shape
// ============================================================================

#[test]
fn test_ticks_strictly_increase() {
    for seed in [1, 2, 3] {
        let records = Simulation::new(SimulationConfig::default().with_seed(seed))
            .unwrap()
            .run(120)
            .unwrap();
        assert_eq!(records.len(), 120);
        for pair in records.windows(2) {
            assert!(pair[0].tick < pair[1].tick);
        }
    }
}

#[test]
fn test_emotion_aggregate_stays_in_range() {
    let config = SimulationConfig {
        initial_spread: 1.0,
        ..SimulationConfig::default()
    }
    .with_valence_bias(0.9);
    let records = Simulation::new(config).unwrap().run(200).unwrap();
    for record in &records {
        assert!(record.emotion_aggregate.as_vad().is_in_range());
        assert!(record.vocabulary_size <= 128);
    }
}

#[test]
fn test_stream_survives_jsonl_round_trip() {
    let records = Simulation::new(SimulationConfig::default())
        .unwrap()
        .run(50)
        .unwrap();
    let mut buffer = Vec::new();
    write_jsonl(&mut buffer, &records).unwrap();
    assert_eq!(buffer.iter().filter(|&&b| b == b'\n').count(), 50);
    assert_eq!(read_jsonl(buffer.as_slice()).unwrap(), records);
}

// ============================================================================
// Determinism and isolation
// ============================================================================

#[test]
fn test_same_seed_reproduces_stream() {
    let config = SimulationConfig::default().with_seed(99);
    let a = Simulation::new(config.clone()).unwrap().run(150).unwrap();
    let b = Simulation::new(config).unwrap().run(150).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_interleaved_runs_do_not_interfere() {
    let config = SimulationConfig::default();
    let alone = Simulation::new(config.clone()).unwrap().run(60).unwrap();

    let mut first = Simulation::new(config.clone()).unwrap();
    let mut second = Simulation::new(config.with_seed(7)).unwrap();
    let mut interleaved = Vec::new();
    for _ in 0..60 {
        interleaved.push(first.step().unwrap());
        second.step().unwrap();
    }
    assert_eq!(alone, interleaved);
}

#[test]
fn test_parallel_ensemble_matches_sequential() {
    let base = SimulationConfig {
        population: 10,
        ..SimulationConfig::default()
    };
    let configs: Vec<SimulationConfig> = (0..4).map(|s| base.clone().with_seed(s)).collect();
    let parallel = run_ensemble(configs.clone(), 40).unwrap();
    for (config, records) in configs.into_iter().zip(parallel) {
        assert_eq!(Simulation::new(config).unwrap().run(40).unwrap(), records);
    }
}

// ============================================================================
// Vocabulary-compression law
// ============================================================================

fn mean_vocabulary(config: SimulationConfig, ticks: u64, warmup: u64) -> f64 {
    let records = Simulation::new(config).unwrap().run(ticks).unwrap();
    let measured: Vec<f64> = records
        .iter()
        .filter(|r| r.tick >= warmup)
        .map(|r| r.vocabulary_size as f64)
        .collect();
    measured.iter().sum::<f64>() / measured.len() as f64
}

#[test]
fn test_vocabulary_non_increasing_in_valence_bias() {
    let biases = [-0.5, -0.25, 0.0, 0.25, 0.5];
    let sizes: Vec<f64> = biases
        .iter()
        .map(|&bias| mean_vocabulary(calibration_base().with_valence_bias(bias), 200, 40))
        .collect();
    for pair in sizes.windows(2) {
        assert!(
            pair[1] <= pair[0],
            "vocabulary grew with valence: {:?}",
            sizes
        );
    }
}

#[test]
fn test_calibration_slope_near_34_symbols_per_valence() {
    let points =
        valence_sweep(&calibration_base(), &[-0.5, 0.0, 0.5], &[1, 2, 3], 200, 40).unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p.runs == 3));

    let slope = fitted_slope(&points).unwrap();
    assert!(
        (-44.0..=-24.0).contains(&slope),
        "slope {slope:.2} outside the calibration band"
    );
}

#[test]
fn test_mean_valence_tracks_bias() {
    let points = valence_sweep(&calibration_base(), &[-0.4, 0.4], &[5], 120, 20).unwrap();
    assert!((points[0].mean_valence + 0.4).abs() < 0.05);
    assert!((points[1].mean_valence - 0.4).abs() < 0.05);
}

// ============================================================================
// Pluggable metrics
// ============================================================================

#[derive(Debug)]
struct VocabularyScore;

impl EmergenceMetrics for VocabularyScore {
    fn score(&self, view: &PopulationView<'_>) -> f64 {
        view.vocabulary_size as f64
    }

    fn recursion_depth(&self, _view: &PopulationView<'_>) -> u32 {
        0
    }

    fn cluster_count(&self, view: &PopulationView<'_>) -> u32 {
        view.agents.len() as u32
    }
}

#[test]
fn test_custom_metrics_strategy() {
    let mut sim =
        Simulation::with_metrics(SimulationConfig::default(), Box::new(VocabularyScore)).unwrap();
    for record in sim.run(30).unwrap() {
        assert_eq!(record.score, record.vocabulary_size as f64);
        assert_eq!(record.cluster_count, 24);
        assert_eq!(record.recursion_depth, 0);
    }
}

// ============================================================================
// Configuration and cancellation
// ============================================================================

#[test]
fn test_configuration_errors_name_the_parameter() {
    let err = EmergenceConfig::from_toml_str("[simulation]\nvocabulary_window = 0\n").unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("vocabulary_window"));
}

#[test]
fn test_cancel_stops_at_tick_boundary() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let cancel = CancelFlag::new();
    let mut delivered = 0u64;
    let status = sim
        .run_with(100, &cancel, |record, state| {
            delivered += 1;
            assert_eq!(state.current_tick(), record.tick + 1);
            if record.tick == 9 {
                cancel.cancel();
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(status, RunStatus::Cancelled { after: Some(9) });
    assert_eq!(delivered, 10);

    // A fresh run on the same engine continues from the next tick
    let resumed = sim.run(1).unwrap();
    assert_eq!(resumed[0].tick, 10);
}

#[test]
fn test_saved_state_resumes_from_disk() {
    let dir = std::env::temp_dir().join(format!("emergent-lexicon-state-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("save_state.json");

    let config = SimulationConfig::default().with_seed(11);
    let expected = Simulation::new(config.clone()).unwrap().run(30).unwrap();

    let mut first = Simulation::new(config).unwrap();
    let mut records = first.run(12).unwrap();
    first.state().save(&path).unwrap();
    drop(first);

    let mut resumed = Simulation::restore(SimulationState::load(&path).unwrap()).unwrap();
    assert_eq!(resumed.current_tick(), 12);
    records.extend(resumed.run(18).unwrap());
    assert_eq!(records, expected);

    std::fs::remove_dir_all(&dir).unwrap();
}
