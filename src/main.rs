//! Emergent Lexicon - Runner
//!
//! Runs one seeded simulation, streams its tick records to disk as JSON
//! lines, feeds them through the streaming detector and writes the detection
//! output next to them.
//!
//! Every snapshot interval the full simulation state is autosaved to
//! `save_state.json`; a later run in the same directory resumes from it,
//! together with the saved history and the records already on disk. Ctrl-C
//! stops the run at the next tick boundary. Interrupted and failed runs
//! still flush the records, save state and history and write a final
//! snapshot.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use emergent_lexicon::analysis::{DetectorOutput, StreamingDetector};
use emergent_lexicon::core::cancel::{CancelFlag, RunStatus};
use emergent_lexicon::core::config::EmergenceConfig;
use emergent_lexicon::core::error::Result;
use emergent_lexicon::core::types::Tick;
use emergent_lexicon::history::{
    read_history_file, read_jsonl, write_history_file, BoundedHistory, JsonlWriter,
};
use emergent_lexicon::simulation::{Simulation, SimulationState, TickMetricRecord};

/// Agents sampled into each periodic snapshot
const SNAPSHOT_SAMPLE: usize = 3;

/// Emergent Lexicon - affect-modulated vocabulary simulation
#[derive(Parser, Debug)]
#[command(name = "emergent-lexicon")]
#[command(about = "Simulate an emotion-driven shared vocabulary and detect meta-events")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total ticks for the run, counting ticks restored from a save
    /// (overrides runner.ticks)
    #[arg(long)]
    ticks: Option<u64>,

    /// Random seed (overrides simulation.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Valence bias (overrides simulation.emotion.valence_bias)
    #[arg(long, allow_hyphen_values = true)]
    valence_bias: Option<f32>,

    /// Output directory for records, snapshots and detection results
    #[arg(long, default_value = "runs/latest")]
    out: PathBuf,

    /// Ignore any saved state and history in the output directory
    #[arg(long)]
    fresh: bool,
}

/// Files the runner reads and writes inside the output directory
struct RunPaths {
    records: PathBuf,
    history: PathBuf,
    detection: PathBuf,
    state: PathBuf,
    snapshots: PathBuf,
}

impl RunPaths {
    fn new(out: &Path) -> Self {
        Self {
            records: out.join("records.jsonl"),
            history: out.join("history.json"),
            detection: out.join("detection.json"),
            state: out.join("save_state.json"),
            snapshots: out.join("snapshots"),
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("emergent_lexicon=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EmergenceConfig::load(path)?,
        None => EmergenceConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.runner.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(bias) = args.valence_bias {
        config.simulation.emotion.valence_bias = bias;
    }
    config.validate()?;

    let paths = RunPaths::new(&args.out);
    fs::create_dir_all(&paths.snapshots)?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            tracing::warn!("Ctrl-C handler unavailable: {}", e);
        }
    }

    let report = run_to_disk(&config, &paths, args.fresh, &cancel)?;

    match report.status {
        RunStatus::Completed => println!("Run completed: {} ticks", report.ticks_completed),
        RunStatus::Cancelled { after } => println!(
            "Run interrupted after tick {}",
            after.map_or("-".to_string(), |t| t.to_string())
        ),
    }
    println!("{}", report.output.summary_line());
    println!(
        "History: {} records kept in memory ({} dropped), {} written to {}",
        report.history_kept,
        report.history_dropped,
        report.records_written,
        paths.records.display()
    );

    Ok(())
}

/// What a finished run left behind
struct RunReport {
    status: RunStatus,
    ticks_completed: Tick,
    output: DetectorOutput,
    history_kept: usize,
    history_dropped: u64,
    records_written: u64,
}

/// Simulate up to `runner.ticks` ticks into `paths`, resuming a saved run
/// unless `fresh`
///
/// Records, history and state are persisted whether the run completes, is
/// cancelled or fails; on failure the run's error is returned after that.
fn run_to_disk(
    config: &EmergenceConfig,
    paths: &RunPaths,
    fresh: bool,
    cancel: &CancelFlag,
) -> Result<RunReport> {
    let runner = &config.runner;
    let mut simulation = match resume(paths, fresh) {
        Some(simulation) => simulation,
        None => Simulation::new(config.simulation.clone())?,
    };
    let resumed_at = simulation.current_tick();

    // Replay what is already on disk so detection covers the whole run
    let prior = if resumed_at > 0 {
        prior_records(&paths.records, resumed_at)
    } else {
        Vec::new()
    };
    let prior_history: Vec<TickMetricRecord> = if resumed_at > 0 {
        read_history_file(&paths.history)?
            .into_iter()
            .filter(|r| r.tick < resumed_at)
            .collect()
    } else {
        Vec::new()
    };

    let mut detector = StreamingDetector::new(config.detector.clone())?;
    let mut history = BoundedHistory::from_records(runner.history_limit, prior_history);
    let mut records = JsonlWriter::new(BufWriter::new(File::create(&paths.records)?));
    for record in &prior {
        records.write(record)?;
        detector.push(record)?;
    }

    let remaining = runner.ticks.saturating_sub(resumed_at);
    tracing::info!(
        resumed_at,
        remaining,
        prior_records = prior.len(),
        prior_history = history.len(),
        "run starting"
    );

    let outcome = simulation.run_with(remaining, cancel, |record, sim| {
        records.write(record)?;
        detector.push(record)?;
        history.push(record.clone());

        if record.score >= runner.alert_threshold {
            tracing::warn!(
                tick = record.tick,
                score = record.score,
                "score at or above alert threshold"
            );
        }

        let completed = sim.current_tick();
        if runner.snapshot_interval > 0 && completed % runner.snapshot_interval == 0 {
            write_snapshot(&paths.snapshots, sim)?;
            sim.state().save(&paths.state)?;
            tracing::debug!(tick = completed, "autosaved");
        }
        Ok(())
    });

    let interrupted = !matches!(outcome, Ok(RunStatus::Completed));
    let persisted = persist(paths, &simulation, &history, &mut records, interrupted);
    let status = match outcome {
        Ok(status) => {
            persisted?;
            status
        }
        Err(e) => {
            match persisted {
                Ok(()) => tracing::error!(error = %e, "run failed; state and history saved"),
                Err(save) => tracing::error!(error = %e, save_error = %save, "run failed"),
            }
            return Err(e);
        }
    };

    let output = detector.finish();
    fs::write(&paths.detection, output.to_json())?;

    Ok(RunReport {
        status,
        ticks_completed: simulation.current_tick(),
        output,
        history_kept: history.len(),
        history_dropped: history.dropped(),
        records_written: records.written(),
    })
}

/// Restore the saved simulation unless `fresh`; a save that cannot be
/// loaded is reported and a new run starts instead
fn resume(paths: &RunPaths, fresh: bool) -> Option<Simulation> {
    if fresh || !paths.state.exists() {
        return None;
    }
    match SimulationState::load(&paths.state).and_then(Simulation::restore) {
        Ok(simulation) => {
            tracing::info!(
                tick = simulation.current_tick(),
                path = %paths.state.display(),
                "resuming saved simulation"
            );
            Some(simulation)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not load saved state, starting a new run");
            None
        }
    }
}

/// Records from an earlier run that precede `before`; unreadable files are
/// reported and skipped
fn prior_records(path: &Path, before: Tick) -> Vec<TickMetricRecord> {
    let loaded = File::open(path)
        .map_err(Into::into)
        .and_then(|file| read_jsonl(BufReader::new(file)));
    match loaded {
        Ok(records) => records.into_iter().filter(|r| r.tick < before).collect(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "prior records unavailable, detection starts at the resumed tick"
            );
            Vec::new()
        }
    }
}

fn write_snapshot(dir: &Path, simulation: &Simulation) -> Result<()> {
    let snapshot = simulation.snapshot(SNAPSHOT_SAMPLE);
    tracing::info!("{}", snapshot.summary());
    fs::write(
        dir.join(format!("snapshot_{:06}.json", snapshot.ticks_completed)),
        snapshot.to_json(),
    )?;
    Ok(())
}

/// Flush records, save history and state, and snapshot interrupted runs;
/// every step is attempted and the first failure is returned
fn persist<W: Write>(
    paths: &RunPaths,
    simulation: &Simulation,
    history: &BoundedHistory,
    records: &mut JsonlWriter<W>,
    interrupted: bool,
) -> Result<()> {
    let flushed = records.flush();
    let history_saved = write_history_file(&paths.history, history);
    let state_saved = simulation.state().save(&paths.state);
    let snapshot = if interrupted {
        write_snapshot(&paths.snapshots, simulation)
    } else {
        Ok(())
    };
    flushed.and(history_saved).and(state_saved).and(snapshot)
}
