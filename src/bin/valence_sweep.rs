//! Valence sweep
//!
//! Calibrates the vocabulary-compression law: runs a seeded ensemble at each
//! valence bias in parallel and reports mean vocabulary size per bias plus
//! the fitted slope (symbols per +1.0 valence).

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use emergent_lexicon::core::config::EmergenceConfig;
use emergent_lexicon::core::error::Result;
use emergent_lexicon::simulation::{fitted_slope, valence_sweep, SweepPoint};

#[derive(Parser, Debug)]
#[command(name = "valence_sweep")]
#[command(about = "Measure vocabulary size as a function of valence bias")]
struct Args {
    /// TOML configuration file; only the [simulation] table is used
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lowest valence bias
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    from: f32,

    /// Highest valence bias
    #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
    to: f32,

    /// Number of bias values, evenly spaced
    #[arg(long, default_value_t = 5)]
    steps: usize,

    /// Seeds per bias
    #[arg(long, default_value_t = 4)]
    seeds: u64,

    /// Ticks per run
    #[arg(long, default_value_t = 400)]
    ticks: u64,

    /// Leading ticks excluded from the averages
    #[arg(long, default_value_t = 100)]
    warmup: u64,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,
}

#[derive(Serialize)]
struct SweepReport {
    points: Vec<SweepPoint>,
    slope: Option<f64>,
    seeds: u64,
    ticks: u64,
    warmup: u64,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("emergent_lexicon=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let base = match &args.config {
        Some(path) => EmergenceConfig::load(path)?.simulation,
        None => EmergenceConfig::default().simulation,
    };

    let biases: Vec<f32> = if args.steps <= 1 {
        vec![args.from]
    } else {
        let step = (args.to - args.from) / (args.steps - 1) as f32;
        (0..args.steps).map(|i| args.from + step * i as f32).collect()
    };
    let seeds: Vec<u64> = (0..args.seeds).map(|i| base.seed + i).collect();

    let points = valence_sweep(&base, &biases, &seeds, args.ticks, args.warmup)?;
    let report = SweepReport {
        slope: fitted_slope(&points),
        points,
        seeds: args.seeds,
        ticks: args.ticks,
        warmup: args.warmup,
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:>8}  {:>12}  {:>12}", "bias", "vocabulary", "valence");
    for p in &report.points {
        println!(
            "{:>+8.2}  {:>12.2}  {:>+12.3}",
            p.valence_bias, p.mean_vocabulary_size, p.mean_valence
        );
    }
    match report.slope {
        Some(slope) => println!("\nslope: {:+.2} symbols per +1.0 valence", slope),
        None => println!("\nslope: n/a (need at least two bias values)"),
    }
    Ok(())
}
