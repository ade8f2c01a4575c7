//! Writes a synthetic dataset with the default analysis schema.
//!
//! Every mediator depends on the diagnosis; the outcome depends on the
//! diagnosis directly and on two of the mediators. About 3% of mediator
//! cells are written as `NA`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use mediation_analyzer::config::AnalysisConfig;

#[derive(Parser)]
#[command(name = "generate-sample")]
#[command(about = "Write a synthetic CSV for trying mediation-analyzer")]
struct Cli {
    /// Number of subjects.
    #[arg(short, long, default_value_t = 200)]
    rows: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(short, long, default_value = "UPDATED_DATA.csv")]
    output: PathBuf,
}

const MISSING_RATE: f64 = 0.03;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AnalysisConfig::default();
    let mediators = config.mediators();
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let noise = Normal::new(0.0, 1.0)?;

    // (baseline, diagnosis effect, weight in outcome) per mediator
    let coefficients: Vec<(f64, f64, f64)> = (0u32..)
        .zip(&mediators)
        .map(|(i, _)| {
            let weight = match i {
                2 => -0.6,
                6 => 0.8,
                _ => 0.0,
            };
            let i = f64::from(i);
            (5.0f64.mul_add(i, 50.0), 0.15f64.mul_add(i % 4.0, 0.4), weight)
        })
        .collect();

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;

    let mut header = vec![config.predictor.clone()];
    header.extend(mediators.iter().cloned());
    header.push(config.outcome.clone());
    writer.write_record(&header)?;

    for _ in 0..cli.rows {
        let dx = if rng.random_bool(0.5) { 1.0 } else { 0.0 };
        let mut record = vec![format!("{dx}")];
        let mut outcome = 0.5f64.mul_add(dx, 70.0);

        for &(base, effect, weight) in &coefficients {
            let z = effect.mul_add(dx, noise.sample(&mut rng));
            outcome += weight * z;
            if rng.random_bool(MISSING_RATE) {
                record.push("NA".to_string());
            } else {
                record.push(format!("{:.3}", 10.0f64.mul_add(z, base)));
            }
        }

        outcome += noise.sample(&mut rng);
        record.push(format!("{outcome:.3}"));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} subjects ({} mediators) to {}",
        cli.rows,
        mediators.len(),
        cli.output.display()
    );
    Ok(())
}
