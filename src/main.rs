//! mediation-analyzer: CLI entry point.
//!
//! Runs single-mediator analyses over the configured variables.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use colored::Colorize;
use log::info;
use serde::Serialize;

use mediation_analyzer::backend::Backend;
use mediation_analyzer::bootstrap::{run_path_bootstrap, ConfidenceTable};
use mediation_analyzer::config::{load_config_file, AnalysisConfig, DataSource};
use mediation_analyzer::data::{AnalysisFrame, AnalysisSpec, Dataset};
use mediation_analyzer::descriptive::{frame_correlations, Correlations, GroupComparison};
use mediation_analyzer::mediation::MediationSummary;
use mediation_analyzer::plot::save_histogram;
use mediation_analyzer::report;
use mediation_analyzer::sem::{fit_path_model, PathValues};
use mediation_analyzer::types::{BatchSummary, VariableOutcome};

#[derive(Parser)]
#[command(name = "mediation-analyzer")]
#[command(about = "Bootstrap mediation analysis of a predictor, mediator and outcome")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args([
    "test", "testall", "pc", "pc_all", "bs", "bsplot", "stats",
])))]
struct Cli {
    /// Analyse the `--vars` mediators with the chosen model.
    #[arg(long)]
    test: bool,

    /// Analyse every configured variable.
    #[arg(long)]
    testall: bool,

    /// Percent mediated for one variable.
    #[arg(long, value_name = "VAR")]
    pc: Option<String>,

    /// Percent mediated for every configured variable, one line per path.
    #[arg(long)]
    pc_all: bool,

    /// Bootstrapped confidence intervals and mediation strength.
    #[arg(long)]
    bs: bool,

    /// Save bootstrapped percent-mediation histograms.
    #[arg(long)]
    bsplot: bool,

    /// Correlations and group descriptives.
    #[arg(long)]
    stats: bool,

    /// Model backend: sm (OLS mediation), r (path model table), md (path model summary).
    #[arg(short, long, value_enum, default_value_t)]
    model: Backend,

    /// Data source.
    #[arg(short, long, value_enum, default_value_t)]
    data: DataSource,

    /// Mediators to analyse, comma separated (`all` for every configured variable).
    #[arg(long, value_delimiter = ',')]
    vars: Vec<String>,

    /// Path to a YAML analysis config.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bootstrap seed (overrides the config).
    #[arg(long)]
    seed: Option<u64>,

    /// Bootstrap replicates (overrides the config).
    #[arg(long)]
    reps: Option<usize>,

    /// Also print the bootstrap summary as JSON (with `--bs`).
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.bootstrap.seed = Some(seed);
    }
    if let Some(reps) = cli.reps {
        if reps == 0 {
            anyhow::bail!("--reps must be at least 1");
        }
        config.bootstrap.replicates = reps;
    }

    let data_path = config.data_path(cli.data).to_path_buf();
    let dataset = Dataset::from_path(&data_path)
        .with_context(|| format!("Failed to load data from {}", data_path.display()))?;

    println!("{}", "mediation-analyzer".bold());
    println!("  Data: {}", data_path.display());
    println!("  Rows: {}", dataset.n_rows());
    println!("  X: {}  Y: {}", config.predictor, config.outcome);
    println!("  Model: {}", cli.model);
    println!();
    println!("Running all checks...");
    println!();

    let run = Run {
        dataset: &dataset,
        config: &config,
        cli: &cli,
    };

    if cli.stats {
        run.stats_mode()
    } else {
        let (variables, mode) = run.select_mode()?;
        run.batch(&variables, mode);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Test,
    TestAll,
    Percent,
    PercentPerPath,
    Bootstrap,
    BootstrapPlot,
}

struct Run<'a> {
    dataset: &'a Dataset,
    config: &'a AnalysisConfig,
    cli: &'a Cli,
}

impl Run<'_> {
    fn select_mode(&self) -> anyhow::Result<(Vec<String>, Mode)> {
        let cli = self.cli;
        Ok(if cli.testall {
            (self.config.mediators(), Mode::TestAll)
        } else if cli.pc_all {
            (self.config.mediators(), Mode::PercentPerPath)
        } else if let Some(var) = &cli.pc {
            (vec![var.clone()], Mode::Percent)
        } else if cli.test {
            (self.requested_vars()?, Mode::Test)
        } else if cli.bs {
            (self.requested_vars()?, Mode::Bootstrap)
        } else {
            (self.requested_vars()?, Mode::BootstrapPlot)
        })
    }

    /// Mediators from `--vars`; `all` expands to every configured variable.
    fn requested_vars(&self) -> anyhow::Result<Vec<String>> {
        match self.cli.vars.as_slice() {
            [] => anyhow::bail!("No mediators given. Use --vars a,b or --vars all"),
            [single] if single == "all" => Ok(self.config.mediators()),
            vars => Ok(vars.iter().map(|v| v.trim().to_string()).collect()),
        }
    }

    fn spec(&self, mediator: &str) -> AnalysisSpec {
        AnalysisSpec::new(&self.config.predictor, mediator, &self.config.outcome)
    }

    /// Prints the column checks and returns the variables present in the data.
    fn checked<'v>(&self, variables: &'v [String]) -> (Vec<&'v String>, Vec<VariableOutcome>) {
        let checks = self.dataset.check_columns(variables);
        print!("{}", report::render_column_checks(&checks));
        println!();

        let mut skipped = Vec::new();
        let mut present = Vec::new();
        for (var, check) in variables.iter().zip(&checks) {
            if check.present {
                present.push(var);
            } else {
                skipped.push(VariableOutcome::Skipped {
                    name: var.clone(),
                    reason: "column not in dataset".to_string(),
                });
            }
        }
        (present, skipped)
    }

    fn batch(&self, variables: &[String], mode: Mode) {
        let start = Instant::now();
        let (present, mut outcomes) = self.checked(variables);

        for var in present {
            if mode == Mode::TestAll {
                print!("{}", report::render_banner(var));
                println!();
            }
            let result = match mode {
                Mode::Test | Mode::TestAll => self.analyse(var),
                Mode::Percent => self.percent(var, false),
                Mode::PercentPerPath => self.percent(var, true),
                Mode::Bootstrap => self.bootstrap(var),
                Mode::BootstrapPlot => self.bootstrap_plot(var, variables.len()),
            };
            match result {
                Ok(details) => outcomes.push(VariableOutcome::Done {
                    name: var.clone(),
                    details,
                }),
                Err(e) => {
                    println!("{}", format!("!!!! ERROR ON {var}: {e:#} !!!!").red());
                    outcomes.push(VariableOutcome::Failed {
                        name: var.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }
        println!();

        print_summary(&outcomes, start.elapsed().as_secs_f64());
    }

    fn prepare(&self, var: &str, show_cleaning: bool) -> anyhow::Result<AnalysisFrame> {
        let spec = self.spec(var);
        info!("{spec}");
        let (frame, cleaning) = AnalysisFrame::prepare(self.dataset, spec)?;
        if show_cleaning {
            print!("{}", report::render_cleaning(&cleaning, &frame.spec));
        }
        Ok(frame)
    }

    fn analyse(&self, var: &str) -> anyhow::Result<String> {
        let frame = self.prepare(var, true)?;
        println!("Results for {var}:");
        let result = self.cli.model.run(&frame, &self.config.bootstrap)?;
        println!("{}", report::render_backend(&result));
        Ok(format!("{} model on {} rows", self.cli.model, frame.len()))
    }

    fn percent(&self, var: &str, per_path: bool) -> anyhow::Result<String> {
        let frame = self.prepare(var, false)?;
        let table = fit_path_model(&frame)?;
        let alpha = self.config.bootstrap.significance;
        if per_path {
            print!("{}", report::render_percent_check_per_path(&table, &frame.spec, alpha));
        } else {
            print!("{}", report::render_percent_check(&table, &frame.spec, alpha));
        }
        Ok(format!("{} rows", table.n))
    }

    fn bootstrap(&self, var: &str) -> anyhow::Result<String> {
        let frame = self.prepare(var, false)?;
        let boot = &self.config.bootstrap;
        let dist = run_path_bootstrap(&frame, boot)?;
        print!(
            "{}",
            report::render_bootstrap_summary(
                &dist,
                &frame.spec,
                frame.len(),
                boot.confidence,
                boot.significance
            )
        );
        println!();

        if self.cli.json {
            let summary = BootstrapSummary {
                predictor: &frame.spec.predictor,
                mediator: &frame.spec.mediator,
                outcome: &frame.spec.outcome,
                n: frame.len(),
                seed: dist.seed,
                replicates: dist.len(),
                confidence_intervals: dist.confidence_intervals(boot.confidence),
                significant_share: dist.significance_proportions(boot.significance, 1.0),
                mediation: dist.mediation_distribution().summary(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Ok(format!("{} replicates, seed {}", dist.len(), dist.seed))
    }

    fn bootstrap_plot(&self, var: &str, tested: usize) -> anyhow::Result<String> {
        let frame = self.prepare(var, false)?;
        let boot = &self.config.bootstrap;
        let dist = run_path_bootstrap(&frame, boot)?;

        let dir = output_dir(&self.config.output_dir);
        println!(">>> Saving histogram for {var} to {} ...", dir.display());
        let path = save_histogram(&dir, &frame.spec, &dist, tested, boot.significance)?;
        println!(">>> Histogram for {var} successfully saved!");
        println!();
        Ok(path.display().to_string())
    }

    fn stats_mode(&self) -> anyhow::Result<()> {
        let start = Instant::now();
        let variables = if self.cli.vars.is_empty() {
            self.config.mediators()
        } else {
            self.requested_vars()?
        };
        let (present, mut outcomes) = self.checked(&variables);
        let present: Vec<String> = present.into_iter().cloned().collect();

        if self.dataset.has_column(&self.config.predictor) {
            let corr = Correlations::compute(self.dataset, &self.config.predictor, &present)?;
            print!("{}", report::render_correlations(&corr));
            println!();
        }

        for var in &present {
            let result = self.prepare(var, true).map(|frame| {
                let (xm, my) = frame_correlations(&frame);
                print!("{}", report::render_frame_correlations(&frame.spec, &xm, &my));
                let cmp = GroupComparison::compute(&frame);
                print!(
                    "{}",
                    report::render_group_comparison(&cmp, &frame.spec, &self.config.groups)
                );
                format!("d = {:.3}", cmp.cohens_d)
            });
            match result {
                Ok(details) => outcomes.push(VariableOutcome::Done {
                    name: var.clone(),
                    details,
                }),
                Err(e) => {
                    println!("{}", format!("!!!! ERROR ON {var}: {e:#} !!!!").red());
                    outcomes.push(VariableOutcome::Failed {
                        name: var.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        print_summary(&outcomes, start.elapsed().as_secs_f64());
        Ok(())
    }
}

/// JSON form of a bootstrap run.
#[derive(Serialize)]
struct BootstrapSummary<'a> {
    predictor: &'a str,
    mediator: &'a str,
    outcome: &'a str,
    n: usize,
    seed: u64,
    replicates: usize,
    confidence_intervals: ConfidenceTable,
    significant_share: PathValues,
    mediation: Option<MediationSummary>,
}

/// Relative output directories resolve against the working directory.
fn output_dir(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| dir.to_path_buf(), |cwd| cwd.join(dir))
}

fn print_summary(outcomes: &[VariableOutcome], elapsed: f64) {
    let summary = BatchSummary::of(outcomes);

    println!("{}", "=".repeat(60));
    for outcome in outcomes {
        match outcome {
            VariableOutcome::Done { .. } => {}
            VariableOutcome::Failed { name, error } => {
                println!("  {} {}", "✗".red(), name.red());
                println!("      {error}");
            }
            VariableOutcome::Skipped { name, reason } => {
                println!("  {} {} ({})", "○".yellow(), name.dimmed(), reason.dimmed());
            }
        }
    }

    if summary.failed == 0 {
        println!(
            "  {} {} analysed, {} skipped in {:.2}s",
            "DONE".green(),
            summary.done.to_string().green(),
            summary.skipped,
            elapsed
        );
    } else {
        println!(
            "  {} {} analysed, {} failed, {} skipped in {:.2}s",
            "DONE".yellow(),
            summary.done,
            summary.failed.to_string().red(),
            summary.skipped,
            elapsed
        );
    }
    println!("{}", "=".repeat(60));
}
