//! Bootstrap resampling of the path model.
//!
//! Each replicate draws a resample of the cleaned frame with replacement,
//! refits the model and records the a, b and c estimates and p-values.
//! Replicates are independent, so they run on the rayon pool. Replicate
//! `i` seeds its own RNG from `(base_seed, i)`, which keeps the result
//! deterministic for a given seed whatever the thread scheduling.

#![allow(clippy::cast_precision_loss)]

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::AnalysisFrame;
use crate::error::Result;
use crate::mediation::MediationDistribution;
use crate::sem::{fit_path_model, PathLabel, PathValues};
use crate::stats::quantile;

/// Bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of resamples.
    pub replicates: usize,
    /// Base seed; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// p-value threshold for counting a replicate's path as significant.
    pub significance: f64,
    /// Two-sided confidence level of the percentile intervals.
    pub confidence: f64,
    /// Draw a progress bar on stderr (only when it is a terminal).
    #[serde(skip)]
    pub progress: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            replicates: 2000,
            seed: None,
            significance: 0.05,
            confidence: 0.95,
            progress: true,
        }
    }
}

/// Counter-based seed derivation (SplitMix64).
#[inline]
pub const fn counter_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn create_progress_bar(len: u64, message: &str, enabled: bool) -> ProgressBar {
    let draw_target = if enabled && std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) =
        ProgressStyle::with_template(" > {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Runs `f` on `config.replicates` resamples of `frame`.
///
/// Returns the base seed used together with the replicate results. The
/// first error aborts the whole run.
pub fn replicate<T, F>(
    frame: &AnalysisFrame,
    config: &BootstrapConfig,
    f: F,
) -> Result<(u64, Vec<T>)>
where
    T: Send,
    F: Fn(&AnalysisFrame) -> Result<T> + Sync,
{
    let base_seed = config.seed.unwrap_or_else(rand::random);
    debug!(
        "bootstrap of {} over {} rows: {} replicates, seed {base_seed}",
        frame.spec.mediator,
        frame.len(),
        config.replicates
    );

    let pb = create_progress_bar(
        config.replicates as u64,
        "Getting bootstrapped results...",
        config.progress,
    );

    let results = (0..config.replicates as u64)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(counter_seed(base_seed, i));
            let sample = frame.resample(&mut rng);
            let out = f(&sample);
            pb.inc(1);
            out
        })
        .collect::<Result<Vec<T>>>();

    pb.finish_and_clear();
    Ok((base_seed, results?))
}

/// Path estimates and p-values from one resample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapReplicate {
    pub estimates: PathValues,
    pub p_values: PathValues,
}

/// Lower and upper percentile bounds per path.
///
/// Stored as two bound columns so the percent-mediated report can treat
/// each bound as its own set of path values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceTable {
    pub level: f64,
    pub lower: PathValues,
    pub upper: PathValues,
}

impl ConfidenceTable {
    pub const fn bounds(&self) -> [(&'static str, PathValues); 2] {
        [("Lower Bound", self.lower), ("Upper Bound", self.upper)]
    }
}

/// Empirical distribution of path estimates across replicates.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapDistribution {
    pub seed: u64,
    pub replicates: Vec<BootstrapReplicate>,
}

impl BootstrapDistribution {
    pub fn len(&self) -> usize {
        self.replicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicates.is_empty()
    }

    /// Estimates of one path across all replicates.
    pub fn estimates(&self, label: PathLabel) -> Vec<f64> {
        self.replicates
            .iter()
            .map(|r| r.estimates.get(label))
            .collect()
    }

    /// Percentile confidence intervals at `level` (e.g. 0.95).
    pub fn confidence_intervals(&self, level: f64) -> ConfidenceTable {
        let tail = (1.0 - level) / 2.0;
        let bound = |p: f64| {
            let q = |label| quantile(&self.estimates(label), p);
            PathValues {
                a: q(PathLabel::A),
                b: q(PathLabel::B),
                c: q(PathLabel::C),
            }
        };
        ConfidenceTable {
            level,
            lower: bound(tail),
            upper: bound(1.0 - tail),
        }
    }

    /// Share of replicates whose scaled p-value is below `threshold`.
    ///
    /// `multiplier` scales each p-value first (1 for none, the number of
    /// tested variables for a Bonferroni-style correction).
    pub fn significance_proportions(&self, threshold: f64, multiplier: f64) -> PathValues {
        let share = |label: PathLabel| {
            if self.is_empty() {
                return 0.0;
            }
            let hits = self
                .replicates
                .iter()
                .filter(|r| r.p_values.get(label) * multiplier < threshold)
                .count();
            hits as f64 / self.len() as f64
        };
        PathValues {
            a: share(PathLabel::A),
            b: share(PathLabel::B),
            c: share(PathLabel::C),
        }
    }

    /// Per-replicate mediated fraction `|a·b / (c + a·b)|`.
    pub fn mediation_distribution(&self) -> MediationDistribution {
        MediationDistribution::from_estimates(self.replicates.iter().map(|r| r.estimates))
    }
}

/// Fits the path model on every resample.
pub fn run_path_bootstrap(
    frame: &AnalysisFrame,
    config: &BootstrapConfig,
) -> Result<BootstrapDistribution> {
    let (seed, replicates) = replicate(frame, config, |sample| {
        let table = fit_path_model(sample)?;
        Ok(BootstrapReplicate {
            estimates: table.estimates(),
            p_values: table.p_values(),
        })
    })?;
    Ok(BootstrapDistribution { seed, replicates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnalysisSpec;
    use pretty_assertions::assert_eq;

    fn frame() -> AnalysisFrame {
        let x: Vec<f64> = (0..40).map(|i| f64::from(i % 2)).collect();
        let m: Vec<f64> = (0..40)
            .map(|i| 1.5f64.mul_add(f64::from(i % 2), f64::from((i * 7) % 5) * 0.2))
            .collect();
        let y: Vec<f64> = m
            .iter()
            .zip(&x)
            .enumerate()
            .map(|(i, (m, x))| 2.0 * m + 0.5 * x + f64::from(((i * 3) % 7) as u8) * 0.1)
            .collect();
        AnalysisFrame::from_vectors(AnalysisSpec::new("X", "M", "Y"), x, m, y).unwrap()
    }

    fn config(replicates: usize) -> BootstrapConfig {
        BootstrapConfig {
            replicates,
            seed: Some(42),
            progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_counter_seed_is_deterministic_and_spread() {
        assert_eq!(counter_seed(42, 0), counter_seed(42, 0));
        assert_ne!(counter_seed(42, 0), counter_seed(42, 1));
        assert_ne!(counter_seed(42, 0), counter_seed(43, 0));
    }

    #[test]
    fn test_same_seed_same_distribution() {
        let f = frame();
        let first = run_path_bootstrap(&f, &config(50)).unwrap();
        let second = run_path_bootstrap(&f, &config(50)).unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first.seed, 42);
        assert_eq!(first.replicates, second.replicates);
    }

    #[test]
    fn test_interval_bounds_are_ordered() {
        let f = frame();
        for reps in [1, 2, 25] {
            let dist = run_path_bootstrap(&f, &config(reps)).unwrap();
            let ci = dist.confidence_intervals(0.95);
            for label in PathLabel::ALL {
                assert!(ci.lower.get(label) <= ci.upper.get(label), "{label} with B={reps}");
            }
        }
    }

    #[test]
    fn test_significance_share_counts_exactly() {
        let rep = |p: f64| BootstrapReplicate {
            estimates: PathValues { a: 1.0, b: 1.0, c: 1.0 },
            p_values: PathValues { a: p, b: 0.5, c: 0.01 },
        };
        let dist = BootstrapDistribution {
            seed: 0,
            replicates: vec![rep(0.01), rep(0.04), rep(0.2), rep(0.049)],
        };
        let share = dist.significance_proportions(0.05, 1.0);
        assert!((share.a - 0.75).abs() < 1e-12);
        assert!(share.b.abs() < 1e-12);
        assert!((share.c - 1.0).abs() < 1e-12);

        // Bonferroni scaling by 3 tested variables: only p = 0.01 survives for a.
        let scaled = dist.significance_proportions(0.05, 3.0);
        assert!((scaled.a - 0.25).abs() < 1e-12);
        assert!((scaled.c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_distribution_has_zero_share() {
        let dist = BootstrapDistribution {
            seed: 0,
            replicates: Vec::new(),
        };
        let share = dist.significance_proportions(0.05, 1.0);
        assert!(share.a.abs() < f64::EPSILON);
    }
}
