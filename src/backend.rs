//! Interchangeable mediation model backends.

#![allow(clippy::cast_precision_loss)]

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::bootstrap::{replicate, BootstrapConfig};
use crate::data::AnalysisFrame;
use crate::error::Result;
use crate::regression::ols;
use crate::sem::{fit_path_model, PathTable};
use crate::stats::{mean, median, quantile};

/// Model backend used for a single-variable analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OLS regressions fed into a bootstrap mediation procedure.
    Sm,
    /// Path model, full inspection table.
    R,
    /// Path model, condensed per-path display.
    #[default]
    Md,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sm => "sm",
            Self::R => "r",
            Self::Md => "md",
        })
    }
}

/// Result of running a backend on one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendReport {
    Sm(OlsMediation),
    R(PathTable),
    Md(PathTable),
}

impl Backend {
    pub fn run(self, frame: &AnalysisFrame, config: &BootstrapConfig) -> Result<BackendReport> {
        Ok(match self {
            Self::Sm => BackendReport::Sm(ols_mediation(frame, config)?),
            Self::R => BackendReport::R(fit_path_model(frame)?),
            Self::Md => BackendReport::Md(fit_path_model(frame)?),
        })
    }
}

/// One effect of the OLS mediation summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSummary {
    pub name: &'static str,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub p_value: f64,
}

impl EffectSummary {
    fn from_draws(name: &'static str, draws: &[f64], level: f64, center: fn(&[f64]) -> f64) -> Self {
        let tail = (1.0 - level) / 2.0;
        Self {
            name,
            estimate: center(draws),
            lower: quantile(draws, tail),
            upper: quantile(draws, 1.0 - tail),
            p_value: sign_p_value(draws),
        }
    }
}

/// `2 * min(P(x > 0), P(x < 0))` over the draws.
fn sign_p_value(draws: &[f64]) -> f64 {
    if draws.is_empty() {
        return f64::NAN;
    }
    let above = draws.iter().filter(|&&d| d > 0.0).count();
    let below = draws.iter().filter(|&&d| d < 0.0).count();
    (2.0 * above.min(below) as f64 / draws.len() as f64).min(1.0)
}

/// Bootstrap mediation summary built from two OLS models.
#[derive(Debug, Clone, Serialize)]
pub struct OlsMediation {
    pub replicates: usize,
    pub seed: u64,
    pub effects: Vec<EffectSummary>,
}

#[derive(Debug, Clone, Copy)]
struct OlsDraw {
    acme: f64,
    ade: f64,
}

/// Outcome model `Y ~ M + X`, mediator model `M ~ X`, bootstrapped.
///
/// With linear models and no interaction the control and treated effects
/// coincide, so both rows report the same draws.
pub fn ols_mediation(frame: &AnalysisFrame, config: &BootstrapConfig) -> Result<OlsMediation> {
    let spec = &frame.spec;
    let (seed, draws) = replicate(frame, config, |sample| {
        let outcome = ols(
            &sample.y,
            &[
                (spec.mediator.as_str(), sample.m.as_slice()),
                (spec.predictor.as_str(), sample.x.as_slice()),
            ],
        )?;
        let mediator = ols(&sample.m, &[(spec.predictor.as_str(), sample.x.as_slice())])?;
        Ok(OlsDraw {
            acme: mediator.estimate(&spec.predictor) * outcome.estimate(&spec.mediator),
            ade: outcome.estimate(&spec.predictor),
        })
    })?;

    Ok(OlsMediation {
        replicates: draws.len(),
        seed,
        effects: summarize_draws(&draws, config.confidence),
    })
}

/// Effect rows from the bootstrap draws.
///
/// Proportions use the median: a draw with a near-zero total effect makes
/// its ratio arbitrarily large, which would drag a mean outside the interval.
fn summarize_draws(draws: &[OlsDraw], level: f64) -> Vec<EffectSummary> {
    let acme: Vec<f64> = draws.iter().map(|d| d.acme).collect();
    let ade: Vec<f64> = draws.iter().map(|d| d.ade).collect();
    let total: Vec<f64> = draws.iter().map(|d| d.acme + d.ade).collect();
    let prop: Vec<f64> = draws.iter().map(|d| d.acme / (d.acme + d.ade)).collect();

    let effect = |name, values: &[f64]| EffectSummary::from_draws(name, values, level, mean);
    let ratio = |name, values: &[f64]| EffectSummary::from_draws(name, values, level, median);
    vec![
        effect("ACME (control)", &acme),
        effect("ACME (treated)", &acme),
        effect("ADE (control)", &ade),
        effect("ADE (treated)", &ade),
        effect("Total effect", &total),
        ratio("Prop. mediated (control)", &prop),
        ratio("Prop. mediated (treated)", &prop),
        effect("ACME (average)", &acme),
        effect("ADE (average)", &ade),
        ratio("Prop. mediated (average)", &prop),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnalysisSpec;
    use crate::sem::PathLabel;

    fn frame() -> AnalysisFrame {
        let x: Vec<f64> = (0..30).map(|i| f64::from(i % 2)).collect();
        let noise: Vec<f64> = (0..30).map(|i| f64::from((i * 5) % 7) / 10.0 - 0.3).collect();
        let m: Vec<f64> = x.iter().zip(&noise).map(|(x, e)| 1.5 * x + e).collect();
        let y: Vec<f64> = m
            .iter()
            .zip(&x)
            .zip(noise.iter().rev())
            .map(|((m, x), e)| 2.0 * m + 0.5 * x + e)
            .collect();
        AnalysisFrame::from_vectors(AnalysisSpec::new("X", "M", "Y"), x, m, y).unwrap()
    }

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            replicates: 200,
            seed: Some(7),
            progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_proportion_estimate_survives_near_zero_total() {
        let mut draws: Vec<OlsDraw> = (0..39)
            .map(|i| OlsDraw {
                acme: 1.0 + f64::from(i) * 0.01,
                ade: 0.5,
            })
            .collect();
        draws.push(OlsDraw {
            acme: 1.0,
            ade: -1.0 + 1e-9,
        });

        let effects = summarize_draws(&draws, 0.95);
        let props: Vec<_> = effects
            .iter()
            .filter(|e| e.name.starts_with("Prop. mediated"))
            .collect();
        assert_eq!(props.len(), 3);
        for prop in props {
            assert!(
                prop.lower <= prop.estimate && prop.estimate <= prop.upper,
                "{} = {} outside [{}, {}]",
                prop.name,
                prop.estimate,
                prop.lower,
                prop.upper
            );
            assert!((prop.estimate - 1.19 / 1.69).abs() < 0.01);
        }

        let acme: Vec<f64> = draws.iter().map(|d| d.acme).collect();
        assert!((effects[0].estimate - mean(&acme)).abs() < 1e-12);
    }

    #[test]
    fn test_sign_p_value_cases() {
        assert!((sign_p_value(&[1.0, 2.0, 3.0]) - 0.0).abs() < f64::EPSILON);
        assert!((sign_p_value(&[1.0, -1.0, 2.0, -2.0]) - 1.0).abs() < f64::EPSILON);
        assert!((sign_p_value(&[1.0, 1.0, 1.0, -1.0]) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_backends_agree_on_paths() {
        let f = frame();
        let cfg = config();
        let BackendReport::R(table) = Backend::R.run(&f, &cfg).unwrap() else {
            panic!("r backend returns a table");
        };
        let BackendReport::Md(md) = Backend::Md.run(&f, &cfg).unwrap() else {
            panic!("md backend returns a table");
        };
        assert_eq!(table, md);

        let BackendReport::Sm(sm) = Backend::Sm.run(&f, &cfg).unwrap() else {
            panic!("sm backend returns a summary");
        };
        assert_eq!(sm.replicates, 200);
        let acme = &sm.effects[0];
        let ade = &sm.effects[2];
        let est = table.estimates();
        assert!((acme.estimate - est.a * est.b).abs() < 0.2);
        assert!((ade.estimate - est.c).abs() < 0.2);
        assert!(acme.lower <= acme.upper);
        assert!((table.path(PathLabel::A).estimate - 1.5).abs() < 0.3);
    }

    #[test]
    fn test_default_backend_is_md() {
        assert_eq!(Backend::default(), Backend::Md);
        assert_eq!(Backend::Sm.to_string(), "sm");
    }
}
