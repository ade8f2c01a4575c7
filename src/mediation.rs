//! Percent of the total effect carried by the mediator.
//!
//! indirect = a·b, total = c + a·b, mediated = |indirect / total|.
//!
//! A total effect within [`TOTAL_EFFECT_EPSILON`] of zero makes the ratio
//! meaningless. Such cases yield `None`; bootstrap replicates hitting it are
//! excluded from the distribution and counted.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::bootstrap::ConfidenceTable;
use crate::sem::{PathTable, PathValues};
use crate::stats::{compute_stats, median};

/// Total effects smaller than this in magnitude are treated as zero.
pub const TOTAL_EFFECT_EPSILON: f64 = 1e-12;

/// Decomposition of the total effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathEffects {
    pub indirect: f64,
    pub direct: f64,
    pub total: f64,
}

impl PathEffects {
    pub fn new(paths: PathValues) -> Self {
        let indirect = paths.a * paths.b;
        Self {
            indirect,
            direct: paths.c,
            total: paths.c + indirect,
        }
    }

    /// `|indirect / total|`, or `None` when the total effect is degenerate.
    pub fn mediated_fraction(&self) -> Option<f64> {
        if !self.total.is_finite() || self.total.abs() < TOTAL_EFFECT_EPSILON {
            return None;
        }
        let fraction = (self.indirect / self.total).abs();
        fraction.is_finite().then_some(fraction)
    }

    pub fn percent_mediated(&self) -> Option<f64> {
        self.mediated_fraction().map(|f| f * 100.0)
    }
}

fn format_percent(percent: Option<f64>) -> String {
    percent.map_or_else(
        || "undefined (total effect is zero)".to_string(),
        |p| format!("{p:.3}%"),
    )
}

/// Single-fit line: `>>> 85.714% of effect mediated by Social Motivation`.
pub fn percent_mediated_line(table: &PathTable, mediator: &str) -> String {
    let effects = PathEffects::new(table.estimates());
    format!(
        ">>> {} of effect mediated by {}",
        format_percent(effects.percent_mediated()),
        mediator.replace('_', " ")
    )
}

/// One line per confidence bound.
pub fn percent_mediated_by_bound(ci: &ConfidenceTable) -> Vec<String> {
    ci.bounds()
        .iter()
        .map(|(bound, paths)| {
            let pct = PathEffects::new(*paths).percent_mediated();
            match pct {
                Some(p) => format!("- At {bound}, {p:.3}% of effect mediated."),
                None => format!("- At {bound}, {}.", format_percent(None)),
            }
        })
        .collect()
}

/// Mediated fractions across bootstrap replicates.
#[derive(Debug, Clone, Serialize)]
pub struct MediationDistribution {
    /// Fractions (not percents) of retained replicates.
    pub values: Vec<f64>,
    /// Replicates dropped for a degenerate total effect.
    pub excluded: usize,
}

impl MediationDistribution {
    pub fn from_estimates(estimates: impl IntoIterator<Item = PathValues>) -> Self {
        let mut values = Vec::new();
        let mut excluded = 0;
        for paths in estimates {
            match PathEffects::new(paths).mediated_fraction() {
                Some(f) => values.push(f),
                None => excluded += 1,
            }
        }
        if excluded > 0 {
            log::warn!("excluded {excluded} replicates with a zero total effect");
        }
        Self { values, excluded }
    }

    /// Values scaled to percents.
    pub fn percents(&self) -> Vec<f64> {
        self.values.iter().map(|v| v * 100.0).collect()
    }

    pub fn summary(&self) -> Option<MediationSummary> {
        if self.values.is_empty() {
            return None;
        }
        let pct = self.percents();
        let (mean, sd) = compute_stats(&pct);
        Some(MediationSummary {
            min: pct.iter().copied().fold(f64::INFINITY, f64::min),
            max: pct.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            median: median(&pct),
            sd,
            retained: pct.len(),
            excluded: self.excluded,
        })
    }
}

/// Summary of the percent-mediated distribution, in percent units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MediationSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub sd: f64,
    pub retained: usize,
    pub excluded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnalysisFrame, AnalysisSpec};
    use crate::sem::fit_path_model;
    use pretty_assertions::assert_eq;

    const fn paths(a: f64, b: f64, c: f64) -> PathValues {
        PathValues { a, b, c }
    }

    #[test]
    fn test_fraction_formula() {
        let effects = PathEffects::new(paths(1.5, 2.0, 0.5));
        assert!((effects.indirect - 3.0).abs() < 1e-12);
        assert!((effects.total - 3.5).abs() < 1e-12);
        assert!((effects.percent_mediated().unwrap() - 300.0 / 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_indirect_uses_absolute_value() {
        let effects = PathEffects::new(paths(-1.0, 2.0, 1.0));
        assert!((effects.mediated_fraction().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_is_undefined() {
        assert_eq!(PathEffects::new(paths(1.0, 1.0, -1.0)).mediated_fraction(), None);
        assert_eq!(PathEffects::new(paths(f64::NAN, 1.0, 0.0)).mediated_fraction(), None);
    }

    #[test]
    fn test_single_fit_line_uses_labelled_paths() {
        let frame = AnalysisFrame::from_vectors(
            AnalysisSpec::new("X", "Social_Motivation", "Y"),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.1, -0.2, 0.3, 1.4, 1.7, 1.5],
            vec![0.4, -0.1, 0.5, 3.6, 3.9, 3.5],
        )
        .unwrap();
        let table = fit_path_model(&frame).unwrap();
        let est = table.estimates();

        // Inspection rows are a, c, b.
        let rows = table.rows();
        assert!((rows[0].estimate - est.a).abs() < f64::EPSILON);
        assert!((rows[1].estimate - est.c).abs() < f64::EPSILON);
        assert!((rows[2].estimate - est.b).abs() < f64::EPSILON);

        let expected = (est.a * est.b / est.a.mul_add(est.b, est.c)).abs() * 100.0;
        assert_eq!(
            percent_mediated_line(&table, "Social_Motivation"),
            format!(">>> {expected:.3}% of effect mediated by Social Motivation")
        );
    }

    #[test]
    fn test_bound_lines() {
        let ci = ConfidenceTable {
            level: 0.95,
            lower: paths(1.0, 1.0, 1.0),
            upper: paths(1.0, 1.0, -1.0),
        };
        assert_eq!(
            percent_mediated_by_bound(&ci),
            vec![
                "- At Lower Bound, 50.000% of effect mediated.".to_string(),
                "- At Upper Bound, undefined (total effect is zero).".to_string(),
            ]
        );
    }

    #[test]
    fn test_distribution_excludes_degenerate_replicates() {
        let dist = MediationDistribution::from_estimates([
            paths(1.0, 1.0, 1.0),
            paths(1.0, 1.0, -1.0),
            paths(1.0, 3.0, 1.0),
        ]);
        assert_eq!(dist.excluded, 1);
        let summary = dist.summary().unwrap();
        assert_eq!(summary.retained, 2);
        assert!((summary.min - 50.0).abs() < 1e-9);
        assert!((summary.max - 75.0).abs() < 1e-9);
        assert!((summary.mean - 62.5).abs() < 1e-9);
        assert!((summary.median - 62.5).abs() < 1e-9);
        assert!((summary.sd - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_distribution_has_no_summary() {
        let dist = MediationDistribution::from_estimates(Vec::new());
        assert!(dist.summary().is_none());
    }
}
