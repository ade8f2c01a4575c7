//! Correlations and group descriptives.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::data::{AnalysisFrame, Dataset};
use crate::error::Result;
use crate::stats::{mean, pearson, std_dev, Correlation, Ddof};

/// Predictor correlated with each target on jointly complete rows.
#[derive(Debug, Clone, Serialize)]
pub struct Correlations {
    pub predictor: String,
    /// Rows complete for the predictor and every target.
    pub n: usize,
    pub pairs: Vec<(String, Correlation)>,
}

impl Correlations {
    pub fn compute(dataset: &Dataset, predictor: &str, targets: &[String]) -> Result<Self> {
        let mut names: Vec<&str> = targets.iter().map(String::as_str).collect();
        names.push(predictor);
        let columns = dataset.complete_rows(&names)?;
        let (x, rest) = columns
            .split_last()
            .unwrap_or_else(|| unreachable!("predictor column is always requested"));

        Ok(Self {
            predictor: predictor.to_string(),
            n: x.len(),
            pairs: targets
                .iter()
                .zip(rest)
                .map(|(name, col)| (name.clone(), pearson(x, col)))
                .collect(),
        })
    }
}

/// Predictor~mediator and mediator~outcome correlations of one frame.
pub fn frame_correlations(frame: &AnalysisFrame) -> (Correlation, Correlation) {
    (pearson(&frame.x, &frame.m), pearson(&frame.m, &frame.y))
}

/// Mean, SD and size of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub sd: f64,
}

impl GroupStats {
    pub fn of(sample: &[f64]) -> Self {
        Self {
            n: sample.len(),
            mean: mean(sample),
            sd: std_dev(sample, Ddof::Sample),
        }
    }
}

/// Mediator compared between the X == 1 and X == 0 groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupComparison {
    pub treated: GroupStats,
    pub control: GroupStats,
    pub cohens_d: f64,
}

impl GroupComparison {
    pub fn from_groups(treated: &[f64], control: &[f64]) -> Self {
        let treated = GroupStats::of(treated);
        let control = GroupStats::of(control);
        Self {
            treated,
            control,
            cohens_d: cohens_d(&treated, &control),
        }
    }

    pub fn compute(frame: &AnalysisFrame) -> Self {
        let (treated, control) = frame.split_by_predictor();
        Self::from_groups(&treated, &control)
    }
}

/// Standardised mean difference with the pooled sample SD.
pub fn cohens_d(first: &GroupStats, second: &GroupStats) -> f64 {
    let dof = (first.n + second.n) as f64 - 2.0;
    let pooled = ((first.n as f64 - 1.0) * first.sd.powi(2)
        + (second.n as f64 - 1.0) * second.sd.powi(2))
        / dof;
    (first.mean - second.mean) / pooled.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnalysisSpec;

    #[test]
    fn test_cohens_d_sign_flips_with_labels() {
        let g1 = [5.0, 6.0, 7.0, 8.0];
        let g2 = [3.0, 4.0, 4.0, 6.0, 5.0];
        let forward = GroupComparison::from_groups(&g1, &g2).cohens_d;
        let swapped = GroupComparison::from_groups(&g2, &g1).cohens_d;
        assert!(forward > 0.0);
        assert!((forward + swapped).abs() < 1e-12);
    }

    #[test]
    fn test_cohens_d_known_value() {
        // Equal SDs of 1 and a mean gap of 2 give d = 2.
        let d = GroupComparison::from_groups(&[1.0, 2.0, 3.0], &[-1.0, 0.0, 1.0]).cohens_d;
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_comparison_from_frame() {
        let frame = AnalysisFrame::from_vectors(
            AnalysisSpec::new("X", "M", "Y"),
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0],
            vec![0.0; 6],
        )
        .unwrap();
        let cmp = GroupComparison::compute(&frame);
        assert_eq!(cmp.treated.n, 3);
        assert!((cmp.treated.mean - 2.0).abs() < 1e-12);
        assert!((cmp.control.sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlations_use_jointly_complete_rows() {
        let ds = Dataset::from_columns(vec![
            ("X".into(), vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0), Some(1.0)]),
            ("A".into(), vec![Some(1.0), Some(3.0), Some(1.5), Some(2.5), None]),
            ("B".into(), vec![Some(2.0), None, Some(1.0), Some(0.5), Some(0.2)]),
        ])
        .unwrap();
        let corr = Correlations::compute(&ds, "X", &["A".to_string(), "B".to_string()]).unwrap();
        assert_eq!(corr.n, 3);
        assert_eq!(corr.pairs.len(), 2);
        assert_eq!(corr.pairs[0].0, "A");
        assert!(corr.pairs[0].1.r > 0.9);
    }
}
