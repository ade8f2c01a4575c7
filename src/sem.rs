//! Three-variable structural path model.
//!
//! ```text
//! M ~ a*X
//! Y ~ c*X + b*M
//! ```
//!
//! Fit by maximum likelihood on the covariance matrix of (X, M, Y) with
//! divisor n. For this recursive, saturated model the ML coefficients equal
//! the OLS slopes; standard errors are the asymptotic ML ones and p-values
//! come from z-tests.

#![allow(clippy::cast_precision_loss, clippy::similar_names)]

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::data::AnalysisFrame;
use crate::error::{MediationError, Result};
use crate::regression::invert_spd;
use crate::stats::{mean, normal_two_sided_p};

/// Minimum rows for a fit with finite standard errors.
const MIN_ROWS: usize = 4;

/// Label of a regression path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathLabel {
    /// Predictor to mediator.
    A,
    /// Mediator to outcome.
    B,
    /// Predictor to outcome, controlling for the mediator.
    C,
}

impl PathLabel {
    /// Display order used in reports.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A Path",
            Self::B => "B Path",
            Self::C => "C Path",
        }
    }
}

impl fmt::Display for PathLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
        })
    }
}

/// Relation between the two sides of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "~")]
    Regression,
    #[serde(rename = "~~")]
    Covariance,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regression => "~",
            Self::Covariance => "~~",
        })
    }
}

/// One parameter of the fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathRow {
    pub lval: String,
    pub op: Operator,
    pub rval: String,
    pub label: Option<PathLabel>,
    pub estimate: f64,
    pub std_err: f64,
    pub z_value: f64,
    pub p_value: f64,
}

impl PathRow {
    fn new(
        lval: &str,
        op: Operator,
        rval: &str,
        label: Option<PathLabel>,
        estimate: f64,
        variance: f64,
    ) -> Self {
        let std_err = variance.max(0.0).sqrt();
        let z_value = estimate / std_err;
        Self {
            lval: lval.to_string(),
            op,
            rval: rval.to_string(),
            label,
            estimate,
            std_err,
            z_value,
            p_value: normal_two_sided_p(z_value),
        }
    }
}

/// Estimate and p-value for each of the a, b and c paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathValues {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PathValues {
    pub const fn get(&self, label: PathLabel) -> f64 {
        match label {
            PathLabel::A => self.a,
            PathLabel::B => self.b,
            PathLabel::C => self.c,
        }
    }
}

/// Parameter table of a fitted path model.
///
/// Rows keep the inspection order (a, c, b, then variances) for display;
/// callers look paths up by label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathTable {
    rows: Vec<PathRow>,
    pub n: usize,
}

impl PathTable {
    pub fn rows(&self) -> &[PathRow] {
        &self.rows
    }

    /// Regression rows only, in inspection order.
    pub fn regressions(&self) -> impl Iterator<Item = &PathRow> {
        self.rows.iter().filter(|r| r.op == Operator::Regression)
    }

    pub fn path(&self, label: PathLabel) -> &PathRow {
        self.rows
            .iter()
            .find(|r| r.label == Some(label))
            .unwrap_or_else(|| unreachable!("every fitted table carries path {label}"))
    }

    pub fn estimates(&self) -> PathValues {
        self.values(|r| r.estimate)
    }

    pub fn p_values(&self) -> PathValues {
        self.values(|r| r.p_value)
    }

    fn values(&self, f: impl Fn(&PathRow) -> f64) -> PathValues {
        PathValues {
            a: f(self.path(PathLabel::A)),
            b: f(self.path(PathLabel::B)),
            c: f(self.path(PathLabel::C)),
        }
    }

    /// Whether every path's p-value is below `alpha`.
    pub fn all_significant(&self, alpha: f64) -> bool {
        PathLabel::ALL.iter().all(|&l| self.path(l).p_value < alpha)
    }
}

/// ML covariance matrix (divisor n) of the given columns.
fn ml_covariance(columns: &[&[f64]]) -> DMatrix<f64> {
    let n = columns.first().map_or(0, |c| c.len()) as f64;
    let means: Vec<f64> = columns.iter().map(|c| mean(c)).collect();
    DMatrix::from_fn(columns.len(), columns.len(), |i, j| {
        columns[i]
            .iter()
            .zip(columns[j])
            .map(|(u, v)| (u - means[i]) * (v - means[j]))
            .sum::<f64>()
            / n
    })
}

/// Fits the path model to a cleaned frame.
pub fn fit_path_model(frame: &AnalysisFrame) -> Result<PathTable> {
    let n = frame.len();
    if n < MIN_ROWS {
        return Err(MediationError::InsufficientData {
            model: "path model",
            needed: MIN_ROWS,
            got: n,
        });
    }
    let nf = n as f64;
    let spec = &frame.spec;
    let (x, m, y) = (&spec.predictor, &spec.mediator, &spec.outcome);

    // Order: X, M, Y.
    let s = ml_covariance(&[frame.x.as_slice(), frame.m.as_slice(), frame.y.as_slice()]);

    // M ~ a*X
    let sxx = s[(0, 0)];
    if sxx.is_nan() || sxx <= 0.0 {
        return Err(MediationError::Singular("predictor covariance"));
    }
    let a = s[(0, 1)] / sxx;
    let resid_m = s[(1, 1)] - a * s[(0, 1)];
    let var_a = resid_m / (nf * sxx);

    // Y ~ c*X + b*M
    let pred = s.view((0, 0), (2, 2)).into_owned();
    let pred_inv = invert_spd(pred, "predictor covariance")?;
    let q = DVector::from_column_slice(&[s[(0, 2)], s[(1, 2)]]);
    let beta = &pred_inv * &q;
    let (c, b) = (beta[0], beta[1]);
    let resid_y = s[(2, 2)] - beta.dot(&q);
    let var_c = resid_y * pred_inv[(0, 0)] / nf;
    let var_b = resid_y * pred_inv[(1, 1)] / nf;

    let variance_of_variance = |v: f64| 2.0 * v * v / nf;

    let rows = vec![
        PathRow::new(m, Operator::Regression, x, Some(PathLabel::A), a, var_a),
        PathRow::new(y, Operator::Regression, x, Some(PathLabel::C), c, var_c),
        PathRow::new(y, Operator::Regression, m, Some(PathLabel::B), b, var_b),
        PathRow::new(m, Operator::Covariance, m, None, resid_m, variance_of_variance(resid_m)),
        PathRow::new(y, Operator::Covariance, y, None, resid_y, variance_of_variance(resid_y)),
        PathRow::new(x, Operator::Covariance, x, None, sxx, variance_of_variance(sxx)),
    ];

    Ok(PathTable { rows, n })
}
