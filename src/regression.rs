//! Ordinary least squares with an intercept.

#![allow(clippy::cast_precision_loss)]

use nalgebra::{DMatrix, DVector};

use crate::error::{MediationError, Result};
use crate::stats::t_two_sided_p;

/// One estimated coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_err: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// Fitted OLS model. The first coefficient is the intercept.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<Coefficient>,
    pub df_resid: usize,
    /// Residual variance with the n - k divisor.
    pub sigma2: f64,
}

impl OlsFit {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Point estimate for `name`, `NaN` when absent.
    pub fn estimate(&self, name: &str) -> f64 {
        self.coefficient(name).map_or(f64::NAN, |c| c.estimate)
    }
}

/// Regresses `response` on an intercept plus `regressors`.
pub fn ols(response: &[f64], regressors: &[(&str, &[f64])]) -> Result<OlsFit> {
    let n = response.len();
    let k = regressors.len() + 1;
    if n <= k {
        return Err(MediationError::InsufficientData {
            model: "OLS",
            needed: k + 1,
            got: n,
        });
    }
    if let Some((name, col)) = regressors.iter().find(|(_, col)| col.len() != n) {
        return Err(MediationError::RaggedColumn {
            column: (*name).to_string(),
            expected: n,
            got: col.len(),
        });
    }

    let design = DMatrix::from_fn(n, k, |row, col| {
        if col == 0 {
            1.0
        } else {
            regressors[col - 1].1[row]
        }
    });
    let y = DVector::from_column_slice(response);

    let xtx = design.transpose() * &design;
    let xtx_inv = invert_spd(xtx, "OLS design")?;
    let beta = &xtx_inv * design.transpose() * &y;

    let residuals = &y - &design * &beta;
    let df_resid = n - k;
    let sigma2 = residuals.norm_squared() / df_resid as f64;

    let names = std::iter::once("Intercept").chain(regressors.iter().map(|(name, _)| *name));
    let coefficients = names
        .enumerate()
        .map(|(i, name)| {
            let std_err = (sigma2 * xtx_inv[(i, i)]).sqrt();
            let t_value = beta[i] / std_err;
            Coefficient {
                name: name.to_string(),
                estimate: beta[i],
                std_err,
                t_value,
                p_value: t_two_sided_p(t_value, df_resid as f64),
            }
        })
        .collect();

    Ok(OlsFit {
        coefficients,
        df_resid,
        sigma2,
    })
}

/// Relative pivot below which a symmetric matrix is treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Inverts a symmetric positive-definite matrix through its Cholesky factor.
pub(crate) fn invert_spd(matrix: DMatrix<f64>, what: &'static str) -> Result<DMatrix<f64>> {
    let scale = matrix.diagonal().iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !scale.is_finite() || scale <= 0.0 {
        return Err(MediationError::Singular(what));
    }
    let chol = matrix.cholesky().ok_or(MediationError::Singular(what))?;
    let min_pivot = chol
        .l_dirty()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |acc, v| acc.min(v * v));
    if min_pivot < PIVOT_TOLERANCE * scale {
        return Err(MediationError::Singular(what));
    }
    Ok(chol.inverse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0f64.mul_add(*v, 1.0)).collect();
        let fit = ols(&y, &[("x", &x[..])]).unwrap();
        assert!((fit.estimate("Intercept") - 1.0).abs() < 1e-10);
        assert!((fit.estimate("x") - 2.0).abs() < 1e-10);
        assert_eq!(fit.df_resid, 3);
    }

    #[test]
    fn test_standard_errors_match_closed_form() {
        // y = [1, 3, 2, 5, 4] on x = [1..5]: slope 0.8, RSS 3.6, SE(slope) = sqrt(1.2 / 10).
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let fit = ols(&y, &[("x", &x[..])]).unwrap();
        let slope = fit.coefficient("x").unwrap();
        assert!((slope.estimate - 0.8).abs() < 1e-10);
        let expected_se = (1.2f64 / 10.0).sqrt();
        assert!((slope.std_err - expected_se).abs() < 1e-10);
        assert!(slope.p_value > 0.05 && slope.p_value < 0.2);
    }

    #[test]
    fn test_collinear_design_is_singular() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 2.0, 2.0, 3.0];
        let err = ols(&y, &[("x", &x[..]), ("x2", &x[..])]).unwrap_err();
        assert!(matches!(err, MediationError::Singular(_)));
    }

    #[test]
    fn test_too_few_rows() {
        let err = ols(&[1.0, 2.0], &[("x", &[0.0, 1.0][..])]).unwrap_err();
        assert!(matches!(err, MediationError::InsufficientData { .. }));
    }
}
