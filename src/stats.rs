//! Descriptive and inferential statistics helpers.
//!
//! Provides the sample moments, quantiles and p-values used by the model
//! backends and reports.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Degrees-of-freedom correction for variance estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ddof {
    /// Divide by n.
    Population,
    /// Divide by n - 1.
    Sample,
}

impl Ddof {
    const fn offset(self) -> usize {
        match self {
            Self::Population => 0,
            Self::Sample => 1,
        }
    }
}

/// Arithmetic mean. `NaN` for an empty slice.
#[must_use]
pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return f64::NAN;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Variance with the given correction. `NaN` when undefined.
#[must_use]
pub fn variance(sample: &[f64], ddof: Ddof) -> f64 {
    let n = sample.len();
    if n <= ddof.offset() {
        return f64::NAN;
    }
    let mu = mean(sample);
    sample.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n - ddof.offset()) as f64
}

#[must_use]
pub fn std_dev(sample: &[f64], ddof: Ddof) -> f64 {
    variance(sample, ddof).sqrt()
}

/// Computes mean and population standard deviation for a sample.
#[must_use]
pub fn compute_stats(sample: &[f64]) -> (f64, f64) {
    if sample.is_empty() {
        return (0.0, 0.0);
    }
    (mean(sample), std_dev(sample, Ddof::Population))
}

/// Quantile with linear interpolation between order statistics.
///
/// Matches the default definition used by pandas and R (type 7).
/// Returns `NaN` for an empty slice.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(sample: &[f64], p: f64) -> f64 {
    if sample.is_empty() {
        return f64::NAN;
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);

    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[must_use]
pub fn median(sample: &[f64]) -> f64 {
    quantile(sample, 0.5)
}

/// Two-sided p-value of a z statistic under the standard normal.
#[must_use]
pub fn normal_two_sided_p(z: f64) -> f64 {
    if !z.is_finite() {
        return if z.is_nan() { f64::NAN } else { 0.0 };
    }
    Normal::new(0.0, 1.0).map_or(f64::NAN, |dist| (2.0 * dist.sf(z.abs())).clamp(0.0, 1.0))
}

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
#[must_use]
pub fn t_two_sided_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return if t.is_nan() { f64::NAN } else { 0.0 };
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |dist| (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

/// Pearson correlation coefficient with its two-sided p-value.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Pearson correlation between two equally long samples.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    if n < 3 {
        return Correlation {
            r: f64::NAN,
            p_value: f64::NAN,
            n,
        };
    }

    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mx, yi - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let p_value = if (1.0 - r.abs()) < f64::EPSILON {
        0.0
    } else {
        t_two_sided_p(r * (df / (1.0 - r * r)).sqrt(), df)
    };

    Correlation { r, p_value, n }
}

/// Significance stars for a p-value.
#[must_use]
pub fn significance_stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        ""
    }
}

/// Rounds to `digits` decimal places.
#[must_use]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
