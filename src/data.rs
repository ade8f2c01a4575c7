//! Dataset loading and per-analysis cleaning.
//!
//! The [`Dataset`] is loaded once and only ever borrowed. Each analysis
//! narrows it to the predictor, mediator and outcome columns and drops
//! incomplete rows, producing an [`AnalysisFrame`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::error::{MediationError, Result};

/// Tokens treated as missing in addition to empty cells.
const NA_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "."];

/// An immutable table of subjects by named numeric measures.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Dataset {
    /// Loads a headered CSV file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)?;
        let dataset = Self::from_csv(reader)?;
        info!(
            "loaded {} ({} rows x {} columns)",
            path.display(),
            dataset.n_rows(),
            dataset.names.len()
        );
        Ok(dataset)
    }

    /// Parses a headered CSV from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let names: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut columns = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;
            for (col, values) in columns.iter_mut().enumerate() {
                values.push(parse_cell(record.get(col).unwrap_or("")));
            }
        }

        Self::from_columns(names.into_iter().zip(columns).collect())
    }

    /// Builds a dataset from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let rows = columns.first().map_or(0, |(_, values)| values.len());
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        let mut index = HashMap::with_capacity(columns.len());

        for (name, values) in columns {
            if values.len() != rows {
                return Err(MediationError::RaggedColumn {
                    column: name,
                    expected: rows,
                    got: values.len(),
                });
            }
            index.insert(name.clone(), names.len());
            names.push(name);
            data.push(values);
        }

        Ok(Self {
            names,
            columns: data,
            index,
            rows,
        })
    }

    pub const fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    fn require(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| MediationError::MissingColumn(name.to_string()))
    }

    /// Reports which of `names` exist in the dataset.
    pub fn check_columns<'a>(&self, names: &'a [String]) -> Vec<ColumnCheck<'a>> {
        names
            .iter()
            .map(|name| ColumnCheck {
                name,
                present: self.has_column(name),
            })
            .collect()
    }

    /// Rows where every listed column has a value, as column-major vectors.
    pub fn complete_rows(&self, names: &[&str]) -> Result<Vec<Vec<f64>>> {
        let cols = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>>>()?;
        let mut out = vec![Vec::with_capacity(self.rows); cols.len()];

        for row in 0..self.rows {
            let values: Option<Vec<f64>> = cols.iter().map(|c| c[row]).collect();
            if let Some(values) = values {
                for (dst, v) in out.iter_mut().zip(values) {
                    dst.push(v);
                }
            }
        }

        Ok(out)
    }
}

fn parse_cell(raw: &str) -> Option<f64> {
    let cell = raw.trim();
    if cell.is_empty() || NA_TOKENS.contains(&cell) {
        return None;
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!("treating non-numeric cell {cell:?} as missing");
            None
        }
    }
}

/// Presence of one requested variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnCheck<'a> {
    pub name: &'a str,
    pub present: bool,
}

/// Predictor, mediator and outcome column names for one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSpec {
    pub predictor: String,
    pub mediator: String,
    pub outcome: String,
}

impl AnalysisSpec {
    pub fn new(
        predictor: impl Into<String>,
        mediator: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            predictor: predictor.into(),
            mediator: mediator.into(),
            outcome: outcome.into(),
        }
    }

    /// Mediator name with underscores shown as spaces.
    pub fn mediator_label(&self) -> String {
        self.mediator.replace('_', " ")
    }
}

impl std::fmt::Display for AnalysisSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Analysis for {} (IV: {}, DV: {})",
            self.mediator, self.predictor, self.outcome
        )
    }
}

/// Outcome of dropping incomplete rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub original_rows: usize,
    pub retained_rows: usize,
}

impl CleaningReport {
    pub const fn dropped(&self) -> usize {
        self.original_rows - self.retained_rows
    }
}

/// Cleaned X, M and Y columns for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    pub spec: AnalysisSpec,
    pub x: Vec<f64>,
    pub m: Vec<f64>,
    pub y: Vec<f64>,
}

impl AnalysisFrame {
    /// Narrows `dataset` to X, M and Y and drops incomplete rows.
    pub fn prepare(dataset: &Dataset, spec: AnalysisSpec) -> Result<(Self, CleaningReport)> {
        let mut cols = dataset
            .complete_rows(&[
                spec.predictor.as_str(),
                spec.mediator.as_str(),
                spec.outcome.as_str(),
            ])?
            .into_iter();
        let (x, m, y) = match (cols.next(), cols.next(), cols.next()) {
            (Some(x), Some(m), Some(y)) => (x, m, y),
            _ => unreachable!("complete_rows returns one vector per requested column"),
        };

        let report = CleaningReport {
            original_rows: dataset.n_rows(),
            retained_rows: x.len(),
        };
        debug!(
            "{}: kept {} of {} rows",
            spec.mediator, report.retained_rows, report.original_rows
        );

        Ok((Self { spec, x, m, y }, report))
    }

    /// Builds a frame directly from cleaned columns.
    pub fn from_vectors(spec: AnalysisSpec, x: Vec<f64>, m: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        for (name, len) in [(&spec.mediator, m.len()), (&spec.outcome, y.len())] {
            if len != x.len() {
                return Err(MediationError::RaggedColumn {
                    column: name.clone(),
                    expected: x.len(),
                    got: len,
                });
            }
        }
        Ok(Self { spec, x, m, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Draws `len()` rows with replacement.
    #[must_use]
    pub fn resample<R: Rng>(&self, rng: &mut R) -> Self {
        let n = self.len();
        let mut x = Vec::with_capacity(n);
        let mut m = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let i = rng.random_range(0..n);
            x.push(self.x[i]);
            m.push(self.m[i]);
            y.push(self.y[i]);
        }
        Self {
            spec: self.spec.clone(),
            x,
            m,
            y,
        }
    }

    /// Mediator values for subjects with X == 1 and X == 0.
    #[allow(clippy::float_cmp)]
    pub fn split_by_predictor(&self) -> (Vec<f64>, Vec<f64>) {
        let mut treated = Vec::new();
        let mut control = Vec::new();
        for (&x, &m) in self.x.iter().zip(&self.m) {
            if x == 1.0 {
                treated.push(m);
            } else if x == 0.0 {
                control.push(m);
            }
        }
        (treated, control)
    }
}
