//! Histogram of the bootstrapped percent-mediation distribution.
//!
//! The chart shows a 15-bin density histogram, a dashed mean line, a ±1 SD
//! band, red tick labels at the mean and mean ± SD, and two text boxes with
//! the distribution summary and the per-path significance shares.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::bootstrap::BootstrapDistribution;
use crate::data::AnalysisSpec;
use crate::error::{MediationError, Result};
use crate::mediation::MediationSummary;
use crate::report::{render_mediation_summary, render_significance};
use crate::sem::PathValues;

const BINS: usize = 15;
const SIZE: (u32, u32) = (1600, 900);
/// Ticks closer than this share of the data range to a marker are dropped.
const TICK_CLEARANCE: f64 = 0.2;

fn plot_err(e: impl std::fmt::Display) -> MediationError {
    MediationError::Plot(e.to_string())
}

/// One histogram bar in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub left: f64,
    pub right: f64,
    pub density: f64,
}

/// Equal-width density histogram over the data range.
pub fn density_bins(values: &[f64], bins: usize) -> Vec<Bar> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let scale = values.len() as f64 * width;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let left = (i as f64).mul_add(width, lo);
            Bar {
                left,
                right: left + width,
                density: count as f64 / scale,
            }
        })
        .collect()
}

/// Evenly spaced ticks on a 1/2/2.5/5 × 10^k step.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if lo.is_nan() || hi.is_nan() || hi <= lo || target == 0 {
        return vec![lo];
    }
    let raw = (hi - lo) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// An x-axis tick; markers are the mean and mean ± SD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub marker: bool,
}

impl Tick {
    pub fn label(&self) -> String {
        if self.marker {
            format!("{:.2}", self.value)
        } else {
            format!("{:.0}", self.value)
        }
    }
}

/// Base ticks minus those crowding the markers, plus the markers.
pub fn marker_ticks(base: &[f64], mean: f64, sd: f64, clearance: f64) -> Vec<Tick> {
    let markers = [mean - sd, mean, mean + sd];
    let mut ticks: Vec<Tick> = base
        .iter()
        .filter(|t| markers.iter().all(|m| (*t - m).abs() >= clearance))
        .map(|&value| Tick {
            value,
            marker: false,
        })
        .chain(markers.iter().map(|&value| Tick {
            value,
            marker: true,
        }))
        .collect();
    ticks.sort_by(|a, b| a.value.total_cmp(&b.value));
    ticks.dedup_by(|a, b| (a.value - b.value).abs() < f64::EPSILON);
    ticks
}

/// `floor(min) .. ceil(max / 10) * 10`.
pub fn x_limits(summary: &MediationSummary) -> (f64, f64) {
    let lo = summary.min.floor();
    let hi = ((summary.max / 10.0).ceil() * 10.0).max(lo + 1.0);
    (lo, hi)
}

/// `{dir}/{M} Percent Mediation ({X} vs. {Y}).png`.
pub fn histogram_path(dir: &Path, spec: &AnalysisSpec) -> PathBuf {
    dir.join(format!(
        "{} Percent Mediation ({} vs. {}).png",
        spec.mediator, spec.predictor, spec.outcome
    ))
}

fn significance_box(share: &PathValues, significance: f64) -> String {
    format!(
        "Percentage of Significant\nBootstrapped Estimates**:\n  ** (p < {significance})\n\n{}",
        render_significance(share)
            .lines()
            .map(|l| format!("- {l}\n"))
            .collect::<String>()
    )
}

/// Renders the percent-mediation histogram for one mediator into `dir`.
///
/// `tested` is the number of variables analysed in this run; p-values are
/// scaled by it before counting significant replicates.
pub fn save_histogram(
    dir: &Path,
    spec: &AnalysisSpec,
    dist: &BootstrapDistribution,
    tested: usize,
    significance: f64,
) -> Result<PathBuf> {
    let mediation = dist.mediation_distribution();
    let summary = mediation.summary().ok_or(MediationError::InsufficientData {
        model: "histogram",
        needed: 1,
        got: 0,
    })?;
    let share = dist.significance_proportions(significance, tested.max(1) as f64);
    let percents = mediation.percents();

    fs::create_dir_all(dir)?;
    let path = histogram_path(dir, spec);
    draw(&path, spec, &percents, &summary, &significance_box(&share, significance))?;
    info!("histogram for {} written to {}", spec.mediator, path.display());
    Ok(path)
}

fn draw(
    path: &Path,
    spec: &AnalysisSpec,
    percents: &[f64],
    summary: &MediationSummary,
    share_text: &str,
) -> Result<()> {
    let bars = density_bins(percents, BINS);
    let (x_lo, x_hi) = x_limits(summary);
    let y_hi = bars.iter().map(|b| b.density).fold(0.0, f64::max) * 1.1;
    let y_hi = if y_hi > 0.0 { y_hi } else { 1.0 };
    let (mean, sd) = (summary.mean, summary.sd);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (chart_area, _) = root.split_horizontally(1180);

    let title = format!(
        "{} Mediation Effect (%) - {} -> {}",
        spec.mediator_label(),
        spec.predictor,
        spec.outcome
    );
    let mut chart = ChartBuilder::on(&chart_area)
        .margin(25)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_desc("Density")
        .draw()
        .map_err(plot_err)?;

    let band = ((mean - sd).max(0.0), mean + sd);
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(band.0, 0.0), (band.1, y_hi)],
            RED.mix(0.2).filled(),
        )))
        .map_err(plot_err)?;

    chart
        .draw_series(bars.iter().map(|b| {
            Rectangle::new([(b.left, 0.0), (b.right, b.density)], BLUE.mix(0.6).filled())
        }))
        .map_err(plot_err)?;

    // Dashed mean line.
    let dashes = 30;
    chart
        .draw_series((0..dashes).step_by(2).map(|i| {
            let y0 = y_hi * f64::from(i) / f64::from(dashes);
            let y1 = y_hi * f64::from(i + 1) / f64::from(dashes);
            PathElement::new(vec![(mean, y0), (mean, y1)], RED.stroke_width(2))
        }))
        .map_err(plot_err)?;

    let ticks = marker_ticks(
        &nice_ticks(x_lo, x_hi, 10),
        mean,
        sd,
        TICK_CLEARANCE * (summary.max - summary.min),
    );
    for tick in ticks.iter().filter(|t| (x_lo..=x_hi).contains(&t.value)) {
        let (px, py) = chart.backend_coord(&(tick.value, 0.0));
        let color = if tick.marker { RED } else { BLACK };
        let style = ("sans-serif", 16)
            .into_font()
            .color(&color)
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&PathElement::new(vec![(px, py), (px, py + 6)], color))
            .map_err(plot_err)?;
        root.draw(&Text::new(tick.label(), (px, py + 10), style))
            .map_err(plot_err)?;
    }

    let (w, h) = (SIZE.0 as f64, SIZE.1 as f64);
    draw_text_box(&root, (0.75 * w) as i32, (0.15 * h) as i32, &render_mediation_summary(summary))?;
    draw_text_box(&root, (0.75 * w) as i32, (0.40 * h) as i32, share_text)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn draw_text_box<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    x: i32,
    y: i32,
    text: &str,
) -> Result<()> {
    const LINE: i32 = 22;
    const PAD: i32 = 10;
    let lines: Vec<&str> = text.lines().collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    let bottom = y + PAD * 2 + LINE * lines.len() as i32;
    let right = x + PAD * 2 + longest * 9;

    area.draw(&Rectangle::new([(x, y), (right, bottom)], BLACK.stroke_width(1)))
        .map_err(plot_err)?;
    for (i, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            (*line).to_string(),
            (x + PAD, y + PAD + LINE * i as i32),
            ("sans-serif", 18).into_font(),
        ))
        .map_err(plot_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{run_path_bootstrap, BootstrapConfig, BootstrapReplicate};
    use crate::data::AnalysisFrame;
    use pretty_assertions::assert_eq;

    fn frame() -> AnalysisFrame {
        let x: Vec<f64> = (0..40).map(|i| f64::from(i % 2)).collect();
        let m: Vec<f64> = (0..40)
            .map(|i| 1.5f64.mul_add(f64::from(i % 2), f64::from((i * 7) % 5) * 0.2))
            .collect();
        let y: Vec<f64> = m
            .iter()
            .zip(&x)
            .zip((0..40).map(|i| f64::from((i * 3) % 7) * 0.1))
            .map(|((m, x), e)| 2.0 * m + 0.5 * x + e)
            .collect();
        AnalysisFrame::from_vectors(AnalysisSpec::new("X", "M", "Y"), x, m, y).unwrap()
    }

    #[test]
    fn test_density_integrates_to_one() {
        let values: Vec<f64> = (0..100).map(|i| f64::from(i) * 0.37).collect();
        let bars = density_bins(&values, BINS);
        assert_eq!(bars.len(), BINS);
        let area: f64 = bars.iter().map(|b| b.density * (b.right - b.left)).sum();
        assert!((area - 1.0).abs() < 1e-9);
        assert!((bars[0].left - 0.0).abs() < 1e-12);
        assert!((bars[BINS - 1].right - 99.0 * 0.37).abs() < 1e-9);
    }

    #[test]
    fn test_constant_values_get_one_unit_range() {
        let bars = density_bins(&[5.0, 5.0, 5.0], 3);
        assert!((bars[0].left - 4.5).abs() < 1e-12);
        assert!((bars[2].right - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_nice_ticks_cover_range() {
        assert_eq!(nice_ticks(0.0, 100.0, 10), (0..=10).map(|i| f64::from(i) * 10.0).collect::<Vec<_>>());
        assert_eq!(nice_ticks(3.0, 17.0, 5), vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_markers_replace_crowded_ticks() {
        let base = [0.0, 20.0, 40.0, 60.0, 80.0, 100.0];
        let ticks = marker_ticks(&base, 50.0, 10.0, 5.0);
        let values: Vec<f64> = ticks.iter().map(|t| t.value).collect();
        assert_eq!(values, vec![0.0, 20.0, 40.0, 50.0, 60.0, 80.0, 100.0]);
        assert!(ticks.iter().filter(|t| t.marker).count() == 3);
        let labels: Vec<String> = ticks.iter().map(Tick::label).collect();
        assert_eq!(labels[2], "40.00");
        assert_eq!(labels[1], "20");
    }

    #[test]
    fn test_limits_round_outward() {
        let summary = MediationSummary {
            min: 12.7,
            max: 143.2,
            mean: 80.0,
            median: 79.0,
            sd: 20.0,
            retained: 10,
            excluded: 0,
        };
        assert_eq!(x_limits(&summary), (12.0, 150.0));
    }

    #[test]
    fn test_file_name_follows_convention() {
        let spec = AnalysisSpec::new("PrimaryDx_ASD", "WISC_FSIQ", "PercentAccuracy_GTI");
        assert_eq!(
            histogram_path(Path::new("out"), &spec),
            PathBuf::from("out/WISC_FSIQ Percent Mediation (PrimaryDx_ASD vs. PercentAccuracy_GTI).png")
        );
    }

    #[test]
    fn test_save_histogram_creates_directory_and_png() {
        let frame = frame();
        let config = BootstrapConfig {
            replicates: 50,
            seed: Some(3),
            progress: false,
            ..Default::default()
        };
        let dist = run_path_bootstrap(&frame, &config).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("Model_Histograms");
        assert!(!out.exists());

        let path = save_histogram(&out, &frame.spec, &dist, 1, 0.05).unwrap();
        assert_eq!(path, histogram_path(&out, &frame.spec));
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_all_excluded_distribution_is_insufficient() {
        let degenerate = BootstrapReplicate {
            estimates: PathValues { a: 1.0, b: 1.0, c: -1.0 },
            p_values: PathValues { a: 0.01, b: 0.01, c: 0.01 },
        };
        let dist = BootstrapDistribution {
            seed: 1,
            replicates: vec![degenerate; 5],
        };
        let tmp = tempfile::tempdir().unwrap();
        let spec = AnalysisSpec::new("X", "M", "Y");

        let err = save_histogram(tmp.path(), &spec, &dist, 1, 0.05).unwrap_err();
        assert!(matches!(err, MediationError::InsufficientData { .. }), "{err}");
        assert!(!histogram_path(tmp.path(), &spec).exists());
    }
}
