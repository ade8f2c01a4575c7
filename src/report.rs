//! Console rendering of analysis results.
//!
//! Every function returns the text; the binary decides where it goes.

use std::fmt::Write as _;

use colored::Colorize;

use crate::backend::{BackendReport, OlsMediation};
use crate::bootstrap::BootstrapDistribution;
use crate::config::GroupLabels;
use crate::data::{AnalysisSpec, CleaningReport, ColumnCheck};
use crate::descriptive::{Correlations, GroupComparison};
use crate::mediation::{percent_mediated_by_bound, percent_mediated_line, MediationSummary};
use crate::sem::{PathLabel, PathTable, PathValues};
use crate::stats::{round_to, significance_stars, Correlation};

/// `CLEAR: v` or `!!!! v does not exist !!!!` per variable.
pub fn render_column_checks(checks: &[ColumnCheck<'_>]) -> String {
    checks
        .iter()
        .map(|c| {
            if c.present {
                format!("CLEAR: {}\n", c.name)
            } else {
                format!("{}\n", format!("!!!! {} does not exist !!!!", c.name).red())
            }
        })
        .collect()
}

pub fn render_banner(variable: &str) -> String {
    let rule = "#".repeat(variable.len() + 8);
    format!("{rule}\n### {} ###\n{rule}\n", variable.to_uppercase())
}

pub fn render_cleaning(report: &CleaningReport, spec: &AnalysisSpec) -> String {
    format!(
        ">>> {} rows dropped for invalid results on {}.\n\
         >>> New number of subjects for this analysis: {}\n\
         _________________\n",
        report.dropped(),
        spec.mediator,
        report.retained_rows
    )
}

fn correlation_line(left: &str, right: &str, c: &Correlation, stars: bool) -> String {
    format!(
        ">>> {left} vs. {right}: r = {}, p = {}{}\n",
        round_to(c.r, 3),
        round_to(c.p_value, 3),
        if stars { significance_stars(c.p_value) } else { "" }
    )
}

pub fn render_correlations(corr: &Correlations) -> String {
    let mut out = format!(
        "\nCorrelations for {} (n = {}):\n",
        corr.predictor, corr.n
    );
    for (name, c) in &corr.pairs {
        out.push_str(&correlation_line(&corr.predictor, name, c, true));
    }
    out
}

pub fn render_frame_correlations(spec: &AnalysisSpec, xm: &Correlation, my: &Correlation) -> String {
    format!(
        "\nCorrelations:\n{}{}\n",
        correlation_line(&spec.predictor, &spec.mediator, xm, false),
        correlation_line(&spec.mediator, &spec.outcome, my, false)
    )
}

pub fn render_group_comparison(
    cmp: &GroupComparison,
    spec: &AnalysisSpec,
    labels: &GroupLabels,
) -> String {
    let mut out = String::new();
    for (label, group) in [(&labels.treated, &cmp.treated), (&labels.control, &cmp.control)] {
        let _ = writeln!(
            out,
            "{} Scores for {} (n = {}):\n>>> Mean = {}\n>>> SD = {}\n",
            spec.mediator,
            label.to_uppercase(),
            group.n,
            round_to(group.mean, 3),
            round_to(group.sd, 3)
        );
    }
    let _ = writeln!(out, ">>> Cohen's d = {}\n", round_to(cmp.cohens_d, 3));
    out
}

/// Full inspection table of a path model fit.
pub fn render_path_table(table: &PathTable) -> String {
    let mut out = format!(
        "{:<12} {:<3} {:<12} {:>10} {:>10} {:>10} {:>10}\n",
        "lval", "op", "rval", "Estimate", "Std. Err", "z-value", "p-value"
    );
    for row in table.rows() {
        let _ = writeln!(
            out,
            "{:<12} {:<3} {:<12} {:>10.6} {:>10.6} {:>10.4} {:>10.6}",
            row.lval, row.op.to_string(), row.rval, row.estimate, row.std_err, row.z_value, row.p_value
        );
    }
    out
}

/// Condensed per-path display.
pub fn render_path_markdown(table: &PathTable) -> String {
    let mut out = String::new();
    for row in table.regressions() {
        let _ = writeln!(
            out,
            "\n{} --> {}\nEstimate: {} (p = {})",
            row.rval,
            row.lval,
            round_to(row.estimate, 3),
            round_to(row.p_value, 3)
        );
    }
    out.push_str("______________\n");
    out
}

pub fn render_ols_mediation(summary: &OlsMediation) -> String {
    let mut out = format!(
        "{:<26} {:>10} {:>10} {:>10} {:>10}\n",
        "", "Estimate", "Lower CI", "Upper CI", "P-value"
    );
    for e in &summary.effects {
        let _ = writeln!(
            out,
            "{:<26} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            e.name, e.estimate, e.lower, e.upper, e.p_value
        );
    }
    let _ = writeln!(out, "({} bootstrap replicates)", summary.replicates);
    out
}

pub fn render_backend(report: &BackendReport) -> String {
    match report {
        BackendReport::Sm(summary) => render_ols_mediation(summary),
        BackendReport::R(table) => render_path_table(table),
        BackendReport::Md(table) => render_path_markdown(table),
    }
}

/// Percent-mediated line for one variable; bold when every path is significant.
pub fn render_percent_check(table: &PathTable, spec: &AnalysisSpec, alpha: f64) -> String {
    let line = format!(
        "{} (Data count: {})",
        percent_mediated_line(table, &spec.mediator),
        table.n
    );
    if table.all_significant(alpha) {
        format!("{}\n", format!("***{line}***").bold())
    } else {
        format!("{line}\n")
    }
}

/// One percent-mediated line per path p-value; bold where that path is significant.
pub fn render_percent_check_per_path(table: &PathTable, spec: &AnalysisSpec, alpha: f64) -> String {
    let pct = percent_mediated_line(table, &spec.mediator);
    table
        .regressions()
        .map(|row| {
            let line = format!("{pct} (n = {}, p = {})", table.n, row.p_value);
            if row.p_value < alpha {
                format!("{}\n", format!("***{line}***").bold())
            } else {
                format!("{line}\n")
            }
        })
        .collect()
}

fn path_lines(values: &PathValues, render: impl Fn(f64) -> String) -> String {
    PathLabel::ALL
        .iter()
        .map(|&label| format!("{} --> {}\n", label.name(), render(values.get(label))))
        .collect()
}

/// Significance proportions as `A Path --> 95.5%` lines.
pub fn render_significance(share: &PathValues) -> String {
    path_lines(share, |s| format!("{}%", round_to(s * 100.0, 2)))
}

/// Interval table, percent of significant replicates and mediation strength.
pub fn render_bootstrap_summary(
    dist: &BootstrapDistribution,
    spec: &AnalysisSpec,
    n: usize,
    confidence: f64,
    significance: f64,
) -> String {
    let ci = dist.confidence_intervals(confidence);
    let mut out = format!(
        "\n>> {} Bootstrapped Regression Estimates:\n",
        spec.mediator_label().bold()
    );
    let _ = writeln!(out, "{:<12} {:>12} {:>12}", "", "Lower Bound", "Upper Bound");
    for label in PathLabel::ALL {
        let _ = writeln!(
            out,
            "{:<12} {:>12.6} {:>12.6}",
            format!("{} -->", label.name()),
            ci.lower.get(label),
            ci.upper.get(label)
        );
    }
    let _ = writeln!(out, "** {}% confidence interval\n", round_to(confidence * 100.0, 1));

    let _ = writeln!(
        out,
        ">> Percentage of bootstrapped p-values within {}% confidence interval:",
        round_to(confidence * 100.0, 1)
    );
    out.push_str(&render_significance(
        &dist.significance_proportions(significance, 1.0),
    ));

    let _ = writeln!(
        out,
        "\n>> {} Mediation Strength ({}% confidence interval):\n** Data count: {n} **",
        spec.mediator_label(),
        round_to(confidence * 100.0, 1)
    );
    for line in percent_mediated_by_bound(&ci) {
        let _ = writeln!(out, "{line}");
    }

    if let Some(summary) = dist.mediation_distribution().summary() {
        out.push('\n');
        out.push_str(&render_mediation_summary(&summary));
    }
    out
}

/// Percent-mediation distribution summary, also used in the histogram box.
pub fn render_mediation_summary(summary: &MediationSummary) -> String {
    let mut out = format!(
        "Percent Effect of Mediation:\n\n\
         - Lower Bound: {}%\n\
         - Upper Bound: {}%\n\n\
         - Mean: {}%\n\
         - Median: {}%\n  (SD: ±{})\n",
        round_to(summary.min, 2),
        round_to(summary.max, 2),
        round_to(summary.mean, 2),
        round_to(summary.median, 2),
        round_to(summary.sd, 2)
    );
    if summary.excluded > 0 {
        let _ = writeln!(
            out,
            "  ({} replicates excluded: zero total effect)",
            summary.excluded
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::BootstrapReplicate;
    use crate::data::AnalysisFrame;
    use crate::sem::fit_path_model;
    use pretty_assertions::assert_eq;

    fn plain() {
        colored::control::set_override(false);
    }

    fn spec() -> AnalysisSpec {
        AnalysisSpec::new("X", "WISC_FSIQ", "Y")
    }

    #[test]
    fn test_column_checks_and_banner() {
        plain();
        let checks = [
            ColumnCheck { name: "A", present: true },
            ColumnCheck { name: "B", present: false },
        ];
        assert_eq!(
            render_column_checks(&checks),
            "CLEAR: A\n!!!! B does not exist !!!!\n"
        );
        assert_eq!(render_banner("ab"), "##########\n### AB ###\n##########\n");
    }

    #[test]
    fn test_cleaning_reports_zero_dropped() {
        plain();
        let report = CleaningReport {
            original_rows: 10,
            retained_rows: 10,
        };
        let text = render_cleaning(&report, &spec());
        assert!(text.starts_with(">>> 0 rows dropped for invalid results on WISC_FSIQ."));
        assert!(text.contains("New number of subjects for this analysis: 10"));
    }

    #[test]
    fn test_markdown_lists_three_paths() {
        plain();
        let frame = AnalysisFrame::from_vectors(
            spec(),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.1, -0.2, 0.3, 1.4, 1.7, 1.5],
            vec![0.4, -0.1, 0.5, 3.6, 3.9, 3.5],
        )
        .unwrap();
        let table = fit_path_model(&frame).unwrap();
        let text = render_path_markdown(&table);
        assert_eq!(text.matches("Estimate:").count(), 3);
        assert!(text.contains("X --> WISC_FSIQ"));
        assert!(text.contains("WISC_FSIQ --> Y"));
        assert!(render_path_table(&table).lines().count() == 7);
    }

    #[test]
    fn test_bootstrap_summary_sections() {
        plain();
        let rep = |a: f64| BootstrapReplicate {
            estimates: PathValues { a, b: 2.0, c: 0.5 },
            p_values: PathValues { a: 0.01, b: 0.01, c: 0.2 },
        };
        let dist = BootstrapDistribution {
            seed: 1,
            replicates: vec![rep(1.0), rep(1.5), rep(2.0)],
        };
        let text = render_bootstrap_summary(&dist, &spec(), 3, 0.95, 0.05);
        assert!(text.contains("A Path --> 100%"));
        assert!(text.contains("C Path --> 0%"));
        assert!(text.contains("- At Lower Bound,"));
        assert!(text.contains("** Data count: 3 **"));
        assert!(text.contains("Percent Effect of Mediation:"));
    }
}
