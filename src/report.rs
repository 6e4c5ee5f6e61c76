//! Plain-text, CSV and JSON renderings of an [`AnalysisReport`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::analysis::points::ResistancePoint;
use crate::analysis::regression::TlmModel;
use crate::analysis::{AnalysisReport, ModelOutcome};
use crate::data::model::{format_g, format_sig, Curve};
use crate::data::selection::{DisplayCurve, SweepRow};

pub const SUMMARY_FILE: &str = "rho_summary.txt";
pub const R0_FILE: &str = "r0_vs_spacing.csv";
pub const RV_FILE: &str = "rv_curves.csv";
pub const CV_FILE: &str = "cv_curves.csv";

const LABEL_WIDTH: usize = 24;

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// One line per loaded curve with its selection state and data ranges.
pub fn sweep_table(curves: &[Curve], rows: &[SweepRow]) -> String {
    let mut out = format!(
        "{:>3}  {:<3}  {:>5}  {:<w$}  {:<4}  {:<19}  {}\n",
        "#",
        "Use",
        "Group",
        "Label",
        "Kind",
        "V range (V)",
        "Y range",
        w = LABEL_WIDTH
    );
    for (i, (curve, row)) in curves.iter().zip(rows).enumerate() {
        let (v0, v1) = curve.voltage_range();
        let (y0, y1) = curve.response_range();
        out.push_str(&format!(
            "{:>3}  {:<3}  {:>5}  {:<w$}  {:<4}  {:<19}  {:.3e} .. {:.3e}\n",
            i + 1,
            if row.included { "x" } else { "" },
            row.group,
            curve.label(),
            curve.kind().to_string(),
            format!("{v0:.3} .. {v1:.3}"),
            y0,
            y1,
            w = LABEL_WIDTH
        ));
    }
    out
}

/// The zero-bias resistance list, one point per line.
pub fn r0_list(points: &[ResistancePoint]) -> String {
    if points.is_empty() {
        return "No data\n".to_string();
    }
    let mut out = format!(
        "{:<w$}\tSpacing (μm)\tR0 (Ω)\n{}\n",
        "Label/Spacing",
        "-".repeat(60),
        w = LABEL_WIDTH
    );
    for p in points {
        out.push_str(&format!(
            "{:<w$}\t{}\t{}\n",
            p.label,
            format_g(p.spacing),
            format_g(p.resistance),
            w = LABEL_WIDTH
        ));
    }
    out
}

/// `[R0 vs Spacing] a=… (Ω/μm), b=… (Ω), R²=…`
pub fn spacing_fit_line(report: &AnalysisReport) -> String {
    let summary = match &report.spacing_fit {
        Some(fit) => format!(
            "a={} (Ω/μm), b={} (Ω), R²={:.4}",
            format_g(fit.slope),
            format_g(fit.intercept),
            fit.r_squared
        ),
        None => "insufficient points".to_string(),
    };
    format!("[R0 vs Spacing] {summary}")
}

fn model_line(model: TlmModel, outcome: &ModelOutcome) -> String {
    match outcome {
        ModelOutcome::Fitted(r) => {
            let mut line = format!(
                "{model}: Rs={} Ω/□, Lt={} μm, rho_c={} Ω·cm²",
                format_sig(r.sheet_resistance, 9),
                format_sig(r.transfer_length, 9),
                format_sig(r.specific_contact_resistivity, 9)
            );
            if let Some(fit) = &r.line {
                line.push_str(&format!(
                    "; y={}x+{}, R^2={}",
                    format_g(fit.slope),
                    format_g(fit.intercept),
                    format_g(fit.r_squared)
                ));
            }
            line
        }
        ModelOutcome::Failed { .. } | ModelOutcome::Unavailable => {
            format!("{model}: fail (check 0<d<R2 & points)")
        }
    }
}

/// Result lines for both models, or a single line when nothing could be
/// attempted.
pub fn summary_lines(report: &AnalysisReport) -> Vec<String> {
    let attempted = report
        .models
        .iter()
        .any(|m| m.outcome != ModelOutcome::Unavailable);
    if !attempted {
        return vec!["Missing R0 or R2.".to_string()];
    }
    report
        .models
        .iter()
        .map(|m| model_line(m.model, &m.outcome))
        .collect()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn to_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("serialising analysis report")
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct R0Row<'a> {
    label: &'a str,
    spacing_um: f64,
    r0_ohm: f64,
}

#[derive(Serialize)]
struct SampleRow<'a> {
    label: &'a str,
    voltage_v: f64,
    value: f64,
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the summary text and the CSV tables into `dir`, creating it if
/// needed.  Returns the paths written, in order.
///
/// `cv_curves.csv` is only written when a C–V curve is displayed.
pub fn write_outputs(
    dir: &Path,
    shown: &[DisplayCurve<'_>],
    report: &AnalysisReport,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();

    let summary = dir.join(SUMMARY_FILE);
    fs::write(&summary, summary_lines(report).join("\n"))
        .with_context(|| format!("writing {}", summary.display()))?;
    written.push(summary);

    let r0 = dir.join(R0_FILE);
    write_csv(
        &r0,
        report.points.iter().map(|p| R0Row {
            label: &p.label,
            spacing_um: p.spacing,
            r0_ohm: p.resistance,
        }),
    )?;
    written.push(r0);

    let rv = dir.join(RV_FILE);
    write_csv(
        &rv,
        report.resistance_curves.iter().flat_map(|c| {
            c.finite_points().map(move |(v, r)| SampleRow {
                label: &c.label,
                voltage_v: v,
                value: r,
            })
        }),
    )?;
    written.push(rv);

    let cv: Vec<_> = shown
        .iter()
        .filter_map(|d| d.curve.capacitance().map(|c| (d, c)))
        .collect();
    if !cv.is_empty() {
        let path = dir.join(CV_FILE);
        write_csv(
            &path,
            cv.iter().flat_map(|(d, c)| {
                d.curve
                    .voltage()
                    .iter()
                    .zip(c.iter())
                    .map(move |(&v, &value)| SampleRow {
                        label: &d.label,
                        voltage_v: v,
                        value,
                    })
            }),
        )?;
        written.push(path);
    }

    info!("wrote {} output files to {}", written.len(), dir.display());
    Ok(written)
}
