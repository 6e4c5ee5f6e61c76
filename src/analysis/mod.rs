//! Derived quantities: differential resistance, zero-bias resistance, and
//! the transfer-length fits across a family of sweeps.
//!
//! Every function here is pure.  An [`AnalysisReport`] is rebuilt from the
//! current curves, selection and [`Parameters`] on each request; nothing is
//! cached between calls.

pub mod differential;
pub mod points;
pub mod regression;
pub mod zero_bias;

use log::warn;
use serde::Serialize;

use crate::data::selection::{DisplayCurve, SpacingTable};
use differential::differential_resistance;
use points::{build_resistance_points, columns, spacing_fit, ResistancePoint};
use regression::{LinearFit, RegressionResult, TlmModel};

// ---------------------------------------------------------------------------
// Scalar parameters
// ---------------------------------------------------------------------------

/// The two user-supplied scalars.  `None` means the value was missing or
/// not a number; computations that need it are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Parameters {
    /// Zero-bias fit half-width, V.
    pub zero_bias_window: Option<f64>,
    /// Contact length (outer radius), µm.
    pub contact_length: Option<f64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            zero_bias_window: Some(zero_bias::DEFAULT_WINDOW),
            contact_length: Some(100.0),
        }
    }
}

/// Read a user-entered scalar.  Anything that is not a finite number is
/// "unavailable".
pub fn parse_parameter(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// `dV/dI` curve derived from one displayed I–V sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResistanceCurve {
    /// Position in the loaded curve list.
    pub index: usize,
    pub label: String,
    pub voltage: Vec<f64>,
    /// May hold `inf`/`NaN` where the derivative vanishes.
    pub resistance: Vec<f64>,
}

impl ResistanceCurve {
    /// Samples safe to plot or aggregate.
    pub fn finite_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.voltage
            .iter()
            .zip(&self.resistance)
            .filter(|(v, r)| v.is_finite() && r.is_finite())
            .map(|(&v, &r)| (v, r))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Fitted(RegressionResult),
    Failed { reason: String },
    /// No points, or no contact length to fit against.
    Unavailable,
}

impl ModelOutcome {
    pub fn fitted(&self) -> Option<&RegressionResult> {
        match self {
            ModelOutcome::Fitted(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub model: TlmModel,
    pub outcome: ModelOutcome,
}

/// Everything derived for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub parameters: Parameters,
    pub resistance_curves: Vec<ResistanceCurve>,
    pub points: Vec<ResistancePoint>,
    /// Plain `R0` vs spacing line.
    pub spacing_fit: Option<LinearFit>,
    /// One entry per [`TlmModel`], in [`TlmModel::ALL`] order.
    pub models: Vec<ModelReport>,
}

impl AnalysisReport {
    pub fn model(&self, model: TlmModel) -> Option<&ModelOutcome> {
        self.models
            .iter()
            .find(|m| m.model == model)
            .map(|m| &m.outcome)
    }
}

/// Derive resistance curves, R0 points and both model fits for the
/// displayed curves.
pub fn analyze(
    shown: &[DisplayCurve<'_>],
    table: &SpacingTable,
    params: &Parameters,
) -> AnalysisReport {
    let resistance_curves = shown
        .iter()
        .filter_map(|d| {
            let current = d.curve.current()?;
            Some(ResistanceCurve {
                index: d.index,
                label: d.label.clone(),
                voltage: d.curve.voltage().to_vec(),
                resistance: differential_resistance(d.curve.voltage(), Some(current)),
            })
        })
        .collect();

    let points = match params.zero_bias_window {
        Some(window) => build_resistance_points(shown, table, window),
        None => Vec::new(),
    };
    let (spacing, resistance) = columns(&points);

    let models = TlmModel::ALL
        .iter()
        .map(|&model| {
            let outcome = match params.contact_length {
                Some(l) if !points.is_empty() => match model.fit(&spacing, &resistance, l) {
                    Ok(res) => ModelOutcome::Fitted(res),
                    Err(e) => {
                        warn!("{model} fit failed: {e}");
                        ModelOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
                _ => ModelOutcome::Unavailable,
            };
            ModelReport { model, outcome }
        })
        .collect();

    AnalysisReport {
        parameters: *params,
        resistance_curves,
        spacing_fit: spacing_fit(&points),
        points,
        models,
    }
}
