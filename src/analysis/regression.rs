use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Micrometres to centimetres.
pub const UM_TO_CM: f64 = 1e-4;

/// Normalised determinant below which the two Model 1 regressors are
/// treated as collinear.
const SINGULAR_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Failure reasons
// ---------------------------------------------------------------------------

/// Why a transfer-length fit produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("{spacing} points but {resistance} resistances")]
    LengthMismatch { spacing: usize, resistance: usize },
    #[error("contact length {0} is not a positive number")]
    InvalidContactLength(f64),
    #[error("spacing {spacing} outside (0, {contact_length})")]
    SpacingOutOfRange { spacing: f64, contact_length: f64 },
    #[error("regressors are degenerate")]
    SingularSystem,
    #[error("fitted slope is zero")]
    ZeroSlope,
    #[error("fit produced a non-finite transfer length")]
    NonFiniteResult,
}

// ---------------------------------------------------------------------------
// Ordinary least squares line
// ---------------------------------------------------------------------------

/// `y = slope·x + intercept` with its coefficient of determination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// `NaN` when the dependent values have no variance.
    pub r_squared: f64,
}

impl LinearFit {
    /// Unweighted least-squares line through `(x, y)`.
    ///
    /// `None` for fewer than two points, mismatched lengths, or when every
    /// `x` is the same.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < 2 || y.len() != n {
            return None;
        }
        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;

        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            sxx += (xi - mean_x) * (xi - mean_x);
            sxy += (xi - mean_x) * (yi - mean_y);
        }
        if !(sxx > 0.0) || !sxx.is_finite() {
            return None;
        }

        let slope = sxy / sxx;
        let mut fit = LinearFit {
            slope,
            intercept: mean_y - slope * mean_x,
            r_squared: f64::NAN,
        };

        let (mut ss_res, mut ss_tot) = (0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            let r = yi - fit.predict(xi);
            ss_res += r * r;
            ss_tot += (yi - mean_y) * (yi - mean_y);
        }
        if ss_tot > 0.0 {
            fit.r_squared = 1.0 - ss_res / ss_tot;
        }
        Some(fit)
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

// ---------------------------------------------------------------------------
// Transfer-length models
// ---------------------------------------------------------------------------

/// Extracted contact parameters.  Lengths are in the caller's spacing unit
/// (µm); resistivity in Ω·cm².
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionResult {
    /// Ω/□
    pub sheet_resistance: f64,
    pub transfer_length: f64,
    /// Ω·cm²
    pub specific_contact_resistivity: f64,
    /// The corrected-resistance line, for the geometric-correction model.
    pub line: Option<LinearFit>,
}

/// The two independent linearisations of the CTLM resistance model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlmModel {
    /// Two-regressor fit of the log/inverse-radius form (Model 1).
    Implicit,
    /// Straight line through correction-factor-scaled resistances (Model 2).
    Corrected,
}

impl TlmModel {
    pub const ALL: [TlmModel; 2] = [TlmModel::Implicit, TlmModel::Corrected];

    pub fn fit(
        self,
        spacing: &[f64],
        resistance: &[f64],
        contact_length: f64,
    ) -> Result<RegressionResult, FitError> {
        match self {
            TlmModel::Implicit => implicit_fit(spacing, resistance, contact_length),
            TlmModel::Corrected => corrected_fit(spacing, resistance, contact_length),
        }
    }
}

impl fmt::Display for TlmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlmModel::Implicit => write!(f, "Method1"),
            TlmModel::Corrected => write!(f, "Method2"),
        }
    }
}

fn check_inputs(spacing: &[f64], resistance: &[f64], contact_length: f64) -> Result<(), FitError> {
    if spacing.len() != resistance.len() {
        return Err(FitError::LengthMismatch {
            spacing: spacing.len(),
            resistance: resistance.len(),
        });
    }
    if spacing.len() < 2 {
        return Err(FitError::TooFewPoints(spacing.len()));
    }
    if !(contact_length.is_finite() && contact_length > 0.0) {
        return Err(FitError::InvalidContactLength(contact_length));
    }
    if let Some(&d) = spacing.iter().find(|&&d| !(d > 0.0 && d < contact_length)) {
        return Err(FitError::SpacingOutOfRange {
            spacing: d,
            contact_length,
        });
    }
    Ok(())
}

/// Model 1: `R = A·ln(L/(L−d)) + B·(1/(L−d) + 1/L)` without intercept,
/// solved in centimetres.
///
/// `Rs = 2πA`, `ρc = (2πB)² / Rs`, `Lt = √(ρc / Rs)`.
pub fn implicit_fit(
    spacing: &[f64],
    resistance: &[f64],
    contact_length: f64,
) -> Result<RegressionResult, FitError> {
    check_inputs(spacing, resistance, contact_length)?;

    let l = contact_length * UM_TO_CM;
    let (x1, x2): (Vec<f64>, Vec<f64>) = spacing
        .iter()
        .map(|&d| {
            let d = d * UM_TO_CM;
            ((l / (l - d)).ln(), 1.0 / (l - d) + 1.0 / l)
        })
        .unzip();

    let (a, b) = solve_two_regressors(&x1, &x2, resistance).ok_or(FitError::SingularSystem)?;

    let sheet = 2.0 * PI * a;
    let rho_c = if sheet != 0.0 {
        (2.0 * PI * b).powi(2) / sheet
    } else {
        f64::NAN
    };
    let lt_cm = if rho_c.is_finite() && sheet > 0.0 {
        (rho_c / sheet).sqrt()
    } else {
        f64::NAN
    };
    let lt = lt_cm / UM_TO_CM;
    if !lt.is_finite() {
        return Err(FitError::NonFiniteResult);
    }

    Ok(RegressionResult {
        sheet_resistance: sheet,
        transfer_length: lt,
        specific_contact_resistivity: rho_c,
        line: None,
    })
}

/// Least squares `y ≈ a·x1 + b·x2` via column-normalised normal equations.
fn solve_two_regressors(x1: &[f64], x2: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let dot = |u: &[f64], v: &[f64]| u.iter().zip(v).map(|(p, q)| p * q).sum::<f64>();
    let s1 = dot(x1, x1).sqrt();
    let s2 = dot(x2, x2).sqrt();
    if !(s1 > 0.0 && s2 > 0.0) || !s1.is_finite() || !s2.is_finite() {
        return None;
    }

    let r = dot(x1, x2) / (s1 * s2);
    let det = 1.0 - r * r;
    if !(det > SINGULAR_TOLERANCE) {
        return None;
    }
    let c1 = dot(x1, y) / s1;
    let c2 = dot(x2, y) / s2;
    let a = (c1 - r * c2) / det;
    let b = (c2 - r * c1) / det;
    Some((a / s1, b / s2))
}

/// Geometric correction factor `C = (L/d)·ln(L/(L−d))`.
pub fn correction_factor(contact_length: f64, spacing: f64) -> f64 {
    (contact_length / spacing) * (contact_length / (contact_length - spacing)).ln()
}

/// Model 2: fit `R/C = m·d + c` in the spacing unit.
///
/// `Rs = 2πL·m`, `Lt = c / 2m`, `ρc = Rs·Lt²` (with `Lt` in cm).
pub fn corrected_fit(
    spacing: &[f64],
    resistance: &[f64],
    contact_length: f64,
) -> Result<RegressionResult, FitError> {
    check_inputs(spacing, resistance, contact_length)?;

    let corrected: Vec<f64> = spacing
        .iter()
        .zip(resistance)
        .map(|(&d, &r)| r / correction_factor(contact_length, d))
        .collect();
    let line = LinearFit::fit(spacing, &corrected).ok_or(FitError::SingularSystem)?;

    if line.slope == 0.0 {
        return Err(FitError::ZeroSlope);
    }
    let sheet = line.slope * 2.0 * PI * contact_length;
    let lt = line.intercept / (2.0 * line.slope);
    if !lt.is_finite() {
        return Err(FitError::NonFiniteResult);
    }
    let rho_c = sheet * (lt * UM_TO_CM).powi(2);

    Ok(RegressionResult {
        sheet_resistance: sheet,
        transfer_length: lt,
        specific_contact_resistivity: rho_c,
        line: Some(line),
    })
}

/// Total resistance of a circular TLM ring with the large-radius form of the
/// contact model: `Rs/2π · [ln(L/(L−d)) + Lt·(1/(L−d) + 1/L)]`.
///
/// All lengths share one unit.
pub fn forward_resistance(
    sheet_resistance: f64,
    transfer_length: f64,
    contact_length: f64,
    spacing: f64,
) -> f64 {
    let inner = contact_length - spacing;
    sheet_resistance / (2.0 * PI)
        * ((contact_length / inner).ln()
            + transfer_length * (1.0 / inner + 1.0 / contact_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RS: f64 = 50.0;
    const LT: f64 = 2.0;
    const L: f64 = 100.0;

    fn synthetic(spacings: &[f64]) -> Vec<f64> {
        spacings
            .iter()
            .map(|&d| forward_resistance(RS, LT, L, d))
            .collect()
    }

    fn rel_err(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn line_fit_recovers_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 1.0).collect();
        let fit = LinearFit::fit(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept + 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(10.0) - 19.0).abs() < 1e-9);
    }

    #[test]
    fn line_fit_degenerate_inputs() {
        assert!(LinearFit::fit(&[1.0], &[1.0]).is_none());
        assert!(LinearFit::fit(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        let flat = LinearFit::fit(&[1.0, 2.0], &[5.0, 5.0]).unwrap();
        assert!(flat.r_squared.is_nan());
    }

    #[test]
    fn implicit_model_recovers_seed() {
        let d = [5.0, 10.0, 15.0, 20.0, 25.0];
        let res = implicit_fit(&d, &synthetic(&d), L).unwrap();
        assert!(rel_err(res.sheet_resistance, RS) < 1e-6);
        assert!(rel_err(res.transfer_length, LT) < 1e-6);
        let rho = RS * (LT * UM_TO_CM).powi(2);
        assert!(rel_err(res.specific_contact_resistivity, rho) < 1e-5);
        assert!(res.line.is_none());
    }

    #[test]
    fn corrected_model_recovers_seed() {
        let d = [5.0, 10.0, 15.0, 20.0, 25.0];
        let res = corrected_fit(&d, &synthetic(&d), L).unwrap();
        assert!(rel_err(res.sheet_resistance, RS) < 0.01);
        assert!(rel_err(res.transfer_length, LT) < 0.01);
        assert!(res.line.unwrap().r_squared >= 0.99);
    }

    #[test]
    fn models_ignore_point_order() {
        let d = [25.0, 5.0, 15.0, 10.0, 20.0];
        let r = synthetic(&d);
        let sorted = [5.0, 10.0, 15.0, 20.0, 25.0];
        let rs = synthetic(&sorted);
        for model in TlmModel::ALL {
            let a = model.fit(&d, &r, L).unwrap();
            let b = model.fit(&sorted, &rs, L).unwrap();
            assert!(rel_err(a.sheet_resistance, b.sheet_resistance) < 1e-9);
            assert!(rel_err(a.transfer_length, b.transfer_length) < 1e-9);
        }
    }

    #[test]
    fn out_of_range_spacing_fails() {
        let d = [5.0, 10.0, 100.0];
        let r = [1.0, 2.0, 3.0];
        for model in TlmModel::ALL {
            assert!(matches!(
                model.fit(&d, &r, L),
                Err(FitError::SpacingOutOfRange { .. })
            ));
            assert!(matches!(
                model.fit(&[0.0, 5.0], &[1.0, 2.0], L),
                Err(FitError::SpacingOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn too_few_points_fails() {
        for model in TlmModel::ALL {
            assert_eq!(model.fit(&[5.0], &[1.0], L), Err(FitError::TooFewPoints(1)));
            assert_eq!(model.fit(&[], &[], L), Err(FitError::TooFewPoints(0)));
        }
    }

    #[test]
    fn bad_contact_length_fails() {
        for model in TlmModel::ALL {
            assert!(matches!(
                model.fit(&[5.0, 10.0], &[1.0, 2.0], f64::NAN),
                Err(FitError::InvalidContactLength(_))
            ));
        }
    }

    #[test]
    fn repeated_spacing_is_degenerate() {
        let d = [10.0, 10.0, 10.0];
        let r = [5.0, 5.1, 4.9];
        assert_eq!(implicit_fit(&d, &r, L), Err(FitError::SingularSystem));
        assert_eq!(corrected_fit(&d, &r, L), Err(FitError::SingularSystem));
    }
}
