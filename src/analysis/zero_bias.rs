use super::regression::LinearFit;

/// Default half-width of the fit window around 0 V.
pub const DEFAULT_WINDOW: f64 = 0.5;

/// Samples needed inside the window before the nearest-to-zero fallback
/// kicks in.
const MIN_WINDOW_SAMPLES: usize = 3;
/// Upper bound on samples taken by the fallback.
const MAX_FALLBACK_SAMPLES: usize = 7;
/// Slopes this close to zero are treated as an open circuit.
const SLOPE_TOLERANCE: f64 = 1e-8;

/// Resistance near zero bias: the reciprocal slope of a straight-line fit
/// of current against voltage over `|V| <= window`.
///
/// If fewer than three samples sit inside the window, the (up to seven)
/// samples closest to 0 V are used instead.  Returns `NaN` when no line
/// can be fitted or its slope is indistinguishable from zero.
pub fn zero_bias_resistance(voltage: &[f64], current: &[f64], window: f64) -> f64 {
    let n = voltage.len().min(current.len());
    if n == 0 {
        return f64::NAN;
    }

    let mut picked: Vec<usize> = (0..n).filter(|&k| voltage[k].abs() <= window).collect();
    if picked.len() < MIN_WINDOW_SAMPLES {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| voltage[a].abs().total_cmp(&voltage[b].abs()));
        order.truncate(MAX_FALLBACK_SAMPLES);
        picked = order;
    }

    let v: Vec<f64> = picked.iter().map(|&k| voltage[k]).collect();
    let i: Vec<f64> = picked.iter().map(|&k| current[k]).collect();
    match LinearFit::fit(&v, &i) {
        Some(fit) if fit.slope.abs() > SLOPE_TOLERANCE => 1.0 / fit.slope,
        _ => f64::NAN,
    }
}
