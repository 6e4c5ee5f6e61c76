/// Minimum sweep length for a second-order derivative estimate.
pub const MIN_SAMPLES: usize = 3;

/// Differential resistance `dV/dI` along a sweep.
///
/// The derivative `dI/dV` is taken with second-order differences in the
/// order the samples were recorded, then inverted point-wise.  Flat or
/// repeated-voltage regions come out as `inf`/`NaN` rather than errors.
/// Without a usable current (missing, length mismatch, fewer than
/// [`MIN_SAMPLES`] points) every sample is `NaN`.
pub fn differential_resistance(voltage: &[f64], current: Option<&[f64]>) -> Vec<f64> {
    match current {
        Some(i) if voltage.len() >= MIN_SAMPLES && i.len() == voltage.len() => {
            gradient(i, voltage).into_iter().map(|g| 1.0 / g).collect()
        }
        _ => vec![f64::NAN; voltage.len()],
    }
}

/// Second-order accurate `df/dx` on an arbitrary (non-uniform, unsorted)
/// grid: central differences inside, one-sided three-point stencils at
/// both ends.  Needs at least three samples.
pub fn gradient(f: &[f64], x: &[f64]) -> Vec<f64> {
    let n = f.len();
    debug_assert_eq!(n, x.len());
    if n < MIN_SAMPLES {
        return vec![f64::NAN; n];
    }

    let mut out = vec![0.0; n];
    for k in 1..n - 1 {
        let hs = x[k] - x[k - 1];
        let hd = x[k + 1] - x[k];
        out[k] = (hs * hs * f[k + 1] + (hd * hd - hs * hs) * f[k] - hd * hd * f[k - 1])
            / (hs * hd * (hd + hs));
    }

    let (dx1, dx2) = (x[1] - x[0], x[2] - x[1]);
    let a = -(2.0 * dx1 + dx2) / (dx1 * (dx1 + dx2));
    let b = (dx1 + dx2) / (dx1 * dx2);
    let c = -dx1 / (dx2 * (dx1 + dx2));
    out[0] = a * f[0] + b * f[1] + c * f[2];

    let (dx1, dx2) = (x[n - 2] - x[n - 3], x[n - 1] - x[n - 2]);
    let a = dx2 / (dx1 * (dx1 + dx2));
    let b = -(dx2 + dx1) / (dx1 * dx2);
    let c = (2.0 * dx2 + dx1) / (dx2 * (dx1 + dx2));
    out[n - 1] = a * f[n - 3] + b * f[n - 2] + c * f[n - 1];

    out
}
