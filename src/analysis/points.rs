use log::debug;
use serde::Serialize;

use super::regression::LinearFit;
use super::zero_bias::zero_bias_resistance;
use crate::data::selection::{resolve_spacing, DisplayCurve, SpacingTable};

/// Zero-bias resistance of one I–V curve placed at its spacing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResistancePoint {
    /// µm
    pub spacing: f64,
    /// Ω
    pub resistance: f64,
    pub label: String,
}

/// One point per displayed I–V curve, in display order.
///
/// Curves without a parseable spacing or with a `NaN` zero-bias estimate
/// are left out.
pub fn build_resistance_points(
    shown: &[DisplayCurve<'_>],
    table: &SpacingTable,
    window: f64,
) -> Vec<ResistancePoint> {
    shown
        .iter()
        .filter_map(|d| {
            let current = d.curve.current()?;
            let resistance = zero_bias_resistance(d.curve.voltage(), current, window);
            let Some(spacing) = resolve_spacing(d, table) else {
                debug!("{}: no spacing value, skipped", d.label);
                return None;
            };
            if resistance.is_nan() {
                debug!("{}: no zero-bias resistance, skipped", d.label);
                return None;
            }
            Some(ResistancePoint {
                spacing,
                resistance,
                label: d.label.clone(),
            })
        })
        .collect()
}

/// Split points into parallel `(spacing, resistance)` arrays.
pub fn columns(points: &[ResistancePoint]) -> (Vec<f64>, Vec<f64>) {
    points.iter().map(|p| (p.spacing, p.resistance)).unzip()
}

/// Plain `R0 = a·d + b` line over the finite points.
pub fn spacing_fit(points: &[ResistancePoint]) -> Option<LinearFit> {
    let (x, y): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter(|p| p.spacing.is_finite() && p.resistance.is_finite())
        .map(|p| (p.spacing, p.resistance))
        .unzip();
    LinearFit::fit(&x, &y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Curve;
    use crate::data::selection::{display_curves, init_selection};

    fn ohmic(label: &str, r: f64) -> Curve {
        let v: Vec<f64> = (0..11).map(|k| -0.5 + 0.1 * k as f64).collect();
        let i = v.iter().map(|x| x / r).collect();
        Curve::current_voltage(label, v, i)
    }

    #[test]
    fn points_follow_the_spacing_table() {
        let curves = vec![
            ohmic("a", 100.0),
            Curve::capacitance_voltage("cv", vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]),
            ohmic("b", 200.0),
        ];
        let table = SpacingTable::default();
        let mut rows = init_selection(&curves);
        rows[2].group = 5;
        let shown = display_curves(&curves, &rows, &table);

        let points = build_resistance_points(&shown, &table, 0.5);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].spacing, 10.0);
        assert_eq!(points[1].spacing, 50.0);
        assert_eq!(points[1].label, "50.00 um");
        assert!((points[1].resistance - 200.0).abs() < 1e-6);

        let fit = spacing_fit(&points).unwrap();
        assert!((fit.slope - 2.5).abs() < 1e-6);
    }

    #[test]
    fn curves_without_spacing_are_skipped() {
        let curves = vec![ohmic("a", 100.0)];
        let table = SpacingTable::from_labels(&["none"]);
        let mut rows = init_selection(&curves);
        rows[0].follow_global = false;
        rows[0].label = "unnamed".into();
        let shown = display_curves(&curves, &rows, &table);
        assert!(build_resistance_points(&shown, &table, 0.5).is_empty());
    }
}
