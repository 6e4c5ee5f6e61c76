use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::Curve;

/// Number of slots in the global spacing table.
pub const GROUP_COUNT: usize = 9;

/// Curves beyond this position start out excluded.
const DEFAULT_INCLUDED: usize = 9;

// ---------------------------------------------------------------------------
// Global spacing table
// ---------------------------------------------------------------------------

/// Nine user-editable spacing labels (`"10.00 um"`, ...), addressed by a
/// 1-based group number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingTable {
    entries: Vec<String>,
}

impl Default for SpacingTable {
    fn default() -> Self {
        SpacingTable {
            entries: (1..=GROUP_COUNT)
                .map(|i| format!("{:.2} um", i as f64 * 10.0))
                .collect(),
        }
    }
}

impl SpacingTable {
    /// Build a table from explicit labels; missing slots stay blank and
    /// extra labels are ignored.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut entries: Vec<String> = labels
            .iter()
            .take(GROUP_COUNT)
            .map(|s| s.as_ref().trim().to_string())
            .collect();
        entries.resize(GROUP_COUNT, String::new());
        SpacingTable { entries }
    }

    /// Label for a 1-based group, trimmed.  Out-of-range groups are blank.
    pub fn entry(&self, group: usize) -> &str {
        group
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Replace the label of a 1-based group.  Returns `false` when the
    /// group does not exist.
    pub fn set(&mut self, group: usize, label: &str) -> bool {
        match group.checked_sub(1).and_then(|i| self.entries.get_mut(i)) {
            Some(slot) => {
                *slot = label.trim().to_string();
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-curve selection rows
// ---------------------------------------------------------------------------

/// How one loaded curve takes part in an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// Whether the curve is part of the current analysis.
    pub included: bool,
    /// Take the display label from the spacing table instead of `label`.
    pub follow_global: bool,
    /// 1-based spacing-table group.
    pub group: usize,
    /// User label; blank falls back to the curve's own label.
    pub label: String,
}

/// One row per curve with the defaults of a fresh load: the first nine
/// curves included, every curve following the table, group = position
/// (capped at nine).
pub fn init_selection(curves: &[Curve]) -> Vec<SweepRow> {
    curves
        .iter()
        .enumerate()
        .map(|(i, c)| SweepRow {
            included: i < DEFAULT_INCLUDED,
            follow_global: true,
            group: (i + 1).min(GROUP_COUNT),
            label: c.label().to_string(),
        })
        .collect()
}

/// Indices of included rows, in row order.
pub fn selected_indices(rows: &[SweepRow]) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| r.included)
        .map(|(i, _)| i)
        .collect()
}

/// An included curve together with the label it is shown under.
#[derive(Debug, Clone)]
pub struct DisplayCurve<'a> {
    /// Position in the loaded curve list.
    pub index: usize,
    pub curve: &'a Curve,
    pub label: String,
    /// Spacing-table group the curve is assigned to.
    pub group: usize,
}

/// Resolve the label a row is shown under.
///
/// * following the table → the group's entry, or `W<group>` if blank
/// * otherwise → the row label, or the curve label if blank
pub fn display_label(row: &SweepRow, table: &SpacingTable, curve: &Curve) -> String {
    if row.follow_global {
        let entry = table.entry(row.group);
        if entry.is_empty() {
            format!("W{}", row.group)
        } else {
            entry.to_string()
        }
    } else {
        let label = row.label.trim();
        if label.is_empty() {
            curve.label().to_string()
        } else {
            label.to_string()
        }
    }
}

/// Included curves in row order with their resolved labels.
pub fn display_curves<'a>(
    curves: &'a [Curve],
    rows: &[SweepRow],
    table: &SpacingTable,
) -> Vec<DisplayCurve<'a>> {
    rows.iter()
        .zip(curves.iter())
        .enumerate()
        .filter(|(_, (row, _))| row.included)
        .map(|(index, (row, curve))| DisplayCurve {
            index,
            curve,
            label: display_label(row, table, curve),
            group: row.group,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Spacing values embedded in labels
// ---------------------------------------------------------------------------

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("number pattern is valid")
    })
}

/// First real-number literal inside a label: `"25 um"` → 25, `"d=1.5e1"` → 15.
pub fn parse_numeric_from_label(label: &str) -> Option<f64> {
    number_pattern()
        .find(label)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Spacing for a displayed curve: the number in its group's table entry,
/// else the number in its display label.  A zero in the table entry also
/// falls back to the label.
pub fn resolve_spacing(display: &DisplayCurve<'_>, table: &SpacingTable) -> Option<f64> {
    parse_numeric_from_label(table.entry(display.group))
        .filter(|&v| v != 0.0)
        .or_else(|| parse_numeric_from_label(&display.label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curves(n: usize) -> Vec<Curve> {
        (0..n)
            .map(|i| Curve::current_voltage(format!("Sweep_{}", i + 1), vec![0.0], vec![0.0]))
            .collect()
    }

    #[test]
    fn default_table() {
        let t = SpacingTable::default();
        assert_eq!(t.entry(1), "10.00 um");
        assert_eq!(t.entry(9), "90.00 um");
        assert_eq!(t.entry(0), "");
        assert_eq!(t.entry(10), "");
    }

    #[test]
    fn table_from_short_list_pads_blank() {
        let t = SpacingTable::from_labels(&["5 um", " 7 um "]);
        assert_eq!(t.entry(2), "7 um");
        assert_eq!(t.entry(3), "");
        let ten = ["5 um", "7 um", "", "", "", "", "", "", "", "x"];
        assert_eq!(t, SpacingTable::from_labels(&ten));
    }

    #[test]
    fn initial_rows() {
        let rows = init_selection(&curves(11));
        assert_eq!(selected_indices(&rows), (0..9).collect::<Vec<_>>());
        assert_eq!(rows[0].group, 1);
        assert_eq!(rows[10].group, 9);
        assert!(rows.iter().all(|r| r.follow_global));
    }

    #[test]
    fn labels_follow_table_or_row() {
        let cs = curves(2);
        let mut table = SpacingTable::default();
        let mut rows = init_selection(&cs);
        assert_eq!(display_label(&rows[0], &table, &cs[0]), "10.00 um");

        table.set(1, "");
        assert_eq!(display_label(&rows[0], &table, &cs[0]), "W1");

        rows[1].follow_global = false;
        rows[1].label = "  ".into();
        assert_eq!(display_label(&rows[1], &table, &cs[1]), "Sweep_2");
        rows[1].label = "custom".into();
        assert_eq!(display_label(&rows[1], &table, &cs[1]), "custom");
    }

    #[test]
    fn numeric_labels() {
        assert_eq!(parse_numeric_from_label("25.00 um"), Some(25.0));
        assert_eq!(parse_numeric_from_label("d=1.5e1um"), Some(15.0));
        assert_eq!(parse_numeric_from_label("-3"), Some(-3.0));
        assert_eq!(parse_numeric_from_label("W"), None);
    }

    #[test]
    fn spacing_prefers_table_entry() {
        let cs = curves(1);
        let mut table = SpacingTable::default();
        let mut rows = init_selection(&cs);
        rows[0].follow_global = false;
        rows[0].label = "35 um".into();
        let shown = display_curves(&cs, &rows, &table);
        assert_eq!(resolve_spacing(&shown[0], &table), Some(10.0));

        table.set(1, "0 um");
        assert_eq!(resolve_spacing(&shown[0], &table), Some(35.0));
    }
}
