use std::path::PathBuf;

use crate::analysis::{analyze, AnalysisReport, Parameters};
use crate::data::loader::{load_file, load_files, LoadError};
use crate::data::model::Curve;
use crate::data::selection::{
    display_curves, init_selection, selected_indices, DisplayCurve, SpacingTable, SweepRow,
    GROUP_COUNT,
};

// ---------------------------------------------------------------------------
// Analysis session
// ---------------------------------------------------------------------------

/// How the curves were loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// One export holding many sweeps.
    SingleFile,
    /// One sweep per file.
    MultiFile,
}

/// The loaded curve snapshot plus the user's selection and parameters.
///
/// Curves never change after load; everything derived from them is
/// recomputed by [`Session::analyze`].
#[derive(Debug, Clone)]
pub struct Session {
    curves: Vec<Curve>,
    pub mode: LoadMode,
    pub sources: Vec<PathBuf>,

    /// One row per curve, same order.
    pub rows: Vec<SweepRow>,

    /// Global spacing labels, addressed by row group.
    pub spacing_table: SpacingTable,

    pub parameters: Parameters,
}

impl Session {
    /// Wrap an already-loaded curve list with default selection state.
    pub fn new(curves: Vec<Curve>, mode: LoadMode, sources: Vec<PathBuf>) -> Self {
        let rows = init_selection(&curves);
        Session {
            curves,
            mode,
            sources,
            rows,
            spacing_table: SpacingTable::default(),
            parameters: Parameters::default(),
        }
    }

    /// One export file holding several sweeps.
    pub fn load_single(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let curves = load_file(&path)?;
        Ok(Session::new(curves, LoadMode::SingleFile, vec![path]))
    }

    /// Several files, one sweep each.
    pub fn load_multi(paths: Vec<PathBuf>) -> Result<Self, LoadError> {
        let curves = load_files(&paths)?;
        Ok(Session::new(curves, LoadMode::MultiFile, paths))
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        selected_indices(&self.rows)
    }

    /// Included curves with the labels they are shown under.
    pub fn display(&self) -> Vec<DisplayCurve<'_>> {
        display_curves(&self.curves, &self.rows, &self.spacing_table)
    }

    /// Recompute every derived quantity for the current state.
    pub fn analyze(&self) -> AnalysisReport {
        analyze(&self.display(), &self.spacing_table, &self.parameters)
    }

    /// Include every curve.
    pub fn select_all(&mut self) {
        for row in &mut self.rows {
            row.included = true;
        }
    }

    /// Exclude every curve.
    pub fn clear_all(&mut self) {
        for row in &mut self.rows {
            row.included = false;
        }
    }

    /// Toggle a single curve.  Out-of-range indices are ignored.
    pub fn set_included(&mut self, index: usize, included: bool) {
        if let Some(row) = self.rows.get_mut(index) {
            row.included = included;
        }
    }

    /// Assign a curve to a spacing group, clamped to `1..=9`.
    pub fn set_group(&mut self, index: usize, group: usize) {
        if let Some(row) = self.rows.get_mut(index) {
            row.group = group.clamp(1, GROUP_COUNT);
        }
    }

    /// Give a curve its own label and stop it following the table.
    pub fn set_label(&mut self, index: usize, label: &str) {
        if let Some(row) = self.rows.get_mut(index) {
            row.label = label.to_string();
            row.follow_global = false;
        }
    }
}
