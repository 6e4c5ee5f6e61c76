//! Contact-resistance extraction from circular transfer-length-method
//! (CTLM) measurements.
//!
//! Instrument exports are parsed into [`Curve`]s, a [`Session`] tracks which
//! curves take part and at what spacing, and [`Session::analyze`] derives
//! zero-bias resistances and the sheet resistance / transfer length /
//! specific contact resistivity of the contact.

pub mod analysis;
pub mod config;
pub mod data;
pub mod report;
pub mod state;

pub use analysis::regression::{FitError, RegressionResult, TlmModel};
pub use analysis::{AnalysisReport, Parameters};
pub use data::loader::LoadError;
pub use data::model::{Curve, CurveKind};
pub use state::{LoadMode, Session};
